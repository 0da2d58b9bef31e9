//! # patchx
//!
//! PatchCore-style visual anomaly detection: fit a coreset of "normal" CNN
//! patch embeddings from defect-free images, then score query images by
//! nearest-neighbor patch distance and localize anomalies spatially.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! patchx download
//! patchx train bottle
//! patchx eval bottle
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use patchx::prelude::*;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let backbone = ConvBackbone::from_id("base256-s8").unwrap();
//! let mut model = PatchCore::new(backbone, 224, 1);
//!
//! let images: Vec<ndarray::Array3<f32>> = vec![/* (3, 224, 224) tensors */];
//! let mut rng = StdRng::seed_from_u64(0);
//! model.fit_from_images(&images, 20_000, &mut rng).unwrap();
//!
//! let query = ndarray::Array3::zeros((3, 224, 224));
//! let (image_score, score_map) = model.score(&query).unwrap();
//! model.save("bottle.bin".as_ref()).unwrap();
//! ```
//!
//! ## Crate Structure
//!
//! - [`patchx_core`] - patch vectors, coreset matcher, model lifecycle and
//!   persistence
//! - [`patchx_backbone`] - deterministic candle CNN feature extractors
//! - [`patchx_data`] - MVTec-AD layout, image I/O, AUROC metrics, galleries

pub mod commands;
pub mod config;

// Re-export core types
pub use patchx_core::{
    CoresetMatcher, Error, FeatureExtractor, FeatureGrid, ModelArtifact, PatchCore, Result, Vector,
};

// Re-export the backbone and data layers
pub use patchx_backbone::ConvBackbone;
pub use patchx_data::{MetricsReport, TestSample};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::RunConfig;
    pub use patchx_backbone::ConvBackbone;
    pub use patchx_core::{
        CoresetMatcher, Error, FeatureExtractor, FeatureGrid, ModelArtifact, PatchCore, Result,
        Vector,
    };
    pub use patchx_data::{
        load_image, load_mask, pixel_auroc, roc_auc, upsample_bilinear, MetricsReport, TestSample,
    };
}
