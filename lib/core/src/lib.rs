//! # patchx-core
//!
//! Core library for the patchx anomaly detector.
//!
//! This crate provides the patch-embedding anomaly model:
//!
//! - [`Vector`] - Dense patch embedding with Euclidean distance
//! - [`FeatureExtractor`] - Injected image -> feature-grid capability
//! - [`CoresetMatcher`] - Brute-force nearest-neighbor matcher over a
//!   subsampled reference coreset
//! - [`PatchCore`] - Fit/score/persist orchestration with an explicit
//!   unfitted/fitted lifecycle
//!
//! ## Example
//!
//! ```rust,no_run
//! use patchx_core::{FeatureExtractor, FeatureGrid, PatchCore, Result, Vector};
//! use ndarray::Array3;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Any capability producing a fixed-shape patch grid can be injected.
//! struct MeanPool;
//!
//! impl FeatureExtractor for MeanPool {
//!     fn id(&self) -> &str { "mean-pool" }
//!     fn channels(&self) -> usize { 3 }
//!     fn embed(&self, _image: &Array3<f32>) -> Result<FeatureGrid> {
//!         let patches = vec![Vector::new(vec![0.0; 3]); 4];
//!         Ok(FeatureGrid { height: 2, width: 2, channels: 3, patches })
//!     }
//! }
//!
//! let training_images = vec![Array3::zeros((3, 8, 8))];
//! let query = Array3::zeros((3, 8, 8));
//!
//! let mut model = PatchCore::new(MeanPool, 8, 1);
//! let mut rng = StdRng::seed_from_u64(0);
//! model.fit_from_images(&training_images, 20_000, &mut rng).unwrap();
//!
//! let (image_score, score_map) = model.score(&query).unwrap();
//! model.save(std::path::Path::new("model.bin")).unwrap();
//! ```

pub mod error;
pub mod grid;
pub mod matcher;
pub mod model;
pub mod vector;

pub use error::{Error, Result};
pub use grid::{FeatureExtractor, FeatureGrid};
pub use matcher::CoresetMatcher;
pub use model::{ModelArtifact, PatchCore};
pub use vector::Vector;
