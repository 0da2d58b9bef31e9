//! # patchx-data
//!
//! Dataset, image I/O, metrics and visualization layer for patchx.
//!
//! - [`mvtec`] - MVTec-AD layout validation and split enumeration
//! - [`image_io`] - decode/resize into model-ready tensors
//! - [`metrics`] - image- and pixel-level AUROC plus the JSON report
//! - [`viz`] - three-panel heatmap galleries

pub mod error;
pub mod image_io;
pub mod metrics;
pub mod mvtec;
pub mod viz;

pub use error::{Error, Result};
pub use image_io::{load_image, load_mask};
pub use metrics::{pixel_auroc, roc_auc, upsample_bilinear, MetricsReport};
pub use mvtec::{
    index_test_split, list_categories, resolve_root, train_good_images, validate_root, TestSample,
};
pub use viz::{normalize01, save_triptych};
