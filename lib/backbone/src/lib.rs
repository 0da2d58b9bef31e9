//! # patchx-backbone
//!
//! Concrete [`patchx_core::FeatureExtractor`] implementations for patchx.
//!
//! The backbone is an exchangeable capability: the model only consumes the
//! grid-shape contract, so any extractor with a fixed channel count and a
//! fixed downsampling ratio can stand in. This crate ships [`ConvBackbone`],
//! a deterministic CPU CNN built on candle whose weights derive from the
//! backbone identifier, making fitted artifacts reconstructable from the
//! identifier alone.

pub mod conv;

pub use conv::{ConvBackbone, DEFAULT_BACKBONE};
