//! YAML run configuration with CLI overrides layered on top.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Dataset root; falls back to `PATCHX_DATA_ROOT`, then `data/mvtec_ad`
    pub data_root: Option<PathBuf>,
    /// Output directory for models, metrics and galleries
    pub out_dir: PathBuf,
    /// Backbone identifier, see patchx-backbone presets
    pub backbone: String,
    /// Square input resolution images are resized to
    pub image_size: u32,
    /// Coreset budget: maximum patch vectors kept at fit time
    pub max_patches: usize,
    /// Stored neighbor count; scoring consumes the rank-1 distance
    pub nn_k: usize,
    /// Seed for the coreset subsampling draw
    pub seed: u64,
    /// Number of top-scoring samples rendered into the eval gallery
    pub top_n: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            out_dir: PathBuf::from("runs"),
            backbone: patchx_backbone::DEFAULT_BACKBONE.to_string(),
            image_size: 224,
            max_patches: 20_000,
            nn_k: 1,
            seed: 0,
            top_n: 8,
        }
    }
}

impl RunConfig {
    /// Load from a YAML file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed to parse config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn model_path(&self, category: &str) -> PathBuf {
        self.out_dir
            .join("models")
            .join(format!("{category}-{}.bin", self.backbone))
    }

    pub fn metrics_path(&self, category: &str) -> PathBuf {
        self.out_dir.join("metrics").join(format!("{category}.json"))
    }

    pub fn gallery_dir(&self, category: &str) -> PathBuf {
        self.out_dir.join("gallery").join(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.image_size, 224);
        assert_eq!(cfg.max_patches, 20_000);
        assert_eq!(cfg.nn_k, 1);
        assert_eq!(cfg.backbone, "base256-s8");
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, "image_size: 64\nbackbone: tiny64-s4\n").unwrap();
        let cfg = RunConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.image_size, 64);
        assert_eq!(cfg.backbone, "tiny64-s4");
        assert_eq!(cfg.max_patches, 20_000);
    }

    #[test]
    fn test_load_unknown_field_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, "imge_size: 64\n").unwrap();
        assert!(RunConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_paths() {
        let cfg = RunConfig::default();
        assert!(cfg
            .model_path("bottle")
            .ends_with("models/bottle-base256-s8.bin"));
        assert!(cfg.metrics_path("bottle").ends_with("metrics/bottle.json"));
    }
}
