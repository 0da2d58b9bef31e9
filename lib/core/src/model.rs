use crate::{CoresetMatcher, Error, FeatureExtractor, FeatureGrid, Result, Vector};
use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Persisted snapshot of a fitted model: everything needed to reconstruct a
/// query-ready [`PatchCore`] without retraining.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub backbone: String,
    pub image_size: u32,
    pub nn_k: usize,
    pub feat_hw: (usize, usize),
    pub channels: usize,
    /// Coreset rows flattened row-major, `coreset.len() == rows * channels`
    pub coreset: Vec<f32>,
}

impl ModelArtifact {
    /// Number of coreset rows
    #[must_use]
    pub fn rows(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.coreset.len() / self.channels
        }
    }

    /// Read an artifact from disk
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ModelFileMissing(path.to_path_buf()));
        }
        let data = std::fs::read(path)?;
        bincode::deserialize(&data)
            .map_err(|e| Error::Persistence(format!("failed to decode {}: {e}", path.display())))
    }

    /// Write the artifact to a temporary file, then rename into place
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = bincode::serialize(self)
            .map_err(|e| Error::Persistence(format!("serialization error: {e}")))?;
        let temp = path.with_extension("tmp");
        std::fs::write(&temp, &data)?;
        std::fs::rename(&temp, path)?;
        Ok(())
    }
}

/// Fitted state, set atomically: the reference coreset and the feature-grid
/// shape it was built against are never observable separately.
#[derive(Debug)]
struct FittedState {
    matcher: CoresetMatcher,
    feat_hw: (usize, usize),
}

/// PatchCore anomaly model: an injected feature extractor plus a coreset
/// matcher with a two-state `Unfitted -> Fitted` lifecycle.
///
/// Fit embeds defect-free training images and stores a (subsampled) pool of
/// their patch vectors as the reference for "normal" appearance. Scoring
/// embeds a query image, takes each patch's nearest-neighbor distance into the
/// coreset, reshapes the distances to the feature grid, and reports the worst
/// local mismatch as the image score.
#[derive(Debug)]
pub struct PatchCore<E: FeatureExtractor> {
    extractor: E,
    image_size: u32,
    k: usize,
    fitted: Option<FittedState>,
}

impl<E: FeatureExtractor> PatchCore<E> {
    #[must_use]
    pub fn new(extractor: E, image_size: u32, k: usize) -> Self {
        Self {
            extractor,
            image_size,
            k: k.max(1),
            fitted: None,
        }
    }

    #[must_use]
    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    #[must_use]
    pub fn backbone_id(&self) -> &str {
        self.extractor.id()
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Feature-grid shape recorded at fit time
    pub fn feat_hw(&self) -> Result<(usize, usize)> {
        Ok(self.fitted()?.feat_hw)
    }

    /// Coreset size, for inspection and tests
    pub fn coreset_len(&self) -> Result<usize> {
        Ok(self.fitted()?.matcher.len())
    }

    /// The single fitted-state guard: every query-side operation goes
    /// through here so an unfitted model fails uniformly.
    fn fitted(&self) -> Result<&FittedState> {
        self.fitted.as_ref().ok_or(Error::NotFitted)
    }

    fn embed_checked(&self, image: &Array3<f32>, expected: Option<(usize, usize)>) -> Result<FeatureGrid> {
        let grid = self.extractor.embed(image)?;
        if grid.len() != grid.height * grid.width {
            return Err(Error::Backbone(format!(
                "extractor '{}' returned {} patches for a {}x{} grid",
                self.extractor.id(),
                grid.len(),
                grid.height,
                grid.width
            )));
        }
        if let Some(expected) = expected {
            if grid.shape() != expected {
                return Err(Error::GridMismatch {
                    expected,
                    actual: grid.shape(),
                });
            }
        }
        Ok(grid)
    }

    /// Fit the reference coreset from defect-free training images.
    ///
    /// Embeds every image, pools all patch vectors, and fits the matcher with
    /// a coreset budget of `max_patches`. The subsampling draw is the only
    /// nondeterminism and is controlled by the caller-provided `rng`.
    pub fn fit_from_images(
        &mut self,
        images: &[Array3<f32>],
        max_patches: usize,
        rng: &mut StdRng,
    ) -> Result<()> {
        if images.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }

        let mut pool: Vec<Vector> = Vec::new();
        let mut feat_hw: Option<(usize, usize)> = None;
        for image in images {
            let grid = self.embed_checked(image, feat_hw)?;
            feat_hw = Some(grid.shape());
            pool.extend(grid.patches);
        }
        let feat_hw = feat_hw.expect("non-empty image list yields a grid shape");

        debug!(
            images = images.len(),
            patches = pool.len(),
            feat_hw = ?feat_hw,
            "fitting coreset"
        );

        let mut matcher = CoresetMatcher::new(self.k, max_patches);
        matcher.fit(pool, rng)?;
        info!(
            coreset = matcher.len(),
            backbone = self.extractor.id(),
            "model fitted"
        );

        // Replace the fitted state as one unit; a failed fit above leaves any
        // previous state untouched.
        self.fitted = Some(FittedState { matcher, feat_hw });
        Ok(())
    }

    /// Score one image: `(image_score, score_map)`.
    ///
    /// The score map is the per-cell nearest-neighbor distance reshaped
    /// row-major into the feature-grid shape recorded at fit time; the image
    /// score is its maximum, so the single worst local region decides.
    pub fn score(&self, image: &Array3<f32>) -> Result<(f32, Array2<f32>)> {
        let state = self.fitted()?;
        let grid = self.embed_checked(image, Some(state.feat_hw))?;
        let distances = state.matcher.query(&grid.patches)?;
        let map = Array2::from_shape_vec(state.feat_hw, distances)
            .map_err(|e| Error::Backbone(format!("score map shape error: {e}")))?;
        let image_score = map.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Ok((image_score, map))
    }

    /// Snapshot the fitted state as an artifact
    pub fn to_artifact(&self) -> Result<ModelArtifact> {
        let state = self.fitted()?;
        let coreset = state.matcher.coreset()?;
        let channels = coreset.first().map_or(0, Vector::dim);
        let mut flat = Vec::with_capacity(coreset.len() * channels);
        for v in coreset {
            flat.extend_from_slice(v.as_slice());
        }
        Ok(ModelArtifact {
            backbone: self.extractor.id().to_string(),
            image_size: self.image_size,
            nn_k: self.k,
            feat_hw: state.feat_hw,
            channels,
            coreset: flat,
        })
    }

    /// Persist the fitted model; fails on an unfitted instance
    pub fn save(&self, path: &Path) -> Result<()> {
        let artifact = self.to_artifact()?;
        artifact.write(path)?;
        info!(path = %path.display(), coreset = artifact.rows(), "model saved");
        Ok(())
    }

    /// Rebuild a query-ready model from a persisted artifact.
    ///
    /// The matcher is re-fitted on the restored coreset rows, so a loaded
    /// model scores identically to the instance that produced the artifact.
    pub fn from_artifact(artifact: ModelArtifact, extractor: E) -> Result<Self> {
        if extractor.id() != artifact.backbone {
            return Err(Error::BackboneMismatch {
                artifact: artifact.backbone,
                extractor: extractor.id().to_string(),
            });
        }
        if artifact.channels == 0 || artifact.coreset.len() % artifact.channels != 0 {
            return Err(Error::Persistence(format!(
                "corrupt artifact: {} coreset values do not divide into {}-channel rows",
                artifact.coreset.len(),
                artifact.channels
            )));
        }
        let rows: Vec<Vector> = artifact
            .coreset
            .chunks_exact(artifact.channels)
            .map(Vector::from_slice)
            .collect();
        let mut matcher = CoresetMatcher::new(artifact.nn_k, rows.len().max(1));
        matcher.fit_exact(rows)?;
        Ok(Self {
            extractor,
            image_size: artifact.image_size,
            k: artifact.nn_k,
            fitted: Some(FittedState {
                matcher,
                feat_hw: artifact.feat_hw,
            }),
        })
    }

    /// Read an artifact from disk and rebuild the model
    pub fn load(path: &Path, extractor: E) -> Result<Self> {
        let artifact = ModelArtifact::read(path)?;
        Self::from_artifact(artifact, extractor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// Test extractor: one channel per patch whose value is the image pixel at
    /// that grid cell, so score-map positions are directly observable.
    #[derive(Debug)]
    struct GridStub {
        hw: (usize, usize),
    }

    impl FeatureExtractor for GridStub {
        fn id(&self) -> &str {
            "grid-stub"
        }

        fn channels(&self) -> usize {
            1
        }

        fn embed(&self, image: &Array3<f32>) -> Result<FeatureGrid> {
            let (h, w) = self.hw;
            let mut patches = Vec::with_capacity(h * w);
            for r in 0..h {
                for c in 0..w {
                    patches.push(Vector::new(vec![image[[0, r, c]]]));
                }
            }
            Ok(FeatureGrid {
                height: h,
                width: w,
                channels: 1,
                patches,
            })
        }
    }

    /// Test extractor mimicking a wider backbone: fixed channel count, patch
    /// values derived from the image mean plus the patch index.
    #[derive(Debug)]
    struct WideStub {
        hw: (usize, usize),
        channels: usize,
    }

    impl FeatureExtractor for WideStub {
        fn id(&self) -> &str {
            "wide-stub"
        }

        fn channels(&self) -> usize {
            self.channels
        }

        fn embed(&self, image: &Array3<f32>) -> Result<FeatureGrid> {
            let mean = image.iter().sum::<f32>() / image.len() as f32;
            let (h, w) = self.hw;
            let patches = (0..h * w)
                .map(|i| Vector::new(vec![mean + i as f32 * 0.01; self.channels]))
                .collect();
            Ok(FeatureGrid {
                height: h,
                width: w,
                channels: self.channels,
                patches,
            })
        }
    }

    fn zeros(h: usize, w: usize) -> Array3<f32> {
        Array3::zeros((3, h, w))
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0)
    }

    #[test]
    fn test_score_before_fit_fails() {
        let model = PatchCore::new(GridStub { hw: (2, 2) }, 8, 1);
        let err = model.score(&zeros(2, 2)).unwrap_err();
        assert!(matches!(err, Error::NotFitted));
    }

    #[test]
    fn test_save_before_fit_fails() {
        let model = PatchCore::new(GridStub { hw: (2, 2) }, 8, 1);
        let dir = tempfile::tempdir().unwrap();
        let err = model.save(&dir.path().join("m.bin")).unwrap_err();
        assert!(matches!(err, Error::NotFitted));
    }

    #[test]
    fn test_fit_empty_list_fails() {
        let mut model = PatchCore::new(GridStub { hw: (2, 2) }, 8, 1);
        let err = model.fit_from_images(&[], 100, &mut rng()).unwrap_err();
        assert!(matches!(err, Error::EmptyTrainingSet));
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_coreset_size_is_min_of_budget_and_pool() {
        // 3 images on an 8x8 grid -> 192 patch vectors
        let mut model = PatchCore::new(WideStub { hw: (8, 8), channels: 4 }, 32, 1);
        let images = vec![zeros(8, 8), zeros(8, 8), zeros(8, 8)];
        model.fit_from_images(&images, 100, &mut rng()).unwrap();
        assert_eq!(model.coreset_len().unwrap(), 100);

        let mut small = PatchCore::new(WideStub { hw: (8, 8), channels: 4 }, 32, 1);
        small.fit_from_images(&images, 1000, &mut rng()).unwrap();
        assert_eq!(small.coreset_len().unwrap(), 192);
    }

    #[test]
    fn test_score_map_ordering_is_row_major() {
        let mut model = PatchCore::new(GridStub { hw: (2, 3) }, 4, 1);
        model
            .fit_from_images(&[zeros(2, 3)], 100, &mut rng())
            .unwrap();

        // One hot pixel at grid cell (1, 2): the anomaly must land exactly
        // there in the score map, anything else is a transposition bug.
        let mut query = zeros(2, 3);
        query[[0, 1, 2]] = 5.0;
        let (score, map) = model.score(&query).unwrap();
        assert_eq!(map.dim(), (2, 3));
        assert!((map[[1, 2]] - 5.0).abs() < 1e-6);
        assert!(map[[0, 0]] < 1e-6);
        assert!(map[[1, 1]] < 1e-6);
        assert!((score - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_vector_coreset_gives_constant_map() {
        let mut model = PatchCore::new(GridStub { hw: (2, 2) }, 4, 1);
        model
            .fit_from_images(&[zeros(2, 2)], 1, &mut rng())
            .unwrap();
        assert_eq!(model.coreset_len().unwrap(), 1);

        let mut query = zeros(2, 2);
        query.fill(3.0);
        let (score, map) = model.score(&query).unwrap();
        let first = map[[0, 0]];
        assert!(map.iter().all(|&v| (v - first).abs() < 1e-6));
        assert!((score - first).abs() < 1e-6);
    }

    #[test]
    fn test_image_score_is_max_of_map() {
        let mut model = PatchCore::new(GridStub { hw: (2, 2) }, 4, 1);
        model
            .fit_from_images(&[zeros(2, 2)], 100, &mut rng())
            .unwrap();
        let mut query = zeros(2, 2);
        query[[0, 0, 0]] = 1.0;
        query[[0, 1, 1]] = 2.5;
        let (score, map) = model.score(&query).unwrap();
        let max = map.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(score, max);
        assert!((score - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_save_load_score_round_trip() {
        let mut model = PatchCore::new(WideStub { hw: (4, 4), channels: 8 }, 16, 1);
        let mut train = zeros(4, 4);
        train.fill(0.25);
        model
            .fit_from_images(&[train.clone()], 10, &mut rng())
            .unwrap();

        let mut query = zeros(4, 4);
        query.fill(0.9);
        let (score_before, map_before) = model.score(&query).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("m.bin");
        model.save(&path).unwrap();

        let restored =
            PatchCore::load(&path, WideStub { hw: (4, 4), channels: 8 }).unwrap();
        assert_eq!(restored.image_size(), 16);
        assert_eq!(restored.feat_hw().unwrap(), (4, 4));
        let (score_after, map_after) = restored.score(&query).unwrap();

        assert!((score_before - score_after).abs() < 1e-6);
        for (a, b) in map_before.iter().zip(map_after.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            PatchCore::load(&dir.path().join("no.bin"), GridStub { hw: (2, 2) }).unwrap_err();
        assert!(matches!(err, Error::ModelFileMissing(_)));
    }

    #[test]
    fn test_load_backbone_mismatch_fails() {
        let mut model = PatchCore::new(GridStub { hw: (2, 2) }, 8, 1);
        model
            .fit_from_images(&[zeros(2, 2)], 100, &mut rng())
            .unwrap();
        let artifact = model.to_artifact().unwrap();
        let err =
            PatchCore::from_artifact(artifact, WideStub { hw: (2, 2), channels: 1 }).unwrap_err();
        assert!(matches!(err, Error::BackboneMismatch { .. }));
    }

    #[test]
    fn test_score_grid_mismatch_is_detected() {
        // Artifact fitted on a 2x2 grid, extractor now yields 3x3: the
        // inconsistency must surface, not silently reshape.
        let mut model = PatchCore::new(GridStub { hw: (2, 2) }, 8, 1);
        model
            .fit_from_images(&[zeros(2, 2)], 100, &mut rng())
            .unwrap();
        let artifact = model.to_artifact().unwrap();
        let skewed = PatchCore::from_artifact(artifact, GridStub { hw: (3, 3) }).unwrap();
        let err = skewed.score(&zeros(3, 3)).unwrap_err();
        assert!(matches!(
            err,
            Error::GridMismatch {
                expected: (2, 2),
                actual: (3, 3)
            }
        ));
    }

    #[test]
    fn test_refit_replaces_coreset() {
        let mut model = PatchCore::new(WideStub { hw: (2, 2), channels: 2 }, 8, 1);
        model
            .fit_from_images(&[zeros(2, 2)], 100, &mut rng())
            .unwrap();
        assert_eq!(model.coreset_len().unwrap(), 4);
        model
            .fit_from_images(&[zeros(2, 2), zeros(2, 2)], 100, &mut rng())
            .unwrap();
        assert_eq!(model.coreset_len().unwrap(), 8);
    }
}
