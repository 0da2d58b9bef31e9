use crate::{Result, Vector};
use ndarray::Array3;

/// Dense grid of patch embeddings produced by one backbone pass over one image.
///
/// Patches are stored flattened in row-major spatial order: the patch for grid
/// cell `(r, c)` sits at index `r * width + c`. Score-map reshaping relies on
/// this ordering.
#[derive(Debug, Clone)]
pub struct FeatureGrid {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub patches: Vec<Vector>,
}

impl FeatureGrid {
    /// Spatial shape `(height_f, width_f)` of the grid
    #[inline]
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Number of patch vectors (equals `height * width`)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// The embedding capability injected into [`crate::PatchCore`].
///
/// Maps a normalized RGB image tensor shaped `(3, size, size)` with values in
/// `[0, 1]` to a fixed-shape grid of patch vectors. Implementations must be
/// deterministic: the same identifier always reconstructs the same capability,
/// and the same input always yields the same grid. The model depends only on
/// this shape contract, not on how the grid is produced.
pub trait FeatureExtractor {
    /// Stable identifier persisted in model artifacts
    fn id(&self) -> &str;

    /// Channel dimensionality of each patch vector
    fn channels(&self) -> usize;

    /// Embed one image into its patch grid.
    ///
    /// Must fail loudly on a wrong input tensor shape rather than coerce.
    fn embed(&self, image: &Array3<f32>) -> Result<FeatureGrid>;
}
