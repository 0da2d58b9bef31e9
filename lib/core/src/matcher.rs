use crate::{Error, Result, Vector};
use rand::rngs::StdRng;
use tracing::debug;

/// Nearest-neighbor matcher over a stored coreset of reference patch vectors.
///
/// `fit` stores a possibly subsampled copy of the input pool; `query` answers
/// exact brute-force rank-1 Euclidean distance per input vector. The matcher
/// keeps `k` as configuration, but scoring always consumes the rank-1
/// distance, so queries return a single distance per vector regardless of `k`.
#[derive(Debug)]
pub struct CoresetMatcher {
    k: usize,
    max_coreset: usize,
    coreset: Option<Vec<Vector>>,
}

impl CoresetMatcher {
    #[must_use]
    pub fn new(k: usize, max_coreset: usize) -> Self {
        Self {
            k: k.max(1),
            max_coreset: max_coreset.max(1),
            coreset: None,
        }
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.coreset.is_some()
    }

    /// Number of stored reference vectors, 0 before fit
    #[must_use]
    pub fn len(&self) -> usize {
        self.coreset.as_ref().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the stored coreset, for persistence
    pub fn coreset(&self) -> Result<&[Vector]> {
        self.coreset.as_deref().ok_or(Error::NotFitted)
    }

    /// Store a reference population, subsampling down to the configured
    /// maximum when the pool is over budget.
    ///
    /// Subsampling draws a uniform random subset without replacement of
    /// exactly `max_coreset` vectors; the draw is the only nondeterminism and
    /// is controlled entirely by `rng`.
    pub fn fit(&mut self, pool: Vec<Vector>, rng: &mut StdRng) -> Result<()> {
        if pool.is_empty() {
            return Err(Error::EmptyPool);
        }
        let selected = if pool.len() > self.max_coreset {
            debug!(
                pool = pool.len(),
                max = self.max_coreset,
                "subsampling patch pool down to coreset budget"
            );
            let indices = rand::seq::index::sample(rng, pool.len(), self.max_coreset);
            let mut picked = Vec::with_capacity(self.max_coreset);
            for i in indices {
                picked.push(pool[i].clone());
            }
            picked
        } else {
            pool
        };
        self.fit_exact(selected)
    }

    /// Store a population verbatim, without subsampling.
    ///
    /// Used when restoring a persisted coreset: the stored rows are already
    /// the selected reference population.
    pub fn fit_exact(&mut self, coreset: Vec<Vector>) -> Result<()> {
        if coreset.is_empty() {
            return Err(Error::EmptyPool);
        }
        let dim = coreset[0].dim();
        for v in &coreset {
            if v.dim() != dim {
                return Err(Error::InvalidDimension {
                    expected: dim,
                    actual: v.dim(),
                });
            }
        }
        self.coreset = Some(coreset);
        Ok(())
    }

    /// Rank-1 nearest-neighbor Euclidean distance for each query vector
    pub fn query(&self, vectors: &[Vector]) -> Result<Vec<f32>> {
        let coreset = self.coreset.as_ref().ok_or(Error::NotFitted)?;
        let dim = coreset[0].dim();
        let mut distances = Vec::with_capacity(vectors.len());
        for q in vectors {
            if q.dim() != dim {
                return Err(Error::InvalidDimension {
                    expected: dim,
                    actual: q.dim(),
                });
            }
            let best = coreset
                .iter()
                .map(|r| q.squared_l2(r))
                .fold(f32::INFINITY, f32::min);
            distances.push(best.sqrt());
        }
        Ok(distances)
    }
}
