//! ROC-AUC metrics and the evaluation report.
//!
//! AUROC over a single-class label set is undefined; both computations return
//! `None` in that case rather than panicking or coercing to 0/1, and `None`
//! serializes as JSON `null` in the report.

use crate::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tie-aware ROC-AUC via the rank-sum (Mann-Whitney) formulation.
///
/// Returns `None` when `labels` contains only one class.
pub fn roc_auc(labels: &[u8], scores: &[f32]) -> Option<f64> {
    debug_assert_eq!(labels.len(), scores.len());
    let positives = labels.iter().filter(|&&l| l > 0).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // average ranks over tie groups, 1-based
    let mut rank_sum_pos = 0.0f64;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let rank = (i + 1 + j + 1) as f64 / 2.0;
        for &idx in &order[i..=j] {
            if labels[idx] > 0 {
                rank_sum_pos += rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((rank_sum_pos - p * (p + 1.0) / 2.0) / (p * n))
}

/// Pixel-level AUROC over a test set: flattens all masks and score maps into
/// one label/score pair set. `None` when every mask pixel is one class, e.g.
/// an all-good test split.
pub fn pixel_auroc(masks: &[Array2<u8>], maps: &[Array2<f32>]) -> Option<f64> {
    debug_assert_eq!(masks.len(), maps.len());
    let total: usize = masks.iter().map(|m| m.len()).sum();
    let mut labels = Vec::with_capacity(total);
    let mut scores = Vec::with_capacity(total);
    for (mask, map) in masks.iter().zip(maps.iter()) {
        debug_assert_eq!(mask.dim(), map.dim());
        labels.extend(mask.iter().copied());
        scores.extend(map.iter().copied());
    }
    roc_auc(&labels, &scores)
}

/// Bilinear upsample of a score map to `size x size`, for pixel-level metrics
/// and visualization at input resolution.
#[must_use]
pub fn upsample_bilinear(map: &Array2<f32>, size: usize) -> Array2<f32> {
    let (h, w) = map.dim();
    if h == size && w == size {
        return map.clone();
    }
    let mut out = Array2::zeros((size, size));
    let scale_y = h as f32 / size as f32;
    let scale_x = w as f32 / size as f32;
    for oy in 0..size {
        let sy = ((oy as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (h - 1) as f32);
        let y0 = sy.floor() as usize;
        let y1 = (y0 + 1).min(h - 1);
        let fy = sy - y0 as f32;
        for ox in 0..size {
            let sx = ((ox as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (w - 1) as f32);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(w - 1);
            let fx = sx - x0 as f32;
            let top = map[[y0, x0]] * (1.0 - fx) + map[[y0, x1]] * fx;
            let bottom = map[[y1, x0]] * (1.0 - fx) + map[[y1, x1]] * fx;
            out[[oy, ox]] = top * (1.0 - fy) + bottom * fy;
        }
    }
    out
}

/// Evaluation record for one category/backbone run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub category: String,
    pub backbone: String,
    pub image_size: u32,
    pub n_test: usize,
    pub n_anomalous: usize,
    /// `null` when the test split holds only one image-level class
    pub image_auroc: Option<f64>,
    /// `null` when every ground-truth pixel is one class
    pub pixel_auroc: Option<f64>,
}

impl MetricsReport {
    /// Write the report as pretty JSON, creating parent directories
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_auc_perfect_separation() {
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!((auc - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_roc_auc_inverted() {
        let auc = roc_auc(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!(auc.abs() < 1e-9);
    }

    #[test]
    fn test_roc_auc_known_value() {
        // pairs won: 3 of 4
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert!((auc - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_roc_auc_all_ties_is_half() {
        let auc = roc_auc(&[0, 1, 0, 1], &[0.5, 0.5, 0.5, 0.5]).unwrap();
        assert!((auc - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_roc_auc_single_class_undefined() {
        assert!(roc_auc(&[0, 0, 0], &[0.1, 0.2, 0.3]).is_none());
        assert!(roc_auc(&[1, 1], &[0.1, 0.2]).is_none());
    }

    #[test]
    fn test_pixel_auroc_all_background_undefined() {
        let masks = vec![Array2::<u8>::zeros((4, 4)), Array2::<u8>::zeros((4, 4))];
        let maps = vec![Array2::<f32>::ones((4, 4)), Array2::<f32>::zeros((4, 4))];
        assert!(pixel_auroc(&masks, &maps).is_none());
    }

    #[test]
    fn test_pixel_auroc_localized_defect() {
        let mut mask = Array2::<u8>::zeros((4, 4));
        mask[[2, 2]] = 1;
        let mut map = Array2::<f32>::zeros((4, 4));
        map[[2, 2]] = 9.0;
        let auc = pixel_auroc(&[mask], &[map]).unwrap();
        assert!((auc - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_upsample_preserves_constant() {
        let map = Array2::from_elem((4, 4), 2.5f32);
        let up = upsample_bilinear(&map, 16);
        assert_eq!(up.dim(), (16, 16));
        assert!(up.iter().all(|&v| (v - 2.5).abs() < 1e-6));
    }

    #[test]
    fn test_upsample_peak_stays_in_place() {
        let mut map = Array2::<f32>::zeros((4, 4));
        map[[1, 2]] = 1.0;
        let up = upsample_bilinear(&map, 16);
        // peak cell (1,2) maps to the block around (6,10)
        let (mut best, mut best_v) = ((0, 0), f32::NEG_INFINITY);
        for ((y, x), &v) in up.indexed_iter() {
            if v > best_v {
                best = (y, x);
                best_v = v;
            }
        }
        assert!(best.0 >= 4 && best.0 < 8, "peak row {} out of block", best.0);
        assert!(best.1 >= 8 && best.1 < 12, "peak col {} out of block", best.1);
    }

    #[test]
    fn test_report_serializes_null_for_undefined() {
        let report = MetricsReport {
            category: "bottle".into(),
            backbone: "base256-s8".into(),
            image_size: 224,
            n_test: 10,
            n_anomalous: 0,
            image_auroc: None,
            pixel_auroc: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"image_auroc\":null"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics").join("bottle.json");
        report.write_json(&path).unwrap();
        let restored: MetricsReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(restored.pixel_auroc.is_none());
        assert_eq!(restored.n_test, 10);
    }
}
