//! MVTec-AD dataset layout: validation, category discovery and split
//! enumeration.
//!
//! Expected structure:
//! ```text
//! <root>/<category>/train/good/*.png
//! <root>/<category>/test/<type>/*.png
//! <root>/<category>/ground_truth/<type>/*.png   (not for good)
//! ```

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const VALID_IMAGE_EXTS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Environment variable overriding the dataset root
pub const ENV_DATA_ROOT: &str = "PATCHX_DATA_ROOT";

/// Default dataset root relative to the working directory
#[must_use]
pub fn default_root() -> PathBuf {
    Path::new("data").join("mvtec_ad")
}

/// Resolve the dataset root: explicit path, then `PATCHX_DATA_ROOT`, then the
/// default location.
#[must_use]
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var(ENV_DATA_ROOT) {
        Ok(env) if !env.trim().is_empty() => PathBuf::from(env.trim()),
        _ => default_root(),
    }
}

/// One entry of a category's test split
#[derive(Debug, Clone)]
pub struct TestSample {
    pub image_path: PathBuf,
    /// Ground-truth mask, absent for good samples
    pub mask_path: Option<PathBuf>,
    /// true = anomalous, false = good
    pub label: bool,
    /// "good" or the defect folder name
    pub defect_type: String,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VALID_IMAGE_EXTS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn category_is_valid(path: &Path) -> bool {
    path.join("train").join("good").exists() && path.join("test").exists()
}

/// Sorted recursive listing of image files under `dir`
fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_image(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Validate that `root` exists and holds at least one MVTec-shaped category
pub fn validate_root(root: &Path) -> Result<()> {
    if !root.exists() {
        return Err(Error::RootMissing(root.to_path_buf()));
    }
    let mut any_dir = false;
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            any_dir = true;
            if category_is_valid(&path) {
                return Ok(());
            }
        }
    }
    if any_dir {
        Err(Error::LayoutInvalid(root.to_path_buf()))
    } else {
        Err(Error::NoCategories(root.to_path_buf()))
    }
}

/// Sorted list of valid category names under `root`
pub fn list_categories(root: &Path) -> Result<Vec<String>> {
    validate_root(root)?;
    let mut categories = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() && category_is_valid(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                categories.push(name.to_string());
            }
        }
    }
    categories.sort();
    Ok(categories)
}

/// Sorted defect-free training images for one category
pub fn train_good_images(root: &Path, category: &str) -> Result<Vec<PathBuf>> {
    let dir = root.join(category).join("train").join("good");
    if !dir.exists() {
        return Err(Error::MissingTrainGood {
            category: category.to_string(),
            path: dir,
        });
    }
    image_files(&dir)
}

/// Resolve the ground-truth mask for one anomalous test image.
///
/// The common MVTec naming is `<stem>_mask.png`; when absent, fall back to the
/// first lexicographic file sharing the stem prefix.
fn find_mask(mask_dir: &Path, image_path: &Path) -> Result<PathBuf> {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let expected = mask_dir.join(format!("{stem}_mask.png"));
    if expected.exists() {
        return Ok(expected);
    }
    if mask_dir.exists() {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(mask_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(stem))
                        .unwrap_or(false)
            })
            .collect();
        candidates.sort();
        if let Some(first) = candidates.into_iter().next() {
            return Ok(first);
        }
    }
    Err(Error::MissingMask(image_path.to_path_buf()))
}

/// Enumerate the full test split of one category, good samples first-class
pub fn index_test_split(root: &Path, category: &str) -> Result<Vec<TestSample>> {
    let test_root = root.join(category).join("test");
    let gt_root = root.join(category).join("ground_truth");
    if !test_root.exists() {
        return Err(Error::MissingTestSplit(test_root));
    }

    let mut defect_dirs: Vec<PathBuf> = std::fs::read_dir(&test_root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    defect_dirs.sort();

    let mut samples = Vec::new();
    for defect_dir in defect_dirs {
        let defect_type = defect_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let is_good = defect_type == "good";
        for image_path in image_files(&defect_dir)? {
            if is_good {
                samples.push(TestSample {
                    image_path,
                    mask_path: None,
                    label: false,
                    defect_type: defect_type.clone(),
                });
            } else {
                let mask_path = find_mask(&gt_root.join(&defect_type), &image_path)?;
                samples.push(TestSample {
                    image_path,
                    mask_path: Some(mask_path),
                    label: true,
                    defect_type: defect_type.clone(),
                });
            }
        }
    }
    debug!(
        category,
        samples = samples.len(),
        anomalous = samples.iter().filter(|s| s.label).count(),
        "indexed test split"
    );
    Ok(samples)
}
