//! Image and mask decoding into the tensor shapes the model consumes.

use crate::{Error, Result};
use image::imageops::FilterType;
use ndarray::{Array2, Array3};
use std::path::Path;

fn open(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode and resize an RGB image to a `(3, size, size)` CHW tensor in `[0, 1]`
pub fn load_image(path: &Path, size: u32) -> Result<Array3<f32>> {
    let rgb = open(path)?
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();
    let size = size as usize;
    let mut tensor = Array3::zeros((3, size, size));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, y, x]] = f32::from(pixel[0]) / 255.0;
        tensor[[1, y, x]] = f32::from(pixel[1]) / 255.0;
        tensor[[2, y, x]] = f32::from(pixel[2]) / 255.0;
    }
    Ok(tensor)
}

/// Decode and resize a ground-truth mask to a binary `(size, size)` map.
///
/// Nearest-neighbor resize keeps the mask binary; any nonzero pixel counts as
/// anomalous.
pub fn load_mask(path: &Path, size: u32) -> Result<Array2<u8>> {
    let gray = open(path)?
        .resize_exact(size, size, FilterType::Nearest)
        .to_luma8();
    let size = size as usize;
    let mut mask = Array2::zeros((size, size));
    for (x, y, pixel) in gray.enumerate_pixels() {
        mask[[y as usize, x as usize]] = u8::from(pixel[0] > 0);
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_load_image_shape_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        let mut img = RgbImage::new(10, 6);
        for (x, _y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([255, 0, (x * 20) as u8]);
        }
        img.save(&path).unwrap();

        let tensor = load_image(&path, 8).unwrap();
        assert_eq!(tensor.dim(), (3, 8, 8));
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // red channel saturated everywhere, green empty
        assert!(tensor.index_axis(ndarray::Axis(0), 0).iter().all(|&v| v > 0.99));
        assert!(tensor.index_axis(ndarray::Axis(0), 1).iter().all(|&v| v < 0.01));
    }

    #[test]
    fn test_load_mask_binarizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mut img = GrayImage::new(8, 8);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Luma([if x >= 4 && y >= 4 { 200 } else { 0 }]);
        }
        img.save(&path).unwrap();

        let mask = load_mask(&path, 8).unwrap();
        assert_eq!(mask.dim(), (8, 8));
        assert_eq!(mask[[0, 0]], 0);
        assert_eq!(mask[[6, 6]], 1);
        assert!(mask.iter().all(|&v| v <= 1));
    }

    #[test]
    fn test_load_image_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_image(&dir.path().join("none.png"), 8).unwrap_err(),
            Error::Decode { .. }
        ));
    }
}
