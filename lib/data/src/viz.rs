//! Gallery rendering: a three-panel comparison image per scored sample.

use crate::{Error, Result};
use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3};
use std::path::Path;

/// Min-max normalize a map into `[0, 1]`; a flat map becomes all zeros
#[must_use]
pub fn normalize01(map: &Array2<f32>) -> Array2<f32> {
    let min = map.iter().copied().fold(f32::INFINITY, f32::min);
    let max = map.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max - min < 1e-12 {
        return Array2::zeros(map.dim());
    }
    map.mapv(|v| (v - min) / (max - min))
}

/// Blue-to-red heat ramp for a value in `[0, 1]`
fn heat_color(v: f32) -> [u8; 3] {
    let v = v.clamp(0.0, 1.0);
    let r = (v * 255.0) as u8;
    let g = ((1.0 - (2.0 * v - 1.0).abs()) * 200.0) as u8;
    let b = ((1.0 - v) * 255.0) as u8;
    [r, g, b]
}

fn tensor_pixel(image: &Array3<f32>, y: usize, x: usize) -> [u8; 3] {
    [
        (image[[0, y, x]].clamp(0.0, 1.0) * 255.0) as u8,
        (image[[1, y, x]].clamp(0.0, 1.0) * 255.0) as u8,
        (image[[2, y, x]].clamp(0.0, 1.0) * 255.0) as u8,
    ]
}

/// Render `image | heatmap overlay | mask` side by side and write a PNG.
///
/// All three inputs must share the same square resolution; the heatmap is
/// min-max normalized before rendering.
pub fn save_triptych(
    out_path: &Path,
    image: &Array3<f32>,
    heatmap: &Array2<f32>,
    mask: &Array2<u8>,
) -> Result<()> {
    let (_c, size, _w) = image.dim();
    let heat = normalize01(heatmap);
    let mut canvas = RgbImage::new((size * 3) as u32, size as u32);

    for y in 0..size {
        for x in 0..size {
            let base = tensor_pixel(image, y, x);
            canvas.put_pixel(x as u32, y as u32, Rgb(base));

            let hm = heat_color(heat[[y, x]]);
            let blended = [
                ((u16::from(base[0]) + u16::from(hm[0])) / 2) as u8,
                ((u16::from(base[1]) + u16::from(hm[1])) / 2) as u8,
                ((u16::from(base[2]) + u16::from(hm[2])) / 2) as u8,
            ];
            canvas.put_pixel((size + x) as u32, y as u32, Rgb(blended));

            let m = if mask[[y, x]] > 0 { 255 } else { 0 };
            canvas.put_pixel((2 * size + x) as u32, y as u32, Rgb([m, m, m]));
        }
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    canvas.save(out_path).map_err(|source| Error::Encode {
        path: out_path.to_path_buf(),
        source,
    })
}
