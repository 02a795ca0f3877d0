use image::{GrayImage, Luma};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::io::input::Shape;

const CROSS_HALF_LENGTH: i64 = 4;
const BACKGROUND: Luma<u8> = Luma([0u8]);
const MARK: Luma<u8> = Luma([255u8]);

/// Canvas pixel for a normalized coordinate: `size / 2 + c * size / 2`, truncated.
pub fn canvas_coordinate(c: f64, canvas_size: u32) -> i64 {
    let half = canvas_size as f64 / 2.0;
    (half + c * half) as i64
}

/// Rasterizes `shape` as white crosses on a black `canvas_size` square.
/// Segments are clipped to the canvas.
pub fn plot_shape(shape: &Shape, canvas_size: u32) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(canvas_size, canvas_size, BACKGROUND);
    for p in shape.iter() {
        let x = canvas_coordinate(p.x, canvas_size);
        let y = canvas_coordinate(p.y, canvas_size);
        for d in -CROSS_HALF_LENGTH..=CROSS_HALF_LENGTH {
            put_clipped(&mut canvas, x + d, y);
            put_clipped(&mut canvas, x, y + d);
        }
    }
    canvas
}

fn put_clipped(canvas: &mut GrayImage, x: i64, y: i64) {
    if x >= 0 && y >= 0 && (x as u64) < canvas.width() as u64 && (y as u64) < canvas.height() as u64
    {
        canvas.put_pixel(x as u32, y as u32, MARK);
    }
}

/// Writes `<name>.<extension>` into `output_dir`.
pub fn save_shape_plot(
    shape: &Shape,
    output_dir: &Path,
    name: &str,
    canvas_size: u32,
    extension: &str,
) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}.{}", name, extension));
    plot_shape(shape, canvas_size).save(&path)?;
    Ok(path)
}
