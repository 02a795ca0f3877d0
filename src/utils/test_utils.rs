use image::{GrayImage, Luma};
use rand::Rng;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::Config;
use crate::io::input::{Landmark, Shape, NUM_LANDMARKS};

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Deterministic, irregular 68-point shape inside `[c - radius, c + radius]`.
pub fn synthetic_face_shape(center_x: f64, center_y: f64, radius: f64) -> Shape {
    let points = (0..NUM_LANDMARKS)
        .map(|i| {
            let theta = 2.0 * PI * (i as f64) / (NUM_LANDMARKS as f64);
            let r = radius * (0.55 + 0.45 * ((i * 7 % 11) as f64 / 10.0));
            Landmark::new(center_x + r * theta.cos(), center_y + r * theta.sin())
        })
        .collect();
    Shape::new(points)
}

/// Applies `scale * R(angle) * p + (tx, ty)` to every landmark.
pub fn transform_shape(shape: &Shape, scale: f64, angle: f64, translation: (f64, f64)) -> Shape {
    let (sin, cos) = angle.sin_cos();
    Shape::new(
        shape
            .iter()
            .map(|p| {
                Landmark::new(
                    scale * (cos * p.x - sin * p.y) + translation.0,
                    scale * (sin * p.x + cos * p.y) + translation.1,
                )
            })
            .collect(),
    )
}

/// Random landmark set that lies inside a `width x height` image.
pub fn random_shape_in<R: Rng>(rng: &mut R, width: u32, height: u32) -> Shape {
    let span_x = rng.random_range(2.0..width as f64 - 1.0);
    let span_y = rng.random_range(2.0..height as f64 - 1.0);
    let left = rng.random_range(0.0..width as f64 - span_x);
    let top = rng.random_range(0.0..height as f64 - span_y);
    let points = (0..NUM_LANDMARKS)
        .map(|_| {
            Landmark::new(
                left + rng.random_range(0.0..span_x),
                top + rng.random_range(0.0..span_y),
            )
        })
        .collect();
    Shape::new(points)
}

/// Renders a shape as the text of a `.pts` file.
pub fn annotation_text(shape: &Shape) -> String {
    let mut text = format!("version: 1\nn_points:  {}\n{{\n", shape.len());
    for p in shape.iter() {
        text.push_str(&format!("{} {}\n", p.x, p.y));
    }
    text.push_str("}\n");
    text
}

pub fn gradient_image(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([((x + y) % 256) as u8]))
}

/// Fresh, empty directory under the system temp dir.
pub fn unique_temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "faceprep_{}_{}_{}",
        name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).ok();
    }
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Writes `count` PNG images with matching annotations into `root/target`.
/// Faces are scaled and shifted slightly per image.
pub fn write_subset(root: &Path, target: &str, count: usize) -> Vec<Shape> {
    let dir = root.join(target);
    std::fs::create_dir_all(&dir).expect("create subset dir");
    (0..count)
        .map(|i| {
            let offset = 4.0 * i as f64;
            let shape = synthetic_face_shape(120.0 + offset, 110.0 + offset, 45.0 + offset);
            let stem = format!("{}_{:03}", target, i);
            gradient_image(256, 240)
                .save(dir.join(format!("{}.png", stem)))
                .expect("write image");
            std::fs::write(dir.join(format!("{}.pts", stem)), annotation_text(&shape))
                .expect("write annotation");
            shape
        })
        .collect()
}

pub fn test_config() -> Config {
    Config {
        dataset_directory: Some(PathBuf::from("dataset")),
        output_directory: Some(PathBuf::from("output")),
        ..Config::default()
    }
}
