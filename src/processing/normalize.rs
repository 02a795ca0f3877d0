use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::config::Config;
use crate::error::Result;
use crate::io::input::{Landmark, Shape};
use crate::processing::bbox::{padded_box, BoundingBox};

/// A cropped grayscale face and its landmarks in the box-relative [-1, 1] frame.
#[derive(Debug, Clone)]
pub struct Sample {
    pub id: String,
    pub image: GrayImage,
    pub shape: Shape,
    pub bbox: BoundingBox,
}

/// Crops `image` to the inclusive pixel range `[top, bottom] x [left, right]`.
///
/// Edges equal to the image dimension address one past the last pixel and are
/// clamped to the last row/column.
pub fn crop_to_box(image: &GrayImage, bbox: &BoundingBox) -> GrayImage {
    let x = bbox.left.clamp(0, image.width() as i64);
    let y = bbox.top.clamp(0, image.height() as i64);
    let last_col = bbox.right.min(image.width() as i64 - 1);
    let last_row = bbox.bottom.min(image.height() as i64 - 1);
    let width = (last_col - x + 1).max(0) as u32;
    let height = (last_row - y + 1).max(0) as u32;

    imageops::crop_imm(image, x as u32, y as u32, width, height).to_image()
}

/// `x' = (x - left) / width * 2 - 1`, likewise for y.
pub fn normalize_landmarks(shape: &Shape, bbox: &BoundingBox) -> Shape {
    let width = bbox.width() as f64;
    let height = bbox.height() as f64;
    Shape::new(
        shape
            .iter()
            .map(|p| {
                Landmark::new(
                    (p.x - bbox.left as f64) / width * 2.0 - 1.0,
                    (p.y - bbox.top as f64) / height * 2.0 - 1.0,
                )
            })
            .collect(),
    )
}

/// Inverse of [`normalize_landmarks`], back to image-pixel space.
pub fn denormalize_landmarks(shape: &Shape, bbox: &BoundingBox) -> Shape {
    let width = bbox.width() as f64;
    let height = bbox.height() as f64;
    Shape::new(
        shape
            .iter()
            .map(|p| {
                Landmark::new(
                    (p.x + 1.0) / 2.0 * width + bbox.left as f64,
                    (p.y + 1.0) / 2.0 * height + bbox.top as f64,
                )
            })
            .collect(),
    )
}

/// Builds one [`Sample`] from a decoded image and its raw landmarks.
pub fn normalize_sample(
    id: &str,
    image: &GrayImage,
    landmarks: &Shape,
    config: &Config,
) -> Result<Sample> {
    let bbox = padded_box(
        landmarks,
        image.height(),
        image.width(),
        config.padding_ratio,
    )?;

    let mut cropped = crop_to_box(image, &bbox);
    if bbox.width() > config.max_image_size as i64 {
        cropped = imageops::resize(
            &cropped,
            config.max_image_size,
            config.max_image_size,
            FilterType::Triangle,
        );
    }

    Ok(Sample {
        id: id.to_string(),
        image: cropped,
        shape: normalize_landmarks(landmarks, &bbox),
        bbox,
    })
}
