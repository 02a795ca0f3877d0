use serde::Serialize;

use crate::error::{PrepError, Result};
use crate::io::input::Shape;

/// Crop box in image-pixel space. Edges are truncated integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BoundingBox {
    pub const fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn is_square(&self) -> bool {
        self.width() == self.height()
    }

    pub fn move_x(&mut self, shift: i64) {
        self.left += shift;
        self.right += shift;
    }

    pub fn move_y(&mut self, shift: i64) {
        self.top += shift;
        self.bottom += shift;
    }

    /// True when `0 <= left <= right <= width` and `0 <= top <= bottom <= height`.
    pub fn is_inside(&self, image_height: u32, image_width: u32) -> bool {
        0 <= self.left
            && self.left <= self.right
            && self.right <= image_width as i64
            && 0 <= self.top
            && self.top <= self.bottom
            && self.bottom <= image_height as i64
    }
}

/// Square, in-bounds box around the landmark extent.
///
/// The shorter side is grown symmetrically (odd remainder goes to the
/// bottom/right edge). If that pushes an edge out of the image the whole box
/// is shifted back along that axis; when the shifted box still does not fit
/// a [`PrepError::Geometry`] is returned.
pub fn derive_box(shape: &Shape, image_height: u32, image_width: u32) -> Result<BoundingBox> {
    let geometry_error = |reason: String| PrepError::Geometry {
        width: image_width,
        height: image_height,
        reason,
    };

    let (min_x, min_y, max_x, max_y) = shape
        .extent()
        .ok_or_else(|| geometry_error("empty landmark set".to_string()))?;

    let mut bbox = BoundingBox::new(min_x as i64, min_y as i64, max_x as i64, max_y as i64);

    let width = bbox.width();
    let height = bbox.height();

    if width > height {
        let diff = (width - height) / 2;
        let rem = (width - height) % 2;
        bbox.top -= diff;
        bbox.bottom += diff + rem;
        if bbox.top < 0 {
            bbox.move_y(-bbox.top);
        } else if bbox.bottom > image_height as i64 {
            bbox.move_y(image_height as i64 - bbox.bottom);
        }
        if bbox.top < 0 || bbox.bottom > image_height as i64 {
            return Err(geometry_error(format!(
                "squared height {} does not fit the image height",
                bbox.height()
            )));
        }
    } else if height > width {
        let diff = (height - width) / 2;
        let rem = (height - width) % 2;
        bbox.left -= diff;
        bbox.right += diff + rem;
        if bbox.left < 0 {
            bbox.move_x(-bbox.left);
        } else if bbox.right > image_width as i64 {
            bbox.move_x(image_width as i64 - bbox.right);
        }
        if bbox.left < 0 || bbox.right > image_width as i64 {
            return Err(geometry_error(format!(
                "squared width {} does not fit the image width",
                bbox.width()
            )));
        }
    }

    if !bbox.is_inside(image_height, image_width) {
        return Err(geometry_error(format!(
            "landmark extent {:?} lies outside the image",
            bbox
        )));
    }
    debug_assert!(bbox.is_square());

    Ok(bbox)
}

/// Grows every edge by `padding`, clamped to the smallest margin left on any side.
///
/// A single clamped amount is used for all four edges and the result is
/// re-truncated to integers.
pub fn expand_box(
    bbox: &BoundingBox,
    image_height: u32,
    image_width: u32,
    padding: f64,
) -> BoundingBox {
    let padding = padding
        .min(bbox.left as f64)
        .min(bbox.top as f64)
        .min((image_width as i64 - bbox.right) as f64)
        .min((image_height as i64 - bbox.bottom) as f64);

    BoundingBox {
        left: (bbox.left as f64 - padding) as i64,
        top: (bbox.top as f64 - padding) as i64,
        right: (bbox.right as f64 + padding) as i64,
        bottom: (bbox.bottom as f64 + padding) as i64,
    }
}

/// Derives the square box and pads it by `padding_ratio` of its width.
pub fn padded_box(
    shape: &Shape,
    image_height: u32,
    image_width: u32,
    padding_ratio: f64,
) -> Result<BoundingBox> {
    let bbox = derive_box(shape, image_height, image_width)?;
    let padding = bbox.width() as f64 * padding_ratio;
    let expanded = expand_box(&bbox, image_height, image_width, padding);
    if expanded.width() <= 0 || expanded.height() <= 0 {
        return Err(PrepError::DegenerateBox {
            width: expanded.width(),
            height: expanded.height(),
        });
    }
    Ok(expanded)
}
