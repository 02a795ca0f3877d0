use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PrepError, Result};

/// Number of landmarks in every annotation (iBUG 68-point markup).
pub const NUM_LANDMARKS: usize = 68;
/// `version`, `n_points`, `{` header lines plus the closing `}`.
pub const ANNOTATION_LINES: usize = NUM_LANDMARKS + 4;
const HEADER_LINES: usize = 3;

const ANNOTATION_EXTENSION: &str = "pts";
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Ordered landmark set. Index `i` denotes the same facial feature in every shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub points: Vec<Landmark>,
}

impl Shape {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn from_tuples(points: &[(f64, f64)]) -> Self {
        Self {
            points: points.iter().map(|&(x, y)| Landmark::new(x, y)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.points.iter()
    }

    pub fn as_tuples(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.x, p.y)).collect()
    }

    /// Axis-aligned extent as `(min_x, min_y, max_x, max_y)`.
    pub fn extent(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.points.first()?;
        Some(self.points.iter().fold(
            (first.x, first.y, first.x, first.y),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        ))
    }

    pub fn centroid(&self) -> (f64, f64) {
        let (sum_x, sum_y) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        let n = self.points.len() as f64;
        (sum_x / n, sum_y / n)
    }

    /// Largest absolute per-coordinate difference to `other`.
    /// Shapes of different length compare as infinitely far apart.
    pub fn max_abs_diff(&self, other: &Shape) -> f64 {
        if self.len() != other.len() {
            return f64::INFINITY;
        }
        self.points
            .iter()
            .zip(other.points.iter())
            .map(|(a, b)| (a.x - b.x).abs().max((a.y - b.y).abs()))
            .fold(0.0, f64::max)
    }
}

/// Parses the text of one `.pts` file.
pub fn parse_annotation(path: &Path, content: &str) -> Result<Shape> {
    let lines: Vec<&str> = content.trim().lines().collect();
    if lines.len() != ANNOTATION_LINES {
        return Err(PrepError::MalformedAnnotation {
            path: path.to_path_buf(),
            reason: format!(
                "expected {} lines, found {}",
                ANNOTATION_LINES,
                lines.len()
            ),
        });
    }

    let malformed = |line_no: usize, reason: &str| PrepError::MalformedAnnotation {
        path: path.to_path_buf(),
        reason: format!("line {}: {}", line_no, reason),
    };

    let mut points = Vec::with_capacity(NUM_LANDMARKS);
    for (offset, line) in lines[HEADER_LINES..ANNOTATION_LINES - 1].iter().enumerate() {
        let line_no = HEADER_LINES + offset + 1;
        let mut fields = line.split_whitespace();
        let mut next_coord = |axis: &str| -> Result<f64> {
            let field = fields
                .next()
                .ok_or_else(|| malformed(line_no, &format!("missing {} coordinate", axis)))?;
            let value = field
                .parse::<f64>()
                .map_err(|e| malformed(line_no, &format!("invalid {} coordinate {:?}: {}", axis, field, e)))?;
            if !value.is_finite() {
                return Err(malformed(
                    line_no,
                    &format!("non-finite {} coordinate {:?}", axis, field),
                ));
            }
            Ok(value)
        };
        let x = next_coord("x")?;
        let y = next_coord("y")?;
        points.push(Landmark::new(x, y));
    }

    Ok(Shape::new(points))
}

/// Reads every `.pts` file in `directory`, keyed by file stem.
pub fn load_annotations<P: AsRef<Path>>(directory: P) -> Result<HashMap<String, Shape>> {
    let directory = directory.as_ref();
    let mut annotations = HashMap::new();

    for path in sorted_entries(directory)? {
        if !has_extension(&path, &[ANNOTATION_EXTENSION]) {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        let shape = parse_annotation(&path, &content)?;
        annotations.insert(sample_id(&path), shape);
    }

    debug!(
        "Loaded {} annotations from {}",
        annotations.len(),
        directory.display()
    );
    Ok(annotations)
}

/// Raster files in `directory`, sorted by file name.
pub fn list_images<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    Ok(sorted_entries(directory.as_ref())?
        .into_iter()
        .filter(|p| has_extension(p, &IMAGE_EXTENSIONS))
        .collect())
}

pub fn load_grayscale<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
    Ok(image::open(path.as_ref())?.to_luma8())
}

/// Sample identifier shared by an image and its annotation: the file name without extension.
pub fn sample_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sorted_entries(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(directory)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.retain(|p| p.is_file());
    paths.sort();
    Ok(paths)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}
