use nalgebra::{Matrix2, Vector2};
use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::error::{PrepError, Result};
use crate::io::input::{Landmark, Shape};
use crate::processing::corpus::{Corpus, SampleFailure};

const DEGENERATE_VARIANCE: f64 = 1e-12;
const SINGULAR_DETERMINANT: f64 = 1e-12;

/// `p' = linear * p + translation`, with `linear = s * R(theta)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub linear: Matrix2<f64>,
    pub translation: Vector2<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            linear: Matrix2::identity(),
            translation: Vector2::zeros(),
        }
    }

    pub fn from_parts(scale: f64, angle: f64, translation: (f64, f64)) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            linear: Matrix2::new(scale * cos, -scale * sin, scale * sin, scale * cos),
            translation: Vector2::new(translation.0, translation.1),
        }
    }

    pub fn scale(&self) -> f64 {
        self.linear.determinant().abs().sqrt()
    }

    pub fn angle(&self) -> f64 {
        self.linear[(1, 0)].atan2(self.linear[(0, 0)])
    }

    pub fn apply_point(&self, p: &Landmark) -> Landmark {
        let q = self.linear * Vector2::new(p.x, p.y) + self.translation;
        Landmark::new(q.x, q.y)
    }

    pub fn apply(&self, shape: &Shape) -> Shape {
        Shape::new(shape.iter().map(|p| self.apply_point(p)).collect())
    }

    /// Inverse mapping `p = linear^-1 * (p' - translation)`.
    pub fn inverse(&self) -> Result<RigidTransform> {
        let det = self.linear.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_DETERMINANT {
            return Err(PrepError::SingularTransform { det });
        }
        let inverse_linear = self
            .linear
            .try_inverse()
            .ok_or(PrepError::SingularTransform { det })?;
        Ok(RigidTransform {
            linear: inverse_linear,
            translation: -(inverse_linear * self.translation),
        })
    }
}

/// Least-squares similarity transform mapping `source` onto `target`.
///
/// Closed-form Umeyama solution restricted to proper rotations, so the
/// result never mirrors the source.
pub fn estimate_rigid_transform(source: &Shape, target: &Shape) -> Result<RigidTransform> {
    if source.len() != target.len() {
        return Err(PrepError::TransformEstimation(format!(
            "point count mismatch: {} vs {}",
            source.len(),
            target.len()
        )));
    }
    if source.len() < 2 {
        return Err(PrepError::TransformEstimation(format!(
            "need at least 2 correspondences, got {}",
            source.len()
        )));
    }
    if source
        .iter()
        .chain(target.iter())
        .any(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(PrepError::TransformEstimation(
            "non-finite coordinate".to_string(),
        ));
    }

    let (scx, scy) = source.centroid();
    let (tcx, tcy) = target.centroid();

    let mut variance = 0.0;
    let mut dot = 0.0;
    let mut cross = 0.0;
    for (s, t) in source.iter().zip(target.iter()) {
        let (px, py) = (s.x - scx, s.y - scy);
        let (qx, qy) = (t.x - tcx, t.y - tcy);
        variance += px * px + py * py;
        dot += px * qx + py * qy;
        cross += px * qy - py * qx;
    }

    if variance < DEGENERATE_VARIANCE {
        return Err(PrepError::TransformEstimation(
            "source points coincide".to_string(),
        ));
    }

    let a = dot / variance;
    let b = cross / variance;
    let linear = Matrix2::new(a, -b, b, a);
    let translation = Vector2::new(tcx, tcy) - linear * Vector2::new(scx, scy);

    Ok(RigidTransform {
        linear,
        translation,
    })
}

/// One sample aligned onto the mean shape and mapped back again.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub index: usize,
    pub sample: String,
    pub transform: RigidTransform,
    pub inverse: RigidTransform,
    pub aligned: Shape,
    pub reconstructed: Shape,
    /// Largest per-coordinate difference between `reconstructed` and the input shape.
    pub reconstruction_error: f64,
}

#[derive(Debug)]
pub struct AlignmentFailure {
    pub index: usize,
    pub failure: SampleFailure,
}

#[derive(Debug, Default)]
pub struct AlignmentReport {
    pub aligned: Vec<Alignment>,
    pub failed: Vec<AlignmentFailure>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AlignmentCounts {
    pub aligned: usize,
    pub estimation_failures: usize,
    pub singular_failures: usize,
    pub other_failures: usize,
}

impl AlignmentReport {
    pub fn counts(&self) -> AlignmentCounts {
        let mut counts = AlignmentCounts {
            aligned: self.aligned.len(),
            ..AlignmentCounts::default()
        };
        for f in &self.failed {
            match f.failure.error {
                PrepError::TransformEstimation(_) => counts.estimation_failures += 1,
                PrepError::SingularTransform { .. } => counts.singular_failures += 1,
                _ => counts.other_failures += 1,
            }
        }
        counts
    }

    pub fn max_reconstruction_error(&self) -> f64 {
        self.aligned
            .iter()
            .map(|a| a.reconstruction_error)
            .fold(0.0, f64::max)
    }
}

/// Estimate, apply, invert and round-trip one shape against `mean_shape`.
pub fn align_shape(
    index: usize,
    sample: &str,
    shape: &Shape,
    mean_shape: &Shape,
) -> Result<Alignment> {
    let transform = estimate_rigid_transform(shape, mean_shape)?;
    let aligned = transform.apply(shape);
    let inverse = transform.inverse()?;
    let reconstructed = inverse.apply(&aligned);
    let reconstruction_error = reconstructed.max_abs_diff(shape);

    Ok(Alignment {
        index,
        sample: sample.to_string(),
        transform,
        inverse,
        aligned,
        reconstructed,
        reconstruction_error,
    })
}

/// Aligns every sample of the corpus onto its mean shape.
///
/// Estimation and inversion failures are logged and collected; they never
/// stop the remaining samples.
pub fn align_corpus(corpus: &Corpus) -> Result<AlignmentReport> {
    let outcomes: Vec<Result<std::result::Result<Alignment, AlignmentFailure>>> = corpus
        .samples
        .par_iter()
        .enumerate()
        .map(|(index, sample)| {
            match align_shape(index, &sample.id, &sample.shape, &corpus.mean_shape) {
                Ok(alignment) => Ok(Ok(alignment)),
                Err(error) if error.is_recoverable() => {
                    warn!("Error aligning sample {} ({}): {}", index, sample.id, error);
                    Ok(Err(AlignmentFailure {
                        index,
                        failure: SampleFailure {
                            sample: sample.id.clone(),
                            error,
                        },
                    }))
                }
                Err(error) => Err(error),
            }
        })
        .collect();

    let mut report = AlignmentReport::default();
    for outcome in outcomes {
        match outcome? {
            Ok(alignment) => report.aligned.push(alignment),
            Err(failure) => report.failed.push(failure),
        }
    }
    Ok(report)
}
