//! Face-landmark dataset preparation.
//!
//! Crops every annotated face to a padded square box, rescales its 68
//! landmarks into the box-relative `[-1, 1]` frame, averages them into a mean
//! shape and aligns each sample onto that mean with a similarity transform.
//! Diagnostic rasters of the original, aligned and round-tripped shapes are
//! written next to CSV/JSON summaries.

pub mod config;
pub mod entry;
pub mod error;
pub mod io;
pub mod logging;
pub mod processing;
pub mod visualize;

mod utils;

#[cfg(feature = "python")]
mod python_bind;

pub use config::Config;
pub use entry::{build_and_align, run_pipeline, RunSummary};
pub use error::PrepError;
pub use io::input::{Landmark, Shape, NUM_LANDMARKS};
pub use processing::align::{estimate_rigid_transform, RigidTransform};
pub use processing::bbox::{derive_box, expand_box, BoundingBox};
pub use processing::corpus::{build_corpus, compute_mean_shape, Corpus};
pub use processing::normalize::{normalize_sample, Sample};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Importable from Python when built with the `python` feature:
///
/// ```python
/// import faceprep
/// corpus = faceprep.build_corpus("data/300W", ["01_Indoor", "02_Outdoor"])
/// corpus.get_normalized_shape(0)
/// ```
#[cfg(feature = "python")]
#[pymodule]
fn faceprep(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_function(wrap_pyfunction!(python_bind::build_corpus, m)?)?;
    m.add_function(wrap_pyfunction!(python_bind::run, m)?)?;
    m.add_class::<python_bind::PyCorpus>()?;
    Ok(())
}
