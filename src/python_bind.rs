use pyo3::exceptions::{PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

use crate::config::Config;
use crate::entry::{build_and_align, run_pipeline};
use crate::processing::align::{AlignmentReport, RigidTransform};
use crate::processing::corpus::Corpus;

type Matrix = [[f64; 2]; 2];

/// Aligned corpus as seen from Python: one entry per successfully aligned sample.
#[pyclass(name = "Corpus")]
#[derive(Debug, Clone, Default)]
pub struct PyCorpus {
    images: Vec<Vec<Vec<u8>>>,
    shapes: Vec<Vec<(f64, f64)>>,
    normalized_shapes: Vec<Vec<(f64, f64)>>,
    rotation: Vec<Matrix>,
    rotation_inv: Vec<Matrix>,
    shift: Vec<(f64, f64)>,
    #[pyo3(get)]
    mean_shape: Vec<(f64, f64)>,
}

fn matrix_rows(transform: &RigidTransform) -> Matrix {
    let m = transform.linear;
    [[m[(0, 0)], m[(0, 1)]], [m[(1, 0)], m[(1, 1)]]]
}

impl PyCorpus {
    pub fn from_alignment(corpus: &Corpus, report: &AlignmentReport) -> Self {
        let mut py_corpus = PyCorpus {
            mean_shape: corpus.mean_shape.as_tuples(),
            ..PyCorpus::default()
        };
        for alignment in &report.aligned {
            let sample = &corpus.samples[alignment.index];
            py_corpus.images.push(
                sample
                    .image
                    .rows()
                    .map(|row| row.map(|p| p.0[0]).collect())
                    .collect(),
            );
            py_corpus.shapes.push(sample.shape.as_tuples());
            py_corpus.normalized_shapes.push(alignment.aligned.as_tuples());
            py_corpus.rotation.push(matrix_rows(&alignment.transform));
            py_corpus.rotation_inv.push(matrix_rows(&alignment.inverse));
            py_corpus.shift.push((
                alignment.transform.translation.x,
                alignment.transform.translation.y,
            ));
        }
        py_corpus
    }

    fn check_index(&self, index: usize) -> PyResult<()> {
        if index >= self.images.len() {
            return Err(PyIndexError::new_err(format!(
                "index {} out of range for corpus of {} images",
                index,
                self.images.len()
            )));
        }
        Ok(())
    }
}

#[pymethods]
impl PyCorpus {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    #[pyo3(signature = (image, shape, normalized_shape, rotation, rotation_inv, shift))]
    fn add(
        &mut self,
        image: Vec<Vec<u8>>,
        shape: Vec<(f64, f64)>,
        normalized_shape: Vec<(f64, f64)>,
        rotation: Matrix,
        rotation_inv: Matrix,
        shift: (f64, f64),
    ) -> PyResult<()> {
        if shape.len() != normalized_shape.len() {
            return Err(PyValueError::new_err(format!(
                "shape has {} points but normalized_shape has {}",
                shape.len(),
                normalized_shape.len()
            )));
        }
        self.images.push(image);
        self.shapes.push(shape);
        self.normalized_shapes.push(normalized_shape);
        self.rotation.push(rotation);
        self.rotation_inv.push(rotation_inv);
        self.shift.push(shift);
        Ok(())
    }

    fn get_num_images(&self) -> usize {
        self.images.len()
    }

    fn get_image(&self, index: usize) -> PyResult<Vec<Vec<u8>>> {
        self.check_index(index)?;
        Ok(self.images[index].clone())
    }

    fn get_shape(&self, index: usize) -> PyResult<Vec<(f64, f64)>> {
        self.check_index(index)?;
        Ok(self.shapes[index].clone())
    }

    fn get_normalized_shape(&self, index: usize) -> PyResult<Vec<(f64, f64)>> {
        self.check_index(index)?;
        Ok(self.normalized_shapes[index].clone())
    }

    fn get_rotation(&self, index: usize) -> PyResult<Matrix> {
        self.check_index(index)?;
        Ok(self.rotation[index])
    }

    fn get_rotation_inv(&self, index: usize) -> PyResult<Matrix> {
        self.check_index(index)?;
        Ok(self.rotation_inv[index])
    }

    fn get_shift(&self, index: usize) -> PyResult<(f64, f64)> {
        self.check_index(index)?;
        Ok(self.shift[index])
    }

    fn __len__(&self) -> usize {
        self.images.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Corpus(images={}, landmarks={})",
            self.images.len(),
            self.mean_shape.len()
        )
    }
}

fn python_config(
    dataset_directory: &str,
    output_directory: Option<&str>,
    targets: Option<Vec<String>>,
    max_image_size: u32,
) -> Config {
    let mut config = Config {
        dataset_directory: Some(PathBuf::from(dataset_directory)),
        output_directory: output_directory.map(PathBuf::from),
        max_image_size,
        ..Config::default()
    };
    if let Some(targets) = targets {
        config.targets = targets;
    }
    config
}

/// Builds and aligns the corpus without writing any output.
#[pyfunction]
#[pyo3(signature = (dataset_directory, targets = None, max_image_size = 500u32))]
pub fn build_corpus(
    dataset_directory: &str,
    targets: Option<Vec<String>>,
    max_image_size: u32,
) -> PyResult<PyCorpus> {
    let config = python_config(dataset_directory, None, targets, max_image_size);
    let (corpus, report) =
        build_and_align(&config).map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))?;
    Ok(PyCorpus::from_alignment(&corpus, &report))
}

/// Runs the full pipeline and returns the number of accepted samples.
#[pyfunction]
#[pyo3(signature = (dataset_directory, output_directory, targets = None, max_image_size = 500u32))]
pub fn run(
    dataset_directory: &str,
    output_directory: &str,
    targets: Option<Vec<String>>,
    max_image_size: u32,
) -> PyResult<usize> {
    let config = python_config(
        dataset_directory,
        Some(output_directory),
        targets,
        max_image_size,
    );
    let summary =
        run_pipeline(&config).map_err(|e| PyRuntimeError::new_err(format!("{:#}", e)))?;
    Ok(summary.accepted_samples)
}
