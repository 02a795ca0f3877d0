use crossbeam::thread;
use rayon::prelude::*;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{PrepError, Result};
use crate::io::input::{
    list_images, load_annotations, load_grayscale, sample_id, Landmark, Shape, NUM_LANDMARKS,
};
use crate::processing::normalize::{normalize_sample, Sample};

/// A sample that was dropped at the per-sample boundary.
#[derive(Debug)]
pub struct SampleFailure {
    pub sample: String,
    pub error: PrepError,
}

#[derive(Debug, Default)]
pub struct SubsetReport {
    pub target: String,
    pub images: usize,
    pub accepted: usize,
    pub skipped: Vec<SampleFailure>,
}

/// All accepted samples in target order plus their mean shape.
#[derive(Debug)]
pub struct Corpus {
    pub samples: Vec<Sample>,
    pub mean_shape: Shape,
    pub subsets: Vec<SubsetReport>,
}

impl Corpus {
    /// Validates the landmark layout and computes the mean shape once.
    pub fn from_samples(samples: Vec<Sample>, subsets: Vec<SubsetReport>) -> Result<Self> {
        validate_landmark_layout(&samples)?;
        let mean_shape = compute_mean_shape(samples.iter().map(|s| &s.shape))?;
        Ok(Self {
            samples,
            mean_shape,
            subsets,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SampleFailure> {
        self.subsets.iter().flat_map(|s| s.skipped.iter())
    }
}

/// Every sample must carry the same number of landmarks so that index `i`
/// refers to one feature across the corpus.
pub fn validate_landmark_layout(samples: &[Sample]) -> Result<()> {
    for sample in samples {
        if sample.shape.len() != NUM_LANDMARKS {
            return Err(PrepError::InconsistentLandmarkCount {
                sample: sample.id.clone(),
                found: sample.shape.len(),
                expected: NUM_LANDMARKS,
            });
        }
    }
    Ok(())
}

/// Per-feature arithmetic mean over all shapes.
pub fn compute_mean_shape<'a, I>(shapes: I) -> Result<Shape>
where
    I: IntoIterator<Item = &'a Shape>,
{
    let mut sums: Vec<Landmark> = Vec::new();
    let mut count = 0usize;

    for (index, shape) in shapes.into_iter().enumerate() {
        if count == 0 {
            sums = vec![Landmark::default(); shape.len()];
        } else if shape.len() != sums.len() {
            return Err(PrepError::InconsistentLandmarkCount {
                sample: format!("#{}", index),
                found: shape.len(),
                expected: sums.len(),
            });
        }
        for (sum, p) in sums.iter_mut().zip(shape.iter()) {
            sum.x += p.x;
            sum.y += p.y;
        }
        count += 1;
    }

    if count == 0 {
        return Err(PrepError::EmptyCorpus);
    }

    let n = count as f64;
    Ok(Shape::new(
        sums.into_iter()
            .map(|s| Landmark::new(s.x / n, s.y / n))
            .collect(),
    ))
}

/// Normalizes every annotated image of one subset directory.
///
/// Images without an annotation abort the subset; recoverable geometry
/// failures are logged and reported in the [`SubsetReport`].
pub fn preprocess_subset(
    target: &str,
    directory: &Path,
    config: &Config,
) -> Result<(Vec<Sample>, SubsetReport)> {
    if !directory.is_dir() {
        return Err(PrepError::Config(format!(
            "target directory {} does not exist",
            directory.display()
        )));
    }
    info!("Processing {}", directory.display());

    let annotations = load_annotations(directory)?;
    let images = list_images(directory)?;

    if let Some(orphan) = images
        .iter()
        .find(|p| !annotations.contains_key(&sample_id(p)))
    {
        return Err(PrepError::MissingAnnotation {
            image: orphan.clone(),
        });
    }

    let outcomes: Vec<Result<std::result::Result<Sample, SampleFailure>>> = images
        .par_iter()
        .map(|path| {
            let id = sample_id(path);
            let landmarks = &annotations[&id];
            let image = load_grayscale(path)?;
            match normalize_sample(&id, &image, landmarks, config) {
                Ok(sample) => Ok(Ok(sample)),
                Err(error) if error.is_recoverable() => {
                    warn!("Skipping {}/{}: {}", target, id, error);
                    Ok(Err(SampleFailure { sample: id, error }))
                }
                Err(error) => Err(error),
            }
        })
        .collect();

    let mut samples = Vec::with_capacity(outcomes.len());
    let mut report = SubsetReport {
        target: target.to_string(),
        images: images.len(),
        ..SubsetReport::default()
    };
    for outcome in outcomes {
        match outcome? {
            Ok(sample) => samples.push(sample),
            Err(failure) => report.skipped.push(failure),
        }
    }
    report.accepted = samples.len();

    info!(
        "{}: {}/{} images accepted",
        target, report.accepted, report.images
    );
    Ok((samples, report))
}

/// Builds the corpus from every configured target, then computes the mean shape.
///
/// Subsets load on scoped threads and are appended in configuration order.
pub fn build_corpus(config: &Config) -> Result<Corpus> {
    let targets = config.target_dirs()?;

    let results = thread::scope(|s| {
        let handles: Vec<_> = targets
            .iter()
            .map(|(target, dir)| s.spawn(move |_| preprocess_subset(target, dir, config)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|p| std::panic::resume_unwind(p)))
            .collect::<Vec<_>>()
    })
    .unwrap_or_else(|p| std::panic::resume_unwind(p));

    let mut samples = Vec::new();
    let mut subsets = Vec::with_capacity(results.len());
    for result in results {
        let (subset_samples, report) = result?;
        samples.extend(subset_samples);
        subsets.push(report);
    }

    if samples.is_empty() {
        return Err(PrepError::EmptyCorpus);
    }
    Corpus::from_samples(samples, subsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::bbox::BoundingBox;
    use crate::utils::test_utils::{
        annotation_text, gradient_image, synthetic_face_shape, test_config, unique_temp_dir,
        write_subset,
    };
    use approx::assert_relative_eq;
    use std::fs;

    fn dataset_config(root: &Path, targets: &[&str]) -> Config {
        Config {
            dataset_directory: Some(root.to_path_buf()),
            targets: targets.iter().map(|t| t.to_string()).collect(),
            ..test_config()
        }
    }

    fn sample_with(shape: Shape) -> Sample {
        Sample {
            id: "s".to_string(),
            image: gradient_image(2, 2),
            shape,
            bbox: BoundingBox::default(),
        }
    }

    #[test]
    fn test_mean_shape_is_feature_wise_average() {
        let a = Shape::from_tuples(&[(0.0, 0.0), (1.0, -1.0)]);
        let b = Shape::from_tuples(&[(2.0, 4.0), (3.0, 1.0)]);
        let c = Shape::from_tuples(&[(1.0, -1.0), (-1.0, 3.0)]);
        let mean = compute_mean_shape([&a, &b, &c]).unwrap();

        assert_relative_eq!(mean.points[0].x, 1.0);
        assert_relative_eq!(mean.points[0].y, 1.0);
        assert_relative_eq!(mean.points[1].x, 1.0);
        assert_relative_eq!(mean.points[1].y, 1.0);
    }

    #[test]
    fn test_mean_of_nothing_is_empty_corpus() {
        let err = compute_mean_shape(std::iter::empty::<&Shape>()).unwrap_err();
        assert!(matches!(err, PrepError::EmptyCorpus));
    }

    #[test]
    fn test_mean_rejects_mismatched_lengths() {
        let a = Shape::from_tuples(&[(0.0, 0.0), (1.0, 1.0)]);
        let b = Shape::from_tuples(&[(0.0, 0.0)]);
        let err = compute_mean_shape([&a, &b]).unwrap_err();
        assert!(matches!(err, PrepError::InconsistentLandmarkCount { .. }));
    }

    #[test]
    fn test_layout_requires_full_landmark_set() {
        let short = sample_with(Shape::from_tuples(&[(0.0, 0.0)]));
        let err = Corpus::from_samples(vec![short], Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            PrepError::InconsistentLandmarkCount { found: 1, expected: 68, .. }
        ));
    }

    #[test]
    fn test_build_corpus_concatenates_targets_in_order() {
        let root = unique_temp_dir("corpus_order");
        write_subset(&root, "01_Indoor", 3);
        write_subset(&root, "02_Outdoor", 2);

        let corpus = build_corpus(&dataset_config(&root, &["01_Indoor", "02_Outdoor"])).unwrap();
        let ids: Vec<&str> = corpus.samples.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "01_Indoor_000",
                "01_Indoor_001",
                "01_Indoor_002",
                "02_Outdoor_000",
                "02_Outdoor_001"
            ]
        );
        assert_eq!(corpus.subsets.len(), 2);
        assert_eq!(corpus.subsets[0].accepted, 3);

        let expected = compute_mean_shape(corpus.samples.iter().map(|s| &s.shape)).unwrap();
        assert!(corpus.mean_shape.max_abs_diff(&expected) < 1e-12);
        assert_eq!(corpus.mean_shape.len(), NUM_LANDMARKS);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_empty_subsets_raise_empty_corpus() {
        let root = unique_temp_dir("corpus_empty");
        fs::create_dir_all(root.join("00_Test")).unwrap();

        let err = build_corpus(&dataset_config(&root, &["00_Test"])).unwrap_err();
        assert!(matches!(err, PrepError::EmptyCorpus));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_image_without_annotation_is_fatal() {
        let root = unique_temp_dir("corpus_orphan");
        write_subset(&root, "00_Test", 1);
        gradient_image(32, 32)
            .save(root.join("00_Test").join("orphan.png"))
            .unwrap();

        let err = build_corpus(&dataset_config(&root, &["00_Test"])).unwrap_err();
        assert!(matches!(err, PrepError::MissingAnnotation { .. }));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_malformed_annotation_aborts_the_run() {
        let root = unique_temp_dir("corpus_malformed");
        let shapes = write_subset(&root, "00_Test", 2);
        let text = annotation_text(&shapes[0]);
        let short: Vec<&str> = text.lines().take(71).collect();
        fs::write(root.join("00_Test").join("00_Test_000.pts"), short.join("\n")).unwrap();

        let err = build_corpus(&dataset_config(&root, &["00_Test"])).unwrap_err();
        assert!(matches!(err, PrepError::MalformedAnnotation { .. }));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_non_finite_landmark_aborts_instead_of_poisoning_mean() {
        let root = unique_temp_dir("corpus_nan");
        let shapes = write_subset(&root, "00_Test", 3);
        let text = annotation_text(&shapes[1]);
        let mut lines: Vec<&str> = text.lines().collect();
        lines[70] = "NaN NaN";
        fs::write(root.join("00_Test").join("00_Test_001.pts"), lines.join("\n")).unwrap();

        let err = build_corpus(&dataset_config(&root, &["00_Test"])).unwrap_err();
        assert!(matches!(err, PrepError::MalformedAnnotation { .. }));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_undecodable_image_aborts_the_run() {
        let root = unique_temp_dir("corpus_undecodable");
        let shapes = write_subset(&root, "00_Test", 1);
        let dir = root.join("00_Test");
        fs::write(dir.join("zz_empty.png"), b"").unwrap();
        fs::write(dir.join("zz_empty.pts"), annotation_text(&shapes[0])).unwrap();

        let err = build_corpus(&dataset_config(&root, &["00_Test"])).unwrap_err();
        assert!(matches!(err, PrepError::Image(_)));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_out_of_bounds_faces_are_skipped() {
        let root = unique_temp_dir("corpus_skip");
        write_subset(&root, "00_Test", 2);
        let dir = root.join("00_Test");
        let outside = synthetic_face_shape(10.0, 10.0, 60.0);
        gradient_image(256, 240).save(dir.join("zz_outside.png")).unwrap();
        fs::write(dir.join("zz_outside.pts"), annotation_text(&outside)).unwrap();

        let corpus = build_corpus(&dataset_config(&root, &["00_Test"])).unwrap();
        assert_eq!(corpus.len(), 2);
        let skipped: Vec<_> = corpus.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].sample, "zz_outside");
        assert_eq!(corpus.subsets[0].images, 3);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_missing_target_directory_is_fatal() {
        let root = unique_temp_dir("corpus_missing");
        let err = build_corpus(&dataset_config(&root, &["nope"])).unwrap_err();
        assert!(matches!(err, PrepError::Config(_)));
        fs::remove_dir_all(&root).ok();
    }
}
