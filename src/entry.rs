use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use tracing::info;

use crate::config::Config;
use crate::error::PrepError;
use crate::io::output::{write_alignment_to_csv, write_json, write_shape_to_csv};
use crate::processing::align::{align_corpus, AlignmentCounts, AlignmentReport};
use crate::processing::corpus::{build_corpus, Corpus};
use crate::visualize::save_shape_plot;

#[derive(Debug, Clone, Serialize)]
pub struct SubsetSummary {
    pub target: String,
    pub images: usize,
    pub accepted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkipRecord {
    pub stage: &'static str,
    pub sample: String,
    pub reason: String,
}

/// Counts reported at the end of a run and written to `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub accepted_samples: usize,
    pub subsets: Vec<SubsetSummary>,
    pub geometry_skips: usize,
    pub degenerate_box_skips: usize,
    pub alignment: AlignmentCounts,
    pub max_reconstruction_error: f64,
    pub skipped: Vec<SkipRecord>,
}

impl RunSummary {
    pub fn new(corpus: &Corpus, report: &AlignmentReport) -> Self {
        let subsets = corpus
            .subsets
            .iter()
            .map(|s| SubsetSummary {
                target: s.target.clone(),
                images: s.images,
                accepted: s.accepted,
                skipped: s.skipped.len(),
            })
            .collect();

        let skipped = corpus
            .skipped()
            .map(|f| SkipRecord {
                stage: "preprocess",
                sample: f.sample.clone(),
                reason: f.error.to_string(),
            })
            .chain(report.failed.iter().map(|f| SkipRecord {
                stage: "align",
                sample: f.failure.sample.clone(),
                reason: f.failure.error.to_string(),
            }))
            .collect();

        Self {
            accepted_samples: corpus.len(),
            subsets,
            geometry_skips: corpus
                .skipped()
                .filter(|f| matches!(f.error, PrepError::Geometry { .. }))
                .count(),
            degenerate_box_skips: corpus
                .skipped()
                .filter(|f| matches!(f.error, PrepError::DegenerateBox { .. }))
                .count(),
            alignment: report.counts(),
            max_reconstruction_error: report.max_reconstruction_error(),
            skipped,
        }
    }
}

/// Builds the corpus and aligns every sample onto the mean shape.
pub fn build_and_align(config: &Config) -> Result<(Corpus, AlignmentReport)> {
    config.validate_input().context("invalid configuration")?;
    let corpus = build_corpus(config).context("building corpus failed")?;
    info!(
        "Corpus built: {} samples, {} skipped",
        corpus.len(),
        corpus.skipped().count()
    );
    let report = align_corpus(&corpus).context("aligning corpus failed")?;
    Ok((corpus, report))
}

/// Full batch run: corpus, mean shape, alignment, diagnostic rasters and summaries.
pub fn run_pipeline(config: &Config) -> Result<RunSummary> {
    config.validate().context("invalid configuration")?;
    let output_dir = config.output_dir()?;
    fs::create_dir_all(output_dir).with_context(|| {
        format!("Could not create output directory: {:?}", output_dir)
    })?;

    let (corpus, report) = build_and_align(config)?;

    save_shape_plot(
        &corpus.mean_shape,
        output_dir,
        "mean",
        config.canvas_size,
        &config.image_format,
    )
    .context("writing mean shape plot failed")?;
    write_shape_to_csv(output_dir.join("mean_shape.csv"), &corpus.mean_shape)?;

    write_alignment_plots(&corpus, &report, config)?;
    write_alignment_to_csv(output_dir.join("alignment.csv"), &report)?;

    let summary = RunSummary::new(&corpus, &report);
    write_json(output_dir.join("summary.json"), &summary)?;

    info!(
        "#images {} (geometry skips {}, degenerate boxes {}, estimation failures {}, singular failures {})",
        summary.accepted_samples,
        summary.geometry_skips,
        summary.degenerate_box_skips,
        summary.alignment.estimation_failures,
        summary.alignment.singular_failures
    );
    Ok(summary)
}

/// `<index>_original`, `<index>_normalized` and `<index>_inverse` for every aligned sample.
fn write_alignment_plots(
    corpus: &Corpus,
    report: &AlignmentReport,
    config: &Config,
) -> Result<()> {
    let output_dir = config.output_dir()?;
    let total = report.aligned.len();

    let results: Vec<Result<()>> = report
        .aligned
        .par_iter()
        .map(|alignment| {
            let original = &corpus.samples[alignment.index].shape;
            for (suffix, shape) in [
                ("original", original),
                ("normalized", &alignment.aligned),
                ("inverse", &alignment.reconstructed),
            ] {
                save_shape_plot(
                    shape,
                    output_dir,
                    &format!("{}_{}", alignment.index, suffix),
                    config.canvas_size,
                    &config.image_format,
                )
                .with_context(|| format!("Failed [{}_{}]", alignment.index, suffix))?;
            }
            Ok(())
        })
        .collect();

    let errors: Vec<String> = results
        .into_iter()
        .filter_map(|r| r.err())
        .map(|e| format!("{:#}", e))
        .collect();

    info!(
        "Shape plots: {}/{} samples written",
        total - errors.len(),
        total
    );
    if !errors.is_empty() {
        bail!("Some shape plots failed:\n{}", errors.join("\n"));
    }
    Ok(())
}
