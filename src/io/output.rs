use anyhow::Context;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::io::input::Shape;
use crate::processing::align::AlignmentReport;

#[derive(Debug, Serialize)]
struct LandmarkRecord {
    feature_index: usize,
    x: f64,
    y: f64,
}

#[derive(Debug, Serialize)]
struct AlignmentRecord<'a> {
    index: usize,
    sample: &'a str,
    status: &'static str,
    scale: Option<f64>,
    angle_rad: Option<f64>,
    tx: Option<f64>,
    ty: Option<f64>,
    reconstruction_error: Option<f64>,
    error: Option<String>,
}

/// `feature_index,x,y` per landmark.
pub fn write_shape_to_csv<P: AsRef<Path>>(path: P, shape: &Shape) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Could not create {}", path.display()))?;

    for (feature_index, p) in shape.iter().enumerate() {
        wtr.serialize(LandmarkRecord {
            feature_index,
            x: p.x,
            y: p.y,
        })?;
    }

    wtr.flush()?;
    Ok(())
}

/// One row per corpus sample, ordered by index, successful or not.
pub fn write_alignment_to_csv<P: AsRef<Path>>(
    path: P,
    report: &AlignmentReport,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Could not create {}", path.display()))?;

    let mut records: Vec<AlignmentRecord> = report
        .aligned
        .iter()
        .map(|a| AlignmentRecord {
            index: a.index,
            sample: &a.sample,
            status: "aligned",
            scale: Some(a.transform.scale()),
            angle_rad: Some(a.transform.angle()),
            tx: Some(a.transform.translation.x),
            ty: Some(a.transform.translation.y),
            reconstruction_error: Some(a.reconstruction_error),
            error: None,
        })
        .chain(report.failed.iter().map(|f| AlignmentRecord {
            index: f.index,
            sample: &f.failure.sample,
            status: "failed",
            scale: None,
            angle_rad: None,
            tx: None,
            ty: None,
            reconstruction_error: None,
            error: Some(f.failure.error.to_string()),
        }))
        .collect();
    records.sort_by_key(|r| r.index);

    for record in records {
        wtr.serialize(record)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    Ok(())
}
