//! Flat label export: one text file per annotation plus a dataset descriptor

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;

use crate::domain::{Annotation, ShapeKind};

/// Which shapes become label rows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    /// Rectangles
    Bbox,
    /// Polygons
    Segment,
}

impl ExportKind {
    pub fn shape_kind(self) -> ShapeKind {
        match self {
            ExportKind::Bbox => ShapeKind::Rectangle,
            ExportKind::Segment => ShapeKind::Polygon,
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportKind::Bbox => "bbox",
            ExportKind::Segment => "segment",
        })
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bbox" => Ok(ExportKind::Bbox),
            "segment" => Ok(ExportKind::Segment),
            other => Err(format!("data type must be 'segment' or 'bbox', got '{other}'")),
        }
    }
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Label names indexed by class id
    pub labels: Vec<String>,
    pub files_written: usize,
    /// Annotation files that could not be read or parsed
    pub skipped: Vec<PathBuf>,
}

/// Annotations live under `<dataset>/images`
pub fn images_dir(dataset: &Path) -> PathBuf {
    dataset.join("images")
}

fn load_annotations(dir: &Path) -> anyhow::Result<(Vec<(String, Annotation)>, Vec<PathBuf>)> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut loaded = Vec::new();
    let mut skipped = Vec::new();
    for path in paths {
        let parsed = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|text| Ok(Annotation::from_json(&text)?));
        match parsed {
            Ok(annotation) => loaded.push((crate::source::stem_of(&path), annotation)),
            Err(err) => {
                log::warn!("Skipping {}: {}", path.display(), err);
                skipped.push(path);
            }
        }
    }
    Ok((loaded, skipped))
}

/// Label rows for one annotation, coordinates normalized by the image size
fn label_rows(annotation: &Annotation, kind: ShapeKind, ids: &BTreeMap<&str, usize>) -> Vec<String> {
    let w = annotation.image_width as f64;
    let h = annotation.image_height as f64;
    annotation
        .shapes
        .iter()
        .filter(|shape| shape.kind == kind)
        .filter_map(|shape| {
            let id = ids.get(shape.label.as_str())?;
            let mut row = id.to_string();
            for [x, y] in &shape.points {
                row.push_str(&format!(" {} {}", x / w, y / h));
            }
            Some(row)
        })
        .collect()
}

/// Single-quoted YAML scalar; embedded quotes are doubled
fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

fn descriptor(dataset: &Path, labels: &[String]) -> String {
    let images = images_dir(dataset);
    let mut text = format!(
        "path: {}\ntrain: {}\nval: {}\ntest:\n\nnames:\n",
        dataset.display(),
        images.display(),
        images.display()
    );
    for (id, label) in labels.iter().enumerate() {
        text.push_str(&format!("  {id}: {}\n", yaml_single_quoted(label)));
    }
    text
}

/// Export every annotation in `<dataset>/images` into `out_dir`.
///
/// `out_dir` is removed and recreated. Class ids follow sorted label order
/// over all shapes of every annotation. An annotation with no shape of the
/// requested kind gets no text file.
pub fn export_labels(dataset: &Path, kind: ExportKind, out_dir: &Path) -> anyhow::Result<ExportSummary> {
    if out_dir.exists() {
        std::fs::remove_dir_all(out_dir)
            .with_context(|| format!("Failed to clear {}", out_dir.display()))?;
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let (annotations, skipped) = load_annotations(&images_dir(dataset))?;

    let labels: Vec<String> = annotations
        .iter()
        .flat_map(|(_, ann)| ann.shapes.iter().map(|s| s.label.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let ids: BTreeMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(id, label)| (label.as_str(), id))
        .collect();

    let mut files_written = 0;
    for (stem, annotation) in &annotations {
        if annotation.image_width == 0 || annotation.image_height == 0 {
            log::warn!("{stem}: zero image size, skipping");
            continue;
        }
        let rows = label_rows(annotation, kind.shape_kind(), &ids);
        if rows.is_empty() {
            continue;
        }
        let path = out_dir.join(format!("{stem}.txt"));
        std::fs::write(&path, rows.join("\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        files_written += 1;
    }

    let config_path = out_dir.join("config.yml");
    std::fs::write(&config_path, descriptor(dataset, &labels))
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    log::info!(
        "Exported {} {} label file(s) with {} class(es)",
        files_written,
        kind,
        labels.len()
    );
    Ok(ExportSummary {
        labels,
        files_written,
        skipped,
    })
}
