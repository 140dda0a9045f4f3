//! Work distribution over independent (item, iteration) units
//!
//! Items are loaded once and each iteration clones the loaded source, so no
//! two units share mutable state. Units run on a rayon pool in any order;
//! a failing unit is recorded and the rest of the batch carries on.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::augment::Pipeline;
use crate::config::AugmentConfig;
use crate::output::{PairWriter, WrittenPair};
use crate::source::{SourcePair, sidecar_for, stem_of};

/// Extensions treated as source images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// An image with its sidecar annotation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceItem {
    pub stem: String,
    pub image: PathBuf,
    pub annotation: PathBuf,
}

/// Why a discovered image will not be augmented
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    MissingAnnotation,
    DuplicateStem,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Discovery {
    pub items: Vec<SourceItem>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// List source images in `dir`, sorted by file name, paired with sidecars.
///
/// Images without a sidecar are skipped. When two images share a stem the
/// first in sorted order wins so output names stay unique.
pub fn discover_items(dir: &Path) -> anyhow::Result<Discovery> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read source directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    images.sort();

    let mut discovery = Discovery::default();
    let mut stems = HashSet::new();
    for image in images {
        let annotation = sidecar_for(&image);
        if !annotation.is_file() {
            log::debug!("No annotation for {}, skipping", image.display());
            discovery.skipped.push((image, SkipReason::MissingAnnotation));
            continue;
        }
        let stem = stem_of(&image);
        if !stems.insert(stem.clone()) {
            log::warn!(
                "{} shares stem '{}' with an earlier image, skipping",
                image.display(),
                stem
            );
            discovery.skipped.push((image, SkipReason::DuplicateStem));
            continue;
        }
        discovery.items.push(SourceItem {
            stem,
            image,
            annotation,
        });
    }
    Ok(discovery)
}

/// 64-bit FNV-1a, stable across platforms and releases
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// SplitMix64 finalizer
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Seed for one unit; depends only on the base seed, the stem and the
/// iteration, never on scheduling
pub fn unit_seed(base: u64, stem: &str, iteration: u32) -> u64 {
    mix(base ^ mix(fnv1a(stem.as_bytes()) ^ mix(iteration as u64 + 1)))
}

/// A unit that did not produce output
#[derive(Debug)]
pub struct UnitFailure {
    pub item: PathBuf,
    /// None when the item itself could not be loaded
    pub iteration: Option<u32>,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub seed: u64,
    pub written: Vec<WrittenPair>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
    pub failures: Vec<UnitFailure>,
}

impl BatchReport {
    /// Total units attempted (successful or failed)
    pub fn attempted(&self) -> usize {
        self.written.len() + self.failures.len()
    }
}

enum UnitOutcome {
    Written(WrittenPair),
    Failed(UnitFailure),
}

/// Everything a worker needs, shared read-only
struct BatchContext<'a> {
    pipeline: &'a Pipeline,
    writer: &'a PairWriter,
    iterations: u32,
    seed: u64,
}

impl BatchContext<'_> {
    fn run_item(&self, item: &SourceItem) -> Vec<UnitOutcome> {
        let source = match SourcePair::load(&item.image, &item.annotation) {
            Ok(source) => source,
            Err(err) => {
                log::error!("Failed to load {}: {}", item.image.display(), err);
                return vec![UnitOutcome::Failed(UnitFailure {
                    item: item.image.clone(),
                    iteration: None,
                    error: anyhow::Error::new(err).context("loading source pair"),
                })];
            }
        };

        (0..self.iterations)
            .into_par_iter()
            .map(|iteration| match self.run_unit(&source, iteration) {
                Ok(written) => UnitOutcome::Written(written),
                Err(error) => {
                    log::error!(
                        "{} iteration {} failed: {:#}",
                        item.image.display(),
                        iteration,
                        error
                    );
                    UnitOutcome::Failed(UnitFailure {
                        item: item.image.clone(),
                        iteration: Some(iteration),
                        error,
                    })
                }
            })
            .collect()
    }

    fn run_unit(&self, source: &SourcePair, iteration: u32) -> anyhow::Result<WrittenPair> {
        let mut rng = StdRng::seed_from_u64(unit_seed(self.seed, &source.stem, iteration));
        let pair = self
            .pipeline
            .augment(source, &mut rng)
            .context("augmentation pipeline")?;
        let written = self
            .writer
            .write(&source.stem, iteration, pair)
            .context("writing output pair")?;
        Ok(written)
    }
}

/// Augment every annotated image in `src` into `dst`
pub fn run_batch(src: &Path, dst: &Path, config: &AugmentConfig) -> anyhow::Result<BatchReport> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create output directory {}", dst.display()))?;

    let discovery = discover_items(src)?;
    let seed = config.seed.unwrap_or_else(rand::random);
    let pipeline = config.pipeline();
    let writer = PairWriter::new(dst, config.output_format, config.jpeg_quality);

    log::info!(
        "Augmenting {} image(s) x {} iteration(s) with [{}], seed {}",
        discovery.items.len(),
        config.iterations,
        pipeline.describe().join(", "),
        seed
    );

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = config.workers {
        builder = builder.num_threads(workers);
    }
    let pool = builder.build().context("Failed to build worker pool")?;

    let ctx = BatchContext {
        pipeline: &pipeline,
        writer: &writer,
        iterations: config.iterations,
        seed,
    };
    let outcomes: Vec<UnitOutcome> = pool.install(|| {
        discovery
            .items
            .par_iter()
            .flat_map_iter(|item| ctx.run_item(item))
            .collect()
    });

    let mut report = BatchReport {
        seed,
        skipped: discovery.skipped,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            UnitOutcome::Written(written) => report.written.push(written),
            UnitOutcome::Failed(failure) => report.failures.push(failure),
        }
    }
    report.written.sort_by(|a, b| a.image.cmp(&b.image));

    log::info!(
        "Wrote {} pair(s), {} failure(s), {} skipped",
        report.written.len(),
        report.failures.len(),
        report.skipped.len()
    );
    Ok(report)
}
