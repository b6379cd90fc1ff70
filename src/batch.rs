//! Batch processing of tile folders.

use std::path::{Path, PathBuf};

use agn::coalesce::{CoalesceStats, Coalescer};
use agn::document::{RetryPolicy, TileDocument};
use agn::folder;
use agn::tiles::LatitudeOffset;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::Error;
use crate::config::Config;

/// Processing applied to every tile.
#[derive(Copy, Clone, Debug)]
pub struct TileJob {
    latitude_offset: LatitudeOffset,
    coalescer: Option<Coalescer>,
    retry_policy: Option<RetryPolicy>,
}

impl TileJob {
    pub fn new(config: &Config) -> Self {
        Self {
            latitude_offset: config.tiles.latitude_offset.into(),
            coalescer: config.coalesce.enabled.then(|| config.coalesce.coalescer()),
            retry_policy: config.save.enabled.then(|| config.save.retry_policy()),
        }
    }

    /// Load, coalesce and save a single tile.
    pub fn process(&self, path: &Path) -> Result<TileReport, agn::Error> {
        let mut tile = TileDocument::from_path(path, self.latitude_offset)?;
        let polygons = tile.vegetation_polygons().len();

        let stats = match &self.coalescer {
            Some(coalescer) => coalescer.coalesce(tile.vegetation_polygons_mut())?,
            None => CoalesceStats::default(),
        };

        if let Some(retry_policy) = &self.retry_policy {
            tile.save_to_path(path, retry_policy)?;
        }

        Ok(TileReport { polygons, stats })
    }
}

/// Outcome of processing a tile.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct TileReport {
    /// Vegetation polygons before coalescing.
    pub polygons: usize,
    pub stats: CoalesceStats,
}

/// Summary of a batch run.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub merged: usize,
}

/// Process all tiles in the given folders in parallel.
pub async fn process_folders(job: TileJob, folders: &[PathBuf]) -> Result<BatchSummary, Error> {
    let mut tasks = JoinSet::new();
    for folder in folders {
        let paths = folder::tile_files(folder)?;
        info!("Found {} tiles in {folder:?}", paths.len());

        for path in paths {
            tasks.spawn_blocking(move || {
                let result = job.process(&path);
                (path, result)
            });
        }
    }

    let mut summary = BatchSummary::default();
    while let Some(task) = tasks.join_next().await {
        let (path, result) = task?;
        match result {
            Ok(report) => {
                info!(
                    "Processed {path:?}: {} of {} vegetation polygons merged, {} snapped",
                    report.stats.merged(),
                    report.polygons,
                    report.stats.snapped,
                );
                summary.processed += 1;
                summary.merged += report.stats.merged();
            },
            Err(err) => {
                error!("Failed to process {path:?}: {err}");
                summary.failed += 1;
            },
        }
    }

    Ok(summary)
}
