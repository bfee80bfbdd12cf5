use crate::core::histogram::{build_histograms, discover_classes};
use crate::core::split::{find_best_split, SplitAssignment, SplitCounts, SplitParams};
use crate::core::stats::{compute_stats, StatsParams};
use crate::core::summary::build_summary;
use crate::io::manifest::{write_band_stats, write_manifest_set, write_summary, ManifestSet};
use crate::progress::{PipelineProgress, ProgressSink};
use crate::types::{NormalizationStats, TilePairNaming, TileResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parameters for the full dataset-preparation pipeline downstream of tiling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineParams {
    pub split: SplitParams,
    pub stats: StatsParams,
    pub naming: TilePairNaming,
}

/// Everything the pipeline produced before finishing or being canceled
#[derive(Debug)]
pub struct PipelineOutput {
    /// Sorted class ids discovered across the label tiles
    pub classes: Vec<u32>,
    /// The winning partition
    pub assignment: SplitAssignment,
    /// Written manifests; absent if the run was canceled first
    pub manifests: Option<ManifestSet>,
    /// Written class summary; absent if the run was canceled first
    pub summary_csv: Option<PathBuf>,
    /// Normalization statistics; absent if the run was canceled first
    pub stats: Option<NormalizationStats>,
    /// Written band-statistics file; absent if the run was canceled first
    pub stats_csv: Option<PathBuf>,
    /// Whether cancellation cut the pipeline short
    pub canceled: bool,
}

/// Orchestrates histogram discovery, split search, persistence and
/// normalization statistics over an existing set of label tiles.
///
/// One [`PipelineProgress`] counter is threaded through the split search and
/// both normalization passes, so a single progress bar spans the whole
/// pipeline; its denominator is `permutations + 2 * num_train`.
pub struct DatasetPipeline {
    params: PipelineParams,
}

impl DatasetPipeline {
    pub fn new(params: PipelineParams) -> Self {
        Self { params }
    }

    pub fn run(
        &self,
        label_paths: &[PathBuf],
        out_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> TileResult<PipelineOutput> {
        self.params.split.validate()?;
        self.params.stats.validate()?;

        log::info!(
            "Starting dataset pipeline over {} label tiles -> {}",
            label_paths.len(),
            out_dir.display()
        );

        let classes = discover_classes(label_paths)?;
        let histograms = build_histograms(label_paths, &classes)?;

        let counts = SplitCounts::for_tiles(histograms.len(), &self.params.split);
        let total_steps = self.params.split.permutations + 2 * counts.train as u64;
        let mut progress = PipelineProgress::new(sink, total_steps);

        let assignment = find_best_split(&histograms, &self.params.split, &mut progress)?;

        let mut output = PipelineOutput {
            classes,
            assignment,
            manifests: None,
            summary_csv: None,
            stats: None,
            stats_csv: None,
            canceled: false,
        };

        if progress.is_canceled() {
            log::warn!("Pipeline canceled after split search; nothing persisted");
            output.canceled = true;
            return Ok(output);
        }

        let pick = |indices: &[usize]| -> Vec<PathBuf> {
            indices.iter().map(|&i| label_paths[i].clone()).collect()
        };
        let train_labels = pick(output.assignment.train_indices());
        let val_labels = pick(output.assignment.val_indices());
        let test_labels = pick(output.assignment.test_indices());

        let manifests = write_manifest_set(
            out_dir,
            &train_labels,
            &val_labels,
            &test_labels,
            &self.params.naming,
        )?;

        let summary = build_summary(
            &train_labels,
            &val_labels,
            &test_labels,
            self.params.stats.scaler_option(),
        )?;
        output.summary_csv = Some(write_summary(out_dir, &summary)?);

        let train_manifest = manifests.train.clone();
        output.manifests = Some(manifests);

        if progress.is_canceled() {
            log::warn!("Pipeline canceled before normalization statistics");
            output.canceled = true;
            return Ok(output);
        }

        match compute_stats(&train_manifest, &self.params.stats, &mut progress)? {
            Some(stats) => {
                output.stats_csv = Some(write_band_stats(out_dir, &stats)?);
                output.stats = Some(stats);
            }
            None => {
                output.canceled = true;
                return Ok(output);
            }
        }

        log::info!(
            "Dataset pipeline complete: score {:.6}, outputs in {}",
            output.assignment.score,
            out_dir.display()
        );
        Ok(output)
    }
}
