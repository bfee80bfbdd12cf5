//! Core dataset-preparation modules

pub mod histogram;
pub mod pipeline;
pub mod split;
pub mod stats;
pub mod summary;
pub mod tiler;

// Re-export main types
pub use histogram::{build_histograms, discover_classes};
pub use pipeline::{DatasetPipeline, PipelineOutput, PipelineParams};
pub use split::{earth_mover_distance, find_best_split, SplitAssignment, SplitCounts, SplitParams};
pub use stats::{compute_stats, StatsParams};
pub use summary::{build_summary, build_summary_from_manifests};
pub use tiler::{RasterTiler, RoiFilter, RoiMode, RoiPolygon, TilingParams};
