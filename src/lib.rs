//! tilefish: A Fast, Modular Raster Tiling & Balanced Dataset Splitting Toolkit
//!
//! This library turns co-registered image/label raster pairs into
//! deep-learning-ready datasets: it tiles the rasters on a fixed grid,
//! searches for a class-balanced train/validation/test partition by
//! minimizing pairwise Earth-Mover distance across the split distributions,
//! writes CSV manifests and a class summary, and computes per-band
//! normalization statistics in two streaming passes.
//!
//! All stages are synchronous and cooperatively cancelable through an
//! injected [`progress::ProgressSink`].

pub mod core;
pub mod io;
pub mod progress;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    BandArray, BandStats, ClassHistogram, ClassSummary, ClassSummaryRow, GeoTransform, LabelArray,
    NormalizationStats, RasterGrid, TileError, TilePairNaming, TileResult, TileWindow,
};

pub use crate::core::{
    build_histograms, build_summary, build_summary_from_manifests, compute_stats, discover_classes,
    earth_mover_distance, find_best_split, DatasetPipeline, PipelineOutput, PipelineParams,
    RasterTiler, RoiFilter, RoiMode, RoiPolygon, SplitAssignment, SplitCounts, SplitParams,
    StatsParams, TilingParams,
};

pub use io::{read_manifest, write_manifest_set, ManifestSet, RasterSource};

pub use progress::{NullProgress, PipelineProgress, ProgressSink};
