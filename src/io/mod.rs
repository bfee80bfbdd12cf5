//! Raster and tabular I/O

pub mod manifest;
pub mod raster;

pub use manifest::{read_manifest, write_manifest_set, ManifestSet};
pub use raster::{write_image_tile, write_label_tile, RasterSource};
