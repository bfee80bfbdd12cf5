use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Real-valued image band data
pub type BandReal = f32;

/// 2D image band array (rows x cols)
pub type BandArray = Array2<BandReal>;

/// 2D label/class array (rows x cols); class 0 is the reserved invalid label
pub type LabelArray = Array2<u32>;

/// Geospatial transformation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Build from a GDAL-style 6-element array
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    /// Convert back to the GDAL 6-element layout
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Geotransform for a sub-window starting at the given pixel offset
    pub fn for_window(&self, x_off: usize, y_off: usize) -> Self {
        let mut gt = self.clone();
        gt.top_left_x += x_off as f64 * self.pixel_width + y_off as f64 * self.rotation_x;
        gt.top_left_y += x_off as f64 * self.rotation_y + y_off as f64 * self.pixel_height;
        gt
    }

    /// Map coordinates of a pixel corner (pixel-space, not center)
    pub fn pixel_to_map(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.top_left_x + px * self.pixel_width + py * self.rotation_x,
            self.top_left_y + px * self.rotation_y + py * self.pixel_height,
        )
    }
}

/// Immutable description of a raster's grid, captured when the dataset is opened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterGrid {
    /// Map coordinates of the top-left corner
    pub origin: (f64, f64),
    /// Pixel size (x, y); y is typically negative for north-up rasters
    pub pixel_size: (f64, f64),
    /// Raster size in pixels (width, height)
    pub size: (usize, usize),
    /// Opaque CRS token (projection WKT); compared for identity only
    pub crs: String,
    /// Number of bands
    pub band_count: usize,
    /// Declared no-data value of band 1, if any
    pub no_data: Option<f64>,
    /// Full geotransform
    pub geo_transform: GeoTransform,
}

impl RasterGrid {
    /// Two grids are compatible iff their CRS tokens and pixel sizes match.
    pub fn compatible_with(&self, other: &RasterGrid) -> bool {
        const EPS: f64 = 1e-9;
        self.crs == other.crs
            && (self.pixel_size.0 - other.pixel_size.0).abs() < EPS
            && (self.pixel_size.1 - other.pixel_size.1).abs() < EPS
    }

    pub fn width(&self) -> usize {
        self.size.0
    }

    pub fn height(&self) -> usize {
        self.size.1
    }
}

/// A rectangular pixel window in image space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileWindow {
    pub x_off: usize,
    pub y_off: usize,
    pub width: usize,
    pub height: usize,
}

impl TileWindow {
    pub fn new(x_off: usize, y_off: usize, width: usize, height: usize) -> Self {
        Self {
            x_off,
            y_off,
            width,
            height,
        }
    }

    /// Derived tile file basename, shared between the image and label tile
    pub fn basename(&self, stem: &str) -> String {
        format!("{}_tile_{}_{}.tif", stem, self.x_off, self.y_off)
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Per-tile class histogram over a fixed, discovered class-id set.
///
/// The counts vector is indexed parallel to the discovered class ids; the
/// reserved class 0 is excluded by construction and never appears in any bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassHistogram {
    pub counts: Vec<u64>,
}

impl ClassHistogram {
    pub fn zeros(num_classes: usize) -> Self {
        Self {
            counts: vec![0; num_classes],
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Naming policy pairing label tiles with their image tiles.
///
/// The image path is derived from a label path by substituting the
/// *rightmost* path segment equal to `label_dir` with `image_dir`, so a
/// directory tree that happens to contain the label directory name higher up
/// is left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilePairNaming {
    pub image_dir: String,
    pub label_dir: String,
}

impl Default for TilePairNaming {
    fn default() -> Self {
        Self {
            image_dir: "images".to_string(),
            label_dir: "labels".to_string(),
        }
    }
}

impl TilePairNaming {
    /// Derive the image tile path for a label tile path.
    ///
    /// Paths are handled as forward-slash strings (the manifest wire format
    /// uses forward slashes on every host).
    pub fn image_path_for(&self, label_path: &str) -> String {
        let normalized = label_path.replace('\\', "/");
        let mut segments: Vec<String> = normalized.split('/').map(|s| s.to_string()).collect();
        for seg in segments.iter_mut().rev() {
            if *seg == self.label_dir {
                *seg = self.image_dir.clone();
                break;
            }
        }
        segments.join("/")
    }
}

/// Per-class counts, percentages and training weight across the three splits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummaryRow {
    pub class_id: u32,
    pub train_count: u64,
    pub train_percentage: f64,
    pub val_count: u64,
    pub val_percentage: f64,
    pub test_count: u64,
    pub test_percentage: f64,
    /// Normalized training weight; weights of represented classes sum to the
    /// number of represented classes
    pub train_weight: f64,
}

/// Class-distribution summary over the chosen train/val/test partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub rows: Vec<ClassSummaryRow>,
    /// Fixed intensity divisor used by the normalization stage, if any
    pub scaler: Option<f64>,
    /// Whether the reserved class 0 was present and removed from the counters
    pub zero_class_removed: bool,
}

/// Streaming statistics for one image band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStats {
    /// 1-based band number
    pub band: usize,
    pub mean: f64,
    pub std: f64,
    /// Valid pixels seen; identical between the mean and deviation passes
    pub pixel_count: u64,
}

/// Per-band normalization statistics over the training split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub bands: Vec<BandStats>,
    /// Scaler the pixels were divided by before the statistics, if nonzero
    pub scaler: Option<f64>,
}

/// Error types for dataset preparation
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("incompatible raster grids: {0}")]
    IncompatibleGrid(String),

    #[error("unreadable raster {path:?}: {reason}")]
    UnreadableRaster { path: PathBuf, reason: String },

    #[error(
        "no feasible split found (canceled: {canceled}); \
         per-class minimum counts {min_counts:?}, best infeasible score {best_infeasible:?}"
    )]
    NoFeasibleSplit {
        min_counts: Vec<f64>,
        best_infeasible: Option<f64>,
        canceled: bool,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("processing error: {0}")]
    Processing(String),
}

/// Result type for dataset preparation operations
pub type TileResult<T> = Result<T, TileError>;
