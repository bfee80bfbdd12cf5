use crate::io::raster::{write_image_tile, write_label_tile, RasterSource};
use crate::progress::{PipelineProgress, ProgressSink};
use crate::types::{
    BandArray, GeoTransform, LabelArray, TileError, TilePairNaming, TileResult, TileWindow,
};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Region-of-interest acceptance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoiMode {
    /// Keep only tiles fully contained in at least one polygon
    Contained,
    /// Keep tiles touching any polygon; pixels outside all polygons are
    /// zeroed in both rasters before tiling
    Intersects,
}

/// A simple closed polygon ring in map coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiPolygon {
    pub exterior: Vec<(f64, f64)>,
}

fn orient(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

fn segments_intersect(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), p4: (f64, f64)) -> bool {
    let d1 = orient(p3, p4, p1);
    let d2 = orient(p3, p4, p2);
    let d3 = orient(p1, p2, p3);
    let d4 = orient(p1, p2, p4);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(p3, p4, p1))
        || (d2 == 0.0 && on_segment(p3, p4, p2))
        || (d3 == 0.0 && on_segment(p1, p2, p3))
        || (d4 == 0.0 && on_segment(p1, p2, p4))
}

/// Axis-aligned rectangle in map coordinates
#[derive(Debug, Clone, Copy)]
struct MapRect {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl MapRect {
    fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ]
    }

    fn edges(&self) -> [((f64, f64), (f64, f64)); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }

    fn contains_point(&self, p: (f64, f64)) -> bool {
        p.0 >= self.min_x && p.0 <= self.max_x && p.1 >= self.min_y && p.1 <= self.max_y
    }
}

impl RoiPolygon {
    /// Even-odd ray-casting point-in-polygon test
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let pts = &self.exterior;
        let n = pts.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = pts[i];
            let (xj, yj) = pts[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    fn edge_segments(&self) -> Vec<((f64, f64), (f64, f64))> {
        let n = self.exterior.len();
        (0..n)
            .map(|i| (self.exterior[i], self.exterior[(i + 1) % n]))
            .collect()
    }

    fn contains_rect(&self, rect: &MapRect) -> bool {
        if !rect.corners().iter().all(|&(x, y)| self.contains_point(x, y)) {
            return false;
        }
        // A polygon edge crossing the rectangle boundary means part of the
        // rectangle lies outside
        for edge in self.edge_segments() {
            for rect_edge in rect.edges() {
                if segments_intersect(edge.0, edge.1, rect_edge.0, rect_edge.1) {
                    return false;
                }
            }
        }
        true
    }

    fn intersects_rect(&self, rect: &MapRect) -> bool {
        if rect.corners().iter().any(|&(x, y)| self.contains_point(x, y)) {
            return true;
        }
        if self.exterior.iter().any(|&p| rect.contains_point(p)) {
            return true;
        }
        for edge in self.edge_segments() {
            for rect_edge in rect.edges() {
                if segments_intersect(edge.0, edge.1, rect_edge.0, rect_edge.1) {
                    return true;
                }
            }
        }
        false
    }
}

/// Region-of-interest filter: a polygon set plus the acceptance mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiFilter {
    pub polygons: Vec<RoiPolygon>,
    pub mode: RoiMode,
}

impl RoiFilter {
    fn validate(&self) -> TileResult<()> {
        if self.polygons.is_empty() {
            return Err(TileError::InvalidParameter(
                "ROI filter requires at least one polygon".to_string(),
            ));
        }
        if self.polygons.iter().any(|p| p.exterior.len() < 3) {
            return Err(TileError::InvalidParameter(
                "ROI polygons require at least three vertices".to_string(),
            ));
        }
        Ok(())
    }

    fn tile_passes(&self, rect: &MapRect) -> bool {
        match self.mode {
            RoiMode::Contained => self.polygons.iter().any(|p| p.contains_rect(rect)),
            RoiMode::Intersects => self.polygons.iter().any(|p| p.intersects_rect(rect)),
        }
    }

    fn contains_any(&self, x: f64, y: f64) -> bool {
        self.polygons.iter().any(|p| p.contains_point(x, y))
    }
}

/// Tiling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingParams {
    /// Tile size in pixels (x, y)
    pub tile_size: (usize, usize),
    /// Grid step in pixels (x, y); may differ from the tile size for
    /// overlapping or gapped tiling
    pub step: (usize, usize),
    /// Minimum percentage of nonzero label pixels required to keep a tile,
    /// in [0, 100]; 0 disables both the coverage filter and the
    /// image-nodata label masking
    pub min_label_coverage: f64,
    /// Optional region-of-interest filter
    pub roi: Option<RoiFilter>,
    /// Output directory naming for the image/label tile pair
    pub naming: TilePairNaming,
}

impl Default for TilingParams {
    fn default() -> Self {
        Self {
            tile_size: (256, 256),
            step: (256, 256),
            min_label_coverage: 0.0,
            roi: None,
            naming: TilePairNaming::default(),
        }
    }
}

impl TilingParams {
    pub fn validate(&self) -> TileResult<()> {
        if self.tile_size.0 == 0 || self.tile_size.1 == 0 {
            return Err(TileError::InvalidParameter(format!(
                "Tile size must be positive, got {:?}",
                self.tile_size
            )));
        }
        if self.step.0 == 0 || self.step.1 == 0 {
            return Err(TileError::InvalidParameter(format!(
                "Step must be positive, got {:?}",
                self.step
            )));
        }
        if !(0.0..=100.0).contains(&self.min_label_coverage) {
            return Err(TileError::InvalidParameter(format!(
                "Label coverage threshold must be within [0, 100], got {}",
                self.min_label_coverage
            )));
        }
        if let Some(roi) = &self.roi {
            roi.validate()?;
        }
        Ok(())
    }
}

/// Raster tiler: walks a co-registered image/label raster pair on a fixed
/// grid and writes per-tile GeoTIFF pairs
pub struct RasterTiler {
    params: TilingParams,
}

impl RasterTiler {
    pub fn new(params: TilingParams) -> Self {
        Self { params }
    }

    /// Tile the image/label raster pair into `out_dir`.
    ///
    /// Returns the number of tile pairs created. A canceled run returns the
    /// count created so far; tiles already on disk are kept.
    pub fn run<P, Q, R>(
        &self,
        image_path: P,
        label_path: Q,
        out_dir: R,
        sink: &dyn ProgressSink,
    ) -> TileResult<usize>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        self.params.validate()?;

        let image = RasterSource::open(image_path.as_ref())?;
        let label = RasterSource::open(label_path.as_ref())?;

        if !image.grid().compatible_with(label.grid()) {
            return Err(TileError::IncompatibleGrid(format!(
                "image {} (pixel size {:?}) vs label {} (pixel size {:?})",
                image.path().display(),
                image.grid().pixel_size,
                label.path().display(),
                label.grid().pixel_size,
            )));
        }

        let (width, height) = image.grid().size;
        let (tx, ty) = self.params.tile_size;
        let (sx, sy) = self.params.step;
        let threshold = self.params.min_label_coverage;

        log::info!(
            "Tiling {}x{} raster into {}x{} tiles (step {}x{}, coverage >= {}%)",
            width,
            height,
            tx,
            ty,
            sx,
            sy,
            threshold
        );

        let mut bands: Vec<BandArray> = Vec::with_capacity(image.grid().band_count);
        for b in 1..=image.grid().band_count {
            bands.push(image.read_band(b)?);
        }
        let mut labels: LabelArray = label.read_labels()?;

        if let Some(roi) = &self.params.roi {
            if roi.mode == RoiMode::Intersects {
                self.mask_outside_roi(&mut bands, &mut labels, roi, &image);
            }
        }

        // Pixels coincident with the image no-data value carry no usable
        // label; force them to the reserved class 0 before coverage checks
        if threshold > 0.0 {
            if let Some(no_data) = image.grid().no_data {
                let nd = no_data as f32;
                let band1 = &bands[0];
                for ((row, col), v) in band1.indexed_iter() {
                    if *v == nd {
                        labels[[row, col]] = 0;
                    }
                }
            }
        }

        // Pad right/bottom by one tile so edge windows are always readable;
        // without this, reads on the last row/column would run out of bounds
        let bands: Vec<BandArray> = bands
            .into_iter()
            .map(|b| pad_bottom_right(&b, tx, ty, 0.0))
            .collect();
        let labels = pad_bottom_right(&labels, tx, ty, 0u32);

        let image_dir = out_dir.as_ref().join(&self.params.naming.image_dir);
        let label_dir = out_dir.as_ref().join(&self.params.naming.label_dir);
        std::fs::create_dir_all(&image_dir)?;
        std::fs::create_dir_all(&label_dir)?;

        let stem = image
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "raster".to_string());

        let xs: Vec<usize> = (0..width).step_by(sx).collect();
        let ys: Vec<usize> = (0..height).step_by(sy).collect();
        let total_tiles = (xs.len() * ys.len()) as u64;
        let mut progress = PipelineProgress::new(sink, total_tiles);

        let mut created = 0usize;
        let tile_pixels = (tx * ty) as f64;
        let geo = &image.grid().geo_transform;
        let crs = image.grid().crs.clone();

        for &x in &xs {
            for &y in &ys {
                let window = TileWindow::new(x, y, tx, ty);

                if let Some(roi) = &self.params.roi {
                    let rect = map_rect_for_window(geo, &window);
                    if !roi.tile_passes(&rect) {
                        log::debug!("Tile ({}, {}) outside ROI, skipped", x, y);
                        progress.advance(1);
                        if progress.is_canceled() {
                            log::warn!("Tiling canceled after {} tiles", created);
                            return Ok(created);
                        }
                        continue;
                    }
                }

                let label_window = labels.slice(s![y..y + ty, x..x + tx]);

                if threshold > 0.0 {
                    let valid = label_window.iter().filter(|&&v| v != 0).count() as f64;
                    let fraction = valid / tile_pixels;
                    if fraction < threshold / 100.0 {
                        log::debug!(
                            "Tile ({}, {}) below coverage threshold ({:.1}% < {}%), skipped",
                            x,
                            y,
                            fraction * 100.0,
                            threshold
                        );
                        progress.advance(1);
                        if progress.is_canceled() {
                            log::warn!("Tiling canceled after {} tiles", created);
                            return Ok(created);
                        }
                        continue;
                    }
                }

                let basename = window.basename(&stem);
                let tile_geo = geo.for_window(x, y);

                let tile_bands: Vec<BandArray> = bands
                    .iter()
                    .map(|b| b.slice(s![y..y + ty, x..x + tx]).to_owned())
                    .collect();
                write_image_tile(
                    image_dir.join(&basename),
                    &tile_bands,
                    &tile_geo,
                    &crs,
                    image.grid().no_data,
                )?;
                write_label_tile(
                    label_dir.join(&basename),
                    &label_window.to_owned(),
                    &tile_geo,
                    &crs,
                )?;
                created += 1;

                progress.advance(1);
                if progress.is_canceled() {
                    log::warn!("Tiling canceled after {} tiles", created);
                    return Ok(created);
                }
            }
        }

        log::info!("Tiling complete: {} tile pairs created", created);
        Ok(created)
    }

    /// Zero every pixel whose center lies outside all ROI polygons.
    ///
    /// Applied once to the whole raster pair, not per tile.
    fn mask_outside_roi(
        &self,
        bands: &mut [BandArray],
        labels: &mut LabelArray,
        roi: &RoiFilter,
        image: &RasterSource,
    ) {
        let geo = &image.grid().geo_transform;
        let (height, width) = labels.dim();
        let mut masked = 0usize;

        for row in 0..height {
            for col in 0..width {
                let (mx, my) = geo.pixel_to_map(col as f64 + 0.5, row as f64 + 0.5);
                if !roi.contains_any(mx, my) {
                    for band in bands.iter_mut() {
                        band[[row, col]] = 0.0;
                    }
                    labels[[row, col]] = 0;
                    masked += 1;
                }
            }
        }

        log::debug!("ROI mask zeroed {} of {} pixels", masked, width * height);
    }
}

fn map_rect_for_window(geo: &GeoTransform, window: &TileWindow) -> MapRect {
    let corners = [
        geo.pixel_to_map(window.x_off as f64, window.y_off as f64),
        geo.pixel_to_map((window.x_off + window.width) as f64, window.y_off as f64),
        geo.pixel_to_map(window.x_off as f64, (window.y_off + window.height) as f64),
        geo.pixel_to_map(
            (window.x_off + window.width) as f64,
            (window.y_off + window.height) as f64,
        ),
    ];
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
    MapRect {
        min_x,
        min_y,
        max_x,
        max_y,
    }
}

/// Pad an array with `fill` on the right and bottom edges.
fn pad_bottom_right<T: Copy>(array: &Array2<T>, pad_x: usize, pad_y: usize, fill: T) -> Array2<T> {
    let (rows, cols) = array.dim();
    let mut padded = Array2::from_elem((rows + pad_y, cols + pad_x), fill);
    padded.slice_mut(s![0..rows, 0..cols]).assign(array);
    padded
}
