use crate::types::{
    BandArray, GeoTransform, LabelArray, RasterGrid, TileError, TileResult, TileWindow,
};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Read-only raster handle plus the immutable grid captured at open time
pub struct RasterSource {
    dataset: Dataset,
    grid: RasterGrid,
    path: PathBuf,
}

impl RasterSource {
    /// Open a raster for reading and capture its grid description.
    pub fn open<P: AsRef<Path>>(path: P) -> TileResult<Self> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening raster: {}", path.display());

        let dataset = Dataset::open(&path).map_err(|e| TileError::UnreadableRaster {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let (width, height) = dataset.raster_size();
        let gt = dataset.geo_transform()?;
        let geo_transform = GeoTransform::from_gdal(gt);
        let band_count = dataset.raster_count() as usize;
        let no_data = dataset.rasterband(1)?.no_data_value();

        let grid = RasterGrid {
            origin: (geo_transform.top_left_x, geo_transform.top_left_y),
            pixel_size: (geo_transform.pixel_width, geo_transform.pixel_height),
            size: (width, height),
            crs: dataset.projection(),
            band_count,
            no_data,
            geo_transform,
        };

        log::debug!(
            "Raster {}: {}x{} pixels, {} band(s), no-data {:?}",
            path.display(),
            width,
            height,
            band_count,
            no_data
        );

        Ok(Self {
            dataset,
            grid,
            path,
        })
    }

    pub fn grid(&self) -> &RasterGrid {
        &self.grid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one full band as a real-valued array (1-based band index).
    pub fn read_band(&self, band: usize) -> TileResult<BandArray> {
        let (width, height) = self.grid.size;
        self.read_band_window(band, &TileWindow::new(0, 0, width, height))
    }

    /// Read a band window as a real-valued array (1-based band index).
    pub fn read_band_window(&self, band: usize, window: &TileWindow) -> TileResult<BandArray> {
        let rasterband = self.dataset.rasterband(band as isize)?;
        let buffer = rasterband.read_as::<f32>(
            (window.x_off as isize, window.y_off as isize),
            (window.width, window.height),
            (window.width, window.height),
            None,
        )?;

        Array2::from_shape_vec((window.height, window.width), buffer.data).map_err(|e| {
            TileError::Processing(format!(
                "Failed to reshape window from {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Read band 1 as a label array.
    pub fn read_labels(&self) -> TileResult<LabelArray> {
        let (width, height) = self.grid.size;
        self.read_label_window(&TileWindow::new(0, 0, width, height))
    }

    /// Read a band-1 window as a label array.
    pub fn read_label_window(&self, window: &TileWindow) -> TileResult<LabelArray> {
        let rasterband = self.dataset.rasterband(1)?;
        let buffer = rasterband.read_as::<u32>(
            (window.x_off as isize, window.y_off as isize),
            (window.width, window.height),
            (window.width, window.height),
            None,
        )?;

        Array2::from_shape_vec((window.height, window.width), buffer.data).map_err(|e| {
            TileError::Processing(format!(
                "Failed to reshape label window from {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Write a multi-band real-valued tile as GeoTIFF.
pub fn write_image_tile<P: AsRef<Path>>(
    path: P,
    bands: &[BandArray],
    geo_transform: &GeoTransform,
    crs: &str,
    no_data: Option<f64>,
) -> TileResult<()> {
    if bands.is_empty() {
        return Err(TileError::Processing(
            "Cannot write a tile with zero bands".to_string(),
        ));
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = bands[0].dim();

    let mut dataset = driver.create_with_band_type::<f32, _>(
        path.as_ref(),
        width as isize,
        height as isize,
        bands.len() as isize,
    )?;

    dataset.set_geo_transform(&geo_transform.to_gdal())?;
    if !crs.is_empty() {
        dataset.set_projection(crs)?;
    }

    for (i, band) in bands.iter().enumerate() {
        let mut rasterband = dataset.rasterband((i + 1) as isize)?;
        let flat_data: Vec<f32> = band.iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;
        if let Some(nd) = no_data {
            rasterband.set_no_data_value(Some(nd))?;
        }
    }

    Ok(())
}

/// Write a single-band label tile as GeoTIFF.
pub fn write_label_tile<P: AsRef<Path>>(
    path: P,
    labels: &LabelArray,
    geo_transform: &GeoTransform,
    crs: &str,
) -> TileResult<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = labels.dim();

    let mut dataset =
        driver.create_with_band_type::<u32, _>(path.as_ref(), width as isize, height as isize, 1)?;

    dataset.set_geo_transform(&geo_transform.to_gdal())?;
    if !crs.is_empty() {
        dataset.set_projection(crs)?;
    }

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<u32> = labels.iter().cloned().collect();
    let buffer = Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;

    Ok(())
}
