//! Shared helpers for building scratch GeoTIFFs in integration tests.
#![allow(dead_code)]

use gdal::raster::Buffer;
use gdal::DriverManager;
use std::path::Path;

/// Initialize test logging once; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Default 1 m/pixel north-up geotransform anchored at the origin
pub const UNIT_GEO: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, -1.0];

/// Write a multi-band f32 GeoTIFF; each band is row-major `width * height`.
pub fn write_f32_raster(
    path: &Path,
    width: usize,
    height: usize,
    bands: &[Vec<f32>],
    geo: [f64; 6],
    no_data: Option<f64>,
) {
    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver");
    let mut dataset = driver
        .create_with_band_type::<f32, _>(path, width as isize, height as isize, bands.len() as isize)
        .expect("create raster");
    dataset.set_geo_transform(&geo).expect("set geotransform");

    for (i, data) in bands.iter().enumerate() {
        assert_eq!(data.len(), width * height);
        let mut band = dataset.rasterband((i + 1) as isize).expect("rasterband");
        let buffer = Buffer::new((width, height), data.clone());
        band.write((0, 0), (width, height), &buffer).expect("write band");
        if let Some(nd) = no_data {
            band.set_no_data_value(Some(nd)).expect("set no-data");
        }
    }
}

/// Write a single-band u32 label GeoTIFF.
pub fn write_u32_raster(path: &Path, width: usize, height: usize, data: &[u32], geo: [f64; 6]) {
    assert_eq!(data.len(), width * height);
    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver");
    let mut dataset = driver
        .create_with_band_type::<u32, _>(path, width as isize, height as isize, 1)
        .expect("create raster");
    dataset.set_geo_transform(&geo).expect("set geotransform");

    let mut band = dataset.rasterband(1).expect("rasterband");
    let buffer = Buffer::new((width, height), data.to_vec());
    band.write((0, 0), (width, height), &buffer).expect("write band");
}
