mod common;

use approx::assert_relative_eq;
use common::{write_f32_raster, UNIT_GEO};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tilefish::io::manifest::write_band_stats;
use tilefish::{compute_stats, NullProgress, PipelineProgress, ProgressSink, StatsParams, TileError};

struct CancelAfter {
    checks: Cell<u64>,
    cancel_from: u64,
}

impl ProgressSink for CancelAfter {
    fn set_progress(&self, _percent: f64) {}

    fn is_canceled(&self) -> bool {
        self.checks.set(self.checks.get() + 1);
        self.checks.get() >= self.cancel_from
    }
}

/// Write 2x2 single-band training images plus a manifest listing them
fn training_set(dir: &TempDir, images: &[Vec<f32>]) -> PathBuf {
    write_training_set(dir, images, 1)
}

fn write_training_set(dir: &TempDir, images: &[Vec<f32>], bands: usize) -> PathBuf {
    common::init_logging();
    let mut manifest = String::from("image,mask\n");
    for (i, pixels) in images.iter().enumerate() {
        let path = dir.path().join(format!("train_{}.tif", i));
        let band_data: Vec<Vec<f32>> = (0..bands)
            .map(|b| pixels.iter().map(|v| v + b as f32 * 100.0).collect())
            .collect();
        write_f32_raster(&path, 2, 2, &band_data, UNIT_GEO, None);
        manifest.push_str(&format!(
            "{},{}\n",
            path.display(),
            dir.path().join(format!("mask_{}.tif", i)).display()
        ));
    }
    let manifest_path = dir.path().join("train_files.csv");
    std::fs::write(&manifest_path, manifest).unwrap();
    manifest_path
}

fn run_stats(manifest: &Path, params: &StatsParams, num_images: u64) -> Option<tilefish::NormalizationStats> {
    let sink = NullProgress;
    let mut progress = PipelineProgress::new(&sink, 2 * num_images);
    compute_stats(manifest, params, &mut progress).expect("stats")
}

#[test]
fn test_scenario_d_mean_and_std() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = training_set(
        &dir,
        &[vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]],
    );

    let stats = run_stats(&manifest, &StatsParams::default(), 2).expect("complete run");
    assert_eq!(stats.bands.len(), 1);
    assert_eq!(stats.scaler, None);
    assert_relative_eq!(stats.bands[0].mean, 4.5, epsilon = 1e-9);
    assert_relative_eq!(stats.bands[0].std, 5.25f64.sqrt(), epsilon = 1e-9);
    assert_eq!(stats.bands[0].pixel_count, 8);
}

#[test]
fn test_no_data_masking_counts() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = training_set(
        &dir,
        &[vec![1.0, 2.0, 0.0, 4.0], vec![5.0, 6.0, 0.0, 8.0]],
    );

    let params = StatsParams {
        scaler: 0.0,
        no_data: Some(0.0),
    };
    let stats = run_stats(&manifest, &params, 2).expect("complete run");

    // Two sentinel pixels masked out of eight; both passes saw the same set
    assert_eq!(stats.bands[0].pixel_count, 6);
    assert_relative_eq!(stats.bands[0].mean, 26.0 / 6.0, epsilon = 1e-9);
}

#[test]
fn test_no_data_compared_in_scaled_domain() {
    // The sentinel is expressed in the scaled domain: with scaler 100, a
    // raw pixel of 300 becomes 3.0 and must be masked by no_data = 3.0
    let dir = tempfile::tempdir().unwrap();
    let manifest = training_set(&dir, &[vec![0.0, 100.0, 200.0, 300.0]]);

    let params = StatsParams {
        scaler: 100.0,
        no_data: Some(3.0),
    };
    let stats = run_stats(&manifest, &params, 1).expect("complete run");

    assert_eq!(stats.scaler, Some(100.0));
    assert_eq!(stats.bands[0].pixel_count, 3);
    assert_relative_eq!(stats.bands[0].mean, 1.0, epsilon = 1e-9);
    assert_relative_eq!(stats.bands[0].std, (2.0f64 / 3.0).sqrt(), epsilon = 1e-9);
}

#[test]
fn test_multi_band_statistics() {
    let dir = tempfile::tempdir().unwrap();
    // Band 2 is band 1 shifted by +100: same std, shifted mean
    let manifest = write_training_set(
        &dir,
        &[vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]],
        2,
    );

    let stats = run_stats(&manifest, &StatsParams::default(), 2).expect("complete run");
    assert_eq!(stats.bands.len(), 2);
    assert_eq!(stats.bands[0].band, 1);
    assert_eq!(stats.bands[1].band, 2);
    assert_relative_eq!(stats.bands[1].mean, stats.bands[0].mean + 100.0, epsilon = 1e-9);
    assert_relative_eq!(stats.bands[1].std, stats.bands[0].std, epsilon = 1e-9);
}

#[test]
fn test_progress_spans_both_passes() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = training_set(
        &dir,
        &[vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]],
    );

    let sink = NullProgress;
    let mut progress = PipelineProgress::new(&sink, 4);
    compute_stats(&manifest, &StatsParams::default(), &mut progress)
        .expect("stats")
        .expect("complete run");
    // One step per image per pass
    assert_eq!(progress.completed(), 4);
}

#[test]
fn test_cancellation_yields_no_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = training_set(
        &dir,
        &[vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]],
    );

    let sink = CancelAfter {
        checks: Cell::new(0),
        cancel_from: 1,
    };
    let mut progress = PipelineProgress::new(&sink, 4);
    let result = compute_stats(&manifest, &StatsParams::default(), &mut progress).expect("stats");
    assert!(result.is_none());
}

#[test]
fn test_missing_image_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("train_files.csv");
    std::fs::write(&manifest_path, "image,mask\n/nowhere/img.tif,/nowhere/mask.tif\n").unwrap();

    let sink = NullProgress;
    let mut progress = PipelineProgress::new(&sink, 2);
    let result = compute_stats(&manifest_path, &StatsParams::default(), &mut progress);
    assert!(matches!(result, Err(TileError::UnreadableRaster { .. })));
}

#[test]
fn test_empty_manifest_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("train_files.csv");
    std::fs::write(&manifest_path, "image,mask\n").unwrap();

    let sink = NullProgress;
    let mut progress = PipelineProgress::new(&sink, 1);
    let result = compute_stats(&manifest_path, &StatsParams::default(), &mut progress);
    assert!(matches!(result, Err(TileError::InvalidParameter(_))));
}

#[test]
fn test_band_stats_csv_annotates_scaler() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = training_set(&dir, &[vec![0.0, 100.0, 200.0, 300.0]]);

    let params = StatsParams {
        scaler: 100.0,
        no_data: None,
    };
    let stats = run_stats(&manifest, &params, 1).expect("complete run");
    let csv_path = write_band_stats(dir.path(), &stats).unwrap();

    let text = std::fs::read_to_string(csv_path).unwrap();
    let header = text.lines().next().unwrap();
    assert_eq!(
        header,
        "Band_Number,std,mean,std and mean already scaled by scaler"
    );

    // Without a scaler the annotation column is absent
    let plain = run_stats(&manifest, &StatsParams::default(), 1).expect("complete run");
    let csv_path = write_band_stats(&dir.path().join("plain"), &plain).unwrap();
    let text = std::fs::read_to_string(csv_path).unwrap();
    assert_eq!(text.lines().next().unwrap(), "Band_Number,std,mean");
}
