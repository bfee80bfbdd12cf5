//! CSV wire formats: split manifests, the class-distribution summary and the
//! per-band normalization statistics.
//!
//! Downstream dataset loaders consume these files as-is, so headers and path
//! conventions are fixed: manifests carry `image,mask` pairs with forward
//! slashes regardless of host OS.

use crate::types::{ClassSummary, NormalizationStats, TilePairNaming, TileResult};
use std::path::{Path, PathBuf};

/// File names of the three split manifests
pub const TRAIN_MANIFEST: &str = "train_files.csv";
pub const VALIDATION_MANIFEST: &str = "validation_files.csv";
pub const TEST_MANIFEST: &str = "test_files.csv";

/// File name of the class-distribution summary
pub const SUMMARY_FILE: &str = "Summary_train_val.csv";

/// File name of the per-band normalization statistics
pub const BAND_STATS_FILE: &str = "Normalize_Bands.csv";

/// Paths of the three written manifests
#[derive(Debug, Clone)]
pub struct ManifestSet {
    pub train: PathBuf,
    pub validation: PathBuf,
    pub test: PathBuf,
}

fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Write one split manifest: header `image,mask`, one row per tile pair.
///
/// The image path of each pair is derived from the label path through the
/// naming policy.
pub fn write_manifest(
    path: &Path,
    label_paths: &[PathBuf],
    naming: &TilePairNaming,
) -> TileResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["image", "mask"])?;

    for label_path in label_paths {
        let mask = forward_slashes(label_path);
        let image = naming.image_path_for(&mask);
        writer.write_record([image.as_str(), mask.as_str()])?;
    }

    writer.flush()?;
    log::debug!("Wrote manifest {} ({} pairs)", path.display(), label_paths.len());
    Ok(())
}

/// Write the train/validation/test manifests into `out_dir`.
pub fn write_manifest_set(
    out_dir: &Path,
    train_labels: &[PathBuf],
    val_labels: &[PathBuf],
    test_labels: &[PathBuf],
    naming: &TilePairNaming,
) -> TileResult<ManifestSet> {
    std::fs::create_dir_all(out_dir)?;

    let set = ManifestSet {
        train: out_dir.join(TRAIN_MANIFEST),
        validation: out_dir.join(VALIDATION_MANIFEST),
        test: out_dir.join(TEST_MANIFEST),
    };

    write_manifest(&set.train, train_labels, naming)?;
    write_manifest(&set.validation, val_labels, naming)?;
    write_manifest(&set.test, test_labels, naming)?;

    log::info!(
        "Wrote manifests to {}: {} train / {} validation / {} test pairs",
        out_dir.display(),
        train_labels.len(),
        val_labels.len(),
        test_labels.len()
    );

    Ok(set)
}

/// Read a manifest back as (image, mask) path pairs, in file order.
pub fn read_manifest(path: &Path) -> TileResult<Vec<(String, String)>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut pairs = Vec::new();

    for record in reader.records() {
        let record = record?;
        let image = record.get(0).unwrap_or("").to_string();
        let mask = record.get(1).unwrap_or("").to_string();
        pairs.push((image, mask));
    }

    Ok(pairs)
}

fn scaler_field(scaler: Option<f64>) -> String {
    match scaler {
        Some(s) => format!("{}", s),
        None => "None".to_string(),
    }
}

/// Write the class-distribution summary table.
///
/// Percentages carry 2 decimals, train weights 4.
pub fn write_summary(out_dir: &Path, summary: &ClassSummary) -> TileResult<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(SUMMARY_FILE);
    let mut writer = csv::Writer::from_path(&path)?;

    writer.write_record([
        "Class ID",
        "Train Count",
        "Train Percentage",
        "Validation Count",
        "Validation Percentage",
        "Test Count",
        "Test Percentage",
        "Class Train Weight",
        "Scaler",
        "Ignored Background : Class Zero",
    ])?;

    let scaler = scaler_field(summary.scaler);
    let zero_removed = if summary.zero_class_removed {
        "True"
    } else {
        "False"
    };

    for row in &summary.rows {
        writer.write_record([
            row.class_id.to_string(),
            row.train_count.to_string(),
            format!("{:.2}", row.train_percentage),
            row.val_count.to_string(),
            format!("{:.2}", row.val_percentage),
            row.test_count.to_string(),
            format!("{:.2}", row.test_percentage),
            format!("{:.4}", row.train_weight),
            scaler.clone(),
            zero_removed.to_string(),
        ])?;
    }

    writer.flush()?;
    log::info!("Wrote class summary {}", path.display());
    Ok(path)
}

/// Write the per-band normalization statistics.
///
/// When a nonzero scaler was applied, an annotation column records that the
/// statistics were computed after scaling.
pub fn write_band_stats(out_dir: &Path, stats: &NormalizationStats) -> TileResult<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(BAND_STATS_FILE);
    let mut writer = csv::Writer::from_path(&path)?;

    match stats.scaler {
        Some(scaler) => {
            writer.write_record([
                "Band_Number",
                "std",
                "mean",
                "std and mean already scaled by scaler",
            ])?;
            for band in &stats.bands {
                writer.write_record([
                    band.band.to_string(),
                    format!("{}", band.std),
                    format!("{}", band.mean),
                    format!("{}", scaler),
                ])?;
            }
        }
        None => {
            writer.write_record(["Band_Number", "std", "mean"])?;
            for band in &stats.bands {
                writer.write_record([
                    band.band.to_string(),
                    format!("{}", band.std),
                    format!("{}", band.mean),
                ])?;
            }
        }
    }

    writer.flush()?;
    log::info!("Wrote band statistics {}", path.display());
    Ok(path)
}
