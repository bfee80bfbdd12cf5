use crate::io::manifest::read_manifest;
use crate::io::raster::RasterSource;
use crate::types::{ClassSummary, ClassSummaryRow, TileResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Accumulate a pixel-value counter over every label tile of one split.
///
/// Returns the counter without class 0 plus whether class 0 was present.
fn count_split(label_paths: &[PathBuf]) -> TileResult<(HashMap<u32, u64>, bool)> {
    let mut counter: HashMap<u32, u64> = HashMap::new();

    for path in label_paths {
        let source = RasterSource::open(path)?;
        let labels = source.read_labels()?;
        for &v in labels.iter() {
            *counter.entry(v).or_insert(0) += 1;
        }
    }

    let zero_present = counter.remove(&0).is_some();
    Ok((counter, zero_present))
}

/// Normalized training class weights.
///
/// Each represented class gets `total / count`, renormalized so the weights
/// of represented classes sum to the number of represented classes. Classes
/// absent from the training split get weight 0.
fn normalized_weights(train_counts: &[u64]) -> Vec<f64> {
    let total: u64 = train_counts.iter().sum();
    let represented = train_counts.iter().filter(|&&c| c > 0).count();
    if total == 0 || represented == 0 {
        return vec![0.0; train_counts.len()];
    }

    let raw: Vec<f64> = train_counts
        .iter()
        .map(|&c| if c > 0 { total as f64 / c as f64 } else { 0.0 })
        .collect();
    let raw_sum: f64 = raw.iter().sum();
    let scale = represented as f64 / raw_sum;
    raw.iter().map(|w| w * scale).collect()
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Build the class-distribution summary for a chosen partition.
///
/// Reads every label tile referenced by the three splits, combines the
/// per-split counters into one table keyed by the union of observed class
/// ids, and computes per-split percentages plus train-only class weights.
pub fn build_summary(
    train_labels: &[PathBuf],
    val_labels: &[PathBuf],
    test_labels: &[PathBuf],
    scaler: Option<f64>,
) -> TileResult<ClassSummary> {
    let (train_counter, train_zero) = count_split(train_labels)?;
    let (val_counter, val_zero) = count_split(val_labels)?;
    let (test_counter, test_zero) = count_split(test_labels)?;

    let mut class_ids: Vec<u32> = train_counter
        .keys()
        .chain(val_counter.keys())
        .chain(test_counter.keys())
        .copied()
        .collect();
    class_ids.sort_unstable();
    class_ids.dedup();

    let train_total: u64 = train_counter.values().sum();
    let val_total: u64 = val_counter.values().sum();
    let test_total: u64 = test_counter.values().sum();

    let train_counts: Vec<u64> = class_ids
        .iter()
        .map(|id| *train_counter.get(id).unwrap_or(&0))
        .collect();
    let weights = normalized_weights(&train_counts);

    let rows: Vec<ClassSummaryRow> = class_ids
        .iter()
        .enumerate()
        .map(|(i, &class_id)| {
            let train_count = train_counts[i];
            let val_count = *val_counter.get(&class_id).unwrap_or(&0);
            let test_count = *test_counter.get(&class_id).unwrap_or(&0);
            ClassSummaryRow {
                class_id,
                train_count,
                train_percentage: percentage(train_count, train_total),
                val_count,
                val_percentage: percentage(val_count, val_total),
                test_count,
                test_percentage: percentage(test_count, test_total),
                train_weight: weights[i],
            }
        })
        .collect();

    let zero_class_removed = train_zero || val_zero || test_zero;
    log::info!(
        "Class summary: {} classes, {} train / {} val / {} test pixels, class 0 removed: {}",
        rows.len(),
        train_total,
        val_total,
        test_total,
        zero_class_removed
    );

    Ok(ClassSummary {
        rows,
        scaler,
        zero_class_removed,
    })
}

/// Build the summary from the three written manifests (mask column).
pub fn build_summary_from_manifests(
    train_csv: &Path,
    val_csv: &Path,
    test_csv: &Path,
    scaler: Option<f64>,
) -> TileResult<ClassSummary> {
    let masks = |path: &Path| -> TileResult<Vec<PathBuf>> {
        Ok(read_manifest(path)?
            .into_iter()
            .map(|(_, mask)| PathBuf::from(mask))
            .collect())
    };

    build_summary(&masks(train_csv)?, &masks(val_csv)?, &masks(test_csv)?, scaler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_class_count() {
        let weights = normalized_weights(&[100, 50, 25]);
        let sum: f64 = weights.iter().sum();
        assert!((sum - 3.0).abs() < 1e-9);
        // Rarer classes weigh more
        assert!(weights[2] > weights[1]);
        assert!(weights[1] > weights[0]);
        assert!(weights.iter().all(|&w| w > 0.0));
    }

    #[test]
    fn test_weights_with_absent_class() {
        let weights = normalized_weights(&[100, 0, 25]);
        assert_eq!(weights[1], 0.0);
        let sum: f64 = weights.iter().sum();
        // Two represented classes, weights sum to 2
        assert!((sum - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_weights_uniform_distribution() {
        let weights = normalized_weights(&[40, 40, 40, 40]);
        for w in weights {
            assert!((w - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_percentage_of_empty_split() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(25, 100), 25.0);
    }
}
