use crate::io::raster::RasterSource;
use crate::types::{ClassHistogram, TileResult};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Scan label tiles and return the sorted set of class ids present.
///
/// The reserved class 0 is never reported. An unreadable tile aborts the
/// scan; silently skipping files would let the histogram/path index
/// correlation drift.
pub fn discover_classes(label_paths: &[PathBuf]) -> TileResult<Vec<u32>> {
    let mut classes = BTreeSet::new();

    for path in label_paths {
        let source = RasterSource::open(path)?;
        let labels = source.read_labels()?;
        for &v in labels.iter() {
            if v != 0 {
                classes.insert(v);
            }
        }
    }

    let classes: Vec<u32> = classes.into_iter().collect();
    log::info!(
        "Discovered {} class(es) across {} label tiles: {:?}",
        classes.len(),
        label_paths.len(),
        classes
    );
    Ok(classes)
}

/// Build one class histogram per label tile, in input order.
///
/// Histograms are indexed parallel to `class_ids`; later stages correlate
/// histogram index, path index and permutation index, so the returned order
/// matches the input path order exactly.
pub fn build_histograms(
    label_paths: &[PathBuf],
    class_ids: &[u32],
) -> TileResult<Vec<ClassHistogram>> {
    let mut histograms = Vec::with_capacity(label_paths.len());

    for path in label_paths {
        let source = RasterSource::open(path)?;
        let labels = source.read_labels()?;

        let mut histogram = ClassHistogram::zeros(class_ids.len());
        for &v in labels.iter() {
            if v == 0 {
                continue;
            }
            if let Ok(idx) = class_ids.binary_search(&v) {
                histogram.counts[idx] += 1;
            }
        }
        histograms.push(histogram);
    }

    log::debug!(
        "Built {} histograms over {} classes",
        histograms.len(),
        class_ids.len()
    );
    Ok(histograms)
}

/// Element-wise sum of the histograms selected by `indices`.
pub fn sum_histograms(histograms: &[ClassHistogram], indices: &[usize]) -> Vec<u64> {
    let num_classes = histograms.first().map(|h| h.counts.len()).unwrap_or(0);
    let mut sum = vec![0u64; num_classes];
    for &i in indices {
        for (s, &c) in sum.iter_mut().zip(histograms[i].counts.iter()) {
            *s += c;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_histograms() {
        let histograms = vec![
            ClassHistogram {
                counts: vec![10, 0],
            },
            ClassHistogram { counts: vec![0, 10] },
            ClassHistogram { counts: vec![5, 5] },
        ];
        assert_eq!(sum_histograms(&histograms, &[0, 2]), vec![15, 5]);
        assert_eq!(sum_histograms(&histograms, &[]), vec![0, 0]);
        assert_eq!(sum_histograms(&histograms, &[0, 1, 2]), vec![15, 15]);
    }
}
