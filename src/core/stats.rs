use crate::io::manifest::read_manifest;
use crate::io::raster::RasterSource;
use crate::progress::PipelineProgress;
use crate::types::{BandStats, NormalizationStats, TileError, TileResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parameters for the normalization-statistics pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsParams {
    /// Fixed intensity divisor applied to every pixel before anything else;
    /// 0 disables scaling
    pub scaler: f64,
    /// Optional no-data sentinel, expressed in the *scaled* domain: pixels
    /// are divided by the scaler first and compared to this value after
    pub no_data: Option<f64>,
}

impl Default for StatsParams {
    fn default() -> Self {
        Self {
            scaler: 0.0,
            no_data: None,
        }
    }
}

impl StatsParams {
    pub fn validate(&self) -> TileResult<()> {
        if self.scaler < 0.0 || !self.scaler.is_finite() {
            return Err(TileError::InvalidParameter(format!(
                "Scaler must be a finite non-negative value, got {}",
                self.scaler
            )));
        }
        Ok(())
    }

    /// The scaler as an option: `None` when scaling is disabled (scaler 0)
    pub fn scaler_option(&self) -> Option<f64> {
        if self.scaler != 0.0 {
            Some(self.scaler)
        } else {
            None
        }
    }
}

/// Accumulate one band of one image.
///
/// With `mean == None` this sums valid pixel values (first pass); with
/// `mean == Some(m)` it sums squared deviations from `m` (second pass). The
/// scale-then-mask rule lives only here, so both passes see the identical
/// valid-pixel set by construction.
fn fold_band(
    source: &RasterSource,
    band: usize,
    params: &StatsParams,
    mean: Option<f64>,
) -> TileResult<(f64, u64)> {
    let data = source.read_band(band)?;
    let mut acc = 0.0f64;
    let mut count = 0u64;

    for &v in data.iter() {
        let mut x = v as f64;
        if let Some(scaler) = params.scaler_option() {
            x /= scaler;
        }
        if let Some(no_data) = params.no_data {
            if x == no_data {
                continue;
            }
        }
        match mean {
            None => acc += x,
            Some(m) => acc += (x - m) * (x - m),
        }
        count += 1;
    }

    Ok((acc, count))
}

/// Compute per-band mean and standard deviation over the training split.
///
/// Two full passes over every image listed in the manifest: the mean pass
/// must complete before per-pixel residuals can be accumulated, which keeps
/// the deviation sums numerically stable without materializing the dataset.
///
/// Progress advances on the shared pipeline counter, one step per image per
/// pass; cancellation is checked per image and yields `Ok(None)`, since
/// partial moments are not usable statistics.
pub fn compute_stats(
    train_manifest: &Path,
    params: &StatsParams,
    progress: &mut PipelineProgress,
) -> TileResult<Option<NormalizationStats>> {
    params.validate()?;

    let images: Vec<PathBuf> = read_manifest(train_manifest)?
        .into_iter()
        .map(|(image, _)| PathBuf::from(image))
        .collect();

    if images.is_empty() {
        return Err(TileError::InvalidParameter(format!(
            "Training manifest {} lists no images",
            train_manifest.display()
        )));
    }

    let band_count = RasterSource::open(&images[0])?.grid().band_count;
    log::info!(
        "Computing normalization statistics over {} training images, {} band(s)",
        images.len(),
        band_count
    );

    // Pass 1: per-band sums and valid-pixel counts
    let mut sums = vec![0.0f64; band_count];
    let mut counts = vec![0u64; band_count];

    for path in &images {
        let source = RasterSource::open(path)?;
        if source.grid().band_count != band_count {
            return Err(TileError::Processing(format!(
                "Band count mismatch: {} has {} bands, expected {}",
                path.display(),
                source.grid().band_count,
                band_count
            )));
        }
        for band in 1..=band_count {
            let (sum, count) = fold_band(&source, band, params, None)?;
            sums[band - 1] += sum;
            counts[band - 1] += count;
        }
        progress.advance(1);
        if progress.is_canceled() {
            log::warn!("Normalization statistics canceled during mean pass");
            return Ok(None);
        }
    }

    let means: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(&s, &c)| {
            if c == 0 {
                return Err(TileError::Processing(
                    "No valid pixels in training split".to_string(),
                ));
            }
            Ok(s / c as f64)
        })
        .collect::<TileResult<_>>()?;

    // Pass 2: squared deviations against the pass-1 means, same mask rule
    let mut sq_diff_sums = vec![0.0f64; band_count];
    let mut counts2 = vec![0u64; band_count];

    for path in &images {
        let source = RasterSource::open(path)?;
        for band in 1..=band_count {
            let (sq, count) = fold_band(&source, band, params, Some(means[band - 1]))?;
            sq_diff_sums[band - 1] += sq;
            counts2[band - 1] += count;
        }
        progress.advance(1);
        if progress.is_canceled() {
            log::warn!("Normalization statistics canceled during deviation pass");
            return Ok(None);
        }
    }

    debug_assert_eq!(counts, counts2);

    let bands: Vec<BandStats> = (0..band_count)
        .map(|i| BandStats {
            band: i + 1,
            mean: means[i],
            std: (sq_diff_sums[i] / counts2[i] as f64).sqrt(),
            pixel_count: counts2[i],
        })
        .collect();

    for stats in &bands {
        log::debug!(
            "Band {}: mean {:.6}, std {:.6}, {} valid pixels",
            stats.band,
            stats.mean,
            stats.std,
            stats.pixel_count
        );
    }

    Ok(Some(NormalizationStats {
        bands,
        scaler: params.scaler_option(),
    }))
}
