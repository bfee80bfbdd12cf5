use crate::core::histogram::sum_histograms;
use crate::progress::PipelineProgress;
use crate::types::{ClassHistogram, TileError, TileResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Parameters for the balanced split search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitParams {
    pub train_fraction: f64,
    pub test_fraction: f64,
    pub val_fraction: f64,
    /// Per-class feasibility floor: every split must hold at least this
    /// fraction of each class's total pixel count
    pub min_class_fraction: f64,
    /// Number of random permutations to try
    pub permutations: u64,
    /// RNG seed; one stream is reused across all trials
    pub seed: u64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            test_fraction: 0.15,
            val_fraction: 0.15,
            min_class_fraction: 0.0,
            permutations: 1000,
            seed: 42,
        }
    }
}

impl SplitParams {
    pub fn validate(&self) -> TileResult<()> {
        for (name, value) in [
            ("train_fraction", self.train_fraction),
            ("test_fraction", self.test_fraction),
            ("val_fraction", self.val_fraction),
            ("min_class_fraction", self.min_class_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TileError::InvalidParameter(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        let sum = self.train_fraction + self.test_fraction + self.val_fraction;
        if sum > 1.0 + 1e-9 {
            return Err(TileError::InvalidParameter(format!(
                "Split fractions sum to {}, must not exceed 1.0",
                sum
            )));
        }
        if self.permutations == 0 {
            return Err(TileError::InvalidParameter(
                "Permutation budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tile counts per split, derived from the tile total and the fractions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub test: usize,
    pub val: usize,
    pub train: usize,
}

impl SplitCounts {
    pub fn for_tiles(num_tiles: usize, params: &SplitParams) -> Self {
        Self {
            test: (num_tiles as f64 * params.test_fraction).floor() as usize,
            val: (num_tiles as f64 * params.val_fraction).floor() as usize,
            train: (num_tiles as f64 * params.train_fraction).floor() as usize,
        }
    }
}

/// The winning permutation: tile ordering plus the test/val/train cut points.
///
/// Slicing order is test, then validation, then train; downstream consumers
/// rely on this convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitAssignment {
    pub permutation: Vec<usize>,
    pub counts: SplitCounts,
    /// Mean pairwise Earth-Mover distance across the three aggregate
    /// class distributions
    pub score: f64,
}

impl SplitAssignment {
    pub fn test_indices(&self) -> &[usize] {
        &self.permutation[0..self.counts.test]
    }

    pub fn val_indices(&self) -> &[usize] {
        &self.permutation[self.counts.test..self.counts.test + self.counts.val]
    }

    pub fn train_indices(&self) -> &[usize] {
        let start = self.counts.test + self.counts.val;
        &self.permutation[start..start + self.counts.train]
    }
}

/// 1-D Earth-Mover (Wasserstein-1) distance between two discrete
/// distributions over the class axis.
///
/// For distributions on the same ordered support this is the sum of absolute
/// cumulative differences.
pub fn earth_mover_distance(p: &[f64], q: &[f64]) -> f64 {
    let mut cumulative = 0.0;
    let mut distance = 0.0;
    for (a, b) in p.iter().zip(q.iter()) {
        cumulative += a - b;
        distance += cumulative.abs();
    }
    distance
}

fn normalize(counts: &[u64]) -> Option<Vec<f64>> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return None;
    }
    Some(counts.iter().map(|&c| c as f64 / total as f64).collect())
}

/// Monte-Carlo search for a class-balanced train/val/test partition.
///
/// Each trial shuffles the tile indices with the shared seeded RNG, sums the
/// per-split histograms, rejects candidates violating the per-class minimum
/// count, and scores the rest by mean pairwise EMD. The strict best feasible
/// candidate wins; ties keep the first found.
///
/// Cancellation is checked per trial. A search that ends (canceled or
/// exhausted) with no feasible candidate fails with
/// [`TileError::NoFeasibleSplit`] carrying the minimum-count vector and the
/// best infeasible score for diagnostics; callers should check cancellation
/// state first to tell user intent from genuine infeasibility.
pub fn find_best_split(
    histograms: &[ClassHistogram],
    params: &SplitParams,
    progress: &mut PipelineProgress,
) -> TileResult<SplitAssignment> {
    params.validate()?;

    if histograms.is_empty() {
        return Err(TileError::InvalidParameter(
            "At least one tile histogram is required".to_string(),
        ));
    }

    let num_tiles = histograms.len();
    let counts = SplitCounts::for_tiles(num_tiles, params);
    let num_classes = histograms[0].counts.len();

    let totals = sum_histograms(histograms, &(0..num_tiles).collect::<Vec<_>>());
    let min_counts: Vec<f64> = totals
        .iter()
        .map(|&t| t as f64 * params.min_class_fraction)
        .collect();

    log::info!(
        "Searching {} permutations of {} tiles ({} classes): test {}, val {}, train {}",
        params.permutations,
        num_tiles,
        num_classes,
        counts.test,
        counts.val,
        counts.train
    );

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut indices: Vec<usize> = (0..num_tiles).collect();

    let mut best: Option<SplitAssignment> = None;
    let mut best_infeasible: Option<f64> = None;
    let mut canceled = false;

    for trial in 0..params.permutations {
        indices.shuffle(&mut rng);

        let assignment = SplitAssignment {
            permutation: indices.clone(),
            counts,
            score: f64::INFINITY,
        };

        let test_hist = sum_histograms(histograms, assignment.test_indices());
        let val_hist = sum_histograms(histograms, assignment.val_indices());
        let train_hist = sum_histograms(histograms, assignment.train_indices());

        let feasible = [&test_hist, &val_hist, &train_hist].iter().all(|hist| {
            hist.iter()
                .zip(min_counts.iter())
                .all(|(&c, &min)| c as f64 >= min)
        });

        let distributions = (
            normalize(&test_hist),
            normalize(&val_hist),
            normalize(&train_hist),
        );

        if let (Some(test), Some(val), Some(train)) = distributions {
            let score = (earth_mover_distance(&test, &train)
                + earth_mover_distance(&val, &train)
                + earth_mover_distance(&test, &val))
                / 3.0;

            if feasible {
                if best.as_ref().map_or(true, |b| score < b.score) {
                    log::debug!("Trial {}: new best score {:.6}", trial, score);
                    best = Some(SplitAssignment {
                        score,
                        ..assignment
                    });
                }
            } else if best_infeasible.map_or(true, |b| score < b) {
                best_infeasible = Some(score);
            }
        }

        progress.advance(1);
        if progress.is_canceled() {
            log::warn!("Split search canceled after {} trials", trial + 1);
            canceled = true;
            break;
        }
    }

    match best {
        Some(assignment) => {
            log::info!(
                "Split search finished: best score {:.6} (canceled: {})",
                assignment.score,
                canceled
            );
            Ok(assignment)
        }
        None => Err(TileError::NoFeasibleSplit {
            min_counts,
            best_infeasible,
            canceled,
        }),
    }
}
