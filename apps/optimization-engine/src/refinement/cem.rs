//! Cross-entropy search: sample around a center, re-center on the elite.

use std::collections::HashSet;

use rand::Rng;
use tracing::debug;

use crate::config::RefinementConfig;
use crate::optimizer::{OptimizerError, rank_order};

use super::probe::{Incumbent, Probe};
use super::space::{SearchSpace, candidate_key};

/// Population size bounds.
const POPULATION_RANGE: (u32, u32) = (4, 12);

/// Resample attempts for a duplicate candidate.
const MAX_RESAMPLES: usize = 5;

/// Population size for a trial budget: `round(sqrt(trials))` clamped to [4, 12].
#[must_use]
pub fn population_size(trials: u32) -> u32 {
    (f64::from(trials).sqrt().round() as u32).clamp(POPULATION_RANGE.0, POPULATION_RANGE.1)
}

/// Run CEM from `seed`. The best candidate ever observed is returned.
pub(crate) async fn run_cem<R: Rng>(
    space: &SearchSpace,
    probe: &mut Probe<'_>,
    seed: Incumbent,
    trials: u32,
    config: &RefinementConfig,
    rng: &mut R,
) -> Result<Incumbent, OptimizerError> {
    let population = population_size(trials);
    let iterations = (trials / population).max(1);
    let mut best = seed;
    let mut center = space.encode(&best.combination);

    for iteration in 0..iterations {
        let decay = config
            .cem_radius_decay
            .powi(i32::try_from(iteration).unwrap_or(i32::MAX));
        let radii: Vec<f64> = space
            .dims()
            .iter()
            .map(|dim| (config.cem_initial_radius * dim.weight * decay).max(config.cem_min_radius))
            .collect();

        let mut seen = HashSet::new();
        let mut samples: Vec<(Vec<f64>, Incumbent)> = Vec::with_capacity(population as usize);

        for index in 0..population {
            let mut candidate = if index == 0 {
                space.decode(&center, &best.combination)
            } else {
                space.decode(&sample_around(&center, &radii, rng), &best.combination)
            };
            let mut attempts = 0;
            while seen.contains(&candidate_key(&candidate)) && attempts < MAX_RESAMPLES {
                candidate = space.decode(&sample_around(&center, &radii, rng), &best.combination);
                attempts += 1;
            }
            seen.insert(candidate_key(&candidate));

            let scored = probe.score(candidate).await?;
            if probe.better(scored.score, best.score) {
                best = scored.clone();
            }
            samples.push((space.encode(&scored.combination), scored));
        }

        let metric = probe.metric();
        let mut valid: Vec<&(Vec<f64>, Incumbent)> = samples
            .iter()
            .filter(|(_, s)| s.score.is_finite())
            .collect();
        if valid.is_empty() {
            debug!(iteration, "CEM population had no usable scores");
            continue;
        }
        valid.sort_by(|a, b| rank_order(a.1.score, b.1.score, metric));

        let elite = valid.len().div_ceil(3);
        center = (0..space.len())
            .map(|d| {
                let sum: f64 = valid.iter().take(elite).map(|(theta, _)| theta[d]).sum();
                (sum / elite as f64).clamp(0.0, 1.0)
            })
            .collect();

        debug!(
            iteration,
            elite,
            best = best.score,
            "CEM iteration complete"
        );
    }

    Ok(best)
}

fn sample_around<R: Rng>(center: &[f64], radii: &[f64], rng: &mut R) -> Vec<f64> {
    center
        .iter()
        .zip(radii)
        .map(|(c, r)| {
            let noise = if *r > 0.0 { rng.random_range(-*r..=*r) } else { 0.0 };
            (c + noise).clamp(0.0, 1.0)
        })
        .collect()
}
