//! Simultaneous-perturbation search with accept-if-better moves.

use rand::Rng;
use tracing::debug;

use crate::config::RefinementConfig;
use crate::optimizer::OptimizerError;

use super::probe::{Incumbent, Probe};
use super::space::SearchSpace;

/// Run SPSA from `seed` with `trials` evaluations at most.
///
/// Each iteration draws one shared ±1 direction, tries the `+` perturbation
/// and, only if that does not improve, the mirrored `-` one. The position is
/// always the best candidate so far.
pub(crate) async fn run_spsa<R: Rng>(
    space: &SearchSpace,
    probe: &mut Probe<'_>,
    seed: Incumbent,
    trials: u32,
    config: &RefinementConfig,
    rng: &mut R,
) -> Result<Incumbent, OptimizerError> {
    let iterations = (trials / 2).max(1);
    let mut best = seed;
    let mut theta = space.encode(&best.combination);

    for iteration in 0..iterations {
        let progress = if iterations > 1 {
            f64::from(iteration) / f64::from(iterations - 1)
        } else {
            1.0
        };
        let direction: Vec<f64> = (0..space.len())
            .map(|_| if rng.random_bool(0.5) { 1.0 } else { -1.0 })
            .collect();
        let scales: Vec<f64> = space
            .dims()
            .iter()
            .map(|dim| {
                let start = config.spsa_initial_scale * dim.weight;
                let end = (config.spsa_min_scale * dim.weight).max(dim.unit_step());
                (end - start).mul_add(progress, start).max(dim.unit_step())
            })
            .collect();

        let mut accepted = false;
        for sign in [1.0, -1.0] {
            let perturbed: Vec<f64> = theta
                .iter()
                .zip(&direction)
                .zip(&scales)
                .map(|((t, d), s)| (sign * d).mul_add(*s, *t).clamp(0.0, 1.0))
                .collect();
            let candidate = probe
                .score(space.decode(&perturbed, &best.combination))
                .await?;

            if probe.better(candidate.score, best.score) {
                debug!(
                    iteration,
                    sign,
                    score = candidate.score,
                    previous = best.score,
                    "SPSA move accepted"
                );
                theta = space.encode(&candidate.combination);
                best = candidate;
                accepted = true;
                break;
            }
        }

        if !accepted {
            debug!(iteration, "SPSA iteration kept position");
        }
    }

    Ok(best)
}
