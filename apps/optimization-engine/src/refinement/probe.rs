//! Memoized candidate scoring shared by SPSA and CEM.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{Combination, DateSpan, EvaluationResult, TargetMetric};
use crate::evaluation::Evaluator;
use crate::optimizer::{OptimizerError, is_better_metric};

use super::space::candidate_key;

/// Best candidate seen so far.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Incumbent {
    /// Candidate combination.
    pub(crate) combination: Combination,
    /// Target metric (sentinel when the evaluation failed).
    pub(crate) score: f64,
    /// Full metrics, if the evaluation succeeded.
    pub(crate) result: Option<EvaluationResult>,
}

/// Evaluates candidates once each and remembers the scores.
pub(crate) struct Probe<'a> {
    evaluator: &'a dyn Evaluator,
    period: Option<DateSpan>,
    metric: TargetMetric,
    cache: HashMap<String, (f64, Option<EvaluationResult>)>,
    evaluations: usize,
}

impl<'a> Probe<'a> {
    pub(crate) fn new(
        evaluator: &'a dyn Evaluator,
        period: Option<DateSpan>,
        metric: TargetMetric,
    ) -> Self {
        Self {
            evaluator,
            period,
            metric,
            cache: HashMap::new(),
            evaluations: 0,
        }
    }

    /// Collaborator calls made so far (cache hits excluded).
    pub(crate) const fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub(crate) const fn metric(&self) -> TargetMetric {
        self.metric
    }

    /// Whether `a` beats `b` under the target metric.
    pub(crate) fn better(&self, a: f64, b: f64) -> bool {
        is_better_metric(a, b, self.metric)
    }

    /// Score a candidate. Failed evaluations score as the sentinel.
    pub(crate) async fn score(
        &mut self,
        combination: Combination,
    ) -> Result<Incumbent, OptimizerError> {
        let key = candidate_key(&combination);
        if let Some((score, result)) = self.cache.get(&key) {
            return Ok(Incumbent {
                combination,
                score: *score,
                result: result.clone(),
            });
        }

        self.evaluations += 1;
        let (score, result) = match self.evaluator.evaluate(&combination, self.period).await {
            Ok(result) => (result.metric_or_sentinel(self.metric), Some(result)),
            Err(err) if err.is_mapping() => return Err(err.into()),
            Err(err) => {
                debug!(error = %err, "Refinement candidate failed, scoring as worst case");
                (self.metric.sentinel(), None)
            }
        };
        self.cache.insert(key, (score, result.clone()));

        Ok(Incumbent {
            combination,
            score,
            result,
        })
    }
}
