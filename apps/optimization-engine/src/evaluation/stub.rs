//! Deterministic in-process evaluator for tests and dry runs.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::error::EvaluationError;
use super::evaluator::Evaluator;
use crate::domain::{Combination, DateSpan, EvaluationResult};

type ScoreFn = dyn Fn(&Combination, Option<DateSpan>) -> EvaluationResult + Send + Sync;

/// Evaluator backed by a pure function of the combination and period.
///
/// Strategy ids registered as unmapped fail with `Mapping`; ids registered
/// as failing fail with `Collaborator`.
pub struct ScriptedEvaluator {
    score: Box<ScoreFn>,
    unmapped: HashSet<String>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    /// Create from a scoring function.
    pub fn new<F>(score: F) -> Self
    where
        F: Fn(&Combination, Option<DateSpan>) -> EvaluationResult + Send + Sync + 'static,
    {
        Self {
            score: Box::new(score),
            unmapped: HashSet::new(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Treat a strategy id as having no collaborator mapping.
    #[must_use]
    pub fn with_unmapped(mut self, strategy: impl Into<String>) -> Self {
        self.unmapped.insert(strategy.into());
        self
    }

    /// Fail every evaluation that involves a strategy id.
    #[must_use]
    pub fn with_failing(mut self, strategy: impl Into<String>) -> Self {
        self.failing.insert(strategy.into());
        self
    }

    /// Number of `evaluate` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn strategies(combination: &Combination) -> impl Iterator<Item = &str> {
        [
            Some(combination.buy_strategy.as_str()),
            Some(combination.sell_strategy.as_str()),
            combination.short_entry.as_ref().map(|l| l.strategy.as_str()),
            combination.short_exit.as_ref().map(|l| l.strategy.as_str()),
        ]
        .into_iter()
        .flatten()
    }
}

impl fmt::Debug for ScriptedEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedEvaluator")
            .field("unmapped", &self.unmapped)
            .field("failing", &self.failing)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        combination: &Combination,
        period: Option<DateSpan>,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        for strategy in Self::strategies(combination) {
            if self.unmapped.contains(strategy) {
                return Err(EvaluationError::Mapping {
                    strategy: strategy.to_string(),
                });
            }
            if self.failing.contains(strategy) {
                return Err(EvaluationError::Collaborator {
                    message: format!("scripted failure for {strategy}"),
                });
            }
        }
        Ok((self.score)(combination, period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scores_and_counts_calls() {
        let evaluator = ScriptedEvaluator::new(|combo, _| EvaluationResult {
            sharpe_ratio: combo.buy_params.get("x").copied(),
            ..EvaluationResult::default()
        });
        let combo = Combination::new("a", "b").with_buy_params([("x".to_string(), 2.5)].into());

        let Ok(result) = evaluator.evaluate(&combo, None).await else {
            panic!("evaluation should succeed");
        };
        assert_eq!(result.sharpe_ratio, Some(2.5));
        assert_eq!(evaluator.calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let evaluator = ScriptedEvaluator::new(|_, _| EvaluationResult::default())
            .with_unmapped("ghost")
            .with_failing("flaky");

        let mapping = evaluator.evaluate(&Combination::new("ghost", "b"), None).await;
        assert!(matches!(mapping, Err(EvaluationError::Mapping { .. })));

        let failing = evaluator.evaluate(&Combination::new("a", "flaky"), None).await;
        assert!(matches!(failing, Err(EvaluationError::Collaborator { .. })));
    }
}
