//! Evaluator port consumed by the optimizer, refinement and validator.

use async_trait::async_trait;
use tracing::debug;

use super::error::EvaluationError;
use super::protocol::SweepPoint;
use crate::domain::{Combination, DateSpan, EvaluationResult, OptimizationScope, ParameterTarget};

/// One parameter sweep: every other value of `combination` stays fixed.
#[derive(Debug, Clone, Copy)]
pub struct SweepRequest<'a> {
    /// Combination providing the fixed context.
    pub combination: &'a Combination,
    /// Leg owning the swept parameter.
    pub scope: OptimizationScope,
    /// Swept parameter.
    pub target: &'a ParameterTarget,
    /// Upper bound on grid points evaluated.
    pub max_points: usize,
    /// Evaluation period (whole dataset when `None`).
    pub period: Option<DateSpan>,
}

/// Source of backtest metrics.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate one combination.
    async fn evaluate(
        &self,
        combination: &Combination,
        period: Option<DateSpan>,
    ) -> Result<EvaluationResult, EvaluationError>;

    /// Sweep one parameter over its grid.
    ///
    /// The default evaluates each grid value; failed steps yield a point with
    /// no metrics so ranking can continue.
    async fn sweep(&self, request: &SweepRequest<'_>) -> Result<Vec<SweepPoint>, EvaluationError> {
        sweep_by_evaluation(self, request).await
    }
}

/// Sweep by evaluating every grid value. Mapping failures abort the sweep.
///
/// # Errors
///
/// Returns `EvaluationError::Mapping` if the combination cannot be mapped.
pub async fn sweep_by_evaluation<E>(
    evaluator: &E,
    request: &SweepRequest<'_>,
) -> Result<Vec<SweepPoint>, EvaluationError>
where
    E: Evaluator + ?Sized,
{
    let values = request.target.range.grid(request.max_points);
    let mut points = Vec::with_capacity(values.len());

    for value in values {
        let mut candidate = request.combination.clone();
        candidate.set_param(request.scope, &request.target.name, value);

        let metrics = match evaluator.evaluate(&candidate, request.period).await {
            Ok(metrics) => metrics,
            Err(err) if err.is_mapping() => return Err(err),
            Err(err) => {
                debug!(
                    param = %request.target.name,
                    value,
                    error = %err,
                    "Sweep step failed, scoring as worst case"
                );
                EvaluationResult::default()
            }
        };
        points.push(SweepPoint {
            param_value: Some(value),
            metrics,
        });
    }

    Ok(points)
}
