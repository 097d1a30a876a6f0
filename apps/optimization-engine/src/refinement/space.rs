//! Normalized search space over a combination's tunable parameters.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::config::RefinementConfig;
use crate::domain::{
    Combination, OptimizationScope, ParamMap, ParamRange, ParameterTarget, RiskTargets,
    StrategyCatalog, round_to_scale,
};
use crate::optimizer::OptimizerError;

const SHORT_PERIOD: &str = "shortPeriod";
const LONG_PERIOD: &str = "longPeriod";

/// One coordinate of the search space.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    /// Scope the parameter belongs to.
    pub scope: OptimizationScope,
    /// Owning strategy (`None` for risk levels).
    pub strategy: Option<String>,
    /// Parameter range.
    pub target: ParameterTarget,
    /// Exploration weight scaling perturbation size.
    pub weight: f64,
}

impl Dimension {
    /// Smallest normalized move that reaches the neighbouring grid point.
    #[must_use]
    pub fn unit_step(&self) -> f64 {
        1.0 / self.target.range.step_ratio()
    }
}

/// Every tunable parameter of a combination mapped onto `[0, 1]`.
///
/// Dimensions are ordered by role (entry, exit, short entry, short exit,
/// risk), then by declaration order inside the strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSpace {
    dims: Vec<Dimension>,
}

impl SearchSpace {
    /// Collect the dimensions of `combination`.
    ///
    /// Risk levels are included when the combination carries risk management
    /// or its exit leg is a risk-control strategy.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStrategy` if a leg is not in the catalog.
    pub fn build(
        combination: &Combination,
        catalog: &StrategyCatalog,
        risk_targets: &RiskTargets,
        config: &RefinementConfig,
    ) -> Result<Self, OptimizerError> {
        let mut dims = Vec::new();
        let mut include_risk = combination.risk_management.is_some();

        for scope in OptimizationScope::ALL {
            let Some(id) = combination.strategy_for(scope) else {
                continue;
            };
            let descriptor = catalog
                .get(id)
                .ok_or_else(|| OptimizerError::UnknownStrategy { id: id.to_string() })?;
            if descriptor.is_risk_control() {
                include_risk = true;
                continue;
            }
            dims.extend(descriptor.optimize_targets.iter().map(|target| Dimension {
                scope,
                strategy: Some(descriptor.id.clone()),
                target: target.clone(),
                weight: exploration_weight(&target.range, config),
            }));
        }

        if include_risk {
            dims.extend(risk_targets.ordered().into_iter().map(|target| Dimension {
                scope: OptimizationScope::Risk,
                strategy: None,
                weight: exploration_weight(&target.range, config),
                target,
            }));
        }

        Ok(Self { dims })
    }

    /// Dimensions in order.
    #[must_use]
    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    /// Number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dims.len()
    }

    /// Whether there is nothing to tune.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Normalized coordinates of a combination. Missing values map to the midpoint.
    #[must_use]
    pub fn encode(&self, combination: &Combination) -> Vec<f64> {
        self.dims
            .iter()
            .map(|dim| {
                combination
                    .param(dim.scope, &dim.target.name)
                    .filter(|v| v.is_finite())
                    .map_or(0.5, |v| dim.target.range.normalize(v))
            })
            .collect()
    }

    /// Build a candidate from normalized coordinates.
    ///
    /// Values are clamped and step-aligned, then `shortPeriod < longPeriod`
    /// is enforced per leg (gap 2 for MACD strategies, 1 otherwise).
    #[must_use]
    pub fn decode(&self, theta: &[f64], template: &Combination) -> Combination {
        let mut by_scope: BTreeMap<usize, (OptimizationScope, ParamMap)> = BTreeMap::new();

        for (dim, unit) in self.dims.iter().zip(theta) {
            let slot = scope_rank(dim.scope);
            let entry = by_scope.entry(slot).or_insert_with(|| {
                (dim.scope, template.params_for(dim.scope).unwrap_or_default())
            });
            let value = dim.target.align(dim.target.range.denormalize(*unit));
            entry.1.insert(dim.target.name.clone(), value);
        }

        let mut candidate = template.clone();
        for (scope, mut params) in by_scope.into_values() {
            if scope != OptimizationScope::Risk {
                self.order_periods(scope, &mut params);
            }
            candidate.set_params(scope, params);
        }
        candidate
    }

    fn order_periods(&self, scope: OptimizationScope, params: &mut ParamMap) {
        let find = |name: &str| {
            self.dims
                .iter()
                .find(|d| d.scope == scope && d.target.name == name)
        };
        let (Some(short), Some(long)) = (find(SHORT_PERIOD), find(LONG_PERIOD)) else {
            return;
        };
        let is_macd = short
            .strategy
            .as_deref()
            .is_some_and(|id| id.to_lowercase().contains("macd"));
        let gap = if is_macd { 2.0 } else { 1.0 };
        enforce_ordered_pair(params, &short.target, &long.target, gap);
    }
}

/// Push `shortPeriod` below `longPeriod - gap` on the step grids.
///
/// No-op when the pair is already ordered or either value is missing.
pub fn enforce_ordered_pair(
    params: &mut ParamMap,
    short: &ParameterTarget,
    long: &ParameterTarget,
    gap: f64,
) {
    let (Some(&short_value), Some(&long_value)) =
        (params.get(&short.name), params.get(&long.name))
    else {
        return;
    };
    if short_value < long_value - gap || !short_value.is_finite() || !long_value.is_finite() {
        return;
    }

    let new_short = floor_to_grid(&short.range, long_value - gap);
    let new_long = ceil_to_grid(&long.range, long_value.max(new_short + gap));
    params.insert(short.name.clone(), new_short);
    params.insert(long.name.clone(), new_long);
}

/// Exploration weight: `ln(1 + steps) / ln(1 + reference)`, clamped.
#[must_use]
pub fn exploration_weight(range: &ParamRange, config: &RefinementConfig) -> f64 {
    let reference = (1.0 + config.exploration_reference_steps.max(1.0)).ln();
    let raw = (1.0 + range.step_ratio()).ln() / reference;
    if raw.is_finite() {
        raw.clamp(config.exploration_weight_min, config.exploration_weight_max)
    } else {
        1.0
    }
}

/// Stable identity of a candidate's parameters, for duplicate detection.
#[must_use]
pub fn candidate_key(combination: &Combination) -> String {
    let mut key = format!("{}|{}", combination.buy_strategy, combination.sell_strategy);
    for scope in OptimizationScope::ALL {
        let Some(params) = combination.params_for(scope) else {
            continue;
        };
        let _ = write!(key, "|{scope}:");
        for (name, value) in &params {
            let _ = write!(key, "{name}={},", round_to_scale(*value));
        }
    }
    key
}

const fn scope_rank(scope: OptimizationScope) -> usize {
    match scope {
        OptimizationScope::Entry => 0,
        OptimizationScope::Exit => 1,
        OptimizationScope::ShortEntry => 2,
        OptimizationScope::ShortExit => 3,
        OptimizationScope::Risk => 4,
    }
}

fn floor_to_grid(range: &ParamRange, value: f64) -> f64 {
    let step = range.effective_step();
    let steps = ((range.clamp(value) - range.lower()) / step + 1e-9).floor();
    round_to_scale(range.clamp(steps.mul_add(step, range.lower())))
}

fn ceil_to_grid(range: &ParamRange, value: f64) -> f64 {
    let step = range.effective_step();
    let steps = ((range.clamp(value) - range.lower()) / step - 1e-9)
        .ceil()
        .min(range.max_steps());
    round_to_scale(range.clamp(steps.mul_add(step, range.lower())))
}
