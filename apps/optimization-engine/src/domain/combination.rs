//! Strategy combinations: the unit of optimization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::target::{ParameterTarget, round_to_scale};

/// Parameter values keyed by name. Ordered so comparisons and payloads are stable.
pub type ParamMap = BTreeMap<String, f64>;

/// Part of a combination that can be optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptimizationScope {
    /// Long entry leg (`buyStrategy`).
    Entry,
    /// Long exit leg (`sellStrategy`).
    Exit,
    /// Short entry leg.
    ShortEntry,
    /// Short exit (cover) leg.
    ShortExit,
    /// Stop-loss / take-profit levels.
    Risk,
}

impl OptimizationScope {
    /// All scopes in optimization order.
    pub const ALL: [Self; 5] = [
        Self::Entry,
        Self::Exit,
        Self::ShortEntry,
        Self::ShortExit,
        Self::Risk,
    ];

    /// Wire name used by the evaluation collaborator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::ShortEntry => "shortEntry",
            Self::ShortExit => "shortExit",
            Self::Risk => "risk",
        }
    }
}

impl fmt::Display for OptimizationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyLeg {
    /// Strategy identifier.
    pub strategy: String,
    /// Current parameter values.
    #[serde(default)]
    pub params: ParamMap,
}

impl StrategyLeg {
    /// Create a leg.
    #[must_use]
    pub fn new(strategy: impl Into<String>, params: ParamMap) -> Self {
        Self {
            strategy: strategy.into(),
            params,
        }
    }
}

/// Stop-loss / take-profit levels (percent).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskManagement {
    /// Stop-loss percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Take-profit percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
}

impl RiskManagement {
    /// Parameter key for the stop-loss level.
    pub const STOP_LOSS: &'static str = "stopLoss";
    /// Parameter key for the take-profit level.
    pub const TAKE_PROFIT: &'static str = "takeProfit";

    /// View as a parameter map.
    #[must_use]
    pub fn to_params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        if let Some(value) = self.stop_loss {
            params.insert(Self::STOP_LOSS.to_string(), value);
        }
        if let Some(value) = self.take_profit {
            params.insert(Self::TAKE_PROFIT.to_string(), value);
        }
        params
    }

    /// Build from a parameter map, ignoring unrelated keys.
    #[must_use]
    pub fn from_params(params: &ParamMap) -> Self {
        Self {
            stop_loss: params.get(Self::STOP_LOSS).copied(),
            take_profit: params.get(Self::TAKE_PROFIT).copied(),
        }
    }

    /// Whether neither level is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stop_loss.is_none() && self.take_profit.is_none()
    }
}

/// Global optimize targets for the risk levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskTargets {
    /// Stop-loss target.
    pub stop_loss: ParameterTarget,
    /// Take-profit target.
    pub take_profit: ParameterTarget,
}

impl Default for RiskTargets {
    fn default() -> Self {
        Self {
            stop_loss: ParameterTarget::new(RiskManagement::STOP_LOSS, 1.0, 30.0, 0.5),
            take_profit: ParameterTarget::new(RiskManagement::TAKE_PROFIT, 5.0, 100.0, 1.0),
        }
    }
}

impl RiskTargets {
    /// Targets in optimization order (stop-loss first).
    #[must_use]
    pub fn ordered(&self) -> Vec<ParameterTarget> {
        vec![self.stop_loss.clone(), self.take_profit.clone()]
    }
}

/// Entry/exit strategy pair with parameters.
///
/// Each optimization task owns its own copy; `Clone` is a full structural copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combination {
    /// Long entry strategy.
    pub buy_strategy: String,
    /// Long exit strategy.
    pub sell_strategy: String,
    /// Entry parameters.
    #[serde(default)]
    pub buy_params: ParamMap,
    /// Exit parameters.
    #[serde(default)]
    pub sell_params: ParamMap,
    /// Optional short entry leg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_entry: Option<StrategyLeg>,
    /// Optional short exit leg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_exit: Option<StrategyLeg>,
    /// Risk levels when the exit is risk-controlled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_management: Option<RiskManagement>,
}

impl Combination {
    /// Create a combination with empty parameter maps.
    #[must_use]
    pub fn new(buy_strategy: impl Into<String>, sell_strategy: impl Into<String>) -> Self {
        Self {
            buy_strategy: buy_strategy.into(),
            sell_strategy: sell_strategy.into(),
            buy_params: ParamMap::new(),
            sell_params: ParamMap::new(),
            short_entry: None,
            short_exit: None,
            risk_management: None,
        }
    }

    /// Set entry parameters.
    #[must_use]
    pub fn with_buy_params(mut self, params: ParamMap) -> Self {
        self.buy_params = params;
        self
    }

    /// Set exit parameters.
    #[must_use]
    pub fn with_sell_params(mut self, params: ParamMap) -> Self {
        self.sell_params = params;
        self
    }

    /// Set risk levels.
    #[must_use]
    pub const fn with_risk(mut self, risk: RiskManagement) -> Self {
        self.risk_management = Some(risk);
        self
    }

    /// Set the short legs.
    #[must_use]
    pub fn with_short_legs(mut self, entry: StrategyLeg, exit: StrategyLeg) -> Self {
        self.short_entry = Some(entry);
        self.short_exit = Some(exit);
        self
    }

    /// Strategy id of a scope's leg. `Risk` has no strategy.
    #[must_use]
    pub fn strategy_for(&self, scope: OptimizationScope) -> Option<&str> {
        match scope {
            OptimizationScope::Entry => Some(&self.buy_strategy),
            OptimizationScope::Exit => Some(&self.sell_strategy),
            OptimizationScope::ShortEntry => self.short_entry.as_ref().map(|l| l.strategy.as_str()),
            OptimizationScope::ShortExit => self.short_exit.as_ref().map(|l| l.strategy.as_str()),
            OptimizationScope::Risk => None,
        }
    }

    /// Current parameters of a scope, if the scope exists on this combination.
    #[must_use]
    pub fn params_for(&self, scope: OptimizationScope) -> Option<ParamMap> {
        match scope {
            OptimizationScope::Entry => Some(self.buy_params.clone()),
            OptimizationScope::Exit => Some(self.sell_params.clone()),
            OptimizationScope::ShortEntry => self.short_entry.as_ref().map(|l| l.params.clone()),
            OptimizationScope::ShortExit => self.short_exit.as_ref().map(|l| l.params.clone()),
            OptimizationScope::Risk => Some(
                self.risk_management
                    .map(|r| r.to_params())
                    .unwrap_or_default(),
            ),
        }
    }

    /// Replace a scope's parameters. Missing short legs are left absent.
    pub fn set_params(&mut self, scope: OptimizationScope, params: ParamMap) {
        match scope {
            OptimizationScope::Entry => self.buy_params = params,
            OptimizationScope::Exit => self.sell_params = params,
            OptimizationScope::ShortEntry => {
                if let Some(leg) = self.short_entry.as_mut() {
                    leg.params = params;
                }
            }
            OptimizationScope::ShortExit => {
                if let Some(leg) = self.short_exit.as_mut() {
                    leg.params = params;
                }
            }
            OptimizationScope::Risk => {
                let risk = RiskManagement::from_params(&params);
                self.risk_management = (!risk.is_empty()).then_some(risk);
            }
        }
    }

    /// Read one parameter value of a scope.
    #[must_use]
    pub fn param(&self, scope: OptimizationScope, name: &str) -> Option<f64> {
        self.params_for(scope)
            .and_then(|params| params.get(name).copied())
    }

    /// Write one parameter value of a scope.
    pub fn set_param(&mut self, scope: OptimizationScope, name: &str, value: f64) {
        if let Some(mut params) = self.params_for(scope) {
            params.insert(name.to_string(), value);
            self.set_params(scope, params);
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} + {}", self.buy_strategy, self.sell_strategy)
    }
}

/// Compare two parameter maps after normalizing values to the aligned precision.
#[must_use]
pub fn params_equal(a: &ParamMap, b: &ParamMap) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
            ka == kb && normalized_eq(*va, *vb)
        })
}

/// Keys whose values differ between two maps (including added or removed keys).
#[must_use]
pub fn changed_keys(before: &ParamMap, after: &ParamMap) -> Vec<String> {
    let mut keys: Vec<String> = after
        .iter()
        .filter(|(key, value)| {
            before
                .get(*key)
                .is_none_or(|previous| !normalized_eq(*previous, **value))
        })
        .map(|(key, _)| key.clone())
        .collect();
    keys.extend(
        before
            .keys()
            .filter(|key| !after.contains_key(*key))
            .cloned(),
    );
    keys
}

/// Align every value that has a matching target. Other keys are kept.
#[must_use]
pub fn align_params(params: &ParamMap, targets: &[ParameterTarget]) -> ParamMap {
    let mut aligned = params.clone();
    for target in targets {
        if let Some(value) = aligned.get_mut(&target.name) {
            *value = target.align(*value);
        }
    }
    aligned
}

fn normalized_eq(a: f64, b: f64) -> bool {
    let (a, b) = (round_to_scale(a), round_to_scale(b));
    a == b || (a.is_nan() && b.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, f64)]) -> ParamMap {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_params_equal_normalizes_precision() {
        let a = params(&[("shortPeriod", 5.0), ("longPeriod", 30.0)]);
        let b = params(&[("longPeriod", 30.000_000_01), ("shortPeriod", 5.0)]);
        assert!(params_equal(&a, &b));

        let c = params(&[("shortPeriod", 6.0), ("longPeriod", 30.0)]);
        assert!(!params_equal(&a, &c));
    }

    #[test]
    fn test_changed_keys() {
        let before = params(&[("a", 1.0), ("b", 2.0), ("gone", 3.0)]);
        let after = params(&[("a", 1.0), ("b", 4.0), ("new", 5.0)]);

        let mut changed = changed_keys(&before, &after);
        changed.sort();
        assert_eq!(changed, vec!["b", "gone", "new"]);
    }

    #[test]
    fn test_scope_params_round_trip() {
        let mut combo = Combination::new("ma_cross", "fixed_stop_loss")
            .with_buy_params(params(&[("shortPeriod", 5.0)]));

        combo.set_param(OptimizationScope::Risk, RiskManagement::STOP_LOSS, 5.5);
        assert_eq!(combo.param(OptimizationScope::Risk, "stopLoss"), Some(5.5));
        assert!(combo.risk_management.is_some());

        combo.set_param(OptimizationScope::Entry, "shortPeriod", 8.0);
        assert_eq!(combo.buy_params.get("shortPeriod"), Some(&8.0));

        assert!(combo.params_for(OptimizationScope::ShortEntry).is_none());
        combo.set_param(OptimizationScope::ShortEntry, "x", 1.0);
        assert!(combo.short_entry.is_none());
    }

    #[test]
    fn test_combination_serializes_wire_names() {
        let combo = Combination::new("ma_cross", "ma_cross_exit")
            .with_risk(RiskManagement {
                stop_loss: Some(5.0),
                take_profit: None,
            });

        let Ok(json) = serde_json::to_value(&combo) else {
            panic!("combination should serialize");
        };
        assert_eq!(json["buyStrategy"], "ma_cross");
        assert_eq!(json["sellStrategy"], "ma_cross_exit");
        assert_eq!(json["riskManagement"]["stopLoss"], 5.0);
        assert!(json.get("shortEntry").is_none());
    }

    #[test]
    fn test_align_params_only_touches_targets() {
        let targets = vec![ParameterTarget::new("period", 10.0, 60.0, 5.0)];
        let aligned = align_params(&params(&[("period", 33.0), ("other", 1.23)]), &targets);
        assert_eq!(aligned.get("period"), Some(&35.0));
        assert_eq!(aligned.get("other"), Some(&1.23));
    }
}
