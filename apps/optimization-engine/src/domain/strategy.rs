//! Strategy catalog entries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::combination::ParamMap;
use super::target::ParameterTarget;

/// How a strategy leg is parameterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Indicator-driven signal strategy with its own optimize targets.
    #[default]
    Signal,
    /// Exit leg driven purely by stop-loss / take-profit levels.
    RiskControl,
}

/// Read-only catalog entry for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDescriptor {
    /// Strategy identifier.
    pub id: String,
    /// Parameters used when a combination carries none.
    #[serde(default)]
    pub default_params: ParamMap,
    /// Tunable parameters in declaration order.
    #[serde(default)]
    pub optimize_targets: Vec<ParameterTarget>,
    /// Strategy kind.
    #[serde(default)]
    pub kind: StrategyKind,
}

impl StrategyDescriptor {
    /// Create a signal strategy with no parameters.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_params: ParamMap::new(),
            optimize_targets: Vec::new(),
            kind: StrategyKind::Signal,
        }
    }

    /// Add a tunable target and its default value.
    #[must_use]
    pub fn with_target(mut self, target: ParameterTarget, default_value: f64) -> Self {
        self.default_params
            .insert(target.name.clone(), target.align(default_value));
        self.optimize_targets.push(target);
        self
    }

    /// Mark the strategy as a risk-control exit.
    #[must_use]
    pub const fn risk_control(mut self) -> Self {
        self.kind = StrategyKind::RiskControl;
        self
    }

    /// Whether the leg is optimized through stop-loss / take-profit.
    #[must_use]
    pub fn is_risk_control(&self) -> bool {
        self.kind == StrategyKind::RiskControl
    }

    /// Find a target by name.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&ParameterTarget> {
        self.optimize_targets.iter().find(|t| t.name == name)
    }
}

/// Immutable lookup of strategy descriptors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyCatalog {
    descriptors: HashMap<String, StrategyDescriptor>,
}

impl StrategyCatalog {
    /// Build a catalog from descriptors. Later duplicates replace earlier ones.
    #[must_use]
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = StrategyDescriptor>) -> Self {
        Self {
            descriptors: descriptors
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
        }
    }

    /// Look up a descriptor.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StrategyDescriptor> {
        self.descriptors.get(id)
    }

    /// Registered strategy ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
