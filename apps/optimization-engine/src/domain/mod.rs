//! Domain types shared by every engine component.
//!
//! - `ParameterTarget` / `ParamRange`: tunable knobs with clamp and step alignment
//! - `StrategyDescriptor` / `StrategyCatalog`: read-only strategy lookup
//! - `Combination`: entry/exit pair being optimized
//! - `EvaluationResult` / `ReturnMoments`: collaborator metrics
//! - `DatasetSnapshot` / `DateSpan`: read-only data and evaluation periods

mod combination;
mod dataset;
mod metrics;
mod strategy;
mod target;

pub use combination::{
    Combination, OptimizationScope, ParamMap, RiskManagement, RiskTargets, StrategyLeg,
    align_params, changed_keys, params_equal,
};
pub use dataset::{DatasetSnapshot, DateSpan};
pub use metrics::{EvaluationResult, ReturnMoments, TargetMetric};
pub use strategy::{StrategyCatalog, StrategyDescriptor, StrategyKind};
pub use target::{ParamRange, ParameterTarget, round_to_scale};
