//! Wire messages exchanged with the evaluation collaborator.
//!
//! Requests are JSON objects tagged by `type`. Replies are either
//! `{"type":"result","data":...}` or `{"type":"error","data":{"message":...}}`;
//! anything else (progress pings, partial lines) is ignored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{EvaluationResult, OptimizationScope, ParamMap, ParamRange};

/// Request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    /// Evaluate one parameter set.
    RunBacktest,
    /// Sweep one parameter over a range.
    RunOptimization,
}

/// Resolved backtest parameters sent to the collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestParams {
    /// Collaborator id of the entry strategy.
    pub entry_strategy: String,
    /// Collaborator id of the exit strategy.
    pub exit_strategy: String,
    /// Entry parameters.
    pub entry_params: ParamMap,
    /// Exit parameters.
    pub exit_params: ParamMap,
    /// Whether short legs are active.
    #[serde(default)]
    pub enable_shorting: bool,
    /// Collaborator id of the short entry strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_entry_strategy: Option<String>,
    /// Collaborator id of the short exit strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_exit_strategy: Option<String>,
    /// Short entry parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_entry_params: Option<ParamMap>,
    /// Short exit parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_exit_params: Option<ParamMap>,
    /// Stop-loss percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Take-profit percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    /// First day of the evaluated period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last day of the evaluated period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Outbound request. Borrows the dataset rows so they are serialized in place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest<'a> {
    /// Request kind.
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Backtest parameters.
    pub params: &'a BacktestParams,
    /// Whether `cached_data` should be used instead of refetching.
    pub use_cached_data: bool,
    /// Read-only price rows.
    pub cached_data: Option<&'a [Value]>,
    /// Leg being swept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize_target_strategy: Option<OptimizationScope>,
    /// Parameter being swept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize_param_name: Option<&'a str>,
    /// Sweep range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize_range: Option<ParamRange>,
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerReply {
    /// Final result payload.
    Result(Value),
    /// Collaborator error message.
    Error(String),
    /// Progress ping or unrecognized message.
    Ignored,
}

impl WorkerReply {
    /// Classify one raw line from the worker.
    #[must_use]
    pub fn classify(line: &str) -> Self {
        let Ok(message) = serde_json::from_str::<Value>(line) else {
            return Self::Ignored;
        };
        match message.get("type").and_then(Value::as_str) {
            Some("result") => match message.get("data") {
                Some(data) if !data.is_null() => Self::Result(data.clone()),
                _ => Self::Ignored,
            },
            Some("error") => {
                let text = message
                    .get("data")
                    .and_then(|d| d.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown collaborator error");
                Self::Error(text.to_string())
            }
            _ => Self::Ignored,
        }
    }
}

/// One point of a parameter sweep.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepPoint {
    /// Swept parameter value.
    #[serde(default)]
    pub param_value: Option<f64>,
    /// Metrics at that value.
    #[serde(flatten)]
    pub metrics: EvaluationResult,
}

/// `data` payload of a sweep reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SweepPayload {
    #[serde(default)]
    pub results: Vec<SweepPoint>,
}
