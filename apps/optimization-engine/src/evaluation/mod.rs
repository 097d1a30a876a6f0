//! Evaluation boundary: the only path to the external backtest collaborator.
//!
//! - `EvaluationClient`: request/response exchange with explicit timeouts
//! - `Evaluator`: port consumed by optimization and validation
//! - `StrategyMapper`: injected id translation (`IdentityMapper` by default)
//! - `WorkerSpawner` / `WorkerChannel`: isolated worker transport
//! - `ScriptedEvaluator`: deterministic in-process evaluator
//!
//! Every call spawns a fresh worker and discards it afterwards, so no two
//! in-flight evaluations share state.

mod client;
mod error;
mod evaluator;
mod mapper;
mod protocol;
mod stub;
mod worker;

pub use client::EvaluationClient;
pub use error::EvaluationError;
pub use evaluator::{Evaluator, SweepRequest, sweep_by_evaluation};
pub use mapper::{IdentityMapper, StrategyMapper, TableMapper};
pub use protocol::{BacktestParams, RequestKind, SweepPoint, WorkerReply, WorkerRequest};
pub use stub::ScriptedEvaluator;
pub use worker::{ProcessWorkerSpawner, WorkerChannel, WorkerSpawner};
