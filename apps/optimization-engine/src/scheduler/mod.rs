//! Bounded-concurrency evaluation scheduling.
//!
//! - `EvaluationScheduler`: cursor + in-flight set, refilled on each completion
//! - `ProgressTracker` / `ProgressObserver`: per-run counters and the snapshot
//!   hook reported through the run context
//! - `StatusBoard`: per-task `queued|running|done|error|skipped` rows
//!
//! # Example
//!
//! ```ignore
//! use optimization_engine::scheduler::{EvaluationScheduler, SchedulerConfig};
//!
//! let scheduler = EvaluationScheduler::new(SchedulerConfig::with_concurrency(4))?;
//! let report = scheduler
//!     .run_with_fallback(&ctx, combinations, Clone::clone, |_, combo| optimize(combo))
//!     .await;
//! ```

mod config;
mod error;
mod executor;
mod progress;
mod result;
mod status;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use executor::EvaluationScheduler;
#[cfg(test)]
pub use progress::MockProgressObserver;
pub use progress::{NoOpProgressObserver, Progress, ProgressObserver, ProgressTracker};
pub use result::ScheduleReport;
pub use status::{StatusBoard, TaskEntry, TaskState};
