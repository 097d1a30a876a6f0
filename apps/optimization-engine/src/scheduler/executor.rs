//! Bounded-concurrency task executor.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::context::OptimizationRunContext;

use super::config::SchedulerConfig;
use super::error::SchedulerError;
use super::progress::ProgressTracker;
use super::result::ScheduleReport;
use super::status::StatusBoard;

/// Runs independent tasks with at most `concurrency` in flight.
///
/// Tasks are polled cooperatively on the caller's task; a new task is
/// launched as soon as one settles. Cancellation is checked before every
/// launch and never interrupts in-flight tasks.
#[derive(Debug, Clone)]
pub struct EvaluationScheduler {
    config: SchedulerConfig,
}

impl EvaluationScheduler {
    /// Create a scheduler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConcurrency` if the limit is zero.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        if config.concurrency == 0 {
            return Err(SchedulerError::InvalidConcurrency {
                concurrency: config.concurrency,
            });
        }
        Ok(Self { config })
    }

    /// Concurrency limit.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.config.concurrency
    }

    /// Run every task through `job`.
    ///
    /// Results land at their input index regardless of completion order. A
    /// task that errors or times out leaves `None` in its slot; the run
    /// itself never fails.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn run<T, R, E, F, Fut>(
        &self,
        ctx: &OptimizationRunContext,
        tasks: Vec<T>,
        mut job: F,
    ) -> ScheduleReport<R>
    where
        F: FnMut(usize, T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        let total = tasks.len();
        let limit = self.config.concurrency.max(1);
        let timeout = self.config.task_timeout();
        let mut tracker = ProgressTracker::new(total as u64);
        let mut board = StatusBoard::new(total);
        let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
        let mut pending = tasks.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut peak_in_flight = 0;
        let mut cancelled = false;
        let start_time = Instant::now();

        info!(
            run_id = %ctx.run_id(),
            tasks = total,
            concurrency = limit,
            "Starting scheduled evaluation run"
        );

        loop {
            while in_flight.len() < limit && !cancelled {
                if ctx.is_cancelled() {
                    cancelled = true;
                    info!(run_id = %ctx.run_id(), "Cancellation requested; no further launches");
                    break;
                }
                let Some((index, task)) = pending.next() else {
                    break;
                };

                board.mark_running(index);
                let fut = job(index, task);
                let task_span = span!(Level::DEBUG, "scheduled_task", index);
                in_flight.push(
                    async move {
                        let outcome = match timeout {
                            Some(limit) => match tokio::time::timeout(limit, fut).await {
                                Ok(result) => result.map_err(|e| e.to_string()),
                                Err(_) => Err(format!("timed out after {}s", limit.as_secs())),
                            },
                            None => fut.await.map_err(|e| e.to_string()),
                        };
                        (index, outcome)
                    }
                    .instrument(task_span),
                );
                peak_in_flight = peak_in_flight.max(in_flight.len());
                debug!(index, in_flight = in_flight.len(), "Task dispatched");
            }

            let Some((index, outcome)) = in_flight.next().await else {
                break;
            };

            match outcome {
                Ok(value) => {
                    results[index] = Some(value);
                    board.mark_done(index);
                    tracker.task_completed(true);
                }
                Err(message) => {
                    warn!(index, error = %message, "Task failed");
                    board.mark_error(index, message);
                    tracker.task_completed(false);
                }
            }

            let progress = tracker.progress();
            if self.config.track_progress {
                debug!(
                    "Progress: {:.1}% ({}/{}) - ETA: {}s",
                    progress.percentage(),
                    progress.completed,
                    progress.total,
                    progress.eta_secs
                );
            }
            ctx.report_progress(&progress);
        }

        for (index, _) in pending {
            board.mark_skipped(index);
            tracker.task_skipped();
        }

        let final_progress = tracker.progress();
        let elapsed = start_time.elapsed();

        info!(
            run_id = %ctx.run_id(),
            "Scheduled run complete: {}/{} succeeded, {} skipped in {:.2}s (peak {} in flight)",
            final_progress.completed - final_progress.failed,
            final_progress.total,
            final_progress.skipped,
            elapsed.as_secs_f64(),
            peak_in_flight
        );

        ScheduleReport {
            results,
            tasks: board.into_entries(),
            completed: final_progress.completed,
            failed: final_progress.failed,
            skipped: final_progress.skipped,
            peak_in_flight,
            cancelled,
            fallbacks: Vec::new(),
            total_time_ms: elapsed.as_millis() as u64,
        }
    }

    /// Like [`run`](Self::run), but every empty slot is filled with
    /// `fallback(task)`, built before the task is handed to `job`.
    pub async fn run_with_fallback<T, R, E, F, Fut, B>(
        &self,
        ctx: &OptimizationRunContext,
        tasks: Vec<T>,
        fallback: B,
        job: F,
    ) -> ScheduleReport<R>
    where
        F: FnMut(usize, T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Display,
        B: Fn(&T) -> R,
    {
        let fallback_values: Vec<R> = tasks.iter().map(&fallback).collect();
        let mut report = self.run(ctx, tasks, job).await;

        for (index, (slot, value)) in report
            .results
            .iter_mut()
            .zip(fallback_values)
            .enumerate()
        {
            if slot.is_none() {
                *slot = Some(value);
                report.fallbacks.push(index);
            }
        }

        if !report.fallbacks.is_empty() {
            info!(
                run_id = %ctx.run_id(),
                fallbacks = report.fallbacks.len(),
                "Substituted fallback values for unresolved tasks"
            );
        }

        report
    }
}
