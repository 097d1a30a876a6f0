//! Evaluation client: one request/response exchange per call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::EvaluationError;
use super::evaluator::{Evaluator, SweepRequest};
use super::mapper::{IdentityMapper, StrategyMapper};
use super::protocol::{
    BacktestParams, RequestKind, SweepPayload, SweepPoint, WorkerReply, WorkerRequest,
};
use super::worker::WorkerSpawner;
use crate::config::EvaluationConfig;
use crate::domain::{Combination, DatasetSnapshot, DateSpan, EvaluationResult};

/// Sends backtest and sweep requests to isolated workers.
pub struct EvaluationClient {
    spawner: Arc<dyn WorkerSpawner>,
    mapper: Arc<dyn StrategyMapper>,
    dataset: DatasetSnapshot,
    config: EvaluationConfig,
}

impl EvaluationClient {
    /// Create a client with the identity strategy mapper.
    #[must_use]
    pub fn new(
        spawner: Arc<dyn WorkerSpawner>,
        dataset: DatasetSnapshot,
        config: EvaluationConfig,
    ) -> Self {
        Self {
            spawner,
            mapper: Arc::new(IdentityMapper),
            dataset,
            config,
        }
    }

    /// Replace the strategy mapper.
    #[must_use]
    pub fn with_mapper(mut self, mapper: Arc<dyn StrategyMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// Dataset snapshot handed to every worker.
    #[must_use]
    pub const fn dataset(&self) -> &DatasetSnapshot {
        &self.dataset
    }

    /// Resolve collaborator parameters for a combination.
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError::Mapping` if any leg's strategy is unknown.
    pub fn build_params(
        &self,
        combination: &Combination,
        period: Option<DateSpan>,
    ) -> Result<BacktestParams, EvaluationError> {
        let short_entry = combination
            .short_entry
            .as_ref()
            .map(|leg| self.mapper.map(&leg.strategy).map(|id| (id, leg.params.clone())))
            .transpose()?;
        let short_exit = combination
            .short_exit
            .as_ref()
            .map(|leg| self.mapper.map(&leg.strategy).map(|id| (id, leg.params.clone())))
            .transpose()?;
        let risk = combination.risk_management.unwrap_or_default();

        Ok(BacktestParams {
            entry_strategy: self.mapper.map(&combination.buy_strategy)?,
            exit_strategy: self.mapper.map(&combination.sell_strategy)?,
            entry_params: combination.buy_params.clone(),
            exit_params: combination.sell_params.clone(),
            enable_shorting: short_entry.is_some() || short_exit.is_some(),
            short_entry_params: short_entry.as_ref().map(|(_, p)| p.clone()),
            short_exit_params: short_exit.as_ref().map(|(_, p)| p.clone()),
            short_entry_strategy: short_entry.map(|(id, _)| id),
            short_exit_strategy: short_exit.map(|(id, _)| id),
            stop_loss: risk.stop_loss,
            take_profit: risk.take_profit,
            start_date: period.map(|p| p.start),
            end_date: period.map(|p| p.end),
        })
    }

    /// Run one backtest.
    ///
    /// # Errors
    ///
    /// Returns an `EvaluationError` on mapping failure, timeout, worker
    /// failure or a collaborator error reply.
    pub async fn run_backtest(
        &self,
        combination: &Combination,
        period: Option<DateSpan>,
    ) -> Result<EvaluationResult, EvaluationError> {
        let params = self.build_params(combination, period)?;
        let request = self.request(RequestKind::RunBacktest, &params);

        let data = self
            .exchange(&request, self.config.backtest_timeout())
            .await?;
        let mut result: EvaluationResult =
            serde_json::from_value(data).map_err(|e| EvaluationError::Protocol {
                message: e.to_string(),
            })?;

        result.used_stop_loss = result.used_stop_loss.or(params.stop_loss);
        result.used_take_profit = result.used_take_profit.or(params.take_profit);
        Ok(result)
    }

    /// Sweep one parameter through the collaborator's optimization mode.
    ///
    /// # Errors
    ///
    /// Returns an `EvaluationError` on mapping failure, timeout, worker
    /// failure or a collaborator error reply.
    pub async fn run_sweep(
        &self,
        sweep: &SweepRequest<'_>,
    ) -> Result<Vec<SweepPoint>, EvaluationError> {
        let params = self.build_params(sweep.combination, sweep.period)?;
        let mut range = sweep.target.range;
        range.step = range.effective_step();

        let request = WorkerRequest {
            optimize_target_strategy: Some(sweep.scope),
            optimize_param_name: Some(&sweep.target.name),
            optimize_range: Some(range),
            ..self.request(RequestKind::RunOptimization, &params)
        };

        let data = self.exchange(&request, self.config.sweep_timeout()).await?;
        let payload: SweepPayload =
            serde_json::from_value(data).map_err(|e| EvaluationError::Protocol {
                message: e.to_string(),
            })?;
        Ok(payload.results)
    }

    fn request<'a>(&'a self, kind: RequestKind, params: &'a BacktestParams) -> WorkerRequest<'a> {
        let use_cached_data = self.config.use_cached_data && !self.dataset.is_empty();
        WorkerRequest {
            kind,
            params,
            use_cached_data,
            cached_data: use_cached_data.then(|| self.dataset.rows().as_slice()),
            optimize_target_strategy: None,
            optimize_param_name: None,
            optimize_range: None,
        }
    }

    async fn exchange(
        &self,
        request: &WorkerRequest<'_>,
        timeout: Duration,
    ) -> Result<Value, EvaluationError> {
        let payload = serde_json::to_string(request).map_err(|e| EvaluationError::Protocol {
            message: e.to_string(),
        })?;

        let mut worker = self.spawner.spawn().await?;
        let exchange = async {
            worker.send(payload).await?;
            loop {
                let Some(line) = worker.recv().await else {
                    return Err(EvaluationError::WorkerExited);
                };
                match WorkerReply::classify(&line) {
                    WorkerReply::Result(data) => return Ok(data),
                    WorkerReply::Error(message) => {
                        return Err(EvaluationError::Collaborator { message });
                    }
                    WorkerReply::Ignored => {
                        debug!(kind = ?request.kind, "Ignoring non-terminal worker message");
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    kind = ?request.kind,
                    timeout_secs = timeout.as_secs(),
                    "Evaluation timed out, discarding worker"
                );
                Err(EvaluationError::Timeout {
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl Evaluator for EvaluationClient {
    async fn evaluate(
        &self,
        combination: &Combination,
        period: Option<DateSpan>,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.run_backtest(combination, period).await
    }

    async fn sweep(&self, request: &SweepRequest<'_>) -> Result<Vec<SweepPoint>, EvaluationError> {
        self.run_sweep(request).await
    }
}
