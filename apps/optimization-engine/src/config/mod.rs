//! Configuration module for the optimization engine.
//!
//! Provides YAML configuration loading, validation, and environment
//! variable interpolation for every engine component.
//!
//! # Usage
//!
//! ```rust,ignore
//! use optimization_engine::config::{Config, load_config};
//!
//! // Load from default path (optimizer.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/optimizer.yaml"))?;
//!
//! println!("trials: {}", config.optimization.trials());
//! ```

mod evaluation;
mod logging;
mod optimization;
mod refinement;
mod validation;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use evaluation::EvaluationConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use optimization::{ITERATION_LIMIT_RANGE, OptimizationConfig, TRIALS_RANGE};
pub use refinement::{RefinementConfig, RefinementMode};
pub use validation::{TRADING_DAYS_PER_YEAR, ValidationConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Coordinate-ascent optimization.
    #[serde(default)]
    pub optimization: OptimizationConfig,
    /// Evaluation collaborator.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Local refinement.
    #[serde(default)]
    pub refinement: RefinementConfig,
    /// Walk-forward validation.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

pub(crate) const fn default_true() -> bool {
    true
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "optimizer.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("optimizer.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is a compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str());
        match cap.get(1).map(|m| std::env::var(m.as_str())) {
            Some(Ok(v)) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

/// Validate configuration values.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let opt = &config.optimization;
    if opt.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "optimization.concurrency must be positive".to_string(),
        ));
    }
    if opt.parameter_trials == 0 {
        return Err(ConfigError::ValidationError(
            "optimization.parameter_trials must be positive".to_string(),
        ));
    }
    if opt.iteration_limit == 0 || opt.max_internal_iterations == 0 {
        return Err(ConfigError::ValidationError(
            "optimization.iteration_limit and max_internal_iterations must be positive".to_string(),
        ));
    }
    if opt.enabled_scopes.is_empty() {
        return Err(ConfigError::ValidationError(
            "optimization.enabled_scopes must not be empty".to_string(),
        ));
    }

    let eval = &config.evaluation;
    if eval.backtest_timeout_secs == 0 || eval.sweep_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "evaluation timeouts must be positive".to_string(),
        ));
    }

    let refine = &config.refinement;
    if !(refine.spsa_min_scale > 0.0 && refine.spsa_min_scale <= refine.spsa_initial_scale) {
        return Err(ConfigError::ValidationError(
            "refinement.spsa_min_scale must be in (0, spsa_initial_scale]".to_string(),
        ));
    }
    if !(refine.cem_min_radius > 0.0 && refine.cem_min_radius <= refine.cem_initial_radius) {
        return Err(ConfigError::ValidationError(
            "refinement.cem_min_radius must be in (0, cem_initial_radius]".to_string(),
        ));
    }
    if !(refine.cem_radius_decay > 0.0 && refine.cem_radius_decay <= 1.0) {
        return Err(ConfigError::ValidationError(
            "refinement.cem_radius_decay must be in (0, 1]".to_string(),
        ));
    }
    if !(refine.exploration_weight_min > 0.0
        && refine.exploration_weight_min <= refine.exploration_weight_max)
        || refine.exploration_reference_steps <= 0.0
    {
        return Err(ConfigError::ValidationError(
            "refinement exploration weights must satisfy 0 < min <= max and reference > 0"
                .to_string(),
        ));
    }

    let val = &config.validation;
    if let Err(reason) = val.plan.check() {
        return Err(ConfigError::ValidationError(format!(
            "validation.plan: {reason}"
        )));
    }
    if !val.thresholds.is_finite() {
        return Err(ConfigError::ValidationError(
            "validation.thresholds must be finite".to_string(),
        ));
    }
    if !(val.min_track_record_confidence > 0.5 && val.min_track_record_confidence < 1.0) {
        return Err(ConfigError::ValidationError(
            "validation.min_track_record_confidence must be in (0.5, 1)".to_string(),
        ));
    }
    if !val.loose_benchmark.is_finite() || !val.strict_benchmark.is_finite() {
        return Err(ConfigError::ValidationError(
            "validation benchmarks must be finite".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::domain::{OptimizationScope, TargetMetric};
    use crate::validation::WindowMode;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.optimization.parameter_trials, 60);
        assert_eq!(config.optimization.concurrency, 4);
        assert_eq!(config.evaluation.backtest_timeout_secs, 30);
        assert_eq!(config.evaluation.sweep_timeout_secs, 60);
        assert!(config.evaluation.use_cached_data);
        assert_eq!(config.validation.plan.training_months, 36);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_empty_config_uses_defaults() {
        let config = match load_config_from_string("{}") {
            Ok(c) => c,
            Err(e) => panic!("should load empty config: {e}"),
        };
        assert_eq!(config.optimization.target_metric, TargetMetric::AnnualizedReturn);
        assert_eq!(config.optimization.iteration_limit, 6);
    }

    #[test]
    fn test_env_var_with_default_when_missing() {
        let input = "metric: ${OPT_ENGINE_CONFIG_TEST_NONEXISTENT_VAR:-sharpeRatio}";
        let result = interpolate_env_vars(input);
        assert_eq!(result, "metric: sharpeRatio");
    }

    #[test]
    fn test_env_var_without_default_becomes_empty() {
        let input = "seed: ${OPT_ENGINE_CONFIG_TEST_UNLIKELY_TO_EXIST}";
        let result = interpolate_env_vars(input);
        assert_eq!(result, "seed: ");
    }

    #[test]
    fn test_env_var_with_default_uses_existing() {
        let input = "path: ${PATH:-default}";
        let result = interpolate_env_vars(input);
        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let yaml = r"
optimization:
  concurrency: 0
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for zero concurrency");
        };
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_invalid_log_format_fails_to_parse() {
        let yaml = r"
logging:
  format: xml
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for invalid log format");
        };
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation_bad_window_plan() {
        let yaml = r"
validation:
  plan:
    training_months: 0
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for empty training segment");
        };
        assert!(err.to_string().contains("validation.plan"));
    }

    #[test]
    fn test_full_config_parse() {
        let yaml = r#"
optimization:
  target_metric: sharpeRatio
  parameter_trials: 80
  iteration_limit: 4
  concurrency: 2
  enabled_scopes: [entry, exit, risk]
  risk_targets:
    stopLoss: { name: stopLoss, range: { from: 2, to: 20, step: 1 } }
    takeProfit: { name: takeProfit, range: { from: 10, to: 50, step: 5 } }

evaluation:
  backtest_timeout_secs: 15
  use_cached_data: false

refinement:
  enabled: true
  mode: cem
  trials: 48
  seed: 7

validation:
  plan:
    training_months: 24
    testing_months: 6
    step_months: 6
    window_count: 4
    mode: anchored
  thresholds:
    sharpe_ratio: 1.5
  strict_mode: true
  optimize_windows: true

logging:
  level: "debug"
  format: "pretty"
"#;

        let config = match load_config_from_string(yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load full config: {e}"),
        };

        assert_eq!(config.optimization.target_metric, TargetMetric::SharpeRatio);
        assert_eq!(config.optimization.trials(), 80);
        assert!(config.optimization.scope_enabled(OptimizationScope::Risk));
        assert!((config.optimization.risk_targets.take_profit.range.step - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.evaluation.backtest_timeout_secs, 15);
        assert_eq!(config.evaluation.sweep_timeout_secs, 60);
        assert!(!config.evaluation.use_cached_data);
        assert!(config.refinement.enabled);
        assert_eq!(config.refinement.mode, RefinementMode::Cem);
        assert_eq!(config.refinement.seed, Some(7));
        assert_eq!(config.validation.plan.window_count, Some(4));
        assert_eq!(config.validation.plan.mode, WindowMode::Anchored);
        assert!((config.validation.thresholds.sharpe_ratio - 1.5).abs() < f64::EPSILON);
        assert!((config.validation.thresholds.win_rate - 45.0).abs() < f64::EPSILON);
        assert!(config.validation.strict_mode);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = match tempfile::NamedTempFile::new() {
            Ok(f) => f,
            Err(e) => panic!("tempfile: {e}"),
        };
        if let Err(e) = writeln!(file, "optimization:\n  parameter_trials: 25") {
            panic!("write: {e}");
        }

        let path = file.path().to_string_lossy().to_string();
        let config = match load_config(Some(&path)) {
            Ok(c) => c,
            Err(e) => panic!("should load config file: {e}"),
        };
        assert_eq!(config.optimization.parameter_trials, 25);
    }

    #[test]
    fn test_load_config_missing_file() {
        let Err(err) = load_config(Some("/nonexistent/optimizer.yaml")) else {
            panic!("expected read error");
        };
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
