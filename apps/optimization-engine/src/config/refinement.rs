//! Local refinement (SPSA / CEM) settings.
//!
//! The scale, radius and exploration-weight constants are tuning knobs, not
//! contracts; defaults reproduce the behaviour the engine was calibrated with.

use serde::{Deserialize, Serialize};

/// Which refinement algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefinementMode {
    /// SPSA for up to two targets, CEM above.
    #[default]
    Auto,
    /// Always SPSA.
    Spsa,
    /// Always CEM.
    Cem,
}

/// Refinement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Run refinement after convergence.
    #[serde(default)]
    pub enabled: bool,
    /// Algorithm selection.
    #[serde(default)]
    pub mode: RefinementMode,
    /// Evaluation budget.
    #[serde(default = "default_trials")]
    pub trials: u32,
    /// RNG seed; `None` draws from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
    /// SPSA initial perturbation (normalized units, before weighting).
    #[serde(default = "default_spsa_initial_scale")]
    pub spsa_initial_scale: f64,
    /// SPSA final perturbation (normalized units, before weighting).
    #[serde(default = "default_spsa_min_scale")]
    pub spsa_min_scale: f64,
    /// CEM initial sampling radius (normalized units, before weighting).
    #[serde(default = "default_cem_initial_radius")]
    pub cem_initial_radius: f64,
    /// CEM radius floor.
    #[serde(default = "default_cem_min_radius")]
    pub cem_min_radius: f64,
    /// CEM geometric radius decay per iteration.
    #[serde(default = "default_cem_radius_decay")]
    pub cem_radius_decay: f64,
    /// Range-to-step ratio that maps to an exploration weight of 1.
    #[serde(default = "default_exploration_reference_steps")]
    pub exploration_reference_steps: f64,
    /// Lower clamp for the exploration weight.
    #[serde(default = "default_exploration_weight_min")]
    pub exploration_weight_min: f64,
    /// Upper clamp for the exploration weight.
    #[serde(default = "default_exploration_weight_max")]
    pub exploration_weight_max: f64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: RefinementMode::Auto,
            trials: default_trials(),
            seed: None,
            spsa_initial_scale: default_spsa_initial_scale(),
            spsa_min_scale: default_spsa_min_scale(),
            cem_initial_radius: default_cem_initial_radius(),
            cem_min_radius: default_cem_min_radius(),
            cem_radius_decay: default_cem_radius_decay(),
            exploration_reference_steps: default_exploration_reference_steps(),
            exploration_weight_min: default_exploration_weight_min(),
            exploration_weight_max: default_exploration_weight_max(),
        }
    }
}

const fn default_trials() -> u32 {
    40
}

const fn default_spsa_initial_scale() -> f64 {
    0.25
}

const fn default_spsa_min_scale() -> f64 {
    0.02
}

const fn default_cem_initial_radius() -> f64 {
    0.3
}

const fn default_cem_min_radius() -> f64 {
    0.01
}

const fn default_cem_radius_decay() -> f64 {
    0.7
}

const fn default_exploration_reference_steps() -> f64 {
    100.0
}

const fn default_exploration_weight_min() -> f64 {
    0.5
}

const fn default_exploration_weight_max() -> f64 {
    1.5
}
