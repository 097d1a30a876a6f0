//! Strategy id mapping (Driven Port)
//!
//! Translates catalog strategy ids into the evaluation collaborator's
//! vocabulary. Resolved once when the client is built.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::error::EvaluationError;
use crate::domain::StrategyCatalog;

/// Exit strategies whose collaborator id drops the `_exit` suffix.
const EXIT_ALIASES: [(&str, &str); 9] = [
    ("ma_cross_exit", "ma_cross"),
    ("ema_cross_exit", "ema_cross"),
    ("k_d_cross_exit", "k_d_cross"),
    ("macd_cross_exit", "macd_cross"),
    ("rsi_overbought_exit", "rsi_overbought"),
    ("williams_overbought_exit", "williams_overbought"),
    ("ma_below_exit", "ma_below"),
    ("rsi_reversal_exit", "rsi_reversal"),
    ("williams_reversal_exit", "williams_reversal"),
];

/// Short entry and cover strategies the collaborator knows by the same id.
const PASS_THROUGH: [&str; 18] = [
    "short_ma_cross",
    "short_ema_cross",
    "short_k_d_cross",
    "short_macd_cross",
    "short_rsi_overbought",
    "short_williams_overbought",
    "short_ma_below",
    "short_rsi_reversal",
    "short_williams_reversal",
    "cover_ma_cross",
    "cover_ema_cross",
    "cover_k_d_cross",
    "cover_macd_cross",
    "cover_rsi_oversold",
    "cover_williams_oversold",
    "cover_ma_above",
    "cover_rsi_reversal",
    "cover_williams_reversal",
];

/// Port for mapping strategy ids.
#[cfg_attr(test, mockall::automock)]
pub trait StrategyMapper: Send + Sync {
    /// Map a catalog id to the collaborator id.
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError::Mapping` when the id is unknown.
    fn map(&self, strategy: &str) -> Result<String, EvaluationError>;
}

/// No-op mapper: every id is passed through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl StrategyMapper for IdentityMapper {
    fn map(&self, strategy: &str) -> Result<String, EvaluationError> {
        Ok(strategy.to_string())
    }
}

/// Table-driven mapper that rejects ids it does not know.
#[derive(Clone, Default)]
pub struct TableMapper {
    aliases: HashMap<String, String>,
    known: HashSet<String>,
}

impl TableMapper {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard exit aliases plus short/cover pass-through ids.
    #[must_use]
    pub fn standard() -> Self {
        EXIT_ALIASES
            .iter()
            .fold(Self::new(), |mapper, (from, to)| mapper.with_alias(*from, *to))
            .with_known(PASS_THROUGH)
    }

    /// Standard table that also accepts every id in the catalog.
    #[must_use]
    pub fn for_catalog(catalog: &StrategyCatalog) -> Self {
        Self::standard().with_known(catalog.ids())
    }

    /// Register an alias. The target id becomes known.
    #[must_use]
    pub fn with_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let to = to.into();
        self.known.insert(to.clone());
        self.aliases.insert(from.into(), to);
        self
    }

    /// Register ids that map to themselves.
    #[must_use]
    pub fn with_known<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known.extend(ids.into_iter().map(Into::into));
        self
    }
}

impl StrategyMapper for TableMapper {
    fn map(&self, strategy: &str) -> Result<String, EvaluationError> {
        if let Some(alias) = self.aliases.get(strategy) {
            return Ok(alias.clone());
        }
        if self.known.contains(strategy) {
            return Ok(strategy.to_string());
        }
        Err(EvaluationError::Mapping {
            strategy: strategy.to_string(),
        })
    }
}

impl fmt::Debug for TableMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMapper")
            .field("aliases", &self.aliases.len())
            .field("known", &self.known.len())
            .finish()
    }
}
