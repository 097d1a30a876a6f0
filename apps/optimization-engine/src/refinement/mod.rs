//! Local refinement of converged combinations.
//!
//! - `SearchSpace`: tunable parameters mapped onto `[0, 1]`, with step
//!   alignment and ordered-period constraints on decode
//! - SPSA for small spaces, CEM for larger ones
//! - `LocalRefinementEngine`: seed evaluation, algorithm selection and the
//!   never-worse-than-seed guarantee

mod cem;
mod engine;
mod probe;
mod space;
mod spsa;

pub use cem::population_size;
pub use engine::{LocalRefinementEngine, RefinementMethod, RefinementOutcome};
pub use space::{Dimension, SearchSpace, candidate_key, enforce_ordered_pair, exploration_weight};
