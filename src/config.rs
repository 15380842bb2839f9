//! # Configuration
//!
//! The engine's optional operational safeguards (`spec.md` §5: "implementations
//! are free to impose an iteration cap... but the semantics do not require
//! one"), loaded the way the teacher's `Config` is — `figment` layering a
//! `toml::Provider` over `Env` with a crate-specific prefix — per
//! `SPEC_FULL.md` §10.3.
//!
//! Loading a config is entirely optional: [`Engine::new`](crate::engine::Engine::new)
//! takes none and evaluates without caps.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Operational caps for [`Engine::evaluate`](crate::engine::Engine::evaluate).
/// Unset (`None`) by default, matching `spec.md` §5: these never change
/// evaluation semantics, they only guard against pathological rule sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Caps the number of fixpoint iterations; tripping it surfaces as an
    /// [`EvaluationError`](crate::error::EvaluationError), never a panic.
    #[serde(default)]
    pub max_iterations: Option<usize>,

    /// Caps the total number of facts the store may hold.
    #[serde(default)]
    pub max_facts: Option<usize>,
}

impl EngineConfig {
    /// Loads configuration from `advisor.toml` (if present) merged with
    /// `ADVISOR_`-prefixed environment variables, e.g.
    /// `ADVISOR_MAX_ITERATIONS=10000`.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("advisor.toml"))
            .merge(Env::prefixed("ADVISOR_"))
            .extract()
    }

    /// Loads configuration from a specific TOML file, merged with
    /// `ADVISOR_`-prefixed environment variables.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("ADVISOR_"))
            .extract()
    }
}
