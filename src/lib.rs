// src/lib.rs
// Public library surface for the service and the integration tests.

pub mod item;
pub mod numeric;

// Scoring stages, leaf-first
pub mod vectorizer;
pub mod similarity;
pub mod preference;
pub mod fuzzy;

// Per-domain configuration + orchestration
pub mod profile;
pub mod ranking;

pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::item::{Domain, Item, RatingRange, UserPreferences};
pub use crate::profile::{DomainProfile, Profiles};
pub use crate::ranking::{
    EngineFailure, RankOutcome, RankRequest, RankedResult, Recommender, ScoreBreakdown, ScoreError,
    SkipReason, SkippedItem, HARD_FILTER_RATING_BOUNDS, MAX_RESULTS,
};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a compact fmt subscriber filtered by `RUST_LOG`
/// (default `recommender=info,warn`). Safe to call more than once.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recommender=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}
