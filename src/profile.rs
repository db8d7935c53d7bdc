// src/profile.rs
//! Domain profiles: per-domain weight table, relevance blend and fuzzy rule base.
//!
//! Loaded once at start-up from TOML (see `config/recommender.toml`) and shared
//! read-only between requests. The bundled file is embedded into the binary and
//! used whenever no config file is present.

use anyhow::Context;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::fuzzy::{FuzzySystem, FuzzySystemConfig};
use crate::item::Domain;
use crate::preference::{PreferenceScorer, WeightTable};

// --- env defaults & names ---
pub const DEFAULT_RECOMMENDER_CONFIG_PATH: &str = "config/recommender.toml";
pub const ENV_RECOMMENDER_CONFIG_PATH: &str = "RECOMMENDER_CONFIG_PATH";

const BUNDLED_CONFIG: &str = include_str!("../config/recommender.toml");

static BUNDLED: Lazy<Profiles> = Lazy::new(|| {
    Profiles::from_toml_str(BUNDLED_CONFIG).expect("bundled config/recommender.toml is valid")
});

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlendConfig {
    pub preference: f64,
    pub content: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            preference: 0.7,
            content: 0.3,
        }
    }
}

impl BlendConfig {
    /// `preference * p + content * c`
    pub fn relevance(&self, preference: f64, content: f64) -> f64 {
        self.preference * preference + self.content * content
    }
}

fn default_rating_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Multiplier bringing item ratings onto the scale users state ranges in.
    #[serde(default = "default_rating_scale")]
    pub rating_scale: f64,
    /// Apply genre + rating range as a pre-filter instead of soft weights.
    #[serde(default)]
    pub hard_filters: bool,
    /// Drop items whose preference and content scores are both zero.
    #[serde(default)]
    pub skip_without_signal: bool,
    #[serde(default)]
    pub blend: BlendConfig,
    pub weights: WeightTable,
    pub fuzzy: FuzzySystemConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesRoot {
    pub movie: ProfileConfig,
    pub game: ProfileConfig,
}

/* ----------------------------
Compiled profiles
---------------------------- */

/// Everything the orchestrator needs to score one domain.
#[derive(Debug, Clone)]
pub struct DomainProfile {
    pub domain: Domain,
    pub hard_filters: bool,
    pub skip_without_signal: bool,
    pub blend: BlendConfig,
    pub preference: PreferenceScorer,
    pub fuzzy: FuzzySystem,
}

impl DomainProfile {
    pub fn compile(domain: Domain, cfg: &ProfileConfig) -> anyhow::Result<Self> {
        if !(cfg.rating_scale.is_finite() && cfg.rating_scale > 0.0) {
            anyhow::bail!("[{domain}] rating_scale must be > 0, got {}", cfg.rating_scale);
        }
        let BlendConfig {
            preference,
            content,
        } = cfg.blend;
        if !(preference.is_finite() && content.is_finite() && preference >= 0.0 && content >= 0.0)
        {
            anyhow::bail!("[{domain}] blend weights must be finite and non-negative");
        }
        cfg.weights
            .validate()
            .with_context(|| format!("[{domain}] invalid weights"))?;
        let fuzzy = FuzzySystem::compile(&cfg.fuzzy)
            .with_context(|| format!("[{domain}] invalid fuzzy rule base"))?;

        Ok(Self {
            domain,
            hard_filters: cfg.hard_filters,
            skip_without_signal: cfg.skip_without_signal,
            blend: cfg.blend,
            preference: PreferenceScorer::new(cfg.weights, cfg.rating_scale),
            fuzzy,
        })
    }

    pub fn rating_scale(&self) -> f64 {
        self.preference.rating_scale
    }
}

/// Compiled profiles for every domain.
#[derive(Debug, Clone)]
pub struct Profiles {
    movie: DomainProfile,
    game: DomainProfile,
}

impl Profiles {
    pub fn new(movie: DomainProfile, game: DomainProfile) -> Self {
        Self { movie, game }
    }

    /// Parse and compile from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let root: ProfilesRoot = toml::from_str(toml_str)?;
        Ok(Self {
            movie: DomainProfile::compile(Domain::Movie, &root.movie)?,
            game: DomainProfile::compile(Domain::Game, &root.game)?,
        })
    }

    /// Load from an explicit file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading recommender config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing recommender config {}", path.display()))
    }

    /// Load using env var + fallbacks:
    /// 1) `$RECOMMENDER_CONFIG_PATH` (must exist)
    /// 2) `config/recommender.toml`
    /// 3) bundled defaults
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env in local/dev; no-op when absent.
        let _ = dotenvy::dotenv();

        if let Ok(p) = std::env::var(ENV_RECOMMENDER_CONFIG_PATH) {
            let path = PathBuf::from(p);
            if !path.exists() {
                anyhow::bail!(
                    "{ENV_RECOMMENDER_CONFIG_PATH} points to non-existent path {}",
                    path.display()
                );
            }
            let profiles = Self::from_path(&path)?;
            info!(target: "recommender", path = %path.display(), "loaded domain profiles");
            return Ok(profiles);
        }

        let default_path = PathBuf::from(DEFAULT_RECOMMENDER_CONFIG_PATH);
        if default_path.exists() {
            let profiles = Self::from_path(&default_path)?;
            info!(target: "recommender", path = %default_path.display(), "loaded domain profiles");
            return Ok(profiles);
        }

        info!(target: "recommender", "no config file found, using bundled domain profiles");
        Ok(Self::bundled())
    }

    /// Profiles compiled from the embedded `config/recommender.toml`.
    pub fn bundled() -> Self {
        BUNDLED.clone()
    }

    pub fn get(&self, domain: Domain) -> &DomainProfile {
        match domain {
            Domain::Movie => &self.movie,
            Domain::Game => &self.game,
        }
    }
}
