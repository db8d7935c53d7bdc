//! Weighted preference matching.
//!
//! Each attribute contributes independently and only when both the item and the
//! preferences define it:
//! - genre: full weight on a case-insensitive match with any genre token
//! - tags / actors / system requirements: weight × matched / preferred
//! - rating: full weight when `rating * rating_scale` lies in the stated range
//! - cost: full weight when the item costs at most `max_cost`
//!
//! Items and preferences are normalised once per request (`PreparedItem`,
//! `PreparedPreferences`) and passed around by reference.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::item::{Item, RatingRange, UserPreferences};
use crate::numeric::{self, finite_or, ratio, NumericError};

/// Per-domain weight table. Fixed configuration; must sum to at most 1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightTable {
    #[serde(default)]
    pub genre: f64,
    #[serde(default)]
    pub tags: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub actors: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub system_requirements: f64,
}

impl WeightTable {
    pub fn total(&self) -> f64 {
        self.genre + self.tags + self.rating + self.actors + self.cost + self.system_requirements
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, w) in [
            ("genre", self.genre),
            ("tags", self.tags),
            ("rating", self.rating),
            ("actors", self.actors),
            ("cost", self.cost),
            ("system_requirements", self.system_requirements),
        ] {
            if !w.is_finite() || w < 0.0 {
                anyhow::bail!("weight `{name}` must be a finite non-negative number, got {w}");
            }
        }
        let total = self.total();
        if total > 1.0 + 1e-9 {
            anyhow::bail!("weights sum to {total:.4}, must be <= 1.0");
        }
        Ok(())
    }
}

/// Request-scoped view of one item with normalised text sets and checked numbers.
#[derive(Debug, Clone)]
pub struct PreparedItem<'a> {
    pub item: &'a Item,
    pub genres: Vec<String>,
    pub tags: HashSet<String>,
    pub actors: HashSet<String>,
    pub requirements: HashSet<String>,
    /// `None` when the item has no rating.
    pub rating: Option<f64>,
    pub cost: Option<f64>,
    pub popularity: f64,
}

impl<'a> PreparedItem<'a> {
    /// Normalise text fields and validate numeric ones.
    pub fn new(item: &'a Item) -> Result<Self, NumericError> {
        let rating = item
            .rating
            .map(|r| numeric::ingest("rating", Some(r)))
            .transpose()?;
        let cost = item
            .cost
            .map(|c| numeric::ingest("cost", Some(c)))
            .transpose()?;
        Ok(Self {
            item,
            genres: item.genre_tokens(),
            tags: normalized_set(&item.tags),
            actors: normalized_set(&item.actors),
            requirements: normalized_set(&item.system_requirements),
            rating,
            cost,
            popularity: numeric::ingest_count(item.popularity),
        })
    }

    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g == genre)
    }
}

/// Normalised copy of `UserPreferences`.
#[derive(Debug, Clone, Default)]
pub struct PreparedPreferences {
    pub genre: Option<String>,
    pub tags: Option<HashSet<String>>,
    pub rating: Option<RatingRange>,
    pub actors: Option<HashSet<String>>,
    pub max_cost: Option<f64>,
    pub requirements: Option<HashSet<String>>,
}

impl PreparedPreferences {
    pub fn new(prefs: &UserPreferences) -> Self {
        Self {
            genre: prefs
                .genre
                .as_deref()
                .map(|g| g.trim().to_lowercase())
                .filter(|g| !g.is_empty()),
            tags: prefs.tags.as_deref().map(normalized_set),
            rating: prefs.rating,
            actors: prefs.actors.as_deref().map(normalized_set),
            max_cost: prefs.max_cost.filter(|c| !c.is_nan()),
            requirements: prefs.system_requirements.as_deref().map(normalized_set),
        }
    }
}

/// Scores one prepared item against prepared preferences with a domain's weights.
#[derive(Debug, Clone, Copy)]
pub struct PreferenceScorer {
    pub weights: WeightTable,
    /// Multiplier bringing item ratings onto the scale users state ranges in.
    pub rating_scale: f64,
}

impl PreferenceScorer {
    pub fn new(weights: WeightTable, rating_scale: f64) -> Self {
        Self {
            weights,
            rating_scale,
        }
    }

    /// Weighted match in `[0, weights.total()]`. Non-finite results become 0.
    pub fn score(&self, item: &PreparedItem<'_>, prefs: &PreparedPreferences) -> f64 {
        let w = &self.weights;
        let mut score = 0.0;

        if let Some(genre) = &prefs.genre {
            if item.has_genre(genre) {
                score += w.genre;
            }
        }

        if let Some(tags) = &prefs.tags {
            score += w.tags * overlap(&item.tags, tags);
        }

        if let (Some(range), Some(rating)) = (&prefs.rating, item.rating) {
            if range.contains(rating * self.rating_scale) {
                score += w.rating;
            }
        }

        if let Some(actors) = &prefs.actors {
            score += w.actors * overlap(&item.actors, actors);
        }

        if let (Some(max_cost), Some(cost)) = (prefs.max_cost, item.cost) {
            if cost <= max_cost {
                score += w.cost;
            }
        }

        if let Some(reqs) = &prefs.requirements {
            score += w.system_requirements * overlap(&item.requirements, reqs);
        }

        finite_or(score, 0.0)
    }
}

/// `|item ∩ preferred| / |preferred|`, 0 for an empty preferred set.
fn overlap(item: &HashSet<String>, preferred: &HashSet<String>) -> f64 {
    let matching = item.intersection(preferred).count();
    ratio(matching as f64, preferred.len() as f64)
}

fn normalized_set(values: &[String]) -> HashSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}
