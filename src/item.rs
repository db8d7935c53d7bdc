//! Catalog items and user preference structures handed in by the surrounding service.
//!
//! Everything here is plain data: the engine never mutates an `Item` during a
//! request and never persists anything derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which catalog a request ranks. Selects the domain profile (weights + rule base).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Movie,
    Game,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Movie => write!(f, "movie"),
            Domain::Game => write!(f, "game"),
        }
    }
}

/// A movie or a game as supplied by the catalog store.
///
/// `rating` is on the domain's own scale (movies 0–10, games 0–1).
/// Optional numeric fields default to 0 when absent; non-finite values are
/// treated as malformed and the item is skipped during scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub title: String,
    /// Comma-joined categories, e.g. "Action, Thriller".
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub popularity: Option<u64>,
    /// Games only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Movies only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<String>,
    /// Games only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_requirements: Vec<String>,
}

impl Item {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            genre: String::new(),
            tags: Vec::new(),
            rating: None,
            popularity: None,
            cost: None,
            actors: Vec::new(),
            system_requirements: Vec::new(),
        }
    }

    /// Builder style setters (mostly used by callers assembling fixtures).
    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn popularity(mut self, popularity: u64) -> Self {
        self.popularity = Some(popularity);
        self
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn actors<I, S>(mut self, actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actors = actors.into_iter().map(Into::into).collect();
        self
    }

    pub fn system_requirements<I, S>(mut self, reqs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_requirements = reqs.into_iter().map(Into::into).collect();
        self
    }

    /// Genre tokens, trimmed and lowercased.
    pub fn genre_tokens(&self) -> Vec<String> {
        self.genre
            .split(',')
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .collect()
    }
}

/// Inclusive rating range. A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl RatingRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let lo = self.min.unwrap_or(f64::NEG_INFINITY);
        let hi = self.max.unwrap_or(f64::INFINITY);
        lo <= value && value <= hi
    }

    /// Fill missing bounds with `min` / `max`; stated bounds win.
    pub fn or_bounds(self, min: f64, max: f64) -> Self {
        Self {
            min: Some(self.min.unwrap_or(min)),
            max: Some(self.max.unwrap_or(max)),
        }
    }
}

/// Sparse, explicitly stated preferences. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub rating: Option<RatingRange>,
    #[serde(default)]
    pub actors: Option<Vec<String>>,
    #[serde(default)]
    pub max_cost: Option<f64>,
    #[serde(default)]
    pub system_requirements: Option<Vec<String>>,
}

impl UserPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_rating(mut self, range: RatingRange) -> Self {
        self.rating = Some(range);
        self
    }

    pub fn with_actors<I, S>(mut self, actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actors = Some(actors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    pub fn with_system_requirements<I, S>(mut self, reqs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_requirements = Some(reqs.into_iter().map(Into::into).collect());
        self
    }
}
