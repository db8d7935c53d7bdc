// src/ranking.rs
//! # Ranking Orchestrator
//! Pure, request-scoped pipeline that turns a candidate catalog into at most
//! ten `(item, score)` pairs. No I/O, no state carried between calls.
//!
//! Order:
//! 1) drop candidates already in the user's history (by id)
//! 2) validate numeric fields; domains with `hard_filters` pre-filter on
//!    genre and rating range
//! 3) fit one TF-IDF matrix over the remaining tag lists
//! 4) per item: preference + content → relevance → fuzzy score
//! 5) stable sort by score (desc), truncate to `MAX_RESULTS`
//!
//! A bad item is skipped and reported in `RankOutcome::skipped`; it never
//! aborts the request. A failure of the whole request (a panic, or a fuzzy
//! input the profile cannot feed) yields empty results with
//! `RankOutcome::failure` set. Neither case panics or returns `Err`.

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::fuzzy::{FuzzyError, Signal};
use crate::item::{Domain, Item, UserPreferences};
use crate::metrics::{
    ensure_metrics_described, DURATION_MS, ENGINE_FAILURES_TOTAL, FUZZY_FALLBACK_TOTAL,
    ITEMS_SCORED_TOTAL, ITEMS_SKIPPED_TOTAL, REQUESTS_TOTAL,
};
use crate::numeric::{finite_or, NumericError};
use crate::preference::{PreparedItem, PreparedPreferences};
use crate::profile::{DomainProfile, Profiles};
use crate::similarity::ContentScorer;
use crate::vectorizer::TfIdfMatrix;

/// Upper bound on returned results.
pub const MAX_RESULTS: usize = 10;

/// Bounds a hard-filter rating range takes when the user leaves a side open.
pub const HARD_FILTER_RATING_BOUNDS: (f64, f64) = (0.0, 10.0);

/// Why one item was left out of the ranking.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error(transparent)]
    Malformed(#[from] NumericError),
    #[error("neither preference nor content signal")]
    NoSignal,
}

impl SkipReason {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Malformed(_) => "malformed",
            SkipReason::NoSignal => "no_signal",
        }
    }
}

/// The whole request failed; results are empty.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineFailure {
    #[error("fuzzy inference failed: {0}")]
    Inference(#[from] FuzzyError),
    #[error("scoring panicked: {0}")]
    Panic(String),
    #[error("background scoring task failed: {0}")]
    Join(String),
}

/// Why `score_item` produced no result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    /// Leave this item out, keep going.
    #[error(transparent)]
    Skip(#[from] SkipReason),
    /// Abort the request.
    #[error(transparent)]
    Engine(#[from] EngineFailure),
}

impl From<FuzzyError> for ScoreError {
    fn from(e: FuzzyError) -> Self {
        ScoreError::Engine(EngineFailure::Inference(e))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    pub id: u64,
    pub title: String,
    pub reason: SkipReason,
}

/// Intermediate scores kept for explainability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub preference: f64,
    pub content: f64,
    pub relevance: f64,
    pub fired_rules: usize,
    /// No rule fired; `score` is the neutral midpoint.
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub item: Item,
    /// Fuzzy recommendation strength in `[0, 1]`.
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Ranking plus diagnostics for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankOutcome {
    pub results: Vec<RankedResult>,
    pub skipped: Vec<SkippedItem>,
    pub failure: Option<EngineFailure>,
}

impl RankOutcome {
    fn failed(failure: EngineFailure) -> Self {
        Self {
            results: Vec::new(),
            skipped: Vec::new(),
            failure: Some(failure),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Result ids in rank order.
    pub fn ids(&self) -> Vec<u64> {
        self.results.iter().map(|r| r.item.id).collect()
    }
}

/// Owned request, for callers that hand work to another thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRequest {
    pub domain: Domain,
    pub candidates: Vec<Item>,
    #[serde(default)]
    pub history: Vec<Item>,
    #[serde(default)]
    pub preferences: UserPreferences,
}

/// Entry point for the surrounding service. Cheap to clone; profiles are shared.
#[derive(Debug, Clone)]
pub struct Recommender {
    profiles: Arc<Profiles>,
}

impl Default for Recommender {
    fn default() -> Self {
        Self::new(Arc::new(Profiles::bundled()))
    }
}

impl Recommender {
    pub fn new(profiles: Arc<Profiles>) -> Self {
        Self { profiles }
    }

    pub fn profiles(&self) -> &Profiles {
        &self.profiles
    }

    /// Rank `candidates` for one user. Never panics, never returns more than
    /// `MAX_RESULTS` results.
    pub fn score_and_rank(
        &self,
        candidates: &[Item],
        history: &[Item],
        preferences: &UserPreferences,
        domain: Domain,
    ) -> RankOutcome {
        ensure_metrics_described();
        counter!(REQUESTS_TOTAL, "domain" => domain.to_string()).increment(1);
        let started = Instant::now();

        let profile = self.profiles.get(domain);
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
            rank_with_profile(profile, candidates, history, preferences)
        })) {
            Ok(outcome) => outcome,
            Err(payload) => {
                engine_failure(domain, EngineFailure::Panic(panic_message(payload.as_ref())))
            }
        };

        histogram!(DURATION_MS, "domain" => domain.to_string())
            .record(started.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    /// `score_and_rank` on an owned request.
    pub fn rank(&self, request: &RankRequest) -> RankOutcome {
        self.score_and_rank(
            &request.candidates,
            &request.history,
            &request.preferences,
            request.domain,
        )
    }

    /// Run one request on tokio's blocking pool so async callers don't stall
    /// their executor on CPU-bound scoring.
    pub async fn rank_blocking(&self, request: RankRequest) -> RankOutcome {
        let this = self.clone();
        let domain = request.domain;
        match tokio::task::spawn_blocking(move || this.rank(&request)).await {
            Ok(outcome) => outcome,
            Err(e) => engine_failure(domain, EngineFailure::Join(e.to_string())),
        }
    }
}

/// The pipeline for one domain profile. See the module docs for the steps.
pub fn rank_with_profile(
    profile: &DomainProfile,
    candidates: &[Item],
    history: &[Item],
    preferences: &UserPreferences,
) -> RankOutcome {
    let domain = profile.domain;
    let mut outcome = RankOutcome::default();

    // 1) History exclusion by identity.
    let seen: HashSet<u64> = history.iter().map(|h| h.id).collect();
    let available: Vec<&Item> = candidates.iter().filter(|c| !seen.contains(&c.id)).collect();
    if available.is_empty() {
        debug!(target: "recommender", %domain, candidates = candidates.len(), "nothing left after history filter");
        return outcome;
    }

    // 2) Numeric validation, then the optional hard pre-filter.
    let prefs = PreparedPreferences::new(preferences);
    let mut prepared: Vec<PreparedItem<'_>> = Vec::with_capacity(available.len());
    for item in available {
        match PreparedItem::new(item) {
            Ok(p) => prepared.push(p),
            Err(e) => skip(&mut outcome, domain, item, SkipReason::Malformed(e)),
        }
    }
    if profile.hard_filters {
        prepared.retain(|p| passes_hard_filters(p, &prefs, profile.rating_scale()));
    }
    if prepared.is_empty() {
        debug!(target: "recommender", %domain, "no candidates left to score");
        return outcome;
    }

    // 3) One TF-IDF space per request.
    let docs: Vec<&[String]> = prepared.iter().map(|p| p.item.tags.as_slice()).collect();
    let Some(matrix) = TfIdfMatrix::fit(&docs) else {
        debug!(target: "recommender", %domain, candidates = prepared.len(), "empty tag vocabulary, returning no results");
        return outcome;
    };
    let content = ContentScorer::new(&matrix);

    // 4) Per-item scoring.
    for (idx, p) in prepared.iter().enumerate() {
        match score_item(profile, p, content.score(idx), &prefs) {
            Ok(ranked) => {
                debug!(
                    target: "recommender",
                    %domain,
                    id = p.item.id,
                    preference = ranked.breakdown.preference,
                    content = ranked.breakdown.content,
                    relevance = ranked.breakdown.relevance,
                    score = ranked.score,
                    "item scored"
                );
                outcome.results.push(ranked);
            }
            Err(ScoreError::Skip(reason)) => skip(&mut outcome, domain, p.item, reason),
            Err(ScoreError::Engine(failure)) => return engine_failure(domain, failure),
        }
    }
    counter!(ITEMS_SCORED_TOTAL, "domain" => domain.to_string())
        .increment(outcome.results.len() as u64);

    // 5) Stable sort: ties keep candidate order.
    outcome
        .results
        .sort_by(|a, b| b.score.total_cmp(&a.score));
    outcome.results.truncate(MAX_RESULTS);

    debug!(
        target: "recommender",
        %domain,
        returned = outcome.results.len(),
        skipped = outcome.skipped.len(),
        "ranking finished"
    );
    outcome
}

/// Score one prepared item. The only place an item can be rejected after
/// preparation.
pub fn score_item(
    profile: &DomainProfile,
    item: &PreparedItem<'_>,
    content: f64,
    prefs: &PreparedPreferences,
) -> Result<RankedResult, ScoreError> {
    let preference = profile.preference.score(item, prefs);
    let content = finite_or(content, 0.0);
    if profile.skip_without_signal && preference <= 0.0 && content <= 0.0 {
        return Err(SkipReason::NoSignal.into());
    }
    let relevance = finite_or(profile.blend.relevance(preference, content), 0.0);

    // Values are clamped to each variable's universe inside the fuzzy system.
    let inference = profile.fuzzy.evaluate_signals(|signal| {
        Some(match signal {
            Signal::Relevance => relevance,
            Signal::Rating => item.rating.unwrap_or(0.0),
            Signal::Popularity => item.popularity,
            Signal::Cost => item.cost.unwrap_or(0.0),
        })
    })?;
    if inference.fallback {
        counter!(FUZZY_FALLBACK_TOTAL, "domain" => profile.domain.to_string()).increment(1);
    }

    Ok(RankedResult {
        item: item.item.clone(),
        score: inference.value,
        breakdown: ScoreBreakdown {
            preference,
            content,
            relevance,
            fired_rules: inference.fired_rules,
            fallback: inference.fallback,
        },
    })
}

/// Hard filters: exact genre token match and rating range on the user scale.
/// Only a stated genre or range filters; a missing range bound falls back to
/// [`HARD_FILTER_RATING_BOUNDS`].
fn passes_hard_filters(item: &PreparedItem<'_>, prefs: &PreparedPreferences, scale: f64) -> bool {
    if let Some(genre) = &prefs.genre {
        if !item.has_genre(genre) {
            return false;
        }
    }
    if let Some(range) = prefs.rating {
        let (lo, hi) = HARD_FILTER_RATING_BOUNDS;
        if !range.or_bounds(lo, hi).contains(item.rating.unwrap_or(0.0) * scale) {
            return false;
        }
    }
    true
}

fn skip(outcome: &mut RankOutcome, domain: Domain, item: &Item, reason: SkipReason) {
    warn!(target: "recommender", %domain, id = item.id, title = %item.title, %reason, "item skipped");
    counter!(ITEMS_SKIPPED_TOTAL, "domain" => domain.to_string(), "reason" => reason.label())
        .increment(1);
    outcome.skipped.push(SkippedItem {
        id: item.id,
        title: item.title.clone(),
        reason,
    });
}

fn engine_failure(domain: Domain, failure: EngineFailure) -> RankOutcome {
    error!(target: "recommender", %domain, error = %failure, "ranking request failed");
    counter!(ENGINE_FAILURES_TOTAL, "domain" => domain.to_string()).increment(1);
    RankOutcome::failed(failure)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::RatingRange;

    fn movie(id: u64, title: &str, genre: &str, tags: &[&str], rating: f64, pop: u64) -> Item {
        Item::new(id, title)
            .genre(genre)
            .tags(tags.iter().copied())
            .rating(rating)
            .popularity(pop)
    }

    fn rec() -> Recommender {
        Recommender::default()
    }

    #[test]
    fn action_movie_beats_unmatched_drama() {
        let a = movie(1, "A", "Action", &["war", "hero"], 8.0, 500_000);
        let b = movie(2, "B", "Drama", &["love"], 4.0, 100);
        let prefs = UserPreferences::new()
            .with_genre("Action")
            .with_rating(RatingRange::new(5.0, 10.0));

        let out = rec().score_and_rank(&[a, b], &[], &prefs, Domain::Movie);
        assert_eq!(out.ids(), vec![1, 2]);
        assert!(out.results[0].score > out.results[1].score);

        let top = &out.results[0].breakdown;
        assert!((top.preference - 0.51).abs() < 1e-9);
        assert!((top.content - 0.5).abs() < 1e-9);
        assert!((top.relevance - 0.507).abs() < 1e-9);
        assert!(!top.fallback);
    }

    #[test]
    fn history_is_excluded_by_id() {
        let a = movie(1, "A", "Action", &["war"], 8.0, 1000);
        let b = movie(2, "B", "Action", &["war"], 8.0, 1000);
        // Same id, different fields: still excluded.
        let seen = Item::new(1, "renamed");
        let prefs = UserPreferences::new().with_genre("Action");

        let out = rec().score_and_rank(&[a, b], &[seen], &prefs, Domain::Movie);
        assert_eq!(out.ids(), vec![2]);
    }

    #[test]
    fn empty_after_history_is_empty() {
        let a = movie(1, "A", "Action", &["war"], 8.0, 1000);
        let out = rec().score_and_rank(&[a.clone()], &[a], &UserPreferences::new(), Domain::Movie);
        assert!(out.is_empty());
        assert!(out.failure.is_none());

        let out = rec().score_and_rank(&[], &[], &UserPreferences::new(), Domain::Game);
        assert!(out.is_empty());
    }

    #[test]
    fn all_empty_tags_return_nothing() {
        let a = movie(1, "A", "Action", &[], 8.0, 1000);
        let b = movie(2, "B", "Action", &[], 9.0, 1000);
        let prefs = UserPreferences::new().with_genre("Action");
        let out = rec().score_and_rank(&[a, b], &[], &prefs, Domain::Movie);
        assert!(out.is_empty());
        assert!(out.skipped.is_empty());
        assert!(out.failure.is_none());
    }

    #[test]
    fn malformed_item_is_skipped_not_fatal() {
        let good = movie(1, "Good", "Action", &["war"], 8.0, 1000);
        let bad = movie(2, "Bad", "Action", &["war"], f64::NAN, 1000);
        let prefs = UserPreferences::new().with_genre("Action");

        let out = rec().score_and_rank(&[bad, good], &[], &prefs, Domain::Movie);
        assert_eq!(out.ids(), vec![1]);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].id, 2);
        assert_eq!(out.skipped[0].reason.label(), "malformed");
    }

    #[test]
    fn movie_items_without_signal_are_skipped() {
        // Single candidate → content 0; no preference match → no signal.
        let a = movie(1, "A", "Drama", &["love"], 8.0, 1000);
        let prefs = UserPreferences::new().with_genre("Horror");
        let out = rec().score_and_rank(&[a], &[], &prefs, Domain::Movie);
        assert!(out.is_empty());
        assert_eq!(out.skipped[0].reason, SkipReason::NoSignal);
    }

    #[test]
    fn game_hard_filters_prune_before_scoring() {
        let g1 = Item::new(1, "Doom")
            .genre("Action, Shooter")
            .tags(["fps"])
            .rating(0.9)
            .cost(5.0)
            .popularity(12_000_000);
        let g2 = Item::new(2, "Stardew")
            .genre("Simulation")
            .tags(["farming"])
            .rating(0.95)
            .cost(15.0)
            .popularity(10_000_000);
        let g3 = Item::new(3, "Bad Shooter")
            .genre("Shooter")
            .tags(["fps"])
            .rating(0.3)
            .cost(60.0)
            .popularity(1000);

        let prefs = UserPreferences::new()
            .with_genre("shooter")
            .with_rating(RatingRange::new(5.0, 10.0));
        let out = rec().score_and_rank(&[g1, g2, g3], &[], &prefs, Domain::Game);
        assert_eq!(out.ids(), vec![1]);
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn open_ended_game_range_uses_default_bounds() {
        let weak = Item::new(1, "Weak").genre("Shooter").tags(["fps"]).rating(0.15);
        let strong = Item::new(2, "Strong").genre("Shooter").tags(["fps"]).rating(0.8);
        let top = Item::new(3, "Top").genre("Shooter").tags(["fps"]).rating(0.95);

        let min_only = UserPreferences::new().with_rating(RatingRange {
            min: Some(5.0),
            max: None,
        });
        let out = rec().score_and_rank(&[weak.clone()], &[], &min_only, Domain::Game);
        assert!(out.is_empty());
        assert!(out.failure.is_none());

        let out = rec().score_and_rank(&[weak.clone(), strong.clone()], &[], &min_only, Domain::Game);
        assert_eq!(out.ids(), vec![2]);

        let max_only = UserPreferences::new().with_rating(RatingRange {
            min: None,
            max: Some(9.0),
        });
        let out = rec().score_and_rank(&[weak, strong, top], &[], &max_only, Domain::Game);
        let mut ids = out.ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn movies_treat_genre_as_soft_weight() {
        let a = movie(1, "A", "Action", &["war"], 8.0, 700_000);
        let b = movie(2, "B", "Drama", &["love"], 8.0, 700_000);
        let prefs = UserPreferences::new().with_genre("Action");
        let out = rec().score_and_rank(&[a, b], &[], &prefs, Domain::Movie);
        // Drama is still ranked (content 0.5 keeps it alive), just lower.
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].item.id, 1);
    }

    #[test]
    fn results_are_truncated_to_ten() {
        let items: Vec<Item> = (0..25)
            .map(|i| movie(i, &format!("M{i}"), "Action", &["war", "hero"], 7.0, 400_000))
            .collect();
        let prefs = UserPreferences::new().with_genre("Action");
        let out = rec().score_and_rank(&items, &[], &prefs, Domain::Movie);
        assert_eq!(out.results.len(), MAX_RESULTS);
        // Identical items tie: candidate order is kept.
        assert_eq!(out.ids(), (0..10).collect::<Vec<u64>>());
    }

    #[test]
    fn fuzzy_errors_abort_the_request() {
        let err = ScoreError::from(FuzzyError::MissingInput("rating".into()));
        let ScoreError::Engine(failure) = err else {
            panic!("expected engine failure, got {err:?}");
        };
        let out = engine_failure(Domain::Game, failure.clone());
        assert!(out.is_empty());
        assert!(out.skipped.is_empty());
        assert_eq!(out.failure, Some(failure));
    }

    #[test]
    fn panic_message_extracts_strings() {
        let p: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(p.as_ref()), "boom");
        let p: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(p.as_ref()), "bang");
        let p: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(p.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn blocking_offload_matches_sync_path() {
        let req = RankRequest {
            domain: Domain::Movie,
            candidates: vec![
                movie(1, "A", "Action", &["war", "hero"], 8.0, 500_000),
                movie(2, "B", "Drama", &["love"], 4.0, 100),
            ],
            history: vec![],
            preferences: UserPreferences::new().with_genre("Action"),
        };
        let r = rec();
        let sync = r.rank(&req);
        let offloaded = r.rank_blocking(req).await;
        assert_eq!(sync, offloaded);
    }
}
