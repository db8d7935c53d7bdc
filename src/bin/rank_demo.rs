//! Ranks one JSON request file (default `demos/movies.json`) and prints the
//! result, the skipped items and the Prometheus exposition.

use std::{env, fs, sync::Arc};

use anyhow::Context;
use media_recommender::{metrics::Metrics, init_tracing, Profiles, RankRequest, Recommender};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let metrics = Metrics::init()?;

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/movies.json".to_string());
    let raw = fs::read_to_string(&path).with_context(|| format!("reading request {path}"))?;
    let request: RankRequest =
        serde_json::from_str(&raw).with_context(|| format!("parsing request {path}"))?;

    let recommender = Recommender::new(Arc::new(Profiles::from_env()?));
    let outcome = recommender.rank_blocking(request).await;

    if let Some(failure) = &outcome.failure {
        eprintln!("ranking failed: {failure}");
    }
    println!("{}", serde_json::to_string_pretty(&outcome.results)?);
    for s in &outcome.skipped {
        println!("skipped #{} {:?}: {}", s.id, s.title, s.reason);
    }

    println!("\n{}", metrics.render());
    Ok(())
}
