//! The aggregation pipeline: resolve identifiers, fan out feed fetches,
//! merge, sort, cap, and cache the combined payload.
//!
//! Failure containment mirrors the rest of the service: a dead feed
//! contributes zero articles, an unknown identifier gets a soft error entry,
//! and only a missing feeds catalog escalates to the caller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::cache::ResultCache;
use crate::config::Settings;
use crate::feed::{parse_feed, Article};
use crate::fetch::FeedFetcher;
use crate::sources::{PoliticianEntry, SourceResolver};

/// Per-identifier article cap, applied after concatenating its feeds.
pub const MAX_ARTICLES_PER_POLITICIAN: usize = 10;
/// Global cap on the merged, time-sorted article list.
pub const MAX_TOTAL_ARTICLES: usize = 50;

pub const NOT_FOUND_ERROR: &str = "Politician not found";

/// One requested identifier's slice of the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliticianNews {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub articles: Vec<Article>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Article plus attribution to the politician whose feed produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributedArticle {
    #[serde(flatten)]
    pub article: Article,
    #[serde(rename = "politicianId")]
    pub politician_id: String,
    #[serde(rename = "politicianName")]
    pub politician_name: String,
    #[serde(rename = "politicianParty", skip_serializing_if = "Option::is_none")]
    pub politician_party: Option<String>,
    #[serde(rename = "politicianRole", skip_serializing_if = "Option::is_none")]
    pub politician_role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatePayload {
    pub articles: Vec<AttributedArticle>,
    /// Only identifiers that yielded at least one article appear here.
    pub politicians: Vec<PoliticianNews>,
    pub timestamp: String,
}

/// Per-identifier work in flight, kept in request order.
enum Pending {
    NotFound(String),
    Fetching {
        id: String,
        entry: PoliticianEntry,
        handles: Vec<JoinHandle<Vec<Article>>>,
    },
}

pub struct Aggregator {
    resolver: Arc<SourceResolver>,
    fetcher: Arc<FeedFetcher>,
    cache: Arc<ResultCache>,
    /// Global bound on simultaneous outbound feed fetches.
    limiter: Arc<Semaphore>,
    cache_ttl: Duration,
}

impl Aggregator {
    pub fn new(
        settings: &Settings,
        resolver: Arc<SourceResolver>,
        fetcher: Arc<FeedFetcher>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            cache,
            limiter: Arc::new(Semaphore::new(settings.fetch_concurrency)),
            cache_ttl: settings.cache_ttl,
        }
    }

    /// Runs the pipeline for a raw `ids` query value.
    ///
    /// The cache key is the raw value itself: the same identifiers in a
    /// different order are a different key. Within one TTL window repeated
    /// calls return the stored payload untouched, original timestamp
    /// included. Errors escalate only when the feeds catalog is unavailable.
    pub async fn aggregate(&self, raw_ids: &str) -> Result<Value> {
        counter!("aggregate_requests_total").increment(1);

        let cache_key = format!("news:{raw_ids}");
        if let Some(cached) = self.cache.get(&cache_key) {
            counter!("aggregate_cache_hits_total").increment(1);
            return Ok(cached);
        }

        let ids: Vec<String> = raw_ids
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        let catalog = self.resolver.politician_feeds().await?;

        // Fan out every feed of every known identifier; awaiting in declared
        // order below is the join-all barrier and keeps concatenation order.
        let mut pending = Vec::with_capacity(ids.len());
        for id in ids {
            match catalog.get(&id) {
                None => pending.push(Pending::NotFound(id)),
                Some(entry) => {
                    let handles = entry
                        .feeds
                        .iter()
                        .map(|url| self.spawn_feed_fetch(url.clone()))
                        .collect();
                    pending.push(Pending::Fetching {
                        id,
                        entry: entry.clone(),
                        handles,
                    });
                }
            }
        }

        let mut politicians = Vec::with_capacity(pending.len());
        for job in pending {
            politicians.push(match job {
                Pending::NotFound(id) => PoliticianNews {
                    name: id.clone(),
                    id,
                    party: None,
                    role: None,
                    articles: Vec::new(),
                    error: Some(NOT_FOUND_ERROR.to_string()),
                },
                Pending::Fetching { id, entry, handles } => {
                    let mut articles = Vec::new();
                    for handle in handles {
                        match handle.await {
                            Ok(mut batch) => articles.append(&mut batch),
                            Err(e) => tracing::warn!(error = %e, "feed fetch task failed"),
                        }
                    }
                    articles.truncate(MAX_ARTICLES_PER_POLITICIAN);
                    PoliticianNews {
                        name: entry.display_name(&id),
                        id,
                        party: entry.party.clone(),
                        role: entry.role.clone(),
                        articles,
                        error: None,
                    }
                }
            });
        }

        let mut all_articles: Vec<AttributedArticle> = politicians
            .iter()
            .flat_map(|p| {
                p.articles.iter().map(|a| AttributedArticle {
                    article: a.clone(),
                    politician_id: p.id.clone(),
                    politician_name: p.name.clone(),
                    politician_party: p.party.clone(),
                    politician_role: p.role.clone(),
                })
            })
            .collect();

        // Stable sort: articles sharing a timestamp keep merge order.
        all_articles.sort_by(|a, b| b.article.pub_date.cmp(&a.article.pub_date));
        all_articles.truncate(MAX_TOTAL_ARTICLES);

        let payload = AggregatePayload {
            articles: all_articles,
            politicians: politicians
                .into_iter()
                .filter(|p| !p.articles.is_empty())
                .collect(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        let value = serde_json::to_value(&payload)?;

        // Write-through is fire-and-forget: the response does not wait for
        // the cache to become durable.
        let cache = Arc::clone(&self.cache);
        let stored = value.clone();
        let ttl = self.cache_ttl;
        tokio::spawn(async move {
            cache.put(cache_key, stored, ttl);
        });

        Ok(value)
    }

    fn spawn_feed_fetch(&self, url: String) -> JoinHandle<Vec<Article>> {
        let fetcher = Arc::clone(&self.fetcher);
        let limiter = Arc::clone(&self.limiter);
        tokio::spawn(async move {
            let _permit = match limiter.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Vec::new(),
            };
            match fetcher.fetch_text(&url).await {
                Ok(body) => parse_feed(&body, &url),
                Err(e) => {
                    tracing::warn!(feed_url = %url, error = %e, "skipping failed feed");
                    Vec::new()
                }
            }
        })
    }
}
