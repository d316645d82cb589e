//! Source catalogs and their merged feed view.
//!
//! Two independently maintained JSON documents describe where headlines come
//! from: `feeds.json` maps politician identifiers to their RSS/Atom feed
//! URLs, and `data/democratic-sources.json` lists reference sources with
//! category/tier metadata. Both are fetched from the configured origin and
//! cached for one TTL window; a catalog that cannot be loaded degrades to an
//! empty one everywhere except the aggregation path, which needs the feeds
//! catalog and surfaces the failure.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::ResultCache;
use crate::config::Settings;
use crate::fetch::FeedFetcher;

/// Cache keys for the raw catalog documents.
const FEEDS_CACHE_KEY: &str = "feeds:json";
const SOURCES_CACHE_KEY: &str = "sources:json";

/// Catalog A: one politician's entry in `feeds.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PoliticianEntry {
    pub name: Option<String>,
    pub party: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub feeds: Vec<String>,
}

impl PoliticianEntry {
    /// Display name, falling back to the catalog key.
    pub fn display_name(&self, id: &str) -> String {
        self.name.clone().unwrap_or_else(|| id.to_string())
    }
}

/// Catalog B: one reference source in `democratic-sources.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<i64>,
    #[serde(default)]
    pub has_rss: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rss_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceCatalog {
    #[serde(default)]
    pub sources: Vec<ReferenceSource>,
}

/// One feed URL with its display metadata, after merging both catalogs.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<i64>,
    /// Which catalog contributed this URL.
    #[serde(rename = "source")]
    pub origin: &'static str,
}

/// AND-semantics filter over reference sources; unset fields match anything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceFilter {
    pub category: Option<String>,
    pub tier: Option<i64>,
    pub has_rss: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub total_feeds: usize,
    pub total_sources: usize,
    pub sources_with_rss: usize,
    pub by_category: BTreeMap<String, u64>,
    pub by_tier: BTreeMap<i64, u64>,
}

pub struct SourceResolver {
    feeds_url: String,
    sources_url: String,
    catalog_ttl: Duration,
    fetcher: Arc<FeedFetcher>,
    cache: Arc<ResultCache>,
}

impl SourceResolver {
    pub fn new(settings: &Settings, fetcher: Arc<FeedFetcher>, cache: Arc<ResultCache>) -> Self {
        Self {
            feeds_url: settings.feeds_catalog_url(),
            sources_url: settings.sources_catalog_url(),
            catalog_ttl: settings.cache_ttl,
            fetcher,
            cache,
        }
    }

    /// Loads Catalog A. Errors propagate: the aggregation path cannot run
    /// without it, so the caller decides whether to degrade or fail.
    pub async fn politician_feeds(&self) -> Result<HashMap<String, PoliticianEntry>> {
        let raw = self
            .catalog_json(&self.feeds_url, FEEDS_CACHE_KEY)
            .await
            .context("loading feeds catalog")?;
        let entries: HashMap<String, Value> =
            serde_json::from_value(raw).context("feeds catalog is not a JSON object")?;

        // Duck-typed catalog: entries that don't look like a politician
        // record are skipped, not fatal.
        let mut out = HashMap::with_capacity(entries.len());
        for (id, value) in entries {
            match serde_json::from_value::<PoliticianEntry>(value) {
                Ok(entry) => {
                    out.insert(id, entry);
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "skipping malformed feeds.json entry")
                }
            }
        }
        Ok(out)
    }

    /// Loads Catalog B, degrading to an empty catalog on any failure.
    pub async fn reference_catalog(&self) -> ReferenceCatalog {
        let loaded = self
            .catalog_json(&self.sources_url, SOURCES_CACHE_KEY)
            .await
            .and_then(|raw| {
                serde_json::from_value::<ReferenceCatalog>(raw)
                    .context("sources catalog has unexpected shape")
            });
        match loaded {
            Ok(catalog) => catalog,
            Err(e) => {
                counter!("catalog_load_errors_total").increment(1);
                tracing::warn!(error = %e, "reference sources unavailable, using empty catalog");
                ReferenceCatalog::default()
            }
        }
    }

    /// Union of both catalogs keyed by feed URL. Catalog A wins on URL
    /// collisions; placeholder and blank URLs are dropped at this point.
    pub async fn get_all_feeds(&self) -> Vec<FeedSource> {
        let mut merged: HashMap<String, FeedSource> = HashMap::new();

        let politicians = match self.politician_feeds().await {
            Ok(map) => map,
            Err(e) => {
                counter!("catalog_load_errors_total").increment(1);
                tracing::warn!(error = %e, "politician feeds unavailable, using empty catalog");
                HashMap::new()
            }
        };
        for (id, entry) in &politicians {
            for url in &entry.feeds {
                if !is_usable_feed_url(url) {
                    continue;
                }
                merged.entry(url.clone()).or_insert_with(|| FeedSource {
                    name: entry.display_name(id),
                    url: url.clone(),
                    party: entry.party.clone(),
                    role: entry.role.clone(),
                    category: None,
                    tier: None,
                    origin: "feeds.json",
                });
            }
        }

        for source in self.reference_catalog().await.sources {
            let Some(url) = source.rss_url.clone().filter(|_| source.has_rss) else {
                continue;
            };
            if !is_usable_feed_url(&url) || merged.contains_key(&url) {
                continue;
            }
            merged.insert(
                url.clone(),
                FeedSource {
                    name: source.name.clone().unwrap_or_default(),
                    url,
                    party: None,
                    role: None,
                    category: source.category.clone(),
                    tier: source.tier,
                    origin: "democratic-sources.json",
                },
            );
        }

        merged.into_values().collect()
    }

    pub async fn get_reference_sources(&self, filter: &SourceFilter) -> Vec<ReferenceSource> {
        self.reference_catalog()
            .await
            .sources
            .into_iter()
            .filter(|s| {
                filter
                    .category
                    .as_ref()
                    .is_none_or(|c| s.category.as_deref() == Some(c.as_str()))
                    && filter.tier.is_none_or(|t| s.tier == Some(t))
                    && filter.has_rss.is_none_or(|r| s.has_rss == r)
            })
            .collect()
    }

    pub async fn get_source_by_name(&self, name: &str) -> Option<ReferenceSource> {
        self.reference_catalog()
            .await
            .sources
            .into_iter()
            .find(|s| s.name.as_deref() == Some(name))
    }

    pub async fn get_source_by_id(&self, id: &str) -> Option<ReferenceSource> {
        self.reference_catalog()
            .await
            .sources
            .into_iter()
            .find(|s| s.id.as_deref() == Some(id))
    }

    /// Rollup counts. Missing tier counts as 0 and missing category as
    /// "unknown" here only; the records themselves keep their absent fields.
    pub async fn get_stats(&self) -> SourceStats {
        let feeds = self.get_all_feeds().await;
        let sources = self.reference_catalog().await.sources;

        let mut by_category: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_tier: BTreeMap<i64, u64> = BTreeMap::new();
        for s in &sources {
            let cat = s.category.clone().unwrap_or_else(|| "unknown".to_string());
            *by_category.entry(cat).or_insert(0) += 1;
            *by_tier.entry(s.tier.unwrap_or(0)).or_insert(0) += 1;
        }

        SourceStats {
            total_feeds: feeds.len(),
            total_sources: sources.len(),
            sources_with_rss: sources.iter().filter(|s| s.has_rss).count(),
            by_category,
            by_tier,
        }
    }

    /// Raw catalog JSON, served from the shared cache within its TTL window.
    /// The cache write is fire-and-forget relative to the caller.
    async fn catalog_json(&self, url: &str, cache_key: &'static str) -> Result<Value> {
        if let Some(cached) = self.cache.get(cache_key) {
            return Ok(cached);
        }
        let body = self.fetcher.fetch_text(url).await?;
        let value: Value =
            serde_json::from_str(&body).with_context(|| format!("{url} is not valid JSON"))?;

        let cache = Arc::clone(&self.cache);
        let stored = value.clone();
        let ttl = self.catalog_ttl;
        tokio::spawn(async move {
            cache.put(cache_key, stored, ttl);
        });

        Ok(value)
    }
}

fn is_usable_feed_url(url: &str) -> bool {
    let trimmed = url.trim();
    !trimmed.is_empty() && !trimmed.contains("example.com")
}
