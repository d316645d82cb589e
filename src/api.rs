use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::aggregate::Aggregator;
use crate::cache::ResultCache;
use crate::config::Settings;
use crate::fetch::FeedFetcher;
use crate::sources::{ReferenceSource, SourceFilter, SourceResolver, SourceStats};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub resolver: Arc<SourceResolver>,
    cache_ttl_secs: u64,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_fetcher(settings, Arc::new(FeedFetcher::new(settings.fetch_timeout)))
    }

    /// Wires the full pipeline around the given fetcher; tests pass a
    /// fixture-mode one here.
    pub fn with_fetcher(settings: &Settings, fetcher: Arc<FeedFetcher>) -> Self {
        let cache = Arc::new(ResultCache::new());
        let resolver = Arc::new(SourceResolver::new(
            settings,
            Arc::clone(&fetcher),
            Arc::clone(&cache),
        ));
        let aggregator = Arc::new(Aggregator::new(
            settings,
            Arc::clone(&resolver),
            fetcher,
            cache,
        ));
        Self {
            aggregator,
            resolver,
            cache_ttl_secs: settings.cache_ttl_secs(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(news))
        .route("/sources", get(reference_sources))
        .route("/stats", get(stats))
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct NewsQuery {
    ids: Option<String>,
}

/// `GET /?ids=a,b,c` — the aggregation entry point.
async fn news(State(state): State<AppState>, Query(q): Query<NewsQuery>) -> Response {
    let Some(ids) = q.ids.filter(|v| !v.is_empty()) else {
        // The deployed frontend expects this client error with a success
        // status; kept as-is for compatibility.
        return Json(json!({ "error": "Missing ids parameter" })).into_response();
    };

    match state.aggregator.aggregate(&ids).await {
        Ok(payload) => (
            [(
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_ttl_secs),
            )],
            Json(payload),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "aggregation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to fetch news",
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// `GET /sources?category=&tier=&has_rss=` — filtered reference sources.
async fn reference_sources(
    State(state): State<AppState>,
    Query(filter): Query<SourceFilter>,
) -> Json<Vec<ReferenceSource>> {
    Json(state.resolver.get_reference_sources(&filter).await)
}

async fn stats(State(state): State<AppState>) -> Json<SourceStats> {
    Json(state.resolver.get_stats().await)
}
