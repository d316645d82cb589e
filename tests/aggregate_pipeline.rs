// tests/aggregate_pipeline.rs
//
// End-to-end aggregation through the real Router, with canned feeds.
//
// Covered (strict):
// - dead feed contributes zero articles without failing its identifier
// - per-politician cap (10) and global cap (50)
// - merged list is globally time-sorted, newest first
// - cache: identical `ids` within TTL return a byte-identical body,
//   original timestamp included; a different id order is a different key

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tokio::time::sleep;
use tower::ServiceExt as _; // for `oneshot`

use political_digest::fetch::FeedFetcher;
use political_digest::{api, AppState, Settings};

const BODY_LIMIT: usize = 1024 * 1024;

const SMITH_ATOM_URL: &str = "https://smith.senate.example.gov/feed.atom";
const SMITH_DEAD_URL: &str = "https://smith.senate.example.gov/old-feed.rss";
const GOVERNOR_RSS_URL: &str = "https://governor.state.example.org/rss";
const CAPITOL_RSS_URL: &str = "https://capitolwire.example.org/rss";

fn feeds_catalog() -> String {
    // Six representatives share the capitol wire feed so a single request can
    // push the merged list past the global cap.
    let mut catalog = format!(
        r#"{{
  "sen-smith": {{
    "name": "Jane Smith", "party": "Democratic", "role": "Senator",
    "feeds": ["{SMITH_ATOM_URL}", "{SMITH_DEAD_URL}"]
  }},
  "gov-price": {{
    "name": "Avery Price", "party": "Democratic", "role": "Governor",
    "feeds": ["{GOVERNOR_RSS_URL}"]
  }}"#
    );
    for n in 1..=6 {
        catalog.push_str(&format!(
            r#",
  "rep-{n}": {{
    "name": "Representative {n}", "party": "Democratic", "role": "Representative",
    "feeds": ["{CAPITOL_RSS_URL}"]
  }}"#
        ));
    }
    catalog.push_str("\n}");
    catalog
}

fn test_router() -> Router {
    let settings = Settings::default();
    let fetcher = Arc::new(FeedFetcher::fixture([
        (settings.feeds_catalog_url(), feeds_catalog()),
        (
            settings.sources_catalog_url(),
            r#"{"sources": []}"#.to_string(),
        ),
        (
            SMITH_ATOM_URL.to_string(),
            include_str!("fixtures/smith_press_atom.xml").to_string(),
        ),
        (
            GOVERNOR_RSS_URL.to_string(),
            include_str!("fixtures/governor_rss.xml").to_string(),
        ),
        (
            CAPITOL_RSS_URL.to_string(),
            include_str!("fixtures/capitol_many_rss.xml").to_string(),
        ),
        // SMITH_DEAD_URL is deliberately absent: it behaves like a 404.
    ]));
    api::router(AppState::with_fetcher(&settings, fetcher))
}

async fn get_news(app: &Router, ids: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(format!("/?ids={ids}"))
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let cache_control = resp
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, cache_control, bytes)
}

fn parse(bytes: &[u8]) -> Json {
    serde_json::from_slice(bytes).expect("parse payload json")
}

#[tokio::test]
async fn dead_feed_contributes_zero_articles_without_failing_the_identifier() {
    let app = test_router();
    let (status, cache_control, bytes) = get_news(&app, "sen-smith").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_control.as_deref(), Some("public, max-age=300"));

    let v = parse(&bytes);
    let politicians = v["politicians"].as_array().unwrap();
    assert_eq!(politicians.len(), 1);
    assert_eq!(politicians[0]["id"], "sen-smith");
    assert!(
        politicians[0].get("error").is_none(),
        "a dead feed is not an identifier-level error"
    );

    // The live Atom feed has exactly 3 usable entries.
    assert_eq!(politicians[0]["articles"].as_array().unwrap().len(), 3);
    assert_eq!(v["articles"].as_array().unwrap().len(), 3);

    let first = &v["articles"][0];
    assert_eq!(first["politicianId"], "sen-smith");
    assert_eq!(first["politicianName"], "Jane Smith");
    assert_eq!(first["politicianParty"], "Democratic");
    assert_eq!(first["politicianRole"], "Senator");
    assert_eq!(first["sourceName"], "Senator Smith Press Office");
}

#[tokio::test]
async fn per_politician_articles_cap_at_ten() {
    let app = test_router();
    let (_, _, bytes) = get_news(&app, "rep-1").await;
    let v = parse(&bytes);

    let articles = v["politicians"][0]["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 10, "12-item feed must cap at 10");
    // Document order is preserved: the fixture lists newest first.
    assert_eq!(articles[0]["title"], "Capitol wire briefing no. 12");
    assert_eq!(articles[9]["title"], "Capitol wire briefing no. 3");
}

#[tokio::test]
async fn merged_articles_are_globally_time_sorted_newest_first() {
    let app = test_router();
    let (_, _, bytes) = get_news(&app, "sen-smith,gov-price").await;
    let v = parse(&bytes);

    let titles: Vec<&str> = v["articles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(
        titles,
        vec![
            "Governor signs budget into law",                // Jul 04 12:00
            "Smith introduces rail safety bill",             // Jul 03 09:00
            "Emergency declaration for river counties",      // Jul 02 18:00
            "Smith & Jones tour flood recovery sites",       // Jul 02 10:30
            "Statement on committee hearing",                // Jul 01 08:00
            "Veterans outreach week announced",              // Jun 30 09:00
        ]
    );
    assert_eq!(v["politicians"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn merged_list_caps_at_fifty_after_sorting() {
    let app = test_router();
    let (_, _, bytes) = get_news(&app, "rep-1,rep-2,rep-3,rep-4,rep-5,rep-6").await;
    let v = parse(&bytes);

    assert_eq!(v["articles"].as_array().unwrap().len(), 50);
    let politicians = v["politicians"].as_array().unwrap();
    assert_eq!(politicians.len(), 6);
    for p in politicians {
        assert_eq!(p["articles"].as_array().unwrap().len(), 10);
    }
}

#[tokio::test]
async fn repeated_request_within_ttl_is_byte_identical() {
    let app = test_router();
    let (_, _, first) = get_news(&app, "sen-smith,gov-price").await;

    // The cache write is fire-and-forget; give it a beat to land.
    sleep(Duration::from_millis(50)).await;

    let (_, _, second) = get_news(&app, "sen-smith,gov-price").await;
    assert_eq!(
        first, second,
        "cached replay must be byte-identical, timestamp included"
    );
}

#[tokio::test]
async fn identifier_order_is_part_of_the_cache_key() {
    let app = test_router();
    let (_, _, ab) = get_news(&app, "sen-smith,gov-price").await;
    sleep(Duration::from_millis(50)).await;
    let (_, _, ba) = get_news(&app, "gov-price,sen-smith").await;

    let v_ab = parse(&ab);
    let v_ba = parse(&ba);
    // Both orders recompute independently; the per-identifier entries follow
    // the requested order, so the payloads differ structurally.
    assert_eq!(v_ab["politicians"][0]["id"], "sen-smith");
    assert_eq!(v_ba["politicians"][0]["id"], "gov-price");
}
