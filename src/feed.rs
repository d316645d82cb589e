//! Article extraction from raw RSS/Atom documents.
//!
//! `parse_feed` never fails: irrecoverable input produces an empty list and a
//! warn log, nothing more. Capping is the orchestrator's job; this module
//! reports every article it can find, in document order.

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::{extract_attribute, extract_tag_text, sanitize_text};

pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// One normalized headline from a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    #[serde(rename = "pubDate")]
    pub pub_date: DateTime<Utc>,
    #[serde(rename = "sourceName")]
    pub source_name: String,
}

/// Extracts all articles from a raw feed document.
///
/// Atom `<entry>` blocks are tried first; RSS `<item>` blocks are only
/// consulted when the document contains no Atom entries at all. An Atom
/// article needs a title and a link; an RSS article needs only a title.
/// Records without a parseable date are stamped with the current time
/// rather than dropped.
pub fn parse_feed(xml: &str, feed_url: &str) -> Vec<Article> {
    let t0 = std::time::Instant::now();

    let source_name = channel_title(xml).unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    static RE_ENTRY: OnceCell<Regex> = OnceCell::new();
    let re_entry = RE_ENTRY.get_or_init(|| Regex::new(r"(?is)<entry\b[^>]*>.*?</entry>").unwrap());
    static RE_ITEM: OnceCell<Regex> = OnceCell::new();
    let re_item = RE_ITEM.get_or_init(|| Regex::new(r"(?is)<item\b[^>]*>.*?</item>").unwrap());

    let mut articles = Vec::new();

    let entries: Vec<&str> = re_entry.find_iter(xml).map(|m| m.as_str()).collect();
    if !entries.is_empty() {
        for entry in &entries {
            let title = extract_tag_text(entry, "title").map(|t| sanitize_text(&t));
            let link = extract_tag_text(entry, "link")
                .or_else(|| extract_attribute(entry, "link", "href"))
                .map(|l| sanitize_text(&l));
            let stamp = extract_tag_text(entry, "published")
                .or_else(|| extract_tag_text(entry, "updated"));

            if let (Some(title), Some(link)) = (non_empty(title), non_empty(link)) {
                articles.push(Article {
                    title,
                    link,
                    pub_date: parse_feed_date(stamp.as_deref()).unwrap_or_else(Utc::now),
                    source_name: source_name.clone(),
                });
            }
        }
    } else {
        for item in re_item.find_iter(xml).map(|m| m.as_str()) {
            let title = extract_tag_text(item, "title").map(|t| sanitize_text(&t));
            let link = extract_tag_text(item, "link").map(|l| sanitize_text(&l));
            let stamp = extract_tag_text(item, "pubDate");

            if let Some(title) = non_empty(title) {
                articles.push(Article {
                    title,
                    link: link.unwrap_or_default(),
                    pub_date: parse_feed_date(stamp.as_deref()).unwrap_or_else(Utc::now),
                    source_name: source_name.clone(),
                });
            }
        }
    }

    if articles.is_empty() {
        tracing::debug!(feed_url, "no articles extracted from feed");
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("feed_parse_ms").record(ms);
    counter!("feed_articles_parsed_total").increment(articles.len() as u64);

    articles
}

/// Display name from the first `<title>` inside the first `<channel>`-like
/// block; also accepts a bare feed-root title for Atom documents.
fn channel_title(xml: &str) -> Option<String> {
    static RE_CHANNEL_TITLE: OnceCell<Regex> = OnceCell::new();
    let re = RE_CHANNEL_TITLE
        .get_or_init(|| Regex::new(r"(?is)<(?:channel|feed)\b[^>]*>.*?<title[^>]*>([^<]+)</title>").unwrap());
    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| sanitize_text(m.as_str()))
        .filter(|s| !s.is_empty())
}

/// RFC 2822 (`Tue, 01 Jul 2025 09:00:00 GMT`, the RSS convention) or
/// RFC 3339 (`2025-07-01T09:00:00Z`, the Atom convention) into UTC; anything
/// else counts as absent.
fn parse_feed_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
