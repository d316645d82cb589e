//! Outbound HTTP for feeds and catalog documents.
//!
//! One shared client carries the request timeout and the digest User-Agent.
//! The fixture mode serves canned bodies keyed by URL so the whole pipeline
//! can run in tests without sockets; a URL absent from the fixture map
//! behaves like a 404.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use metrics::counter;

use crate::config::FEED_USER_AGENT;

pub struct FeedFetcher {
    mode: Mode,
}

enum Mode {
    Http { client: reqwest::Client },
    Fixture(HashMap<String, String>),
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(FEED_USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            mode: Mode::Http { client },
        }
    }

    /// Canned-response fetcher for tests and local runs without a network.
    pub fn fixture<I, K, V>(bodies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = bodies
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            mode: Mode::Fixture(map),
        }
    }

    /// Single best-effort GET; a transport error or non-success status is an
    /// error for the caller to contain. No retries.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        match &self.mode {
            Mode::Http { client } => {
                let resp = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("fetching {url}"))
                    .inspect_err(|_| {
                        counter!("feed_fetch_errors_total").increment(1);
                    })?;
                if !resp.status().is_success() {
                    counter!("feed_fetch_errors_total").increment(1);
                    return Err(anyhow!("{} returned status {}", url, resp.status()));
                }
                resp.text()
                    .await
                    .with_context(|| format!("reading body of {url}"))
            }
            Mode::Fixture(bodies) => bodies.get(url).cloned().ok_or_else(|| {
                counter!("feed_fetch_errors_total").increment(1);
                anyhow!("{url} returned status 404 Not Found")
            }),
        }
    }
}
