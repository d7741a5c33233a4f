//! Mirror reachability and latency probing.
//!
//! Each probe is one bounded-timeout GET against the mirror's index URL.
//! Anything other than a 200 within the timeout counts as unreachable and
//! sorts last. Probing is sequential; a handful of mirrors at a 5 second
//! timeout is bounded at tens of seconds worst case, which is why callers
//! deliver results through an event rather than blocking the session.

use serde::Serialize;
use std::time::{Duration, Instant};

/// One mirror's probe result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorLatency {
    pub name: String,
    pub url: String,

    /// Round-trip time of the probe; `None` when unreachable or non-200.
    pub latency: Option<Duration>,
}

impl MirrorLatency {
    /// Latency in whole milliseconds, `None` when unreachable.
    pub fn latency_ms(&self) -> Option<u128> {
        self.latency.map(|d| d.as_millis())
    }

    fn sort_key(&self) -> u128 {
        self.latency_ms().unwrap_or(u128::MAX)
    }
}

/// Build the probing HTTP client.
pub fn build_client(timeout: Duration) -> Option<reqwest::blocking::Client> {
    match reqwest::blocking::Client::builder()
        .user_agent("cairn")
        .timeout(timeout)
        .build()
    {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::error!("failed to build probe client: {}", e);
            None
        }
    }
}

/// Probe one URL, returning the round-trip time of a 200 response.
pub fn probe_url(client: &reqwest::blocking::Client, url: &str) -> Option<Duration> {
    let start = Instant::now();
    match client.get(url).send() {
        Ok(response) if response.status().as_u16() == 200 => Some(start.elapsed()),
        Ok(response) => {
            tracing::warn!("probe of {} returned {}", url, response.status());
            None
        }
        Err(e) => {
            tracing::warn!("probe of {} failed: {}", url, e);
            None
        }
    }
}

/// Probe every mirror sequentially; results ascending by latency,
/// unreachable mirrors last.
pub fn probe_all(mirrors: &[(String, String)], timeout: Duration) -> Vec<MirrorLatency> {
    let Some(client) = build_client(timeout) else {
        return mirrors
            .iter()
            .map(|(name, url)| MirrorLatency {
                name: name.clone(),
                url: url.clone(),
                latency: None,
            })
            .collect();
    };

    let mut results: Vec<MirrorLatency> = mirrors
        .iter()
        .map(|(name, url)| MirrorLatency {
            name: name.clone(),
            url: url.clone(),
            latency: probe_url(&client, url),
        })
        .collect();

    results.sort_by_key(MirrorLatency::sort_key);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn probe_reachable_mirror_reports_latency() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/simple");
            then.status(200).body("ok");
        });

        let client = build_client(Duration::from_secs(2)).unwrap();
        let latency = probe_url(&client, &server.url("/simple"));
        assert!(latency.is_some());
    }

    #[test]
    fn probe_non_200_is_unreachable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/simple");
            then.status(503);
        });

        let client = build_client(Duration::from_secs(2)).unwrap();
        assert!(probe_url(&client, &server.url("/simple")).is_none());
    }

    #[test]
    fn probe_connection_refused_is_unreachable() {
        let client = build_client(Duration::from_millis(500)).unwrap();
        // Port 9 (discard) is almost certainly closed
        assert!(probe_url(&client, "http://127.0.0.1:9/simple").is_none());
    }

    #[test]
    fn probe_all_sorts_unreachable_last() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/up");
            then.status(200);
        });

        let mirrors = vec![
            ("down".to_string(), "http://127.0.0.1:9/simple".to_string()),
            ("up".to_string(), server.url("/up")),
        ];

        let results = probe_all(&mirrors, Duration::from_millis(800));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "up");
        assert!(results[0].latency.is_some());
        assert_eq!(results[1].name, "down");
        assert!(results[1].latency.is_none());
    }

    #[test]
    fn latency_ms_is_none_when_unreachable() {
        let result = MirrorLatency {
            name: "x".into(),
            url: "http://x".into(),
            latency: None,
        };
        assert_eq!(result.latency_ms(), None);
    }
}
