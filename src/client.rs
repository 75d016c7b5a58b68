use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use thiserror::Error;
use ureq::Agent;

use crate::cache::CacheStore;

/// Attempts per request before a transport failure is surfaced.
const MAX_ATTEMPTS: u32 = 3;

/// Only these statuses are cacheable; 404 is a valid "no data" reply.
const CACHEABLE_STATUSES: &[u16] = &[200, 404];

/// One-time parameters excluded from the cache signature.
const VOLATILE_PARAMS: &[&str] = &["oauth_timestamp", "oauth_nonce", "oauth_signature"];

/// A failed attempt against one source. Always local to a single query;
/// the pipeline turns these into empty contributions.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status code {0}")]
    BadStatus(u16),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A response body plus enough context for the adapter to interpret it.
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
    pub from_cache: bool,
}

/// Per-client counters. Observability only, never behavior-affecting.
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    /// Requests that went over the network.
    pub requests_web: u64,
    /// Requests answered from the persistent cache.
    pub requests_cache: u64,
    /// Reserved; declared by the report format but never incremented.
    pub requests_err: u64,
    /// Total seconds spent waiting for network responses.
    pub time_resp: f64,
    /// Total seconds spent sleeping on the rate limit.
    pub time_wait: f64,
}

/// HTTP client with per-instance rate limiting, transport retries, and a
/// shared persistent response cache.
///
/// The rate limit only governs network traffic: cache hits neither wait nor
/// reset the last-request instant. Each source owns its own client, so
/// throttling is never shared across sources.
pub struct RateLimitedClient {
    agent: Agent,
    cache: Arc<CacheStore>,
    rate_limit: Duration,
    ttl_days: i64,
    last_request: Option<Instant>,
    stats: ClientStats,
}

impl RateLimitedClient {
    pub fn new(
        cache: Arc<CacheStore>,
        rate_limit: Duration,
        ttl_days: i64,
        timeout: Duration,
    ) -> Self {
        let agent = Agent::config_builder()
            .user_agent(crate::USER_AGENT)
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .new_agent();

        Self {
            agent,
            cache,
            rate_limit,
            ttl_days,
            last_request: None,
            stats: ClientStats::default(),
        }
    }

    pub fn stats(&self) -> ClientStats {
        self.stats.clone()
    }

    /// Issue a request, preferring the cache.
    ///
    /// A status outside {200, 404} is an error and is never cached. 404
    /// passes through as a valid reply so adapters can treat it as "no
    /// data" rather than a failure.
    pub fn request(
        &mut self,
        url: &str,
        params: &[(&str, String)],
        method: Method,
    ) -> Result<HttpReply, ProviderError> {
        let signature = cache_signature(method, url, params);

        match self.cache.get(&signature, self.ttl_days) {
            Ok(Some((status, body))) => {
                log::debug!("cache hit: {signature}");
                self.stats.requests_cache += 1;
                return Ok(HttpReply {
                    status,
                    body,
                    from_cache: true,
                });
            }
            Ok(None) => {}
            Err(e) => log::warn!("Cache read failed for {signature}: {e}"),
        }

        self.wait_rate_limit();

        let started = Instant::now();
        let mut response = self.send_with_retries(url, params, method)?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        self.last_request = Some(started);
        self.stats.requests_web += 1;
        self.stats.time_resp += started.elapsed().as_secs_f64();

        if !CACHEABLE_STATUSES.contains(&status) {
            return Err(ProviderError::BadStatus(status));
        }

        if let Err(e) = self.cache.put(&signature, status, &body) {
            log::warn!("Cache write failed for {signature}: {e}");
        }

        Ok(HttpReply {
            status,
            body,
            from_cache: false,
        })
    }

    /// Sleep until the rate-limit deadline computed from the last network
    /// request. A single sleep to a monotonic-clock deadline, no polling.
    fn wait_rate_limit(&mut self) {
        if let Some(last) = self.last_request {
            let deadline = last + self.rate_limit;
            let now = Instant::now();
            if now < deadline {
                let wait = deadline - now;
                self.stats.time_wait += wait.as_secs_f64();
                thread::sleep(wait);
            }
        }
    }

    fn send_with_retries(
        &self,
        url: &str,
        params: &[(&str, String)],
        method: Method,
    ) -> Result<ureq::http::Response<ureq::Body>, ProviderError> {
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let result = match method {
                Method::Get => self
                    .agent
                    .get(url)
                    .query_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
                    .call(),
                Method::Post => self
                    .agent
                    .post(url)
                    .send_form(params.iter().map(|(k, v)| (*k, v.as_str()))),
            };
            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    log::debug!("{url}: attempt {attempt}/{MAX_ATTEMPTS} failed: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(ProviderError::Transport(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

/// Stable identifying key for a request, used for persistent caching.
/// Parameters are sorted and one-time oauth parameters are excluded.
pub fn cache_signature(method: Method, url: &str, params: &[(&str, String)]) -> String {
    let mut kept: Vec<(&str, &str)> = params
        .iter()
        .filter(|(k, _)| !VOLATILE_PARAMS.contains(k))
        .map(|(k, v)| (*k, v.as_str()))
        .collect();
    kept.sort_unstable();

    let query: Vec<String> = kept.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{} {}?{}", method.as_str(), url, query.join("&"))
}

/// Decode a JSON body, mapping parse failure to the provider taxonomy.
pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))
}
