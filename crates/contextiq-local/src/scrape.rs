//! Web content fetcher: hosted extract service first, then an ordered chain of
//! public relay endpoints.
//!
//! Public relays are individually unreliable (rate limits, blocked agents,
//! response-shape differences), so resilience comes from provider diversity.
//! The chain is strictly sequential: each relay is tried to completion,
//! including parse and HTML reduction, before the next one is contacted, and
//! the first sufficiently long result wins.

use contextiq_core::{Error, HostedExtractor, ProxyAttempt, Result, MIN_WEB_TEXT_CHARS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::reduce;

/// How a relay's response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayShape {
    /// Body is the proxied page itself (HTML or text).
    RawBody,
    /// Body is JSON wrapping the page in a `contents`/`data`/`response` field.
    JsonContents,
}

/// One public relay endpoint: a URL template plus its known response shape.
///
/// Keeping relay quirks in a config record keeps them testable independently
/// of the chain-walking logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relay {
    pub name: String,
    pub shape: RelayShape,
    /// Request template; `{url}` is replaced with the percent-encoded target.
    pub template: String,
}

impl Relay {
    pub fn new(name: &str, shape: RelayShape, template: &str) -> Self {
        Self {
            name: name.to_string(),
            shape,
            template: template.to_string(),
        }
    }

    pub fn request_url(&self, target: &str) -> String {
        self.template
            .replace("{url}", urlencoding::encode(target).as_ref())
    }

    /// Interpret a response body per this relay's shape; `None` means empty.
    pub fn parse_body(&self, body: &str) -> Option<String> {
        match self.shape {
            RelayShape::RawBody => (!body.trim().is_empty()).then(|| body.to_string()),
            RelayShape::JsonContents => {
                let v: serde_json::Value = serde_json::from_str(body).ok()?;
                for field in ["contents", "data", "response"] {
                    if let Some(s) = v.get(field).and_then(|x| x.as_str()) {
                        if !s.trim().is_empty() {
                            return Some(s.to_string());
                        }
                    }
                }
                None
            }
        }
    }
}

/// The ordered public relay chain.
pub fn default_relays() -> Vec<Relay> {
    vec![
        Relay::new("corsproxy", RelayShape::RawBody, "https://corsproxy.io/?{url}"),
        Relay::new(
            "codetabs",
            RelayShape::RawBody,
            "https://api.codetabs.com/v1/proxy?quest={url}",
        ),
        Relay::new(
            "thingproxy",
            RelayShape::RawBody,
            "https://thingproxy.freeboard.io/fetch/{url}",
        ),
        Relay::new(
            "allorigins",
            RelayShape::JsonContents,
            "https://api.allorigins.win/get?url={url}",
        ),
    ]
}

/// Optional relay override: `CONTEXTIQ_RELAYS` holds semicolon-separated
/// `name,shape,template` entries (shape: `raw` or `json`). Malformed entries
/// are skipped; an empty result means "no override".
pub fn relays_from_env() -> Option<Vec<Relay>> {
    let raw = std::env::var("CONTEXTIQ_RELAYS").ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let relays: Vec<Relay> = raw
        .split(';')
        .filter_map(|entry| {
            let mut parts = entry.splitn(3, ',');
            let name = parts.next()?.trim();
            let shape = match parts.next()?.trim() {
                "raw" => RelayShape::RawBody,
                "json" => RelayShape::JsonContents,
                _ => return None,
            };
            let template = parts.next()?.trim();
            if name.is_empty() || !template.contains("{url}") {
                return None;
            }
            Some(Relay::new(name, shape, template))
        })
        .collect();
    (!relays.is_empty()).then_some(relays)
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub relays: Vec<Relay>,
    /// Deadline for each individual relay request. The original pipeline had
    /// none, leaving a stalled relay able to stall the whole chain.
    pub relay_timeout: Duration,
    /// Hard cap on bytes read from a relay response body.
    pub max_body_bytes: u64,
    pub min_text_chars: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            relays: default_relays(),
            relay_timeout: Duration::from_secs(10),
            max_body_bytes: 5_000_000,
            min_text_chars: MIN_WEB_TEXT_CHARS,
        }
    }
}

impl ScrapeConfig {
    /// Default config with the env relay override applied.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(relays) = relays_from_env() {
            cfg.relays = relays;
        }
        cfg
    }
}

/// Hosted fetch-and-extract service client (the primary path).
#[derive(Debug, Clone)]
pub struct HostedScrape {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl HostedScrape {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let endpoint = env("CONTEXTIQ_SCRAPE_ENDPOINT")
            .ok_or_else(|| Error::NotConfigured("missing CONTEXTIQ_SCRAPE_ENDPOINT".to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key: env("CONTEXTIQ_SCRAPE_API_KEY"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct HostedScrapeResponse {
    #[serde(default)]
    content: String,
}

#[async_trait::async_trait]
impl HostedExtractor for HostedScrape {
    async fn extract(&self, url: &str) -> Result<String> {
        let body = serde_json::json!({ "url": url });
        let mut rb = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }
        let resp = rb
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ExtractionFailed(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::ExtractionFailed(format!(
                "hosted extract HTTP {status}"
            )));
        }
        let parsed: HostedScrapeResponse = resp
            .json()
            .await
            .map_err(|e| Error::ExtractionFailed(e.to_string()))?;
        if parsed.content.trim().is_empty() {
            return Err(Error::ExtractionFailed(
                "hosted extract returned no content".to_string(),
            ));
        }
        Ok(parsed.content)
    }
}

/// Outcome of one web acquisition: the reduced text, which path produced it,
/// and the relay attempts made along the way.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub text: String,
    pub via: String,
    pub attempts: Vec<ProxyAttempt>,
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidUrl(format!("unsupported scheme: {other}"))),
    }
}

async fn try_relay(
    client: &reqwest::Client,
    cfg: &ScrapeConfig,
    relay: &Relay,
    endpoint: &str,
) -> std::result::Result<String, String> {
    let resp = client
        .get(endpoint)
        .timeout(cfg.relay_timeout)
        .header(
            reqwest::header::ACCEPT,
            "application/json, text/html, */*",
        )
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }

    // Stream the body under a byte cap so a misbehaving relay cannot balloon
    // memory; truncation past the cap only costs that relay its attempt.
    let max_bytes = cfg.max_body_bytes as usize;
    let mut bytes: Vec<u8> = Vec::new();
    let mut stream = resp.bytes_stream();
    use futures_util::StreamExt;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| format!("body read failed: {e}"))?;
        if bytes.len().saturating_add(chunk.len()) > max_bytes {
            let can_take = max_bytes.saturating_sub(bytes.len());
            bytes.extend_from_slice(&chunk[..can_take]);
            break;
        }
        bytes.extend_from_slice(&chunk);
    }
    let body = String::from_utf8_lossy(&bytes).to_string();
    let html = relay
        .parse_body(&body)
        .ok_or_else(|| "empty response body".to_string())?;

    let text = reduce::html_to_text(&html);
    let got = text.chars().count();
    if got < cfg.min_text_chars {
        return Err(format!("reduced text too short: {got} chars"));
    }
    Ok(text)
}

/// Fetch and reduce page content for `url`.
///
/// Ordered, stop on first success: URL validation (no network on failure),
/// hosted extract service, then each relay in turn. Both network paths share
/// [`reduce::html_to_text`] and the same acceptance floor.
pub async fn scrape_url(
    client: &reqwest::Client,
    cfg: &ScrapeConfig,
    hosted: Option<&dyn HostedExtractor>,
    url: &str,
) -> Result<ScrapeReport> {
    validate_url(url)?;

    let mut attempts: Vec<ProxyAttempt> = Vec::new();

    if let Some(hosted) = hosted {
        match hosted.extract(url).await {
            Ok(content) => {
                let text = reduce::html_to_text(&content);
                if text.chars().count() >= cfg.min_text_chars {
                    return Ok(ScrapeReport {
                        text,
                        via: "hosted".to_string(),
                        attempts,
                    });
                }
                tracing::debug!(url, "hosted extract content too short; trying relays");
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "hosted extract failed; trying relays");
            }
        }
    }

    for relay in &cfg.relays {
        let endpoint = relay.request_url(url);
        match try_relay(client, cfg, relay, &endpoint).await {
            Ok(text) => {
                tracing::debug!(relay = %relay.name, "relay succeeded");
                attempts.push(ProxyAttempt {
                    endpoint,
                    succeeded: true,
                    error: None,
                });
                return Ok(ScrapeReport {
                    text,
                    via: relay.name.clone(),
                    attempts,
                });
            }
            Err(reason) => {
                tracing::debug!(relay = %relay.name, reason = %reason, "relay failed");
                attempts.push(ProxyAttempt {
                    endpoint,
                    succeeded: false,
                    error: Some(reason),
                });
            }
        }
    }

    Err(Error::ExtractionFailed(
        "could not extract content; site may block automated access".to_string(),
    ))
}
