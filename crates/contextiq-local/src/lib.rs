//! Local implementation of the contextiq acquisition pipeline.
//!
//! [`Acquirer`] is the source selector: it takes one of three untrusted input
//! sources (typed text, an uploaded file, a remote URL) and produces a single
//! analysis-ready text buffer with its provenance attached. One call, one
//! buffer; nothing is shared between acquisitions.

use contextiq_core::{
    Acquired, ContentSource, Error, HostedExtractor, Result, UploadPolicy, MIN_FILE_TEXT_CHARS,
};
use std::time::Duration;

pub mod dispatch;
pub mod extract;
pub mod llm;
pub mod normalize;
pub mod ocr;
pub mod reduce;
pub mod scrape;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Build the shared HTTP client with browser-like identity and hang-proof
/// defaults. Per-request timeouts (the relay deadline) layer on top.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::ExtractionFailed(e.to_string()))
}

pub struct Acquirer {
    client: reqwest::Client,
    policy: UploadPolicy,
    scrape_cfg: scrape::ScrapeConfig,
    hosted: Option<Box<dyn HostedExtractor>>,
}

impl Acquirer {
    /// Acquirer with environment-derived config: relay overrides applied, and
    /// the hosted extract service attached when its endpoint is configured.
    pub fn from_env() -> Result<Self> {
        let client = http_client()?;
        let hosted = match scrape::HostedScrape::from_env(client.clone()) {
            Ok(h) => Some(Box::new(h) as Box<dyn HostedExtractor>),
            Err(_) => None,
        };
        Ok(Self {
            client,
            policy: UploadPolicy::default(),
            scrape_cfg: scrape::ScrapeConfig::from_env(),
            hosted,
        })
    }

    pub fn new(policy: UploadPolicy, scrape_cfg: scrape::ScrapeConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            policy,
            scrape_cfg,
            hosted: None,
        })
    }

    pub fn with_hosted(mut self, hosted: Box<dyn HostedExtractor>) -> Self {
        self.hosted = Some(hosted);
        self
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Accept typed/pasted text as the buffer.
    pub fn acquire_text(&self, text: &str) -> Result<Acquired> {
        let text = normalize::clean_text(text);
        normalize::ensure_min_chars(&text, MIN_FILE_TEXT_CHARS)?;
        let source = ContentSource::Text;
        let label = source.label();
        Ok(Acquired { text, source, label })
    }

    /// Extract the buffer from an uploaded file.
    pub async fn acquire_file(
        &self,
        name: &str,
        bytes: &[u8],
        progress: Option<ocr::Progress>,
    ) -> Result<Acquired> {
        let text = dispatch::extract_file(&self.policy, name, bytes, progress).await?;
        let source = ContentSource::File {
            name: name.to_string(),
        };
        let label = source.label();
        Ok(Acquired { text, source, label })
    }

    /// Fetch and reduce a webpage into the buffer.
    pub async fn acquire_url(&self, url: &str) -> Result<Acquired> {
        let report = scrape::scrape_url(
            &self.client,
            &self.scrape_cfg,
            self.hosted.as_deref(),
            url,
        )
        .await?;
        tracing::debug!(url, via = %report.via, attempts = report.attempts.len(), "web acquisition done");
        let source = ContentSource::Web {
            url: url.to_string(),
        };
        let label = source.label();
        Ok(Acquired {
            text: report.text,
            source,
            label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn acquirer_with_relays(relays: Vec<scrape::Relay>) -> Acquirer {
        let cfg = scrape::ScrapeConfig {
            relays,
            ..scrape::ScrapeConfig::default()
        };
        Acquirer::new(UploadPolicy::default(), cfg).unwrap()
    }

    #[test]
    fn typed_text_is_normalized_and_tagged_as_manual() {
        let a = acquirer_with_relays(Vec::new());
        let got = a.acquire_text("  hello\r\nworld of text  ").unwrap();
        assert_eq!(got.text, "hello\nworld of text");
        assert_eq!(got.source, ContentSource::Text);
        assert_eq!(got.label, "manual text");
    }

    #[test]
    fn typed_text_below_floor_is_rejected_not_padded() {
        let a = acquirer_with_relays(Vec::new());
        let err = a.acquire_text("   tiny   ").unwrap_err();
        assert!(matches!(err, Error::ContentTooShort { .. }));
    }

    #[tokio::test]
    async fn file_acquisition_carries_the_file_name() {
        let a = acquirer_with_relays(Vec::new());
        let got = a
            .acquire_file("report.txt", b"ten chars plus a little more", None)
            .await
            .unwrap();
        assert_eq!(
            got.source,
            ContentSource::File {
                name: "report.txt".to_string()
            }
        );
        assert_eq!(got.label, "report.txt");
    }

    #[tokio::test]
    async fn url_acquisition_runs_the_relay_chain_end_to_end() {
        let app = Router::new().route(
            "/page",
            get(|| async {
                "<html><body><nav>menu</nav><article>An article body long enough to \
                 clear the fifty character web floor easily.</article></body></html>"
            }),
        );
        let addr = serve(app).await;

        let a = acquirer_with_relays(vec![scrape::Relay::new(
            "local",
            scrape::RelayShape::RawBody,
            &format!("http://{addr}/page?u={{url}}"),
        )]);

        let got = a.acquire_url("https://example.com/story").await.unwrap();
        assert!(got.text.starts_with("An article body"));
        assert!(!got.text.contains("menu"));
        assert_eq!(
            got.source,
            ContentSource::Web {
                url: "https://example.com/story".to_string()
            }
        );
    }

    #[tokio::test]
    async fn failed_url_acquisition_yields_no_buffer() {
        let a = acquirer_with_relays(Vec::new());
        let err = a.acquire_url("https://example.com/").await.unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
    }
}
