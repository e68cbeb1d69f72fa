use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("file too large: {got_mb} MB (maximum {max_mb} MB)")]
    SizeExceeded { got_mb: u64, max_mb: u64 },
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("content too short: {got} chars (minimum {min})")]
    ContentTooShort { got: usize, min: usize },
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("llm failed: {0}")]
    Llm(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Minimum accepted length for text extracted from a file or typed directly.
pub const MIN_FILE_TEXT_CHARS: usize = 10;
/// Minimum accepted length for text reduced from a webpage.
pub const MIN_WEB_TEXT_CHARS: usize = 50;
/// Minimum raw OCR output below which an image counts as having no readable text.
pub const MIN_OCR_TEXT_CHARS: usize = 5;
/// Cap on buffer length when handed to the chat collaborator as context.
pub const CONTEXT_PREVIEW_CHARS: usize = 4000;

/// Provenance of the active text buffer.
///
/// Created when an acquisition populates the buffer and replaced wholesale on
/// each new acquisition, never merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentSource {
    Text,
    File { name: String },
    Web { url: String },
}

impl ContentSource {
    pub fn label(&self) -> String {
        match self {
            ContentSource::Text => "manual text".to_string(),
            ContentSource::File { name } => name.clone(),
            ContentSource::Web { url } => url.clone(),
        }
    }
}

/// One analysis-ready buffer plus its provenance.
///
/// Invariant: `text` is non-empty and at least the minimum floor for its
/// source kind (see the `MIN_*_TEXT_CHARS` constants). Shorter extractions are
/// reported as errors, never truncated or padded into acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acquired {
    pub text: String,
    pub source: ContentSource,
    pub label: String,
}

/// Record of one relay endpoint tried during a web fetch.
///
/// Ephemeral: collected for the duration of a single acquisition so the chain
/// walker can report what it tried; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyAttempt {
    pub endpoint: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Upload gate applied before any extractor runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Maximum upload size in megabytes.
    pub max_upload_mb: u64,
    /// Lowercase extension allow-list. `doc` is recognized separately and
    /// rejected with guidance rather than attempted.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_upload_mb: 15,
            allowed_extensions: [
                "txt", "md", "csv", "rtf", "pdf", "docx", "jpg", "jpeg", "png", "gif", "bmp",
                "webp",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl UploadPolicy {
    pub fn max_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn allows(&self, extension: &str) -> bool {
        let ext = extension.trim().to_ascii_lowercase();
        self.allowed_extensions.iter().any(|e| e == &ext)
    }
}

/// A hosted fetch-and-extract service tried before the public relay chain.
///
/// Invoked with the target URL only; implementations return page content or
/// fail, and any failure sends the caller down the relay fallback chain.
#[async_trait::async_trait]
pub trait HostedExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_allows_documented_extensions() {
        let p = UploadPolicy::default();
        for ext in ["txt", "md", "csv", "rtf", "pdf", "docx", "jpg", "png", "webp"] {
            assert!(p.allows(ext), "expected {ext} to be allowed");
        }
        assert!(p.allows("PDF"), "extension matching must be case-insensitive");
        assert!(!p.allows("doc"), "legacy doc is rejected, not allowed");
        assert!(!p.allows("exe"));
        assert_eq!(p.max_bytes(), 15 * 1024 * 1024);
    }

    #[test]
    fn content_source_serializes_with_kind_tag() {
        let s = ContentSource::Web {
            url: "https://example.com/a".to_string(),
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["kind"], "web");
        assert_eq!(v["url"], "https://example.com/a");

        let file: ContentSource =
            serde_json::from_value(serde_json::json!({"kind": "file", "name": "notes.txt"}))
                .unwrap();
        assert_eq!(file.label(), "notes.txt");
    }

    #[test]
    fn errors_render_short_actionable_messages() {
        let e = Error::SizeExceeded {
            got_mb: 20,
            max_mb: 15,
        };
        assert_eq!(e.to_string(), "file too large: 20 MB (maximum 15 MB)");

        let e = Error::ContentTooShort { got: 9, min: 10 };
        assert_eq!(e.to_string(), "content too short: 9 chars (minimum 10)");
    }
}
