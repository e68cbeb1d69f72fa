//! Chat-completions collaborator: summarize, analyze, and converse over the
//! acquired buffer.
//!
//! This is deliberately thin glue around an OpenAI-compatible endpoint; the
//! pipeline's only obligation toward it is delivering a normalized buffer,
//! capped when used as conversational context.

use contextiq_core::{Error, Result, CONTEXT_PREVIEW_CHARS};
use serde::{Deserialize, Serialize};

use crate::normalize;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Sentiment / themes / keywords produced by the analyze operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Analysis {
    pub sentiment: String,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Analysis {
    /// Fallback when the model returns something unparseable.
    fn neutral() -> Self {
        Self {
            sentiment: "neutral".to_string(),
            themes: vec!["general".to_string()],
            keywords: vec!["text".to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatClient {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let base_url = env("CONTEXTIQ_LLM_BASE_URL")
            .ok_or_else(|| Error::NotConfigured("missing CONTEXTIQ_LLM_BASE_URL".to_string()))?;
        let model = env("CONTEXTIQ_LLM_MODEL")
            .ok_or_else(|| Error::NotConfigured("missing CONTEXTIQ_LLM_MODEL".to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key: env("CONTEXTIQ_LLM_API_KEY"),
            model,
        })
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn chat_completion(
        &self,
        messages: Vec<Message>,
        max_tokens: Option<u64>,
        temperature: Option<f64>,
    ) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
            temperature,
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Llm(status_error_message(status.as_u16(), &body)));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    /// Concise summary of the buffer (under ~150 words).
    pub async fn summarize(&self, text: &str) -> Result<String> {
        let messages = vec![
            Message::new(
                "system",
                "You are a helpful assistant that creates concise, clear summaries of text. \
                 Focus on key points and main ideas. Keep summaries under 150 words.",
            ),
            Message::new(
                "user",
                format!("Please summarize the following text:\n\n{text}"),
            ),
        ];
        self.chat_completion(messages, None, None).await
    }

    /// Sentiment / themes / keywords analysis of the buffer.
    pub async fn analyze(&self, text: &str) -> Result<Analysis> {
        let messages = vec![
            Message::new(
                "system",
                "You are an AI text analyzer. Analyze the given text and provide: \
                 1) Overall sentiment (positive/negative/neutral/mixed), 2) Key themes/topics, \
                 3) Main keywords. Respond with a JSON object only.",
            ),
            Message::new(
                "user",
                format!(
                    "Analyze this text and return a JSON object with \"sentiment\", \
                     \"themes\" (array), and \"keywords\" (array):\n\n{text}"
                ),
            ),
        ];
        let content = self.chat_completion(messages, None, None).await?;
        Ok(parse_analysis(&content).unwrap_or_else(Analysis::neutral))
    }

    /// One Q&A turn grounded in the acquired buffer (capped as context).
    pub async fn chat(
        &self,
        message: &str,
        context: Option<&str>,
        history: &[Message],
    ) -> Result<String> {
        let system = match context {
            Some(ctx) => format!(
                "You are ContextIQ, a helpful AI assistant that answers questions about \
                 content. Here is the context to reference:\n\n{}\n\nProvide clear, concise \
                 answers based on the context and conversation history.",
                normalize::context_preview(ctx, CONTEXT_PREVIEW_CHARS)
            ),
            None => "You are ContextIQ, a helpful AI assistant. Answer questions helpfully \
                     and accurately."
                .to_string(),
        };

        let mut messages = vec![Message::new("system", system)];
        messages.extend(history.iter().cloned());
        messages.push(Message::new("user", message));
        self.chat_completion(messages, Some(1000), Some(0.7)).await
    }
}

/// Parse the model's analysis JSON, tolerating markdown code fences.
fn parse_analysis(content: &str) -> Option<Analysis> {
    let trimmed = content.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(inner.trim()).ok()
}

fn status_error_message(status: u16, body: &str) -> String {
    match status {
        429 if body.contains("quota") => {
            "api quota exceeded; check your provider billing".to_string()
        }
        429 => "api rate limit reached; wait a moment and try again".to_string(),
        401 => "invalid api key; check CONTEXTIQ_LLM_API_KEY".to_string(),
        400 => format!("invalid request: HTTP 400 {}", body.trim()),
        _ => format!("chat.completions HTTP {status}"),
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}
