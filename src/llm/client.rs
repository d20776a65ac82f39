// src/llm/client.rs
use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::llm::models::{ChatChunk, ChatMessage, ChatRequest, Tool};
use crate::llm::CompletionSource;
use crate::utils::error::LlmError;

pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";
// Web-search-backed answers routinely take minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_COMPLETION_TOKENS: u32 = 8192;

/// Streaming client for Groq's OpenAI-compatible chat completions.
pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    echo: bool,
}

impl GroqClient {
    /// Reads `GROQ_API_KEY` (and optionally `GROQ_BASE_URL`) from the
    /// environment. `echo` mirrors the streamed answer to stdout.
    pub fn from_env(model: &str, echo: bool) -> Result<Self, LlmError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        let endpoint = std::env::var("GROQ_BASE_URL")
            .map(|base| format!("{}/chat/completions", base.trim_end_matches('/')))
            .unwrap_or_else(|_| GROQ_CHAT_URL.to_string());

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        tracing::debug!("Using model {} at {}", model, endpoint);
        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            endpoint,
            echo,
        })
    }
}

#[async_trait]
impl CompletionSource for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: 1.0,
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            top_p: 1.0,
            reasoning_effort: "medium",
            stream: true,
            tools: vec![Tool { kind: "browser_search" }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            tracing::error!("HTTP error status: {} from {}", status, self.endpoint);
            return Err(LlmError::Http { status, body });
        }

        let mut stream = response.bytes_stream();
        let mut reader = SseReader::default();
        while let Some(chunk) = stream.next().await {
            for delta in reader.feed(&chunk?)? {
                self.echo_delta(&delta);
            }
            if reader.is_done() {
                break;
            }
        }
        for delta in reader.finish()? {
            self.echo_delta(&delta);
        }
        if self.echo {
            println!();
        }

        let text = reader.into_text();
        tracing::debug!("Model answered with {} characters", text.chars().count());
        Ok(text)
    }
}

impl GroqClient {
    fn echo_delta(&self, delta: &str) {
        if self.echo {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(delta.as_bytes()).ok();
            stdout.flush().ok();
        }
    }
}

/// Incremental reader for an SSE body of chat completion chunks.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across network chunks are decoded intact.
#[derive(Debug, Default)]
pub struct SseReader {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl SseReader {
    /// Consumes raw bytes, returning the content deltas completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, LlmError> {
        self.pending.extend_from_slice(bytes);
        let mut deltas = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(delta) = self.line(&String::from_utf8_lossy(&line))? {
                deltas.push(delta);
            }
        }
        Ok(deltas)
    }

    /// Flushes a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Result<Vec<String>, LlmError> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let line = std::mem::take(&mut self.pending);
        Ok(self.line(&String::from_utf8_lossy(&line))?.into_iter().collect())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn into_text(self) -> String {
        self.text
    }

    fn line(&mut self, line: &str) -> Result<Option<String>, LlmError> {
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        let Some(payload) = line.strip_prefix("data:") else {
            // blank separators, comments and event/id fields
            return Ok(None);
        };
        let payload = payload.trim();
        if self.done || payload.is_empty() {
            return Ok(None);
        }
        if payload == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: ChatChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("Skipping unreadable stream chunk: {}", e);
                return Ok(None);
            }
        };
        if let Some(error) = chunk.error {
            return Err(LlmError::Stream(error.message));
        }
        match chunk.content() {
            Some(delta) if !delta.is_empty() => {
                self.text.push_str(&delta);
                Ok(Some(delta))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "index": 0, "delta": { "content": content } }] })
        )
    }

    #[test]
    fn concatenates_deltas_until_done() {
        let mut reader = SseReader::default();
        let body = format!(
            "{}{}: keep-alive\n\n{}data: [DONE]\n\n{}",
            data("[{\"companyName\": \"Test Company\""),
            data(", \"headquarters\": \"Tel Aviv\"}]"),
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            data("ignored after done"),
        );

        let deltas = reader.feed(body.as_bytes()).unwrap();
        assert_eq!(deltas.len(), 2);
        assert!(reader.is_done());
        assert_eq!(
            reader.into_text(),
            "[{\"companyName\": \"Test Company\", \"headquarters\": \"Tel Aviv\"}]"
        );
    }

    #[test]
    fn multibyte_text_split_across_chunks() {
        let mut reader = SseReader::default();
        let line = data("חברות ישראליות");
        let bytes = line.as_bytes();
        // split inside the first Hebrew letter
        let cut = line.find('ח').unwrap() + 1;

        assert!(reader.feed(&bytes[..cut]).unwrap().is_empty());
        assert_eq!(reader.feed(&bytes[cut..]).unwrap(), vec!["חברות ישראליות".to_string()]);
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        let mut reader = SseReader::default();
        let line = data("tail");
        reader.feed(line.trim_end().as_bytes()).unwrap();
        assert_eq!(reader.finish().unwrap(), vec!["tail".to_string()]);
    }

    #[test]
    fn error_payload_fails_the_stream() {
        let mut reader = SseReader::default();
        let err = reader
            .feed(b"data: {\"error\":{\"message\":\"rate limit reached\"}}\n")
            .unwrap_err();
        assert!(matches!(err, LlmError::Stream(ref m) if m == "rate limit reached"));
    }

    #[test]
    fn request_body_carries_search_tool() {
        let body = ChatRequest {
            model: DEFAULT_MODEL,
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: 1.0,
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            top_p: 1.0,
            reasoning_effort: "medium",
            stream: true,
            tools: vec![Tool { kind: "browser_search" }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["tools"][0]["type"], "browser_search");
        assert_eq!(json["max_completion_tokens"], 8192);
        assert_eq!(json["stream"], true);
    }
}
