// src/llm/models.rs
use serde::{Deserialize, Serialize};

/// Body of a streamed chat completion request.
/// Example endpoint: https://api.groq.com/openai/v1/chat/completions
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub top_p: f32,
    pub reasoning_effort: &'a str,
    pub stream: bool,
    pub tools: Vec<Tool<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// Server-side tool enabled for the request, e.g. `browser_search`.
#[derive(Debug, Serialize)]
pub struct Tool<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
}

/// One `data:` payload of the SSE stream.
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamError {
    pub message: String,
}

impl ChatChunk {
    /// Content delta of the first choice, if any.
    pub fn content(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.delta.content)
    }
}
