// src/llm/mod.rs
pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::utils::error::LlmError;

pub use client::{GroqClient, DEFAULT_MODEL};

/// Anything that can answer a single free-text prompt.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Returns the full answer once the model has finished producing it.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
