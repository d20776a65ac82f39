// src/utils/error.rs
use std::path::PathBuf;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("CDP command failed: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError), // Navigation, evaluate, content capture

    #[error("Failed to load {url}: {reason}")]
    Navigation { url: String, reason: String },
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("GROQ_API_KEY is not set (export it or add it to .env)")]
    MissingApiKey,

    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Model stream reported an error: {0}")]
    Stream(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid CSS selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Browser session failed: {0}")]
    Browser(#[from] BrowserError),

    #[error("Language model request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
