// src/extractors/json_response.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::text::truncate_chars;

const PREVIEW_CHARS: usize = 500;

// Shortest fenced block (```json or bare ```) whose body is a JSON array.
static CODE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\[.*?\])\s*```").expect("Failed to compile CODE_BLOCK_RE")
});

/// The seven fields the model is asked to fill for every company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFields {
    pub company_name: String,
    pub website: String,
    pub headquarters: String,
    pub year_founded: String,
    pub core_products: String,
    pub innovations: String,
    pub notes: String,
}

impl CompanyFields {
    /// Re-keys a loosely shaped JSON object onto the fixed schema.
    fn from_object(object: &Map<String, Value>) -> Self {
        let field = |key: &str| object.get(key).map(field_text).unwrap_or_default();
        Self {
            company_name: field("companyName"),
            website: field("website"),
            headquarters: field("headquarters"),
            year_founded: field("yearFounded"),
            core_products: field("coreProducts"),
            innovations: field("innovations"),
            notes: field("notes"),
        }
    }
}

/// Best-effort recovery of company records from a free-text model reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonResponseExtractor;

impl JsonResponseExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Bracketed span first, then a fenced code block. An unreadable reply
    /// yields no records and a warning, never an error.
    pub fn extract(&self, raw: &str) -> Vec<CompanyFields> {
        if let Some(records) = from_bracket_span(raw).filter(|r| !r.is_empty()) {
            return records;
        }
        if let Some(records) = from_code_block(raw).filter(|r| !r.is_empty()) {
            tracing::debug!("Recovered {} records from fenced code block", records.len());
            return records;
        }

        tracing::warn!(
            "No company records could be extracted from model response: {}...",
            truncate_chars(raw, PREVIEW_CHARS)
        );
        Vec::new()
    }
}

/// Everything from the first '[' to the last ']'.
fn from_bracket_span(raw: &str) -> Option<Vec<CompanyFields>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(value) => records_from_value(value),
        Err(e) => {
            tracing::debug!("Bracketed span is not valid JSON: {}", e);
            None
        }
    }
}

fn from_code_block(raw: &str) -> Option<Vec<CompanyFields>> {
    let body = CODE_BLOCK_RE.captures(raw)?.get(1)?.as_str();
    serde_json::from_str::<Value>(body).ok().and_then(records_from_value)
}

fn records_from_value(value: Value) -> Option<Vec<CompanyFields>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_object)
                .map(CompanyFields::from_object)
                .collect(),
        ),
        Value::Object(object) => Some(vec![CompanyFields::from_object(&object)]),
        _ => None,
    }
}

/// Flattens any JSON value into a CSV-friendly cell.
fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .map(field_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_block_defaults_missing_fields() {
        let records = JsonResponseExtractor::new().extract("```json\n[{\"companyName\":\"Acme\"}]\n```");
        assert_eq!(
            records,
            vec![CompanyFields { company_name: "Acme".to_string(), ..Default::default() }]
        );
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(JsonResponseExtractor::new().extract("no structured data here").is_empty());
    }

    #[test]
    fn array_embedded_in_prose() {
        let raw = r#"Here is what I found:
[{"companyName": "Test Company", "website": "https://test.com", "headquarters": "Tel Aviv", "yearFounded": "2020"}]
Let me know if you need more."#;
        let records = JsonResponseExtractor::new().extract(raw);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].company_name, "Test Company");
        assert_eq!(records[0].website, "https://test.com");
        assert_eq!(records[0].headquarters, "Tel Aviv");
        assert_eq!(records[0].year_founded, "2020");
        assert_eq!(records[0].notes, "");
    }

    #[test]
    fn code_block_used_when_bracket_span_is_broken() {
        // Citation brackets around the block make the outer span invalid JSON.
        let raw = "Sources [1] and [2].\n```json\n[{\"companyName\": \"Nova\"}, {\"companyName\": \"Helio\"}]\n```\nSee [3]";
        let records = JsonResponseExtractor::new().extract(raw);

        let names: Vec<_> = records.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(names, vec!["Nova", "Helio"]);
    }

    #[test]
    fn non_string_values_are_flattened() {
        let raw = r#"[{"companyName": "Ion Labs", "yearFounded": 2015, "coreProducts": ["RF sources", "Gyrotrons"], "notes": null, "innovations": {"patents": 3}}]"#;
        let records = JsonResponseExtractor::new().extract(raw);

        assert_eq!(records[0].year_founded, "2015");
        assert_eq!(records[0].core_products, "RF sources; Gyrotrons");
        assert_eq!(records[0].notes, "");
        assert_eq!(records[0].innovations, r#"{"patents":3}"#);
    }

    #[test]
    fn non_object_array_items_are_skipped() {
        let raw = r#"[{"companyName": "A"}, "stray", 42, {"companyName": "B"}]"#;
        let records = JsonResponseExtractor::new().extract(raw);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn single_object_is_wrapped() {
        let value: Value = serde_json::from_str(r#"{"companyName": "Solo", "website": "solo.io"}"#).unwrap();
        let records = records_from_value(value).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].website, "solo.io");
    }

    #[test]
    fn reversed_brackets_are_ignored() {
        assert!(from_bracket_span("] nothing [").is_none());
        assert!(JsonResponseExtractor::new().extract("] nothing [").is_empty());
    }
}
