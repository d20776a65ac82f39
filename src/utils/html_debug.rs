// src/utils/html_debug.rs
use chrono::Local;
use regex::Regex;

use crate::browser::MarkerSpec;
use crate::utils::error::ExtractError;

/// Kind of marker a highlighted span belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    Category,
    Subcategory,
    Organization,
}

impl HighlightKind {
    fn css_class(self) -> &'static str {
        match self {
            HighlightKind::Category => "highlight-category",
            HighlightKind::Subcategory => "highlight-subcategory",
            HighlightKind::Organization => "highlight-organization",
        }
    }

    fn label(self) -> &'static str {
        match self {
            HighlightKind::Category => "category",
            HighlightKind::Subcategory => "subcategory",
            HighlightKind::Organization => "organization",
        }
    }
}

/// Wraps each `(start, end, kind)` byte range of `html` in a colored span
/// and returns the escaped source as a standalone page. Ranges overlapping
/// an earlier one are skipped.
pub fn render_highlights(html: &str, highlights: &[(usize, usize, HighlightKind)]) -> String {
    let mut debug_html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n");
    debug_html.push_str("body { font-family: monospace; white-space: pre-wrap; }\n");
    debug_html.push_str(".highlight-category { background-color: #FFFF00; }\n");
    debug_html.push_str(".highlight-subcategory { background-color: #FFA500; }\n");
    debug_html.push_str(".highlight-organization { background-color: #90EE90; }\n");
    debug_html.push_str("</style>\n</head>\n<body>\n");
    debug_html.push_str(&format!(
        "<p><b>Annotated {} at {}</b></p>\n",
        highlights.len(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    let mut sorted = highlights.to_vec();
    sorted.sort_by_key(|h| h.0);

    let mut last_pos = 0;
    for (start, end, kind) in sorted {
        if start < last_pos || end > html.len() || start >= end {
            continue;
        }
        debug_html.push_str(&escape(&html[last_pos..start]));
        debug_html.push_str(&format!(
            "<span class=\"{}\" title=\"Position: {}-{}, Type: {}\">",
            kind.css_class(),
            start,
            end,
            kind.label()
        ));
        debug_html.push_str(&escape(&html[start..end]));
        debug_html.push_str("</span>");
        last_pos = end;
    }
    debug_html.push_str(&escape(&html[last_pos..]));
    debug_html.push_str("\n</body>\n</html>");
    debug_html
}

/// Highlights the opening tags of every category heading, subcategory
/// heading and organization link described by `spec`. Only plain `.class`
/// selectors can be highlighted; others are skipped with a warning.
pub fn annotate_markers(html: &str, spec: &MarkerSpec) -> Result<String, ExtractError> {
    let mut patterns: Vec<(String, HighlightKind)> = Vec::new();
    for (selector, kind) in [
        (&spec.category_selector, HighlightKind::Category),
        (&spec.subcategory_selector, HighlightKind::Subcategory),
    ] {
        match class_tag_pattern(selector) {
            Some(pattern) => patterns.push((pattern, kind)),
            None => tracing::warn!("Cannot highlight non-class selector '{}'", selector),
        }
    }
    patterns.push((
        format!(
            r#"(?i)<a\b[^>]*href\s*=\s*["'][^"']*{}[^"']*["'][^>]*>"#,
            regex::escape(&spec.link_path)
        ),
        HighlightKind::Organization,
    ));

    let mut highlights = Vec::new();
    for (pattern, kind) in &patterns {
        let re = Regex::new(pattern).map_err(|e| ExtractError::InvalidSelector {
            selector: pattern.clone(),
            reason: e.to_string(),
        })?;
        highlights.extend(re.find_iter(html).map(|m| (m.start(), m.end(), *kind)));
    }
    tracing::debug!("Annotating {} marker tags", highlights.len());
    Ok(render_highlights(html, &highlights))
}

// `.some-class` -> opening tag whose class attribute lists `some-class`.
fn class_tag_pattern(selector: &str) -> Option<String> {
    let class = selector.trim().strip_prefix('.')?;
    if class.is_empty()
        || !class.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }
    // `\b` alone would accept `h2-bold` inside `h2-bolder`.
    Some(format!(
        r#"(?i)<[a-z0-9]+[^>]*\bclass\s*=\s*["']([^"']*\s)?{}(\s[^"']*)?["'][^>]*>"#,
        regex::escape(class)
    ))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
