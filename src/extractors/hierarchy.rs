// src/extractors/hierarchy.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::error::ExtractError;

/// Label used when no category or subcategory marker precedes a link.
pub const UNKNOWN: &str = "Unknown";

/// Path segment that identifies an organization detail page.
pub const ORGANIZATION_PATH: &str = "/organizations/";

// --- Data Structures ---

/// One recognized element of the listing page, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerEvent {
    Category(String),
    Subcategory(String),
    Link { href: String, text: String },
}

/// An organization link labelled with the headings that scope it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedLink {
    pub url: String,
    pub category: String,
    pub subcategory: String,
    pub link_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryPair {
    pub category: String,
    pub subcategory: String,
}

// --- Attributor ---

/// Rebuilds the category -> subcategory -> link hierarchy of the listing page
/// from a flat marker stream.
pub struct HierarchyAttributor {
    base_url: Url,
}

impl HierarchyAttributor {
    pub fn new(base_url: &str) -> Result<Self, ExtractError> {
        let base_url =
            Url::parse(base_url).map_err(|_| ExtractError::InvalidBaseUrl(base_url.to_string()))?;
        Ok(Self { base_url })
    }

    /// Labels every organization link with the nearest preceding category and
    /// subcategory. A category marker closes the previous subcategory scope.
    /// Output is deduplicated by URL, first occurrence wins.
    pub fn attribute(&self, events: &[MarkerEvent]) -> Vec<AttributedLink> {
        let mut current_category: &str = UNKNOWN;
        let mut current_subcategory: &str = UNKNOWN;
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for event in events {
            match event {
                MarkerEvent::Category(text) => {
                    current_category = text.as_str();
                    current_subcategory = UNKNOWN;
                }
                MarkerEvent::Subcategory(text) => current_subcategory = text.as_str(),
                MarkerEvent::Link { href, text } => {
                    if let Some(link) =
                        self.link(href, text, current_category, current_subcategory)
                    {
                        if seen.insert(link.url.clone()) {
                            links.push(link);
                        }
                    }
                }
            }
        }

        tracing::debug!("Attributed {} unique links from {} markers", links.len(), events.len());
        links
    }

    /// Degraded mode for when marker collection failed: every organization
    /// link gets Unknown/Unknown. Same filtering and dedup as `attribute`.
    pub fn attribute_unscoped(&self, links: &[(String, String)]) -> Vec<AttributedLink> {
        let mut seen = HashSet::new();
        links
            .iter()
            .filter_map(|(href, text)| self.link(href, text, UNKNOWN, UNKNOWN))
            .filter(|link| seen.insert(link.url.clone()))
            .collect()
    }

    fn link(&self, href: &str, text: &str, category: &str, subcategory: &str) -> Option<AttributedLink> {
        let text = text.trim();
        if text.is_empty() || !href.contains(ORGANIZATION_PATH) {
            return None;
        }
        let url = self.resolve(href)?;
        Some(AttributedLink {
            url,
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            link_text: text.to_string(),
        })
    }

    /// Site-relative hrefs are joined onto the base URL, absolute http(s)
    /// hrefs pass through, anything else is dropped.
    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.starts_with('/') {
            self.base_url.join(href).ok().map(String::from)
        } else if href.starts_with("http://") || href.starts_with("https://") {
            Some(href.to_string())
        } else {
            None
        }
    }
}

/// Unique (category, subcategory) pairs in first-seen order.
pub fn unique_pairs(links: &[AttributedLink]) -> Vec<CategoryPair> {
    let mut seen = HashSet::new();
    links
        .iter()
        .map(|link| CategoryPair {
            category: link.category.clone(),
            subcategory: link.subcategory.clone(),
        })
        .filter(|pair| seen.insert(pair.clone()))
        .collect()
}
