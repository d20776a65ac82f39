// src/extractors/location.rs

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::text::{collapse_whitespace, truncate_chars};

// --- Constants ---
// Headings at least this long are prose that happens to mention "location".
const MAX_HEADING_CHARS: usize = 50;
// How much page text after the first "location" the full-text scan looks at.
const SCAN_WINDOW_CHARS: usize = 200;

// --- Lookup Tables (Lazy Static) ---
static US_STATE_CODES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
        "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
        "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
        "VA", "WA", "WV", "WI", "WY", "DC",
    ]
    .into_iter()
    .collect()
});

// Case-sensitive on purpose: region text is matched exactly as written.
static US_STATE_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("Alabama", "AL"), ("Alaska", "AK"), ("Arizona", "AZ"), ("Arkansas", "AR"),
        ("California", "CA"), ("Colorado", "CO"), ("Connecticut", "CT"), ("Delaware", "DE"),
        ("Florida", "FL"), ("Georgia", "GA"), ("Hawaii", "HI"), ("Idaho", "ID"),
        ("Illinois", "IL"), ("Indiana", "IN"), ("Iowa", "IA"), ("Kansas", "KS"),
        ("Kentucky", "KY"), ("Louisiana", "LA"), ("Maine", "ME"), ("Maryland", "MD"),
        ("Massachusetts", "MA"), ("Michigan", "MI"), ("Minnesota", "MN"), ("Mississippi", "MS"),
        ("Missouri", "MO"), ("Montana", "MT"), ("Nebraska", "NE"), ("Nevada", "NV"),
        ("New Hampshire", "NH"), ("New Jersey", "NJ"), ("New Mexico", "NM"), ("New York", "NY"),
        ("North Carolina", "NC"), ("North Dakota", "ND"), ("Ohio", "OH"), ("Oklahoma", "OK"),
        ("Oregon", "OR"), ("Pennsylvania", "PA"), ("Rhode Island", "RI"),
        ("South Carolina", "SC"), ("South Dakota", "SD"), ("Tennessee", "TN"), ("Texas", "TX"),
        ("Utah", "UT"), ("Vermont", "VT"), ("Virginia", "VA"), ("Washington", "WA"),
        ("West Virginia", "WV"), ("Wisconsin", "WI"), ("Wyoming", "WY"),
        ("District of Columbia", "DC"), ("D.C.", "DC"), ("Washington DC", "DC"),
        ("Washington, DC", "DC"),
    ]
    .into_iter()
    .collect()
});

// --- Regex Patterns (Lazy Static) ---
// City and state names are one or two capitalized words on a single line.
const CITY: &str = r"([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)?)";
const STATE_CODE: &str = r"([A-Z]{2})\b";
const STATE_NAME: &str = r"([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)?)\b";
const LABEL: &str = r"Location[:\s]*";

fn compile(pattern: String) -> Regex {
    Regex::new(&pattern).expect("location pattern must compile")
}

/// "Location: City, ST" then "Location: City, StateName".
static LABELLED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(format!(r"{LABEL}{CITY},\s*{STATE_CODE}")),
        compile(format!(r"{LABEL}{CITY},\s*{STATE_NAME}")),
    ]
});

/// "City, ST" then "City, StateName", no label.
static BARE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(format!(r"{CITY},\s*{STATE_CODE}")),
        compile(format!(r"{CITY},\s*{STATE_NAME}")),
    ]
});

static LOCATION_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)location").expect("Failed to compile LOCATION_WORD_RE"));

// --- Data Structures ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationMatch {
    pub city: String,
    pub region: String,
}

/// A heading-like element of a company page and the text around it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadingCandidate {
    pub text: String,
    /// Text of the immediately following sibling element.
    pub following_text: String,
    /// Line-broken text of the heading's parent element.
    pub parent_text: String,
}

/// A single way of reading a location out of a block of text.
type Strategy = fn(&str) -> Option<LocationMatch>;

/// Text gathered right under a "Location" heading is usually just the location.
const ANCHORED_STRATEGIES: &[Strategy] = &[match_us_patterns, split_on_comma];

/// The full-text window is noisier, so only the labelled form may carry a
/// non-US region.
const FULL_TEXT_STRATEGIES: &[Strategy] = &[match_labelled, match_bare_us];

// --- Extractor ---
#[derive(Debug, Default, Clone, Copy)]
pub struct LocationExtractor;

impl LocationExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Finds the company's city and region. Tries text anchored on a
    /// "Location" heading first, then a window after the first mention of
    /// "location" anywhere on the page.
    pub fn extract(&self, page_text: &str, candidates: &[HeadingCandidate]) -> Option<LocationMatch> {
        self.from_headings(candidates)
            .or_else(|| self.from_page_text(page_text))
    }

    fn from_headings(&self, candidates: &[HeadingCandidate]) -> Option<LocationMatch> {
        candidates
            .iter()
            .filter(|c| is_location_heading(&c.text))
            .find_map(|candidate| {
                let gathered = gather_anchored_text(candidate)?;
                tracing::trace!("Location heading found, gathered text: '{}'", gathered);
                run_strategies(ANCHORED_STRATEGIES, &gathered)
            })
    }

    fn from_page_text(&self, page_text: &str) -> Option<LocationMatch> {
        let start = LOCATION_WORD_RE.find(page_text)?.start();
        let window = truncate_chars(&page_text[start..], SCAN_WINDOW_CHARS);
        tracing::trace!("Scanning page text window: '{}'", window);
        run_strategies(FULL_TEXT_STRATEGIES, window)
    }
}

fn run_strategies(strategies: &[Strategy], text: &str) -> Option<LocationMatch> {
    strategies.iter().find_map(|strategy| strategy(text))
}

/// Exactly "Location" (case-insensitive, trailing colon allowed) and short.
pub fn is_location_heading(text: &str) -> bool {
    let normalized = collapse_whitespace(text).to_lowercase();
    normalized.chars().count() < MAX_HEADING_CHARS
        && normalized.trim_end_matches(':').trim_end() == "location"
}

/// The following sibling's text, or else the first non-empty line after a
/// "Location" line inside the parent block.
fn gather_anchored_text(candidate: &HeadingCandidate) -> Option<String> {
    let following = candidate.following_text.trim();
    if !following.is_empty() {
        return Some(following.to_string());
    }

    let mut lines = candidate
        .parent_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());
    lines.find(|line| line.eq_ignore_ascii_case("location"))?;
    lines.next().map(str::to_string)
}

// --- Strategies ---

/// First of the four patterns whose region is a US state (code or name).
fn match_us_patterns(text: &str) -> Option<LocationMatch> {
    LABELLED_PATTERNS
        .iter()
        .chain(BARE_PATTERNS.iter())
        .find_map(|re| first_capture(re, text).and_then(|(city, raw)| us_match(city, raw)))
}

fn match_bare_us(text: &str) -> Option<LocationMatch> {
    BARE_PATTERNS
        .iter()
        .find_map(|re| first_capture(re, text).and_then(|(city, raw)| us_match(city, raw)))
}

/// Labelled patterns. A non-US region is kept as its first word only, the
/// capture may run into the next word on the same line.
fn match_labelled(text: &str) -> Option<LocationMatch> {
    LABELLED_PATTERNS.iter().find_map(|re| {
        let (city, raw) = first_capture(re, text)?;
        let region = match us_state_code(raw) {
            Some(code) => code.to_string(),
            None => raw.split_whitespace().next()?.to_string(),
        };
        Some(LocationMatch { city: city.to_string(), region })
    })
}

/// Generic "City, Country" reading of the first line holding a comma.
fn split_on_comma(text: &str) -> Option<LocationMatch> {
    let line = text.lines().find(|line| line.contains(','))?;
    let (city, region) = line.split_once(',')?;
    let city = city.trim();
    if city.is_empty() {
        return None;
    }
    Some(LocationMatch {
        city: city.to_string(),
        region: normalize_region(region.trim()),
    })
}

// --- Helpers ---

fn first_capture<'t>(re: &Regex, text: &'t str) -> Option<(&'t str, &'t str)> {
    let caps = re.captures(text)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

fn us_match(city: &str, raw_region: &str) -> Option<LocationMatch> {
    us_state_code(raw_region).map(|code| LocationMatch {
        city: city.to_string(),
        region: code.to_string(),
    })
}

/// Two-letter code or full state name to its postal code. A two-word capture
/// such as "Texas Instruments" falls back to its first word.
fn us_state_code(raw: &str) -> Option<&'static str> {
    let raw = raw.trim();
    if raw.len() == 2 {
        let upper = raw.to_ascii_uppercase();
        if let Some(code) = US_STATE_CODES.get(upper.as_str()) {
            return Some(*code);
        }
    }
    if let Some(code) = US_STATE_NAMES.get(raw) {
        return Some(*code);
    }
    let first_word = raw.split_whitespace().next()?;
    if first_word != raw {
        return US_STATE_NAMES.get(first_word).copied();
    }
    None
}

/// US regions become postal codes, anything else is kept as written.
fn normalize_region(raw: &str) -> String {
    let raw = raw.trim();
    match us_state_code(raw) {
        Some(code) => code.to_string(),
        None => raw.to_string(),
    }
}
