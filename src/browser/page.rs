// src/browser/page.rs

use once_cell::sync::Lazy;
use scraper::{node::Node, ElementRef, Html, Selector};

use crate::extractors::hierarchy::{MarkerEvent, ORGANIZATION_PATH};
use crate::extractors::location::{is_location_heading, HeadingCandidate};
use crate::utils::error::ExtractError;
use crate::utils::text::collapse_whitespace;

// --- CSS Selectors (Lazy Static) ---
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("Failed to compile BODY_SELECTOR"));

static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6").expect("Failed to compile HEADING_SELECTOR")
});

static ANY_BODY_ELEMENT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body *").expect("Failed to compile ANY_BODY_ELEMENT_SELECTOR"));

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Failed to compile ANCHOR_SELECTOR"));

// Elements that start a new line when the page is read as text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

// Elements whose text never shows on screen.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// HTML captured from the browser after client-side rendering settled.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self { url: url.into(), html: html.into() }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Which elements of the listing page are hierarchy markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSpec {
    pub category_selector: String,
    pub subcategory_selector: String,
    pub link_path: String,
}

impl Default for MarkerSpec {
    fn default() -> Self {
        Self {
            category_selector: ".h2-responsive".to_string(),
            subcategory_selector: ".h2-bold".to_string(),
            link_path: ORGANIZATION_PATH.to_string(),
        }
    }
}

impl MarkerSpec {
    pub fn link_selector(&self) -> String {
        format!("a[href*=\"{}\"]", self.link_path)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Category headings, subcategory headings and organization links in
/// document order. An element matching the category selector is always a
/// category.
pub fn collect_markers(doc: &Html, spec: &MarkerSpec) -> Result<Vec<MarkerEvent>, ExtractError> {
    let category = parse_selector(&spec.category_selector)?;
    let subcategory = parse_selector(&spec.subcategory_selector)?;
    let combined = parse_selector(&format!(
        "{}, {}, {}",
        spec.category_selector,
        spec.subcategory_selector,
        spec.link_selector()
    ))?;

    let events: Vec<MarkerEvent> = doc
        .select(&combined)
        .map(|element| {
            if category.matches(&element) {
                MarkerEvent::Category(inline_text(element))
            } else if subcategory.matches(&element) {
                MarkerEvent::Subcategory(inline_text(element))
            } else {
                MarkerEvent::Link {
                    href: element.value().attr("href").unwrap_or_default().to_string(),
                    text: inline_text(element),
                }
            }
        })
        .collect();

    let links = events.iter().filter(|e| matches!(e, MarkerEvent::Link { .. })).count();
    tracing::info!(
        "Found {} heading markers and {} organization links",
        events.len() - links,
        links
    );
    Ok(events)
}

/// Link-only scan used when marker collection fails.
pub fn organization_links(doc: &Html, link_path: &str) -> Vec<(String, String)> {
    doc.select(&ANCHOR_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            href.contains(link_path)
                .then(|| (href.to_string(), inline_text(a)))
        })
        .collect()
}

/// Visible text of the page body, one rendered line per line.
pub fn page_text(doc: &Html) -> String {
    let root = doc
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| doc.root_element());
    rendered_text(root)
}

/// Headings of a company page with the text that surrounds them. When no
/// heading is a "Location" label, any element whose own text mentions
/// "location" is offered as well.
pub fn heading_candidates(doc: &Html) -> Vec<HeadingCandidate> {
    let mut candidates: Vec<HeadingCandidate> =
        doc.select(&HEADING_SELECTOR).map(candidate_for).collect();

    let has_location_heading = candidates.iter().any(|c| is_location_heading(&c.text));
    if !has_location_heading {
        candidates.extend(
            doc.select(&ANY_BODY_ELEMENT_SELECTOR)
                .filter(|el| !HIDDEN_TAGS.contains(&el.value().name()))
                .filter(|el| own_text(*el).to_lowercase().contains("location"))
                .map(candidate_for),
        );
    }
    candidates
}

fn candidate_for(element: ElementRef<'_>) -> HeadingCandidate {
    HeadingCandidate {
        text: inline_text(element),
        following_text: element
            .next_siblings()
            .find_map(ElementRef::wrap)
            .map(rendered_text)
            .unwrap_or_default(),
        parent_text: element
            .parent()
            .and_then(ElementRef::wrap)
            .map(rendered_text)
            .unwrap_or_default(),
    }
}

/// All descendant text on a single line.
pub fn inline_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Descendant text with a line break at every block element boundary,
/// roughly what a browser shows for `innerText`.
pub fn rendered_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_rendered(element, &mut raw);
    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_rendered(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if HIDDEN_TAGS.contains(&name) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push('\n');
            }
            push_rendered(child_el, out);
            if block {
                out.push('\n');
            }
        } else if let Node::Text(text_node) = child.value() {
            out.push_str(&text_node.text);
        }
    }
}

/// Text nodes directly under the element, ignoring its children's text.
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text_node) => Some(&*text_node.text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <a href="/organizations/orphan">Orphan Org</a>
          <section>
            <h2 class="h2-responsive">Magnetics</h2>
            <div>
              <h3 class="h2-bold">Cryogenic Systems</h3>
              <ul>
                <li><a href="/organizations/cryo-one">Cryo One</a></li>
                <li><a href="/organizations/cryo-two">
                      Cryo   Two
                    </a></li>
              </ul>
            </div>
          </section>
          <h2 class="h2-responsive h2-bold">Fuel Cycle</h2>
          <a href="/about">About</a>
        </body></html>
    "#;

    #[test]
    fn markers_come_out_in_document_order() {
        let doc = Html::parse_document(LISTING);
        let events = collect_markers(&doc, &MarkerSpec::default()).unwrap();

        assert_eq!(
            events,
            vec![
                MarkerEvent::Link { href: "/organizations/orphan".into(), text: "Orphan Org".into() },
                MarkerEvent::Category("Magnetics".into()),
                MarkerEvent::Subcategory("Cryogenic Systems".into()),
                MarkerEvent::Link { href: "/organizations/cryo-one".into(), text: "Cryo One".into() },
                MarkerEvent::Link { href: "/organizations/cryo-two".into(), text: "Cryo Two".into() },
                // category wins when an element carries both classes
                MarkerEvent::Category("Fuel Cycle".into()),
            ]
        );
    }

    #[test]
    fn invalid_selector_fails_collection() {
        let doc = Html::parse_document(LISTING);
        let spec = MarkerSpec { category_selector: "h2[".to_string(), ..MarkerSpec::default() };

        let err = collect_markers(&doc, &spec).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidSelector { ref selector, .. } if selector == "h2["));
    }

    #[test]
    fn link_only_scan_finds_organization_anchors() {
        let doc = Html::parse_document(LISTING);
        let links = organization_links(&doc, ORGANIZATION_PATH);

        assert_eq!(links.len(), 3);
        assert_eq!(links[2], ("/organizations/cryo-two".to_string(), "Cryo Two".to_string()));
    }

    #[test]
    fn rendered_text_breaks_lines_at_blocks_only() {
        let doc = Html::parse_document(
            "<html><head><title>T</title><style>p{}</style></head><body>\
             <div><p>Based in <b>Austin</b>, TX</p><p>Founded 2019</p></div>\
             <script>var x = 1;</script></body></html>",
        );
        assert_eq!(page_text(&doc), "Based in Austin, TX\nFounded 2019");
    }

    #[test]
    fn heading_candidates_capture_sibling_and_parent_text() {
        let doc = Html::parse_document(
            "<body><div class=\"card\"><h4>Location</h4><div>Tel Aviv, Israel</div></div></body>",
        );
        let candidates = heading_candidates(&doc);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].text, "Location");
        assert_eq!(candidates[0].following_text, "Tel Aviv, Israel");
        assert_eq!(candidates[0].parent_text, "Location\nTel Aviv, Israel");
    }

    #[test]
    fn non_heading_location_labels_are_offered_when_no_heading_matches() {
        let doc = Html::parse_document(
            "<body><h1>Freemelt</h1><div><span>Location</span><span>Mölndal, Sweden</span></div></body>",
        );
        let candidates = heading_candidates(&doc);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].text, "Location");
        assert_eq!(candidates[1].following_text, "Mölndal, Sweden");
    }

    #[test]
    fn prose_heading_mentioning_location_does_not_hide_labels() {
        let doc = Html::parse_document(
            "<body><h2>Our Location and Hours</h2><div><span>Location</span><span>Garching, Germany</span></div></body>",
        );
        let candidates = heading_candidates(&doc);

        let label = candidates.iter().find(|c| c.text == "Location").unwrap();
        assert_eq!(label.following_text, "Garching, Germany");
    }
}
