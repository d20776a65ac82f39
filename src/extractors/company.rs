// src/extractors/company.rs

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::browser::page::{heading_candidates, inline_text, page_text};
use crate::extractors::hierarchy::AttributedLink;
use crate::extractors::location::LocationExtractor;
use crate::utils::text::{collapse_whitespace, truncate_chars};

const DESCRIPTION_MAX_CHARS: usize = 500;
// Only the first few paragraphs are considered; later ones are boilerplate.
const LEADING_PARAGRAPHS: usize = 5;

// --- CSS Selectors (Lazy Static) ---
static H1_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1").expect("Failed to compile H1_SELECTOR"));

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("Failed to compile TITLE_SELECTOR"));

static NAME_CLASS_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[class*="company"], [class*="name"], [class*="title"]"#)
        .expect("Failed to compile NAME_CLASS_SELECTOR")
});

static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("Failed to compile PARAGRAPH_SELECTOR"));

static DESCRIPTION_CLASS_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"p[class*="description"], p[class*="about"], div[class*="description"], div[class*="about"]"#,
    )
    .expect("Failed to compile DESCRIPTION_CLASS_SELECTOR")
});

static META_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="description"]"#)
        .expect("Failed to compile META_DESCRIPTION_SELECTOR")
});

/// One row of the directory output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryCompany {
    pub category: String,
    pub subcategory: String,
    pub company_name: String,
    pub description: String,
    pub city: String,
    pub state: String,
    pub url: String,
}

impl DirectoryCompany {
    pub fn to_csv_record(&self) -> [&str; 7] {
        [
            &self.category,
            &self.subcategory,
            &self.company_name,
            &self.description,
            &self.city,
            &self.state,
            &self.url,
        ]
    }
}

/// Turns a rendered company page into a `DirectoryCompany`. Fields that
/// cannot be found are left empty.
#[derive(Debug, Default)]
pub struct CompanyRecordBuilder {
    locations: LocationExtractor,
}

impl CompanyRecordBuilder {
    pub fn new() -> Self {
        Self { locations: LocationExtractor::new() }
    }

    pub fn build(&self, link: &AttributedLink, doc: &Html) -> DirectoryCompany {
        let location = self
            .locations
            .extract(&page_text(doc), &heading_candidates(doc));
        let (city, state) = location
            .map(|l| (l.city, l.region))
            .unwrap_or_default();

        DirectoryCompany {
            category: link.category.clone(),
            subcategory: link.subcategory.clone(),
            company_name: company_name(doc).unwrap_or_default(),
            description: description(doc).unwrap_or_default(),
            city,
            state,
            url: link.url.clone(),
        }
    }
}

fn plausible_name(text: &str) -> bool {
    let len = text.chars().count();
    len > 2 && len < 200
}

fn company_name(doc: &Html) -> Option<String> {
    if let Some(h1) = doc.select(&H1_SELECTOR).next() {
        let text = inline_text(h1);
        if plausible_name(&text) {
            return Some(text);
        }
    }

    if let Some(title) = doc.select(&TITLE_SELECTOR).next() {
        let text = inline_text(title);
        let text = text.split('|').next().unwrap_or_default().trim();
        if plausible_name(text) {
            return Some(text.to_string());
        }
    }

    doc.select(&NAME_CLASS_SELECTOR)
        .next()
        .map(inline_text)
        .filter(|text| plausible_name(text))
}

fn description(doc: &Html) -> Option<String> {
    let leading = doc
        .select(&PARAGRAPH_SELECTOR)
        .take(LEADING_PARAGRAPHS)
        .map(inline_text)
        .find(|text| {
            let len = text.chars().count();
            len > 30 && len < 1000
        });
    if let Some(text) = leading {
        return Some(truncate_chars(&text, DESCRIPTION_MAX_CHARS).to_string());
    }

    let classed = doc
        .select(&DESCRIPTION_CLASS_SELECTOR)
        .map(inline_text)
        .find(|text| text.chars().count() > 20);
    if let Some(text) = classed {
        return Some(truncate_chars(&text, DESCRIPTION_MAX_CHARS).to_string());
    }

    doc.select(&META_DESCRIPTION_SELECTOR)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|text| !text.is_empty())
        .map(|text| truncate_chars(&text, DESCRIPTION_MAX_CHARS).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> AttributedLink {
        AttributedLink {
            url: "https://fusionindustryassociation.org/organizations/helion".to_string(),
            category: "Fusion Developers".to_string(),
            subcategory: "Magnetic Confinement".to_string(),
            link_text: "Helion".to_string(),
        }
    }

    #[test]
    fn builds_full_record_from_company_page() {
        let doc = Html::parse_document(
            r#"<html><head><title>Helion | FIA</title></head><body>
                 <h1>Helion Energy</h1>
                 <p>Short intro.</p>
                 <p>Helion is building the world's first fusion power plant using pulsed magneto-inertial fusion.</p>
                 <div class="meta"><h4>Location</h4><div>Everett, Washington</div></div>
               </body></html>"#,
        );
        let company = CompanyRecordBuilder::new().build(&link(), &doc);

        assert_eq!(company.company_name, "Helion Energy");
        assert!(company.description.starts_with("Helion is building"));
        assert_eq!(company.city, "Everett");
        assert_eq!(company.state, "WA");
        assert_eq!(company.category, "Fusion Developers");
        assert_eq!(company.subcategory, "Magnetic Confinement");
        assert_eq!(company.url, link().url);
    }

    #[test]
    fn name_falls_back_to_title_before_pipe() {
        let doc = Html::parse_document(
            "<html><head><title> Zap Energy | Fusion Industry Association</title></head><body><h1>ab</h1></body></html>",
        );
        assert_eq!(company_name(&doc).as_deref(), Some("Zap Energy"));
    }

    #[test]
    fn name_falls_back_to_classed_element() {
        let doc = Html::parse_document(
            r#"<body><span class="org-name">Tokamak Energy</span></body>"#,
        );
        assert_eq!(company_name(&doc).as_deref(), Some("Tokamak Energy"));
    }

    #[test]
    fn description_is_truncated_and_falls_back_to_meta() {
        let long = "x".repeat(900);
        let doc = Html::parse_document(&format!("<body><p>{}</p></body>", long));
        assert_eq!(description(&doc).map(|d| d.chars().count()), Some(500));

        let doc = Html::parse_document(
            r#"<html><head><meta name="description" content="Stellarator components supplier"></head><body><p>tiny</p></body></html>"#,
        );
        assert_eq!(description(&doc).as_deref(), Some("Stellarator components supplier"));
    }

    #[test]
    fn missing_fields_stay_empty() {
        let doc = Html::parse_document("<body><div>nothing useful</div></body>");
        let company = CompanyRecordBuilder::new().build(&link(), &doc);

        assert_eq!(company.company_name, "");
        assert_eq!(company.description, "");
        assert_eq!(company.city, "");
        assert_eq!(company.state, "");
    }
}
