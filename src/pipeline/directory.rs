// src/pipeline/directory.rs
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::browser::page::{collect_markers, organization_links};
use crate::browser::{MarkerSpec, PageRenderer, LISTING_SETTLE, PAGE_SETTLE};
use crate::extractors::{
    unique_pairs, CategoryPair, CompanyRecordBuilder, DirectoryCompany, HierarchyAttributor,
};
use crate::storage::{StorageManager, ANNOTATED_PAGE_FILE, DEBUG_PAGE_FILE};
use crate::utils::error::{ExtractError, StorageError};
use crate::utils::html_debug;
use crate::utils::text::truncate_chars;

pub const DEFAULT_BASE_URL: &str = "https://www.fusionenergybase.com";
const LISTING_PATH: &str = "/supply-chain";
/// Pause between two company pages.
pub const REQUEST_DELAY: Duration = Duration::from_secs(2);
const RULE: &str = "================================================================================";

#[derive(Debug, Clone)]
pub struct DirectoryOptions {
    pub base_url: String,
    pub markers: MarkerSpec,
    /// Stop once the category pairs are saved.
    pub just_gather_categories: bool,
    /// Also write an annotated copy of the listing page.
    pub debug: bool,
    pub request_delay: Duration,
}

impl DirectoryOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            markers: MarkerSpec::default(),
            just_gather_categories: false,
            debug: false,
            request_delay: REQUEST_DELAY,
        }
    }
}

/// A company page that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageError {
    pub url: String,
    pub error: String,
}

/// Scrapes the supply-chain listing and every company page it links to.
/// Results accumulate on the struct so an interrupted run can still be saved.
pub struct DirectoryPipeline {
    options: DirectoryOptions,
    attributor: HierarchyAttributor,
    builder: CompanyRecordBuilder,
    pub categories: Vec<CategoryPair>,
    pub companies: Vec<DirectoryCompany>,
    pub errors: Vec<PageError>,
}

impl DirectoryPipeline {
    pub fn new(options: DirectoryOptions) -> Result<Self, ExtractError> {
        let attributor = HierarchyAttributor::new(&options.base_url)?;
        Ok(Self {
            options,
            attributor,
            builder: CompanyRecordBuilder::new(),
            categories: Vec::new(),
            companies: Vec::new(),
            errors: Vec::new(),
        })
    }

    pub async fn run<R: PageRenderer + ?Sized>(
        &mut self,
        renderer: &R,
        storage: &StorageManager,
    ) -> Result<(), StorageError> {
        tracing::info!("Starting Fusion Energy Base supply chain scrape");

        // 1. Listing page
        let listing_url = format!("{}{}", self.options.base_url.trim_end_matches('/'), LISTING_PATH);
        tracing::info!("Loading main page: {}", listing_url);
        let listing = match renderer.render(&listing_url, LISTING_SETTLE).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Failed to load main page, aborting: {}", e);
                return Ok(());
            }
        };

        tracing::debug!("Main page rendered from {} ({} bytes)", listing.url, listing.html.len());

        // 2. Debug copies
        match storage.save_debug_page(DEBUG_PAGE_FILE, &listing.html) {
            Ok(_) => tracing::info!("Saved {} for inspection", DEBUG_PAGE_FILE),
            Err(e) => tracing::warn!("Failed to save {}: {}", DEBUG_PAGE_FILE, e),
        }
        if self.options.debug {
            self.save_annotated_listing(&listing.html, storage);
        }

        // 3. Attribution
        let doc = listing.document();
        let links = match collect_markers(&doc, &self.options.markers) {
            Ok(events) => self.attributor.attribute(&events),
            Err(e) => {
                tracing::warn!("Marker collection failed ({}), falling back to link-only scan", e);
                let raw = organization_links(&doc, &self.options.markers.link_path);
                self.attributor.attribute_unscoped(&raw)
            }
        };
        tracing::info!("Found {} company links to process", links.len());

        if links.is_empty() {
            tracing::warn!(
                "No company links found. Check {} to inspect the page structure",
                storage.base_dir().join(DEBUG_PAGE_FILE).display()
            );
            return Ok(());
        }

        // 4. Categories are saved before any company page is visited
        self.categories = unique_pairs(&links);
        tracing::info!("Found {} unique category/subcategory pairs", self.categories.len());
        self.print_category_tree();
        storage.save_categories(&self.categories)?;

        if self.options.just_gather_categories {
            tracing::info!("Category gathering complete");
            return Ok(());
        }

        // 5. Company pages
        let total = links.len();
        tracing::info!("Starting to scrape {} company pages...", total);
        for (idx, link) in links.iter().enumerate() {
            tracing::info!("[{}/{}] Processing: {} ({})", idx + 1, total, link.link_text, link.url);
            tracing::info!("  Category: {}, Subcategory: {}", link.category, link.subcategory);

            match renderer.render(&link.url, PAGE_SETTLE).await {
                Ok(page) => {
                    let company = self.builder.build(link, &page.document());
                    let name = if company.company_name.is_empty() {
                        "Unknown"
                    } else {
                        company.company_name.as_str()
                    };
                    tracing::info!("  Extracted: {}", name);
                    tracing::info!("    Location: {}, {}", company.city, company.state);
                    self.companies.push(company);
                }
                Err(e) => {
                    tracing::warn!("  Failed to extract information: {}", e);
                    self.errors.push(PageError {
                        url: link.url.clone(),
                        error: e.to_string(),
                    });
                }
            }

            tokio::time::sleep(self.options.request_delay).await;
        }

        // 6. Summary
        tracing::info!("Scraping complete");
        tracing::info!("Successfully scraped: {} companies", self.companies.len());
        tracing::info!("Errors encountered: {}", self.errors.len());
        self.print_results();
        self.save_companies(storage)?;
        Ok(())
    }

    /// Writes whatever companies have been collected so far.
    pub fn save_companies(&self, storage: &StorageManager) -> Result<Option<PathBuf>, StorageError> {
        storage.save_directory_companies(&self.companies)
    }

    fn save_annotated_listing(&self, html: &str, storage: &StorageManager) {
        let annotated = match html_debug::annotate_markers(html, &self.options.markers) {
            Ok(annotated) => annotated,
            Err(e) => {
                tracing::warn!("Failed to annotate main page: {}", e);
                return;
            }
        };
        if let Err(e) = storage.save_debug_page(ANNOTATED_PAGE_FILE, &annotated) {
            tracing::warn!("Failed to save {}: {}", ANNOTATED_PAGE_FILE, e);
        }
    }

    /// Categories with their subcategories, both sorted.
    pub fn print_category_tree(&self) {
        println!("\n{}\nCATEGORIES AND SUBCATEGORIES\n{}", RULE, RULE);
        if self.categories.is_empty() {
            println!("No categories were found.");
            return;
        }

        let mut tree: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for pair in &self.categories {
            tree.entry(pair.category.as_str())
                .or_default()
                .push(pair.subcategory.as_str());
        }
        for (category, subcategories) in tree.iter_mut() {
            subcategories.sort_unstable();
            subcategories.dedup();
            println!("\n{}", category);
            for subcategory in subcategories.iter() {
                println!("  └─ {}", subcategory);
            }
        }

        println!("\n{}", RULE);
        println!(
            "Total: {} categories, {} category/subcategory pairs",
            tree.len(),
            self.categories.len()
        );
        println!("{}", RULE);
    }

    pub fn print_results(&self) {
        println!("\n{}\nSCRAPED COMPANIES\n{}", RULE, RULE);
        if self.companies.is_empty() {
            println!("No companies were scraped.");
        }

        for (idx, company) in self.companies.iter().enumerate() {
            let name = if company.company_name.is_empty() {
                "Unknown Company"
            } else {
                company.company_name.as_str()
            };
            println!("\n[{}] {}", idx + 1, name);
            println!("    Category: {}", company.category);
            println!("    Subcategory: {}", company.subcategory);
            println!("    Location: {}, {}", company.city, company.state);
            if !company.description.is_empty() {
                let short = truncate_chars(&company.description, 100);
                if short.len() < company.description.len() {
                    println!("    Description: {}...", short);
                } else {
                    println!("    Description: {}", short);
                }
            }
            println!("    URL: {}", company.url);
        }

        println!("\n{}", RULE);
        println!("Total: {} companies", self.companies.len());
        println!("{}", RULE);

        if !self.errors.is_empty() {
            println!("\nERRORS ENCOUNTERED:");
            println!("{}", "-".repeat(RULE.len()));
            for error in &self.errors {
                println!("  URL: {}", error.url);
                println!("  Error: {}\n", error.error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    use async_trait::async_trait;

    use crate::browser::RenderedPage;
    use crate::storage::{CATEGORIES_FILE, COMPANIES_FILE};
    use crate::utils::error::BrowserError;

    const BASE: &str = "https://fusion.test";

    /// Serves canned HTML by URL; unknown URLs fail to load.
    struct FakeRenderer {
        pages: HashMap<String, String>,
    }

    impl FakeRenderer {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
            }
        }
    }

    #[async_trait(?Send)]
    impl PageRenderer for FakeRenderer {
        async fn render(&self, url: &str, _settle: Duration) -> Result<RenderedPage, BrowserError> {
            self.pages
                .get(url)
                .map(|html| RenderedPage::new(url, html.clone()))
                .ok_or_else(|| BrowserError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                })
        }
    }

    const LISTING: &str = r#"<html><body>
        <h2 class="h2-responsive">Fusion Developers</h2>
        <h3 class="h2-bold">Magnetic Confinement</h3>
        <a href="/organizations/helion">Helion</a>
        <a href="/organizations/ghost">Ghost Co</a>
        <h2 class="h2-responsive">Suppliers</h2>
        <a href="/organizations/helion">Helion again</a>
        <a href="/organizations/vacuum-co">Vacuum Co</a>
    </body></html>"#;

    const HELION: &str = r#"<html><body><h1>Helion Energy</h1>
        <div><h4>Location</h4><div>Everett, WA</div></div></body></html>"#;

    const VACUUM: &str = r#"<html><body><h1>Vacuum Co</h1>
        <p>Location: Austin, TX</p></body></html>"#;

    fn options() -> DirectoryOptions {
        DirectoryOptions { request_delay: Duration::ZERO, ..DirectoryOptions::new(BASE) }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("fusion_directory_pipeline_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn renderer() -> FakeRenderer {
        FakeRenderer::new(&[
            ("https://fusion.test/supply-chain", LISTING),
            ("https://fusion.test/organizations/helion", HELION),
            ("https://fusion.test/organizations/vacuum-co", VACUUM),
        ])
    }

    #[test]
    fn scrapes_listing_and_company_pages() {
        let dir = temp_dir("full");
        let storage = StorageManager::new(&dir).unwrap();
        let mut pipeline = DirectoryPipeline::new(options()).unwrap();

        tokio_test::block_on(pipeline.run(&renderer(), &storage)).unwrap();

        assert_eq!(pipeline.categories.len(), 2);
        assert_eq!(pipeline.companies.len(), 2);
        assert_eq!(pipeline.companies[0].company_name, "Helion Energy");
        assert_eq!(pipeline.companies[0].city, "Everett");
        assert_eq!(pipeline.companies[0].state, "WA");
        assert_eq!(pipeline.companies[1].category, "Suppliers");
        assert_eq!(pipeline.companies[1].subcategory, "Unknown");
        assert_eq!(pipeline.companies[1].state, "TX");
        assert_eq!(
            pipeline.errors,
            vec![PageError {
                url: "https://fusion.test/organizations/ghost".to_string(),
                error: "Failed to load https://fusion.test/organizations/ghost: net::ERR_NAME_NOT_RESOLVED"
                    .to_string(),
            }]
        );

        assert!(dir.join(CATEGORIES_FILE).exists());
        assert!(dir.join(COMPANIES_FILE).exists());
        assert!(dir.join(DEBUG_PAGE_FILE).exists());
        assert!(!dir.join(ANNOTATED_PAGE_FILE).exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn just_gather_categories_stops_after_saving_them() {
        let dir = temp_dir("categories_only");
        let storage = StorageManager::new(&dir).unwrap();
        let mut pipeline = DirectoryPipeline::new(DirectoryOptions {
            just_gather_categories: true,
            debug: true,
            ..options()
        })
        .unwrap();

        tokio_test::block_on(pipeline.run(&renderer(), &storage)).unwrap();

        assert!(pipeline.companies.is_empty());
        let text = fs::read_to_string(dir.join(CATEGORIES_FILE)).unwrap();
        assert_eq!(
            text,
            "category,subcategory\nFusion Developers,Magnetic Confinement\nSuppliers,Unknown\n"
        );
        assert!(dir.join(ANNOTATED_PAGE_FILE).exists());
        assert!(!dir.join(COMPANIES_FILE).exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_selector_falls_back_to_unscoped_links() {
        let dir = temp_dir("fallback");
        let storage = StorageManager::new(&dir).unwrap();
        let mut options = options();
        options.markers.category_selector = "h2[".to_string();
        options.just_gather_categories = true;
        let mut pipeline = DirectoryPipeline::new(options).unwrap();

        tokio_test::block_on(pipeline.run(&renderer(), &storage)).unwrap();

        assert_eq!(
            pipeline.categories,
            vec![CategoryPair { category: "Unknown".into(), subcategory: "Unknown".into() }]
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreachable_listing_ends_the_run_quietly() {
        let dir = temp_dir("unreachable");
        let storage = StorageManager::new(&dir).unwrap();
        let mut pipeline = DirectoryPipeline::new(options()).unwrap();

        tokio_test::block_on(pipeline.run(&FakeRenderer::new(&[]), &storage)).unwrap();

        assert!(pipeline.categories.is_empty());
        assert!(!dir.join(DEBUG_PAGE_FILE).exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
