// src/pipeline/gatherer.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::extractors::{CompanyFields, JsonResponseExtractor};
use crate::llm::CompletionSource;
use crate::storage::{read_categories, save_gathered_companies};
use crate::utils::error::StorageError;

pub const DEFAULT_CATEGORIES_FILE: &str = "output/fusion_categories.csv";
pub const DEFAULT_OUTPUT_FILE: &str = "output/israeli_companies.csv";
/// Pause between two model queries.
pub const QUERY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct GatherOptions {
    /// Only the first `limit` category rows are queried.
    pub limit: Option<usize>,
    pub query_delay: Duration,
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self { limit: None, query_delay: QUERY_DELAY }
    }
}

/// A company suggested by the model, tagged with the subcategory it was
/// asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatheredCompany {
    pub category: String,
    pub subcategory: String,
    pub fields: CompanyFields,
}

impl GatheredCompany {
    pub fn to_csv_record(&self) -> [&str; 9] {
        [
            &self.category,
            &self.subcategory,
            &self.fields.company_name,
            &self.fields.website,
            &self.fields.headquarters,
            &self.fields.year_founded,
            &self.fields.core_products,
            &self.fields.innovations,
            &self.fields.notes,
        ]
    }
}

/// Deep-search prompt (Hebrew) asking for Israeli companies developing
/// components in `subcategory`, answered as a JSON table of the seven
/// `CompanyFields` keys.
pub fn build_prompt(subcategory: &str) -> String {
    format!(
        "בצע חיפוש עומק, לחברות ישראליות שעוסקות בתחום {subcategory}, חפש גם באנגלית וגם בעברית. \
         שים דגש על חברות המייצרות ומפתחות רכיבים חדשניים בתחום, ולא על חברות המייבאות רכיבים. \
         סכם את הממצאים בטבלת JSON עם השדות: companyName, website, headquarters, yearFounded, \
         coreProducts, innovations, notes"
    )
}

/// Asks the model about every subcategory of the categories CSV.
pub struct CompanyGatherer {
    options: GatherOptions,
    extractor: JsonResponseExtractor,
    pub companies: Vec<GatheredCompany>,
}

impl CompanyGatherer {
    pub fn new(options: GatherOptions) -> Self {
        Self {
            options,
            extractor: JsonResponseExtractor::new(),
            companies: Vec::new(),
        }
    }

    /// Runs one query per category row. Failures of a single query are
    /// logged and skipped; a missing categories file ends the run early.
    pub async fn run<S: CompletionSource + ?Sized>(&mut self, source: &S, categories_file: &Path) {
        tracing::info!("Starting to gather Israeli companies for all subcategories");

        let mut categories = match read_categories(categories_file) {
            Ok(categories) => categories,
            Err(StorageError::NotFound(path)) => {
                tracing::error!(
                    "Categories file not found: {}. Run the scrape first to generate it",
                    path.display()
                );
                return;
            }
            Err(e) => {
                tracing::error!("Failed to read {}: {}", categories_file.display(), e);
                return;
            }
        };
        if categories.is_empty() {
            tracing::error!("No categories found. Run the scrape first to generate categories");
            return;
        }

        if let Some(limit) = self.options.limit {
            categories.truncate(limit);
            tracing::info!("Processing limited to first {} subcategories", limit);
        }

        let total = categories.len();
        tracing::info!("Processing {} subcategories...", total);
        for (idx, pair) in categories.iter().enumerate() {
            tracing::info!("[{}/{}] Processing: {} > {}", idx + 1, total, pair.category, pair.subcategory);

            match source.complete(&build_prompt(&pair.subcategory)).await {
                Ok(answer) => {
                    let found = self.extractor.extract(&answer);
                    tracing::info!("Found {} companies for {}", found.len(), pair.subcategory);
                    self.companies.extend(found.into_iter().map(|fields| GatheredCompany {
                        category: pair.category.clone(),
                        subcategory: pair.subcategory.clone(),
                        fields,
                    }));
                }
                Err(e) => {
                    tracing::error!("Model query for '{}' failed: {}", pair.subcategory, e);
                }
            }

            if idx + 1 < total {
                tokio::time::sleep(self.options.query_delay).await;
            }
        }

        tracing::info!("Gathering complete");
        tracing::info!(
            "Found {} Israeli companies across {} subcategories",
            self.companies.len(),
            total
        );
    }

    pub fn save(&self, output_file: &Path) -> Result<Option<PathBuf>, StorageError> {
        save_gathered_companies(output_file, &self.companies)
    }
}
