// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::extractors::{CategoryPair, DirectoryCompany};
use crate::pipeline::GatheredCompany;
use crate::utils::error::StorageError;

pub const CATEGORIES_FILE: &str = "fusion_categories.csv";
pub const COMPANIES_FILE: &str = "fusion_companies.csv";
pub const DEBUG_PAGE_FILE: &str = "debug_main_page.html";
pub const ANNOTATED_PAGE_FILE: &str = "debug_main_page_annotated.html";

pub const CATEGORY_COLUMNS: [&str; 2] = ["category", "subcategory"];
pub const DIRECTORY_COLUMNS: [&str; 7] = [
    "category",
    "subcategory",
    "company_name",
    "description",
    "city",
    "state",
    "url",
];
pub const GATHERED_COLUMNS: [&str; 9] = [
    "category",
    "subcategory",
    "companyName",
    "website",
    "headquarters",
    "yearFounded",
    "coreProducts",
    "innovations",
    "notes",
];

/// Output directory of a directory scrape.
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager, creating the base directory if needed
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Writes the category pairs sorted by (category, subcategory). Returns
    /// `None` when there was nothing to write.
    pub fn save_categories(&self, pairs: &[CategoryPair]) -> Result<Option<PathBuf>, StorageError> {
        let mut sorted = pairs.to_vec();
        sorted.sort();
        let path = self.base_dir.join(CATEGORIES_FILE);
        let rows = sorted.iter().map(|p| [p.category.as_str(), p.subcategory.as_str()]);
        write_csv(&path, &CATEGORY_COLUMNS, rows, "categories")
    }

    pub fn save_directory_companies(
        &self,
        companies: &[DirectoryCompany],
    ) -> Result<Option<PathBuf>, StorageError> {
        let path = self.base_dir.join(COMPANIES_FILE);
        let rows = companies.iter().map(DirectoryCompany::to_csv_record);
        write_csv(&path, &DIRECTORY_COLUMNS, rows, "companies")
    }

    /// Saves a debug HTML file under the base directory.
    pub fn save_debug_page(&self, filename: &str, html: &str) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(filename);
        fs::write(&file_path, html).map_err(StorageError::IoError)?;
        tracing::info!("Saved debug HTML to {}", file_path.display());
        Ok(file_path)
    }
}

/// Writes model-gathered companies to `path`, creating its parent directory.
pub fn save_gathered_companies(
    path: &Path,
    companies: &[GatheredCompany],
) -> Result<Option<PathBuf>, StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !companies.is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let rows = companies.iter().map(GatheredCompany::to_csv_record);
    write_csv(path, &GATHERED_COLUMNS, rows, "companies")
}

/// Reads a `category,subcategory` CSV written by `save_categories`.
pub fn read_categories(path: &Path) -> Result<Vec<CategoryPair>, StorageError> {
    if !path.exists() {
        return Err(StorageError::NotFound(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let pairs = reader
        .deserialize::<CategoryPair>()
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!("Loaded {} categories from {}", pairs.len(), path.display());
    Ok(pairs)
}

fn write_csv<'a, I, R>(
    path: &Path,
    columns: &[&str],
    rows: I,
    what: &str,
) -> Result<Option<PathBuf>, StorageError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = &'a str>,
{
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_none() {
        tracing::warn!("No {} to save, skipping {}", what, path.display());
        return Ok(None);
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(columns)?;
    let mut count = 0;
    for row in rows {
        writer.write_record(row)?;
        count += 1;
    }
    writer.flush()?;

    tracing::info!("Saved {} {} to {}", count, what, path.display());
    Ok(Some(path.to_path_buf()))
}
