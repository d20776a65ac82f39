// src/extractors/mod.rs
pub mod company;
pub mod hierarchy;
pub mod json_response;
pub mod location;

// Re-export key extraction types for convenience
pub use company::{CompanyRecordBuilder, DirectoryCompany};
pub use hierarchy::{unique_pairs, CategoryPair, HierarchyAttributor};
pub use json_response::{CompanyFields, JsonResponseExtractor};
