// src/pipeline/mod.rs
pub mod directory;
pub mod gatherer;

pub use directory::{DirectoryOptions, DirectoryPipeline};
pub use gatherer::{CompanyGatherer, GatherOptions, GatheredCompany};
