//! Domain models for the ingestion pipeline.

mod catalog;
mod scrape_job;
mod source;

pub use catalog::{CatalogEntry, EntrySource, ExtractedCard};
pub use scrape_job::{JobStatus, ScrapeJob};
pub use source::{ApiSourceConfig, LlmSourceConfig, SelectorConfig, Source, SourceKind};
