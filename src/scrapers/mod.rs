//! Scrape orchestration.
//!
//! [`CatalogScraper`] runs sources one at a time. Each run is recorded in the
//! job log, images are mirrored sequentially through a shared limiter, and
//! cards are upserted into the catalog. Failures never escape a source run.

mod mirror;
mod orchestrator;

pub use mirror::{CardImageMirror, ImageMirrorPipeline, MirrorError};
pub use orchestrator::{CatalogScraper, RunPhase, ScrapeError, ScrapeResult};
