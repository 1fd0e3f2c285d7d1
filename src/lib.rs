//! cardharvest - catalog scraping and image mirroring pipeline.
//!
//! Pulls card listings from third-party sites, extracts structured records
//! with a generative model, mirrors card images into owned object storage,
//! and upserts the results into the catalog database.

#![allow(clippy::should_implement_trait)]

pub mod cli;
pub mod config;
pub mod http_client;
pub mod images;
pub mod llm;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod storage;
pub mod utils;
