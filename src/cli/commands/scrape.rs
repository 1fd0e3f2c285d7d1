//! Scrape command.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use console::style;

use super::super::helpers::{card_extractor, http_client, open_database, page_fetcher};
use crate::config::Settings;
use crate::images::{ImageProcessor, ProcessOptions};
use crate::llm::CardExtractor;
use crate::rate_limit::RateLimiter;
use crate::repository::{AsyncSqlitePool, DieselCatalogRepository, DieselSourceRepository};
use crate::scrapers::{CatalogScraper, ImageMirrorPipeline, ScrapeResult};
use crate::storage::{ObjectMirror, S3ObjectStore};

/// Scrape the given sources, or every active source when none are named.
pub async fn cmd_scrape(settings: &Settings, source_ids: &[String]) -> anyhow::Result<ExitCode> {
    // Credentials are checked before any job is opened.
    let extractor = card_extractor(settings)?;
    settings.storage.validate()?;

    let pool = open_database(settings).await?;
    let scraper = build_scraper(settings, pool.clone(), extractor)?;

    let mut failures = 0usize;
    let results = if source_ids.is_empty() {
        scraper.scrape_all_sources().await?
    } else {
        let source_repo = DieselSourceRepository::new(pool.clone());
        let mut sources = Vec::with_capacity(source_ids.len());
        for id in source_ids {
            match source_repo.get(id).await? {
                Some(source) => sources.push(source),
                None => {
                    println!("{} Source '{}' not found", style("✗").red(), id);
                    failures += 1;
                }
            }
        }
        scraper.scrape_sources(&sources).await
    };

    if results.is_empty() && failures == 0 {
        println!(
            "{} No active sources. Add one with 'cardharvest source add'.",
            style("!").yellow()
        );
        return Ok(ExitCode::SUCCESS);
    }

    for result in &results {
        print_result(result);
        if !result.is_success() {
            failures += 1;
        }
    }

    let found: u32 = results.iter().map(|r| r.items_found).sum();
    let created: u32 = results.iter().map(|r| r.items_created).sum();
    let updated: u32 = results.iter().map(|r| r.items_updated).sum();
    println!(
        "\n{} {} sources, {} cards found, {} new, {} updated, {} failed",
        style("Done:").bold(),
        results.len(),
        found,
        created,
        updated,
        failures
    );

    let catalog_size = DieselCatalogRepository::new(pool).count().await?;
    println!("  Catalog now holds {} entries", catalog_size);

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_scraper(
    settings: &Settings,
    pool: AsyncSqlitePool,
    extractor: CardExtractor,
) -> anyhow::Result<CatalogScraper> {
    let options = ProcessOptions {
        max_width: settings.scrape.max_image_width,
        format: settings.scrape.output_format,
        quality: settings.scrape.jpeg_quality,
    };
    let processor = ImageProcessor::new(http_client(settings)?, options);

    let store = S3ObjectStore::from_settings(&settings.storage)?;
    let public_domain = settings.storage.public_domain.clone().unwrap_or_default();
    let objects = ObjectMirror::new(Arc::new(store), public_domain);

    let mirror = ImageMirrorPipeline::new(processor, objects);
    let image_limiter = RateLimiter::from_millis("images", settings.scrape.image_interval_ms);

    Ok(CatalogScraper::new(
        pool,
        Arc::new(page_fetcher(settings)?),
        extractor,
        Arc::new(mirror),
        image_limiter,
    )
    .with_inter_source_delay(Duration::from_millis(settings.scrape.inter_source_delay_ms)))
}

fn print_result(result: &ScrapeResult) {
    let elapsed = (result.finished_at - result.started_at).num_milliseconds() as f64 / 1000.0;
    if result.is_success() {
        println!(
            "{} {}: {} found, {} new, {} updated ({:.1}s)",
            style("✓").green(),
            result.source_name,
            result.items_found,
            result.items_created,
            result.items_updated,
            elapsed
        );
        if let Some(note) = &result.error {
            println!("    {} {}", style("!").yellow(), note);
        }
    } else {
        println!(
            "{} {}: {}",
            style("✗").red(),
            result.source_name,
            result.error.as_deref().unwrap_or("failed")
        );
    }
}
