//! Page classification command.

use std::process::ExitCode;

use console::style;

use super::super::helpers::{card_extractor, page_fetcher};
use crate::config::Settings;
use crate::http_client::PageSource;

/// Fetch a page and ask the model whether it lists cards.
pub async fn cmd_analyze(settings: &Settings, url: &str) -> anyhow::Result<ExitCode> {
    let extractor = card_extractor(settings)?;
    let fetcher = page_fetcher(settings)?;

    let html = fetcher.fetch_page(url).await?;
    let analysis = extractor.analyze_page(&html, url).await?;

    if analysis.is_card_listing {
        println!("{} {} looks like a card listing", style("✓").green(), url);
    } else {
        println!("{} {} does not look like a card listing", style("✗").red(), url);
    }

    let selectors = [
        ("Card", &analysis.card_selector),
        ("Name", &analysis.name_selector),
        ("Image", &analysis.image_selector),
        ("Next page", &analysis.next_page_selector),
    ];
    for (label, value) in selectors {
        if let Some(value) = value {
            println!("  {:<10} {}", format!("{}:", label), style(value).cyan());
        }
    }
    if let Some(notes) = &analysis.notes {
        println!("  {}", style(notes).dim());
    }

    Ok(ExitCode::SUCCESS)
}
