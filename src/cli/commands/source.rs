//! Source management commands.

use std::process::ExitCode;

use console::style;

use super::super::helpers::{open_database, truncate};
use super::KindArg;
use crate::config::Settings;
use crate::models::{ApiSourceConfig, LlmSourceConfig, SelectorConfig, Source, SourceKind};
use crate::repository::DieselSourceRepository;

/// Arguments for `source add`.
pub struct NewSourceArgs {
    pub id: String,
    pub url: String,
    pub name: Option<String>,
    pub kind: KindArg,
    pub group: Option<String>,
    pub category: Option<String>,
    pub prompt: Option<String>,
    pub active: bool,
}

impl NewSourceArgs {
    fn into_source(self) -> Source {
        let kind = match self.kind {
            KindArg::Llm => SourceKind::Llm(LlmSourceConfig {
                prompt: self.prompt,
            }),
            KindArg::Selector => SourceKind::Selector(SelectorConfig::default()),
            KindArg::Api => SourceKind::Api(ApiSourceConfig::default()),
        };
        let name = self.name.unwrap_or_else(|| self.id.clone());
        let mut source = Source::new(self.id, name, kind, self.url);
        source.group_name = self.group;
        source.category = self.category;
        source.is_active = self.active;
        source
    }
}

/// List configured sources.
pub async fn cmd_source_list(settings: &Settings) -> anyhow::Result<ExitCode> {
    let source_repo = DieselSourceRepository::new(open_database(settings).await?);
    let sources = source_repo.get_all().await?;

    if sources.is_empty() {
        println!(
            "{} No sources configured. Run 'cardharvest source add' first.",
            style("!").yellow()
        );
        return Ok(ExitCode::SUCCESS);
    }

    println!("\n{}", style("Sources").bold());
    println!("{}", "-".repeat(78));
    println!(
        "{:<16} {:<24} {:<9} {:<8} Last Scraped",
        "ID", "Name", "Kind", "Active"
    );
    println!("{}", "-".repeat(78));

    for source in sources {
        let last_scraped = source
            .last_scraped_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Never".to_string());
        let active = if source.is_active { "yes" } else { "no" };

        println!(
            "{:<16} {:<24} {:<9} {:<8} {}",
            truncate(&source.id, 15),
            truncate(&source.name, 23),
            source.kind.as_str(),
            active,
            last_scraped
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Add or replace a source.
pub async fn cmd_source_add(settings: &Settings, args: NewSourceArgs) -> anyhow::Result<ExitCode> {
    let source_repo = DieselSourceRepository::new(open_database(settings).await?);

    let mut source = args.into_source();
    if let Some(existing) = source_repo.get(&source.id).await? {
        source.created_at = existing.created_at;
        source.last_scraped_at = existing.last_scraped_at;
        println!("{} Replacing source '{}'", style("!").yellow(), source.id);
    }
    source_repo.save(&source).await?;

    println!(
        "{} Saved {} source '{}' ({})",
        style("✓").green(),
        source.kind.as_str(),
        source.name,
        source.base_url
    );
    Ok(ExitCode::SUCCESS)
}

/// Enable or disable a source.
pub async fn cmd_source_set_active(
    settings: &Settings,
    id: &str,
    active: bool,
) -> anyhow::Result<ExitCode> {
    let source_repo = DieselSourceRepository::new(open_database(settings).await?);

    if !source_repo.set_active(id, active).await? {
        println!("{} Source '{}' not found", style("✗").red(), id);
        return Ok(ExitCode::FAILURE);
    }

    let state = if active { "enabled" } else { "disabled" };
    println!("{} Source '{}' {}", style("✓").green(), id, state);
    Ok(ExitCode::SUCCESS)
}
