//! Initialize command.

use std::process::ExitCode;

use console::style;

use super::super::helpers::open_database;
use crate::config::Settings;
use crate::repository::DieselSourceRepository;

/// Create the schema and add config-declared sources that are not yet known.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<ExitCode> {
    let pool = open_database(settings).await?;
    let source_repo = DieselSourceRepository::new(pool.clone());

    let mut sources_added = 0;
    for definition in &settings.sources {
        if source_repo.get(&definition.id).await?.is_none() {
            let source = definition.to_source();
            source_repo.save(&source).await?;
            sources_added += 1;
            println!("  {} Added source: {}", style("✓").green(), source.name);
        }
    }

    if settings.sources.is_empty() {
        println!(
            "{} No sources declared in the config file; add some with 'cardharvest source add'",
            style("!").yellow()
        );
    } else if sources_added == 0 {
        println!("  All {} configured sources already exist", settings.sources.len());
    }

    println!(
        "{} Database ready at {}",
        style("✓").green(),
        pool.database_url()
    );

    Ok(ExitCode::SUCCESS)
}
