//! Shared helper functions for CLI commands.

use std::time::Duration;

use anyhow::Context;

use crate::config::Settings;
use crate::http_client::{HttpClient, PageFetcher};
use crate::llm::{CardExtractor, OpenAiCompatibleClient};
use crate::rate_limit::RateLimiter;
use crate::repository::AsyncSqlitePool;

/// Truncate a string for table display.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Open the database and make sure the schema exists.
pub async fn open_database(settings: &Settings) -> anyhow::Result<AsyncSqlitePool> {
    let pool = AsyncSqlitePool::new(&settings.database_url);
    pool.init_schema()
        .await
        .with_context(|| format!("failed to open database {}", pool.database_url()))?;
    Ok(pool)
}

/// HTTP client for third-party pages and images.
pub fn http_client(settings: &Settings) -> anyhow::Result<HttpClient> {
    Ok(HttpClient::with_user_agent(
        Duration::from_secs(settings.scrape.request_timeout_secs),
        settings.scrape.user_agent.as_deref(),
    )?)
}

/// Rate-limited page fetcher.
pub fn page_fetcher(settings: &Settings) -> anyhow::Result<PageFetcher> {
    Ok(PageFetcher::new(
        http_client(settings)?,
        RateLimiter::from_millis("pages", settings.scrape.page_interval_ms),
    ))
}

/// Card extractor backed by the configured completion API.
pub fn card_extractor(settings: &Settings) -> anyhow::Result<CardExtractor> {
    settings.llm_api_key()?;
    let client = OpenAiCompatibleClient::from_settings(&settings.llm)?;
    Ok(CardExtractor::new(std::sync::Arc::new(client))
        .with_max_content_chars(settings.scrape.max_content_chars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer name", 10), "a much ...");
    }
}
