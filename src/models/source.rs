//! Scrape source models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CSS selectors for selector-based extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_selector: Option<String>,
}

/// Model-driven extraction settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSourceConfig {
    /// Source-specific instruction; a default naming the group/category is
    /// generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Third-party API settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// How cards are extracted from a source. Each variant carries only its own
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config", rename_all = "lowercase")]
pub enum SourceKind {
    Selector(SelectorConfig),
    Llm(LlmSourceConfig),
    Api(ApiSourceConfig),
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selector(_) => "selector",
            Self::Llm(_) => "llm",
            Self::Api(_) => "api",
        }
    }

    /// Rebuild a kind from its stored tag and JSON config.
    ///
    /// Unknown tags yield `None`; unreadable config falls back to the
    /// variant's default configuration.
    pub fn from_parts(kind: &str, config_json: &str) -> Option<Self> {
        match kind {
            "selector" => Some(Self::Selector(
                serde_json::from_str(config_json).unwrap_or_default(),
            )),
            "llm" => Some(Self::Llm(serde_json::from_str(config_json).unwrap_or_default())),
            "api" => Some(Self::Api(serde_json::from_str(config_json).unwrap_or_default())),
            _ => None,
        }
    }

    /// Serialize this variant's configuration for storage.
    pub fn config_json(&self) -> String {
        let json = match self {
            Self::Selector(config) => serde_json::to_string(config),
            Self::Llm(config) => serde_json::to_string(config),
            Self::Api(config) => serde_json::to_string(config),
        };
        json.unwrap_or_else(|_| "{}".to_string())
    }
}

/// A configured external origin to scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Unique identifier for this source.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Extraction strategy and its configuration.
    #[serde(flatten)]
    pub kind: SourceKind,
    /// Page to scrape.
    pub base_url: String,
    pub category: Option<String>,
    pub group_name: Option<String>,
    /// Hint: minimum milliseconds between requests to this source.
    pub rate_limit_ms: Option<u64>,
    /// Hint: maximum number of listing pages to visit.
    pub max_pages: Option<u32>,
    /// Inactive sources are skipped by full runs.
    pub is_active: bool,
    /// When the source was added.
    pub created_at: DateTime<Utc>,
    /// When the source was last scraped successfully.
    pub last_scraped_at: Option<DateTime<Utc>>,
}

impl Source {
    /// Create a new, active source.
    pub fn new(id: String, name: String, kind: SourceKind, base_url: String) -> Self {
        Self {
            id,
            name,
            kind,
            base_url,
            category: None,
            group_name: None,
            rate_limit_ms: None,
            max_pages: None,
            is_active: true,
            created_at: Utc::now(),
            last_scraped_at: None,
        }
    }

    pub fn with_group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}
