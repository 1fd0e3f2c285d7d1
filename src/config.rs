//! Configuration management.
//!
//! Settings come from three layers, later layers winning:
//! built-in defaults, an optional TOML file, then environment variables
//! (after `.env` has been loaded by the binary).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::images::OutputFormat;
use crate::models::{ApiSourceConfig, LlmSourceConfig, SelectorConfig, Source, SourceKind};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILENAME: &str = "cardharvest.toml";

/// Default SQLite database file.
pub const DEFAULT_DATABASE_URL: &str = "cardharvest.db";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Pacing and processing knobs for scrape runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Minimum milliseconds between page fetches.
    pub page_interval_ms: u64,
    /// Minimum milliseconds between image mirror operations.
    pub image_interval_ms: u64,
    /// Pause before every source except the first in a full run.
    pub inter_source_delay_ms: u64,
    /// Character budget for sanitized HTML sent to the model.
    pub max_content_chars: usize,
    /// Images wider than this are downscaled.
    pub max_image_width: u32,
    pub output_format: OutputFormat,
    pub jpeg_quality: u8,
    /// Per-request timeout for page and image fetches.
    pub request_timeout_secs: u64,
    /// Overrides the browser-like User-Agent.
    pub user_agent: Option<String>,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            page_interval_ms: 2000,
            image_interval_ms: 1000,
            inter_source_delay_ms: 5000,
            max_content_chars: 100_000,
            max_image_width: 800,
            output_format: OutputFormat::Png,
            jpeg_quality: 85,
            request_timeout_secs: 30,
            user_agent: None,
        }
    }
}

/// Connection settings for the OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL; `/chat/completions` is appended.
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            max_tokens: 4096,
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

/// S3-compatible object storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    /// Public host that serves mirrored objects.
    pub public_domain: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: None,
            region: "auto".to_string(),
            access_key_id: None,
            secret_access_key: None,
            public_domain: None,
        }
    }
}

impl StorageSettings {
    /// Check that every credential needed for uploads is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.endpoint, "S3_ENDPOINT")?;
        require(&self.bucket, "S3_BUCKET")?;
        require(&self.access_key_id, "S3_ACCESS_KEY_ID")?;
        require(&self.secret_access_key, "S3_SECRET_ACCESS_KEY")?;
        require(&self.public_domain, "S3_PUBLIC_DOMAIN")?;
        Ok(())
    }
}

fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Extraction strategy named in a source definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKindName {
    Selector,
    Llm,
    Api,
}

/// A source declared in the config file, seeded into the database by `init`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub id: String,
    pub name: String,
    pub kind: SourceKindName,
    pub base_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    /// Instruction for model-driven sources.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Endpoint for API sources.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub selectors: Option<SelectorConfig>,
    #[serde(default)]
    pub rate_limit_ms: Option<u64>,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl SourceDefinition {
    pub fn to_source(&self) -> Source {
        let kind = match self.kind {
            SourceKindName::Selector => {
                SourceKind::Selector(self.selectors.clone().unwrap_or_default())
            }
            SourceKindName::Llm => SourceKind::Llm(LlmSourceConfig {
                prompt: self.prompt.clone(),
            }),
            SourceKindName::Api => SourceKind::Api(ApiSourceConfig {
                endpoint: self.endpoint.clone(),
                api_key: None,
            }),
        };
        let mut source =
            Source::new(self.id.clone(), self.name.clone(), kind, self.base_url.clone());
        source.category = self.category.clone();
        source.group_name = self.group_name.clone();
        source.rate_limit_ms = self.rate_limit_ms;
        source.max_pages = self.max_pages;
        source.is_active = self.active;
        source
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database path (an optional `sqlite:` prefix is accepted).
    pub database_url: String,
    pub scrape: ScrapeSettings,
    pub llm: LlmSettings,
    pub storage: StorageSettings,
    /// Sources to seed on `init`.
    pub sources: Vec<SourceDefinition>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            scrape: ScrapeSettings::default(),
            llm: LlmSettings::default(),
            storage: StorageSettings::default(),
            sources: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `cardharvest.toml` if it exists,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CARDHARVEST_DATABASE_URL") {
            self.database_url = v;
        }

        if let Some(v) = get("LLM_ENDPOINT") {
            self.llm.endpoint = v;
        }
        if let Some(v) = get("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("LLM_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.llm.api_key = Some(v);
        }

        if let Some(v) = get("S3_ENDPOINT") {
            self.storage.endpoint = Some(v);
        }
        if let Some(v) = get("S3_BUCKET") {
            self.storage.bucket = Some(v);
        }
        if let Some(v) = get("S3_REGION") {
            self.storage.region = v;
        }
        if let Some(v) = get("S3_ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(v);
        }
        if let Some(v) = get("S3_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Some(v);
        }
        if let Some(v) = get("S3_PUBLIC_DOMAIN") {
            self.storage.public_domain = Some(v);
        }

        if let Some(v) = get("SCRAPE_INTER_SOURCE_DELAY_MS") {
            self.scrape.inter_source_delay_ms = parse_millis("SCRAPE_INTER_SOURCE_DELAY_MS", &v)?;
        }
        if let Some(v) = get("SCRAPE_PAGE_INTERVAL_MS") {
            self.scrape.page_interval_ms = parse_millis("SCRAPE_PAGE_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("SCRAPE_IMAGE_INTERVAL_MS") {
            self.scrape.image_interval_ms = parse_millis("SCRAPE_IMAGE_INTERVAL_MS", &v)?;
        }

        Ok(())
    }

    /// The completion API key, required for model-driven sources.
    pub fn llm_api_key(&self) -> Result<&str, ConfigError> {
        require(&self.llm.api_key, "LLM_API_KEY")
    }
}

fn parse_millis(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
