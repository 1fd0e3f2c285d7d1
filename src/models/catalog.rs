//! Catalog entries and the cards extracted from listing pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::normalize_name;

/// Where a catalog entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    Seed,
    User,
    Scrape,
}

impl EntrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::User => "user",
            Self::Scrape => "scrape",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "seed" => Some(Self::Seed),
            "user" => Some(Self::User),
            "scrape" => Some(Self::Scrape),
            _ => None,
        }
    }
}

/// A card found on a listing page.
///
/// `name` and `image_url` are always non-empty; the remaining fields are
/// optional metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedCard {
    pub name: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ExtractedCard {
    pub fn new(name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_url: image_url.into(),
            group_name: None,
            member_name: None,
            series: None,
            rarity: None,
            release_date: None,
            source_url: None,
        }
    }
}

/// A persisted catalog record, identified by its exact name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub group_name: Option<String>,
    pub member_name: Option<String>,
    pub series: Option<String>,
    pub rarity: Option<String>,
    pub release_date: Option<String>,
    pub image_url: Option<String>,
    pub source: EntrySource,
    pub source_url: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Build a new unverified scrape entry from an extracted card.
    pub fn from_card(card: &ExtractedCard) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: card.name.clone(),
            normalized_name: normalize_name(&card.name),
            group_name: card.group_name.clone(),
            member_name: card.member_name.clone(),
            series: card.series.clone(),
            rarity: card.rarity.clone(),
            release_date: card.release_date.clone(),
            image_url: Some(card.image_url.clone()),
            source: EntrySource::Scrape,
            source_url: card.source_url.clone(),
            verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}
