//! Diesel row types.

use diesel::prelude::*;

use crate::schema;

/// Source row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::sources)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SourceRecord {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub config: String,
    pub base_url: String,
    pub category: Option<String>,
    pub group_name: Option<String>,
    pub rate_limit_ms: Option<i64>,
    pub max_pages: Option<i32>,
    pub is_active: i32,
    pub created_at: String,
    pub last_scraped_at: Option<String>,
}

/// Scrape job row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scrape_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScrapeJobRecord {
    pub id: String,
    pub source_id: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub items_found: i32,
    pub items_created: i32,
    pub items_updated: i32,
    pub error_message: Option<String>,
}

/// New scrape job for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::scrape_jobs)]
pub struct NewScrapeJob<'a> {
    pub id: &'a str,
    pub source_id: &'a str,
    pub status: &'a str,
    pub started_at: &'a str,
    pub items_found: i32,
    pub items_created: i32,
    pub items_updated: i32,
}

/// Catalog entry row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::catalog_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CatalogEntryRecord {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub group_name: Option<String>,
    pub member_name: Option<String>,
    pub series: Option<String>,
    pub rarity: Option<String>,
    pub release_date: Option<String>,
    pub image_url: Option<String>,
    pub source: String,
    pub source_url: Option<String>,
    pub verified: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// New catalog entry for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::catalog_entries)]
pub struct NewCatalogEntry<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub normalized_name: &'a str,
    pub group_name: Option<&'a str>,
    pub member_name: Option<&'a str>,
    pub series: Option<&'a str>,
    pub rarity: Option<&'a str>,
    pub release_date: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub source: &'a str,
    pub source_url: Option<&'a str>,
    pub verified: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
