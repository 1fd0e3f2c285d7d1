//! DDL for the SQLite database. Every statement is idempotent.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('selector', 'llm', 'api')),
    config TEXT NOT NULL DEFAULT '{}',
    base_url TEXT NOT NULL,
    category TEXT,
    group_name TEXT,
    rate_limit_ms INTEGER,
    max_pages INTEGER,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_scraped_at TEXT
);

CREATE TABLE IF NOT EXISTS scrape_jobs (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL REFERENCES sources(id),
    status TEXT NOT NULL CHECK (status IN ('running', 'success', 'failed')),
    started_at TEXT NOT NULL,
    finished_at TEXT,
    items_found INTEGER NOT NULL DEFAULT 0,
    items_created INTEGER NOT NULL DEFAULT 0,
    items_updated INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_scrape_jobs_source_started
    ON scrape_jobs(source_id, started_at);

CREATE TABLE IF NOT EXISTS catalog_entries (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    normalized_name TEXT NOT NULL,
    group_name TEXT,
    member_name TEXT,
    series TEXT,
    rarity TEXT,
    release_date TEXT,
    image_url TEXT,
    source TEXT NOT NULL CHECK (source IN ('seed', 'user', 'scrape')),
    source_url TEXT,
    verified INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_catalog_entries_name
    ON catalog_entries(name);

CREATE INDEX IF NOT EXISTS idx_catalog_entries_normalized_name
    ON catalog_entries(normalized_name);
"#;
