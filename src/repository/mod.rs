//! Repository layer for database persistence.
//!
//! SQLite through Diesel with compile-time query checking. Every operation
//! opens its own connection from [`AsyncSqlitePool`].

mod catalog;
mod jobs;
mod pool;
mod records;
mod schema_sql;
mod source;
mod util;

pub use catalog::{DieselCatalogRepository, UpsertOutcome};
pub use jobs::DieselScrapeJobRepository;
pub use pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
pub use records::{
    CatalogEntryRecord, NewCatalogEntry, NewScrapeJob, ScrapeJobRecord, SourceRecord,
};
pub use schema_sql::SCHEMA_SQL;
pub use source::DieselSourceRepository;
pub use util::to_diesel_error;

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Clamp an unsigned count into an SQLite INTEGER column.
pub(crate) fn to_db_count(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Read a count back, treating negatives as zero.
pub(crate) fn from_db_count(n: i32) -> u32 {
    u32::try_from(n).unwrap_or(0)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_fallbacks() {
        assert_eq!(parse_datetime("garbage"), DateTime::UNIX_EPOCH);
        assert_eq!(parse_datetime_opt(Some("nope".to_string())), None);
        let now = Utc::now();
        assert_eq!(parse_datetime(&now.to_rfc3339()), now);
    }

    #[test]
    fn test_count_conversions() {
        assert_eq!(to_db_count(u32::MAX), i32::MAX);
        assert_eq!(from_db_count(-3), 0);
        assert_eq!(from_db_count(7), 7);
    }
}
