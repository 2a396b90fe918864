//! Row-value conversion helpers. SQLite stores ids as TEXT uuids and
//! timestamps as `datetime('now')` text (or RFC 3339 when written from
//! Rust); these helpers surface conversion failures as rusqlite errors so
//! corrupt rows fail the query instead of producing defaults.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    s.parse::<DateTime<Utc>>().or_else(|_| {
        // SQLite's datetime('now') has no timezone; treat it as UTC.
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
    })
}

fn conv_err(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conv_err(idx, e))
}

pub fn get_opt_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| s.parse().map_err(|e| conv_err(idx, e))).transpose()
}

pub fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_ts(&s).map_err(|e| conv_err(idx, e))
}

pub fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| parse_ts(&s).map_err(|e| conv_err(idx, e))).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        assert!(parse_ts("2026-08-06 10:30:00").is_ok());
        assert!(parse_ts("2026-08-06T10:30:00Z").is_ok());
        assert!(parse_ts("yesterday").is_err());
    }
}
