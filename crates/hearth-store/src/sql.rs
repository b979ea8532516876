//! Row encoding helpers shared by the per-entity modules.

use chrono::{DateTime, SecondsFormat, Utc};
use hearth_shared::{EntityKind, RuleKind, ValidationErrors};
use rusqlite::types::Type;
use rusqlite::{ErrorCode, Row};

use crate::error::StoreError;

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// Column value that must parse into a domain enum.
pub(crate) fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// Map "no rows" to a typed `NotFound`.
pub(crate) fn missing(entity: EntityKind, id: i64) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::not_found(entity, id),
        other => StoreError::Sqlite(other),
    }
}

/// True when `err` is a UNIQUE violation on `table.column`.
pub(crate) fn is_unique_violation(err: &rusqlite::Error, table_column: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, Some(message)) => {
            code.code == ErrorCode::ConstraintViolation && message.contains(table_column)
        }
        _ => false,
    }
}

/// The schema caught a duplicate the pre-check missed (concurrent writer):
/// report it exactly as the pre-check would have.
pub(crate) fn unique_or_sqlite(err: rusqlite::Error, table_column: &str, field: &str) -> StoreError {
    if is_unique_violation(&err, table_column) {
        let mut errors = ValidationErrors::new();
        errors.add(field, RuleKind::Uniqueness, hearth_shared::validation::MSG_TAKEN);
        StoreError::Validation(errors)
    } else {
        StoreError::Sqlite(err)
    }
}

/// Empty strings are stored as NULL.
pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
