//! Column encoding shared by the SQLite repositories.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Error as SqlError, Row};
use timekeep_domain::AttendanceError;

const TIME_FORMAT: &str = "%H:%M:%S";

pub(crate) fn epoch(instant: DateTime<Utc>) -> i64 {
    instant.timestamp()
}

pub(crate) fn epoch_opt(instant: Option<DateTime<Utc>>) -> Option<i64> {
    instant.map(epoch)
}

/// `instant` truncated to the stored precision.
pub(crate) fn truncate(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(instant.timestamp(), 0).unwrap_or(instant)
}

pub(crate) fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn clock_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub(crate) fn instant_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| conversion(idx, Type::Integer, secs.to_string()))
}

pub(crate) fn instant_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let secs: Option<i64> = row.get(idx)?;
    secs.map(|secs| {
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| conversion(idx, Type::Integer, secs.to_string()))
    })
    .transpose()
}

pub(crate) fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    parse_date(idx, &raw)
}

pub(crate) fn date_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_date(idx, &raw)).transpose()
}

pub(crate) fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveTime> {
    let raw: String = row.get(idx)?;
    NaiveTime::parse_from_str(&raw, TIME_FORMAT).map_err(|_| conversion(idx, Type::Text, raw))
}

/// Vocabulary label column.
pub(crate) fn label<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|msg| conversion(idx, Type::Text, msg))
}

pub(crate) fn label_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| raw.parse::<T>().map_err(|msg| conversion(idx, Type::Text, msg))).transpose()
}

/// JSON-encoded column.
pub(crate) fn json<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|err| conversion(idx, Type::Text, err.to_string()))
}

pub(crate) fn json_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw).map_err(|err| conversion(idx, Type::Text, err.to_string()))
    })
    .transpose()
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AttendanceError> {
    serde_json::to_string(value)
        .map_err(|err| AttendanceError::Internal(format!("failed to encode column: {err}")))
}

/// `?1, ?2, ..` placeholders for an `IN` list starting at `first`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count).map(|n| format!("?{n}")).collect::<Vec<_>>().join(", ")
}

fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| conversion(idx, Type::Text, raw.to_string()))
}

fn conversion(idx: usize, ty: Type, detail: String) -> SqlError {
    SqlError::FromSqlConversionFailure(
        idx,
        ty,
        Box::new(AttendanceError::Database(format!("unreadable column value: {detail}"))),
    )
}
