use crate::error::{FinancialReportError, Result};
use crate::schema::{
    Direction, LedgerTable, NormalizationStats, Transaction, COLUMN_AMOUNT, COLUMN_CATEGORY,
    COLUMN_DIRECTION, COLUMN_MERCHANT, COLUMN_TIMESTAMP, COLUMN_USER_ID, UNKNOWN_LABEL,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use serde_json::Value;
use std::collections::HashMap;

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Positions of the required columns inside a table header.
struct ColumnMap {
    timestamp: usize,
    amount: usize,
    direction: usize,
    category: usize,
    merchant: usize,
    user_id: usize,
}

impl ColumnMap {
    fn resolve(table: &LedgerTable) -> Result<Self> {
        let missing = table.missing_columns();
        if !missing.is_empty() {
            return Err(FinancialReportError::MissingColumns(missing));
        }

        let index = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| FinancialReportError::MissingColumns(vec![name.to_string()]))
        };

        Ok(Self {
            timestamp: index(COLUMN_TIMESTAMP)?,
            amount: index(COLUMN_AMOUNT)?,
            direction: index(COLUMN_DIRECTION)?,
            category: index(COLUMN_CATEGORY)?,
            merchant: index(COLUMN_MERCHANT)?,
            user_id: index(COLUMN_USER_ID)?,
        })
    }
}

/// Coerces every row of `table` into a [`Transaction`].
///
/// Only a header without one of the required columns fails. Bad cells degrade
/// per field and every input row yields exactly one transaction.
pub fn normalize(table: &LedgerTable) -> Result<(Vec<Transaction>, NormalizationStats)> {
    let columns = ColumnMap::resolve(table)?;
    let mut stats = NormalizationStats {
        rows: table.len(),
        ..NormalizationStats::default()
    };

    let mut transactions = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let timestamp = parse_timestamp(table.cell(row, columns.timestamp));
        if timestamp.is_none() {
            stats.unparseable_timestamps += 1;
        }

        let amount = match parse_amount(table.cell(row, columns.amount)) {
            Some(amount) => amount,
            None => {
                stats.coerced_amounts += 1;
                0.0
            }
        };

        let direction = parse_direction(table.cell(row, columns.direction));
        if matches!(direction, Direction::Unrecognized(_)) {
            stats.unrecognized_directions += 1;
        }

        transactions.push(Transaction {
            timestamp,
            amount,
            direction,
            category: text_label(table.cell(row, columns.category)),
            merchant_name: text_label(table.cell(row, columns.merchant)),
            user_id: text_label(table.cell(row, columns.user_id)),
        });
    }

    debug!(
        "Normalized {} rows: {} unparseable timestamps, {} amounts coerced to zero, {} unrecognized directions",
        stats.rows, stats.unparseable_timestamps, stats.coerced_amounts, stats.unrecognized_directions
    );

    Ok((transactions, stats))
}

/// Parses a timestamp cell. Integers are Unix epoch seconds; offsets in
/// RFC 3339 strings are dropped in favour of the recorded wall-clock time.
pub fn parse_timestamp(value: Option<&Value>) -> Option<NaiveDateTime> {
    match value? {
        Value::String(raw) => parse_timestamp_str(raw),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Numeric value of an amount cell, `None` when it is not a finite number.
pub fn parse_amount(value: Option<&Value>) -> Option<f64> {
    let amount = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(raw) => raw.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    amount.is_finite().then_some(amount)
}

pub fn parse_direction(value: Option<&Value>) -> Direction {
    let raw = match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    match raw.trim().to_lowercase().as_str() {
        "debit" => Direction::Debit,
        "credit" => Direction::Credit,
        _ => Direction::Unrecognized(raw),
    }
}

/// Free-text label of a cell; missing or blank cells become [`UNKNOWN_LABEL`].
pub fn text_label(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other @ (Value::Array(_) | Value::Object(_))) => other.to_string(),
        _ => UNKNOWN_LABEL.to_string(),
    }
}

/// Splits a multi-user table into one table per `user_id`, in order of first
/// appearance. The header is validated once for the whole batch.
pub fn split_by_user(table: &LedgerTable) -> Result<Vec<(String, LedgerTable)>> {
    let columns = ColumnMap::resolve(table)?;

    let mut order: Vec<(String, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in 0..table.len() {
        let user_id = text_label(table.cell(row, columns.user_id));
        match positions.get(&user_id) {
            Some(&pos) => order[pos].1.push(row),
            None => {
                positions.insert(user_id.clone(), order.len());
                order.push((user_id, vec![row]));
            }
        }
    }

    debug!("Split {} rows across {} users", table.len(), order.len());

    Ok(order
        .into_iter()
        .map(|(user_id, rows)| (user_id, table.select_rows(&rows)))
        .collect())
}
