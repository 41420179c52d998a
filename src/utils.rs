use crate::error::{FinancialReportError, Result};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Calendar year-month with the day and time of day dropped.
///
/// Field order makes the derived `Ord` chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(FinancialReportError::InvalidMonth(format!(
                "{:04}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses "YYYY-MM".
    pub fn parse(value: &str) -> Result<Self> {
        let with_day = format!("{}-01", value.trim());
        let date = NaiveDate::parse_from_str(&with_day, "%Y-%m-%d")
            .map_err(|_| FinancialReportError::InvalidMonth(value.to_string()))?;
        Ok(Self::from_date(&date))
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Human readable label such as "February 2024".
    pub fn label(&self) -> String {
        match self.first_day() {
            Some(date) => date.format("%B %Y").to_string(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Looks up a summed amount, treating an absent key as zero spend.
pub fn amount_or_zero<K, Q>(amounts: &BTreeMap<K, f64>, key: &Q) -> f64
where
    K: Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    amounts.get(key).copied().unwrap_or(0.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (divisor N-1). Zero for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let sum_sq: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// Stable descending sort by value, truncated to `n`.
///
/// Entries with equal values keep their incoming order, so callers decide the
/// tie-break by the order they pass entries in.
pub fn rank_descending<K>(mut entries: Vec<(K, f64)>, n: usize) -> Vec<(K, f64)> {
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries.truncate(n);
    entries
}

/// Stable ascending sort by value, truncated to `n`.
pub fn rank_ascending<K>(mut entries: Vec<(K, f64)>, n: usize) -> Vec<(K, f64)> {
    entries.sort_by(|a, b| a.1.total_cmp(&b.1));
    entries.truncate(n);
    entries
}

/// Formats a currency amount with two decimals and thousands separators.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}
