use crate::ledger::Ledger;
use crate::schema::{
    AnalysisConfig, BurstReport, BurstTransaction, CategoryChange, InsufficientData,
    StageOutcome, Transaction, TrendSummary,
};
use crate::utils::{mean, rank_ascending, rank_descending, sample_std_dev};
use log::debug;
use std::collections::BTreeMap;

pub struct TrendEngine<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> TrendEngine<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Compares the two greatest months present in the debit data.
    pub fn analyze(&self, ledger: &Ledger) -> StageOutcome<TrendSummary> {
        let months = ledger.debit_months();
        let (prev_month, last_month) = match months.as_slice() {
            [.., prev, last] => (*prev, *last),
            _ => {
                debug!(
                    "User {} has {} month(s) of spending, skipping trend comparison",
                    ledger.user_id(),
                    months.len()
                );
                return StageOutcome::InsufficientData(InsufficientData::NotEnoughMonths {
                    found: months.len(),
                });
            }
        };

        let last_rows: Vec<&Transaction> = ledger.debits_in_month(last_month).collect();
        let prev_rows: Vec<&Transaction> = ledger.debits_in_month(prev_month).collect();

        let last_month_total: f64 = last_rows.iter().map(|t| t.amount).sum();
        let prev_month_total: f64 = prev_rows.iter().map(|t| t.amount).sum();

        let category_changes = compare_categories(&last_rows, &prev_rows);

        let increases = category_changes
            .iter()
            .filter(|c| c.change > 0.0)
            .map(|c| (c.clone(), c.change))
            .collect();
        let decreases = category_changes
            .iter()
            .filter(|c| c.change < 0.0)
            .map(|c| (c.clone(), c.change))
            .collect();

        let top_increases = rank_descending(increases, self.config.top_movers)
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        let top_decreases = rank_ascending(decreases, self.config.top_movers)
            .into_iter()
            .map(|(c, _)| c)
            .collect();

        let burst_threshold = self.burst_threshold(ledger);
        let bursts = detect_bursts(&last_rows, burst_threshold);

        debug!(
            "Trend for user {}: {} -> {}, threshold {:.2}, {} burst(s)",
            ledger.user_id(),
            prev_month,
            last_month,
            burst_threshold,
            bursts.transactions().len()
        );

        StageOutcome::Complete(TrendSummary {
            last_month,
            prev_month,
            last_month_label: last_month.label(),
            prev_month_label: prev_month.label(),
            last_month_total,
            prev_month_total,
            total_change_pct: percent_change(prev_month_total, last_month_total),
            category_changes,
            top_increases,
            top_decreases,
            burst_threshold,
            bursts,
        })
    }

    /// `mean + sigma * sample std dev` over every debit amount in the ledger.
    fn burst_threshold(&self, ledger: &Ledger) -> f64 {
        let amounts: Vec<f64> = ledger.debits().map(|t| t.amount).collect();
        let avg = mean(&amounts).unwrap_or(0.0);
        avg + self.config.burst_sigma * sample_std_dev(&amounts)
    }
}

/// Percentage change from `prev` to `last`, defined as 0 when `prev` is 0.
pub fn percent_change(prev: f64, last: f64) -> f64 {
    if prev == 0.0 {
        return 0.0;
    }
    (last - prev) / prev * 100.0
}

/// Outer join of per-category sums; a category absent from one month reads as 0.
fn compare_categories(last_rows: &[&Transaction], prev_rows: &[&Transaction]) -> Vec<CategoryChange> {
    let mut sums: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for txn in last_rows {
        sums.entry(txn.category.as_str()).or_default().0 += txn.amount;
    }
    for txn in prev_rows {
        sums.entry(txn.category.as_str()).or_default().1 += txn.amount;
    }

    sums.into_iter()
        .map(|(category, (last_month, prev_month))| CategoryChange {
            category: category.to_string(),
            last_month,
            prev_month,
            change: last_month - prev_month,
        })
        .collect()
}

fn detect_bursts(last_rows: &[&Transaction], threshold: f64) -> BurstReport {
    let bursts: Vec<BurstTransaction> = last_rows
        .iter()
        .filter(|t| t.amount > threshold)
        .map(|t| BurstTransaction {
            timestamp: t.timestamp,
            merchant_name: t.merchant_name.clone(),
            category: t.category.clone(),
            amount: t.amount,
        })
        .collect();

    if bursts.is_empty() {
        BurstReport::NoneDetected
    } else {
        BurstReport::Detected(bursts)
    }
}

/// Trend analysis with the default configuration.
pub fn analyze_trend(ledger: &Ledger) -> StageOutcome<TrendSummary> {
    TrendEngine::new(&AnalysisConfig::default()).analyze(ledger)
}
