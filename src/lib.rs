//! # Financial Report Builder
//!
//! Deterministic analysis core for personal transaction ledgers. A raw table of
//! transactions is normalized into a per-user [`Ledger`], then summarized into
//! structured records that a narrative layer can turn into a spending report.
//!
//! ## Core Concepts
//!
//! - **Normalization**: every input row yields exactly one [`Transaction`]; bad cells
//!   degrade per field and only a missing required column is an error
//! - **Debits only**: spending statistics are computed over `debit` rows
//! - **Sentinels**: a stage without enough data returns
//!   [`StageOutcome::InsufficientData`] with a canned message instead of failing
//! - **Budget buckets**: categories map onto Needs / Wants / Other by keyword
//!
//! ## Example
//!
//! ```rust
//! use financial_report_builder::*;
//! use serde_json::json;
//!
//! let table = LedgerTable::from_json_records(&[
//!     json!({"timestamp": "2024-01-05 10:00:00", "amount": 1000.0, "direction": "debit",
//!            "category": "Rent", "merchant_name": "Landlord", "user_id": "u1"}),
//!     json!({"timestamp": "2024-02-05 10:00:00", "amount": 1200.0, "direction": "debit",
//!            "category": "Rent", "merchant_name": "Landlord", "user_id": "u1"}),
//! ]);
//!
//! let report = process_ledger_table(&table, &AnalysisConfig::default()).unwrap();
//! let trend = report.trend.complete().unwrap();
//! assert!((trend.total_change_pct - 20.0).abs() < 1e-9);
//! ```

pub mod aggregator;
pub mod baseline;
pub mod classifier;
pub mod error;
pub mod ingestion;
pub mod ledger;
pub mod narrative;
pub mod prompts;
pub mod schema;
pub mod trend;
pub mod utils;

pub use aggregator::{aggregate, SpendingAggregator};
pub use baseline::compute_baseline;
pub use classifier::classify;
pub use error::{FinancialReportError, Result};
pub use ingestion::*;
pub use ledger::Ledger;
pub use narrative::{
    assemble_report, FinalReport, NarrativeGenerator, NarrativeRequest, NarrativeSections,
    NarrativeStage, ReportComposer,
};
pub use schema::*;
pub use trend::{analyze_trend, percent_change, TrendEngine};
pub use utils::*;

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::thread;

pub type UserReports = BTreeMap<String, Result<LedgerReport>>;

pub struct FinancialReportProcessor;

impl FinancialReportProcessor {
    /// Runs the full pipeline over a table holding a single user's rows.
    ///
    /// Rows from several users are rejected with
    /// [`FinancialReportError::MultipleUsers`]; use [`Self::process_users`] for those.
    pub fn process(table: &LedgerTable, config: &AnalysisConfig) -> Result<LedgerReport> {
        validate_config(config)?;

        let ledger = Ledger::from_table(table)?;
        info!(
            "Processing ledger for user {} ({} rows)",
            ledger.user_id(),
            table.len()
        );

        Ok(Self::process_ledger(&ledger, config))
    }

    /// Runs the three analysis stages over an already-normalized ledger.
    pub fn process_ledger(ledger: &Ledger, config: &AnalysisConfig) -> LedgerReport {
        let analysis = SpendingAggregator::new(config).aggregate(ledger);
        let trend = TrendEngine::new(config).analyze(ledger);
        let baseline = compute_baseline(ledger);

        debug!(
            "User {}: analysis complete = {}, trend complete = {}, baseline complete = {}",
            ledger.user_id(),
            analysis.is_complete(),
            trend.is_complete(),
            baseline.is_complete()
        );

        LedgerReport {
            user_id: ledger.user_id().to_string(),
            normalization: ledger.stats(),
            analysis,
            trend,
            baseline,
        }
    }

    /// Processes every user of a multi-user table in turn.
    ///
    /// A failure for one user is recorded under that user and the batch goes on.
    /// Only a bad configuration or a header missing required columns fails the call.
    pub fn process_users(table: &LedgerTable, config: &AnalysisConfig) -> Result<UserReports> {
        validate_config(config)?;
        let users = split_by_user(table)?;
        info!("Processing {} users from {} rows", users.len(), table.len());

        Ok(users
            .iter()
            .map(|(user_id, user_table)| (user_id.clone(), Self::process_user(user_id, user_table, config)))
            .collect())
    }

    /// Same as [`Self::process_users`], spread over scoped worker threads.
    pub fn process_users_parallel(
        table: &LedgerTable,
        config: &AnalysisConfig,
    ) -> Result<UserReports> {
        validate_config(config)?;
        let users = split_by_user(table)?;

        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(users.len())
            .max(1);
        let chunk_size = users.len().div_ceil(workers).max(1);
        info!(
            "Processing {} users from {} rows on {} worker(s)",
            users.len(),
            table.len(),
            workers
        );

        let reports = thread::scope(|scope| {
            let handles: Vec<_> = users
                .chunks(chunk_size)
                .map(|chunk| {
                    let handle = scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|(user_id, user_table)| {
                                (user_id.clone(), Self::process_user(user_id, user_table, config))
                            })
                            .collect::<Vec<_>>()
                    });
                    (chunk, handle)
                })
                .collect();

            let mut reports = UserReports::new();
            for (chunk, handle) in handles {
                match handle.join() {
                    Ok(results) => reports.extend(results),
                    Err(_) => {
                        let ids: Vec<&str> = chunk.iter().map(|(id, _)| id.as_str()).collect();
                        warn!("Worker panicked while processing users {}", ids.join(", "));
                        for (user_id, _) in chunk {
                            reports.insert(
                                user_id.clone(),
                                Err(FinancialReportError::Worker(user_id.clone())),
                            );
                        }
                    }
                }
            }
            reports
        });

        Ok(reports)
    }

    fn process_user(
        user_id: &str,
        table: &LedgerTable,
        config: &AnalysisConfig,
    ) -> Result<LedgerReport> {
        let result = Ledger::from_table(table).map(|ledger| Self::process_ledger(&ledger, config));
        if let Err(e) = &result {
            warn!("Skipping user {}: {}", user_id, e);
        }
        result
    }
}

pub fn process_ledger_table(table: &LedgerTable, config: &AnalysisConfig) -> Result<LedgerReport> {
    FinancialReportProcessor::process(table, config)
}

pub fn process_users(table: &LedgerTable, config: &AnalysisConfig) -> Result<UserReports> {
    FinancialReportProcessor::process_users(table, config)
}

/// Checks the tunable knobs before any stage runs.
pub fn validate_config(config: &AnalysisConfig) -> Result<()> {
    let counts = [
        ("top_categories", config.top_categories),
        ("top_merchants", config.top_merchants),
        ("top_movers", config.top_movers),
    ];
    for (name, value) in counts {
        if value == 0 {
            return Err(FinancialReportError::InvalidConfig(format!(
                "{} must be greater than zero",
                name
            )));
        }
    }

    if !config.burst_sigma.is_finite() || config.burst_sigma < 0.0 {
        return Err(FinancialReportError::InvalidConfig(format!(
            "burst_sigma must be a finite, non-negative number, got {}",
            config.burst_sigma
        )));
    }

    Ok(())
}
