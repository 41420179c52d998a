//! Immutable, normalized view of one user's ledger.
//!
//! Grouping indices over the debit rows are built once at construction and
//! shared by every analysis stage.

use crate::error::{FinancialReportError, Result};
use crate::ingestion::normalize;
use crate::schema::{LedgerTable, NormalizationStats, Transaction, UNKNOWN_LABEL};
use crate::utils::MonthKey;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Ledger {
    user_id: String,
    transactions: Vec<Transaction>,
    stats: NormalizationStats,
    debits: Vec<usize>,
    debits_by_month: BTreeMap<MonthKey, Vec<usize>>,
    debits_by_category: BTreeMap<String, Vec<usize>>,
    debits_by_merchant: BTreeMap<String, Vec<usize>>,
}

impl Ledger {
    /// Normalizes a single user's table. Fails on a missing required column or
    /// when the rows belong to more than one user.
    pub fn from_table(table: &LedgerTable) -> Result<Self> {
        let (transactions, stats) = normalize(table)?;

        let mut user_ids: Vec<String> = Vec::new();
        for txn in &transactions {
            if !user_ids.contains(&txn.user_id) {
                user_ids.push(txn.user_id.clone());
            }
        }
        if user_ids.len() > 1 {
            return Err(FinancialReportError::MultipleUsers(user_ids));
        }

        let user_id = transactions
            .first()
            .map(|t| t.user_id.clone())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        Ok(Self::build(user_id, transactions, stats))
    }

    pub fn from_transactions(user_id: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        let stats = NormalizationStats {
            rows: transactions.len(),
            unparseable_timestamps: transactions.iter().filter(|t| t.timestamp.is_none()).count(),
            ..NormalizationStats::default()
        };
        Self::build(user_id.into(), transactions, stats)
    }

    fn build(user_id: String, transactions: Vec<Transaction>, stats: NormalizationStats) -> Self {
        let mut debits = Vec::new();
        let mut debits_by_month: BTreeMap<MonthKey, Vec<usize>> = BTreeMap::new();
        let mut debits_by_category: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut debits_by_merchant: BTreeMap<String, Vec<usize>> = BTreeMap::new();

        for (idx, txn) in transactions.iter().enumerate() {
            if !txn.direction.is_debit() {
                continue;
            }
            debits.push(idx);
            if let Some(month) = txn.month() {
                debits_by_month.entry(month).or_default().push(idx);
            }
            debits_by_category
                .entry(txn.category.clone())
                .or_default()
                .push(idx);
            debits_by_merchant
                .entry(txn.merchant_name.clone())
                .or_default()
                .push(idx);
        }

        Self {
            user_id,
            transactions,
            stats,
            debits,
            debits_by_month,
            debits_by_category,
            debits_by_merchant,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn stats(&self) -> NormalizationStats {
        self.stats
    }

    pub fn debit_count(&self) -> usize {
        self.debits.len()
    }

    pub fn has_debits(&self) -> bool {
        !self.debits.is_empty()
    }

    pub fn debits(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.resolve(&self.debits)
    }

    /// Distinct months with at least one dated debit, ascending.
    pub fn debit_months(&self) -> Vec<MonthKey> {
        self.debits_by_month.keys().copied().collect()
    }

    pub fn debits_in_month(&self, month: MonthKey) -> impl Iterator<Item = &Transaction> + '_ {
        let indices: &[usize] = self
            .debits_by_month
            .get(&month)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        self.resolve(indices)
    }

    /// Debit rows grouped by category label, in ascending label order.
    pub fn debits_by_category(&self) -> impl Iterator<Item = (&str, Vec<&Transaction>)> + '_ {
        self.debits_by_category
            .iter()
            .map(move |(category, indices)| (category.as_str(), self.resolve(indices).collect()))
    }

    /// Debit count per merchant label, in ascending label order.
    pub fn debit_counts_by_merchant(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.debits_by_merchant
            .iter()
            .map(|(merchant, indices)| (merchant.as_str(), indices.len()))
    }

    pub fn unique_debit_merchants(&self) -> usize {
        self.debits_by_merchant.len()
    }

    fn resolve<'a>(&'a self, indices: &'a [usize]) -> impl Iterator<Item = &'a Transaction> + 'a {
        indices.iter().filter_map(move |&i| self.transactions.get(i))
    }
}
