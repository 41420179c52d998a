use crate::ledger::Ledger;
use crate::schema::{
    AnalysisConfig, AnalysisSummary, CategoryAmount, InsufficientData, MerchantCount,
    StageOutcome, Transaction,
};
use crate::utils::rank_descending;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

pub struct SpendingAggregator<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> SpendingAggregator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn aggregate(&self, ledger: &Ledger) -> StageOutcome<AnalysisSummary> {
        if !ledger.has_debits() {
            debug!("User {} has no debit transactions", ledger.user_id());
            return StageOutcome::InsufficientData(InsufficientData::NoSpendingData);
        }

        let category_spending: BTreeMap<String, f64> = ledger
            .debits_by_category()
            .map(|(category, rows)| {
                (
                    category.to_string(),
                    rows.iter().map(|t| t.amount).sum::<f64>(),
                )
            })
            .collect();

        let top_categories = rank_descending(
            category_spending
                .iter()
                .map(|(category, amount)| (category.clone(), *amount))
                .collect(),
            self.config.top_categories,
        )
        .into_iter()
        .map(|(category, amount)| CategoryAmount { category, amount })
        .collect();

        let mut merchant_counts: Vec<(&str, usize)> = ledger.debit_counts_by_merchant().collect();
        merchant_counts.sort_by(|a, b| b.1.cmp(&a.1));
        let top_merchants = merchant_counts
            .into_iter()
            .take(self.config.top_merchants)
            .map(|(merchant_name, count)| MerchantCount {
                merchant_name: merchant_name.to_string(),
                count,
            })
            .collect();

        let total_debit: f64 = ledger.debits().map(|t| t.amount).sum();
        let transaction_count = ledger.debit_count();

        StageOutcome::Complete(AnalysisSummary {
            category_spending,
            top_categories,
            top_merchants,
            total_debit,
            transaction_count,
            mean_transaction_amount: total_debit / transaction_count as f64,
            unique_merchants: ledger.unique_debit_merchants(),
            transaction_samples: self.sample_transactions(ledger.transactions()),
        })
    }

    /// Seeded sample over every ledger row, returned in ledger order.
    fn sample_transactions(&self, transactions: &[Transaction]) -> Vec<Transaction> {
        let amount = self.config.sample_size.min(transactions.len());
        if amount == 0 {
            return Vec::new();
        }

        let mut rng = StdRng::seed_from_u64(self.config.sample_seed);
        let mut picked = rand::seq::index::sample(&mut rng, transactions.len(), amount).into_vec();
        picked.sort_unstable();

        picked
            .into_iter()
            .filter_map(|i| transactions.get(i).cloned())
            .collect()
    }
}

/// Aggregates with the default configuration.
pub fn aggregate(ledger: &Ledger) -> StageOutcome<AnalysisSummary> {
    SpendingAggregator::new(&AnalysisConfig::default()).aggregate(ledger)
}
