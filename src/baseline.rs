use crate::classifier::classify;
use crate::ledger::Ledger;
use crate::schema::{BudgetBaseline, BudgetBucket, InsufficientData, MonthlyBucketSpend, StageOutcome};
use crate::utils::amount_or_zero;
use log::debug;
use std::collections::BTreeMap;

/// Average monthly spend per budget bucket over every month with dated debits.
///
/// Months in which a bucket saw no spend count as zero for that bucket, so the
/// three averages always add up to the average monthly debit total.
pub fn compute_baseline(ledger: &Ledger) -> StageOutcome<BudgetBaseline> {
    if !ledger.has_debits() {
        return StageOutcome::InsufficientData(InsufficientData::NoSpendingData);
    }

    let months = ledger.debit_months();
    if months.is_empty() {
        debug!(
            "User {} has {} debit(s) but none is dated",
            ledger.user_id(),
            ledger.debit_count()
        );
        return StageOutcome::InsufficientData(InsufficientData::NoDatedSpending);
    }

    let monthly: Vec<MonthlyBucketSpend> = months
        .iter()
        .map(|&month| {
            let mut sums: BTreeMap<BudgetBucket, f64> = BTreeMap::new();
            for txn in ledger.debits_in_month(month) {
                *sums.entry(classify(&txn.category)).or_insert(0.0) += txn.amount;
            }
            MonthlyBucketSpend {
                month,
                needs: amount_or_zero(&sums, &BudgetBucket::Needs),
                wants: amount_or_zero(&sums, &BudgetBucket::Wants),
                other: amount_or_zero(&sums, &BudgetBucket::Other),
            }
        })
        .collect();

    let month_count = monthly.len() as f64;
    let average = |bucket: BudgetBucket| {
        monthly.iter().map(|m| m.amount(bucket)).sum::<f64>() / month_count
    };

    let avg_monthly_needs = average(BudgetBucket::Needs);
    let avg_monthly_wants = average(BudgetBucket::Wants);
    let avg_monthly_other = average(BudgetBucket::Other);

    debug!(
        "Baseline for user {} over {} month(s): needs {:.2}, wants {:.2}, other {:.2}",
        ledger.user_id(),
        monthly.len(),
        avg_monthly_needs,
        avg_monthly_wants,
        avg_monthly_other
    );

    StageOutcome::Complete(BudgetBaseline {
        avg_monthly_needs,
        avg_monthly_wants,
        avg_monthly_other,
        total_avg_monthly: avg_monthly_needs + avg_monthly_wants + avg_monthly_other,
        months_observed: monthly.len(),
        monthly,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Direction, Transaction};
    use crate::utils::MonthKey;
    use chrono::NaiveDate;

    fn spend(month: u32, category: &str, amount: f64) -> Transaction {
        Transaction {
            timestamp: NaiveDate::from_ymd_opt(2024, month, 15).and_then(|d| d.and_hms_opt(0, 0, 0)),
            amount,
            direction: Direction::Debit,
            category: category.to_string(),
            merchant_name: "m".to_string(),
            user_id: "u1".to_string(),
        }
    }

    #[test]
    fn test_no_debits_is_no_spending_data() {
        let mut income = spend(1, "Salary", 3000.0);
        income.direction = Direction::Credit;
        let ledger = Ledger::from_transactions("u1", vec![income]);
        assert_eq!(
            compute_baseline(&ledger),
            StageOutcome::InsufficientData(InsufficientData::NoSpendingData)
        );
    }

    #[test]
    fn test_undated_debits_only() {
        let mut undated = spend(1, "Rent", 900.0);
        undated.timestamp = None;
        let ledger = Ledger::from_transactions("u1", vec![undated]);
        assert_eq!(
            compute_baseline(&ledger),
            StageOutcome::InsufficientData(InsufficientData::NoDatedSpending)
        );
    }

    #[test]
    fn test_unobserved_cells_average_as_zero() {
        let ledger = Ledger::from_transactions(
            "u1",
            vec![
                spend(1, "Rent", 1000.0),
                spend(1, "Shopping", 300.0),
                spend(2, "Rent", 1000.0),
                spend(2, "Gifts", 100.0),
            ],
        );
        let baseline = compute_baseline(&ledger).complete().cloned().unwrap();

        assert_eq!(baseline.months_observed, 2);
        assert!((baseline.avg_monthly_needs - 1000.0).abs() < 1e-9);
        assert!((baseline.avg_monthly_wants - 150.0).abs() < 1e-9);
        assert!((baseline.avg_monthly_other - 50.0).abs() < 1e-9);
        assert!((baseline.total_avg_monthly - 1200.0).abs() < 1e-9);

        assert_eq!(baseline.monthly[1].month, MonthKey::new(2024, 2).unwrap());
        assert_eq!(baseline.monthly[1].wants, 0.0);
        assert_eq!(baseline.average_for(BudgetBucket::Wants), 150.0);
    }

    #[test]
    fn test_bucket_averages_sum_to_monthly_total() {
        let rows = vec![
            spend(1, "Groceries", 420.5),
            spend(1, "Food delivery", 88.0),
            spend(3, "Utilities", 130.25),
            spend(3, "Entertainment", 60.0),
            spend(3, "Charity", 15.0),
            spend(4, "EMI", 700.0),
        ];
        let total: f64 = rows.iter().map(|t| t.amount).sum();
        let ledger = Ledger::from_transactions("u1", rows);
        let baseline = compute_baseline(&ledger).complete().cloned().unwrap();

        let per_month_total = total / baseline.months_observed as f64;
        let bucket_sum: f64 = BudgetBucket::ALL
            .iter()
            .map(|b| baseline.average_for(*b))
            .sum();
        assert!((bucket_sum - per_month_total).abs() < 1e-9);
        assert!((baseline.total_avg_monthly - per_month_total).abs() < 1e-9);
    }

    #[test]
    fn test_undated_debits_are_left_out_of_months() {
        let mut undated = spend(1, "Rent", 5000.0);
        undated.timestamp = None;
        let ledger = Ledger::from_transactions("u1", vec![spend(1, "Rent", 1000.0), undated]);
        let baseline = compute_baseline(&ledger).complete().cloned().unwrap();
        assert_eq!(baseline.months_observed, 1);
        assert_eq!(baseline.avg_monthly_needs, 1000.0);
    }
}
