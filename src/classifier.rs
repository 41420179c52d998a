//! Deterministic mapping of free-text spending categories to budget buckets.
//!
//! Substring rules only. Needs is checked before Wants, so a label containing
//! keywords from both sets lands in Needs.

use crate::schema::BudgetBucket;

pub const NEEDS_KEYWORDS: [&str; 7] = [
    "groceries",
    "utilities",
    "rent",
    "transport",
    "bills",
    "emi",
    "health",
];

pub const WANTS_KEYWORDS: [&str; 7] = [
    "shopping",
    "food",
    "travel",
    "entertainment",
    "recharge",
    "lifestyle",
    "subscription",
];

pub fn classify(category: &str) -> BudgetBucket {
    let lowered = category.to_lowercase();

    if NEEDS_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return BudgetBucket::Needs;
    }

    if WANTS_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return BudgetBucket::Wants;
    }

    BudgetBucket::Other
}
