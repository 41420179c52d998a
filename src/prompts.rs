//! Prompt builders for the narrative collaborator.
//!
//! Each builder renders one structured summary into a self-contained request.
//! Amounts are rendered with [`format_amount`] and prefixed with the currency.

use crate::narrative::{NarrativeRequest, NarrativeStage};
use crate::schema::{AnalysisSummary, BudgetBaseline, BurstReport, CategoryChange, TrendSummary};
use crate::utils::format_amount;

pub const NO_BURST_MESSAGE: &str = "No significant burst spending detected.";

const PROFILE_SYSTEM: &str = "You are a financial analyst AI who writes concise user spending profiles.";
const TRENDS_SYSTEM: &str = "You are a financial analyst AI who summarizes month-over-month spending trends.";
const BUDGET_SYSTEM: &str = "You are a friendly and practical financial advisor AI.";

pub fn profile_request(summary: &AnalysisSummary, currency: &str) -> NarrativeRequest {
    let categories = bullet_lines(
        summary
            .top_categories
            .iter()
            .map(|c| format!("{}: {}{}", c.category, currency, format_amount(c.amount))),
    );
    let merchants = bullet_lines(
        summary
            .top_merchants
            .iter()
            .map(|m| format!("{}: {} transaction(s)", m.merchant_name, m.count)),
    );
    let samples = bullet_lines(summary.transaction_samples.iter().map(|t| {
        let when = t
            .timestamp
            .map(|ts| ts.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string());
        format!(
            "{} | {} | {} | {}{}",
            when,
            t.merchant_name,
            t.category,
            currency,
            format_amount(t.amount)
        )
    }));

    let prompt = format!(
        "Using only the figures below, write a short financial profile of this user.\n\n\
         Data summary:\n\
         - Total spent: {currency}{total} across {count} debit transaction(s) at {merchants_n} merchant(s)\n\
         - Average transaction: {currency}{mean}\n\
         - Top spending categories by amount:\n{categories}\n\
         - Top merchants by transaction frequency:\n{merchants}\n\
         - Sample transactions:\n{samples}\n\n\
         Cover:\n\
         1. Spending habits: one paragraph on the main spending patterns.\n\
         2. Potential fixed obligations: merchants above that look like recurring bills or subscriptions.",
        currency = currency,
        total = format_amount(summary.total_debit),
        count = summary.transaction_count,
        merchants_n = summary.unique_merchants,
        mean = format_amount(summary.mean_transaction_amount),
        categories = categories,
        merchants = merchants,
        samples = samples,
    );

    NarrativeRequest {
        stage: NarrativeStage::Profile,
        system: PROFILE_SYSTEM.to_string(),
        prompt,
        temperature: 0.4,
        max_tokens: 500,
    }
}

pub fn trends_request(trend: &TrendSummary, currency: &str) -> NarrativeRequest {
    let prompt = format!(
        "Summarize this user's spending trends comparing {last} with {prev}, using only the data below.\n\n\
         - Overall spending change: {pct:.2}% ({currency}{prev_total} -> {currency}{last_total})\n\
         - Largest category increases:\n{increases}\n\
         - Largest category decreases:\n{decreases}\n\
         - Unusually large transactions this month:\n{bursts}\n\n\
         Open with the overall change, highlight the most significant category increase, \
         mention any noteworthy large transactions, and keep the tone helpful.",
        last = trend.last_month_label,
        prev = trend.prev_month_label,
        pct = trend.total_change_pct,
        currency = currency,
        prev_total = format_amount(trend.prev_month_total),
        last_total = format_amount(trend.last_month_total),
        increases = movers(&trend.top_increases, currency),
        decreases = movers(&trend.top_decreases, currency),
        bursts = burst_lines(&trend.bursts, currency),
    );

    NarrativeRequest {
        stage: NarrativeStage::Trends,
        system: TRENDS_SYSTEM.to_string(),
        prompt,
        temperature: 0.5,
        max_tokens: 400,
    }
}

/// The budget plan request carries the profile prose as context.
pub fn budget_plan_request(baseline: &BudgetBaseline, profile: &str, currency: &str) -> NarrativeRequest {
    let prompt = format!(
        "Create a simple, personalized monthly budget for this user.\n\n\
         Financial profile:\n---\n{profile}\n---\n\n\
         Average monthly spending over {months} month(s):\n\
         - Needs (groceries, bills, rent, transport): {currency}{needs}\n\
         - Wants (shopping, dining, travel, entertainment): {currency}{wants}\n\
         - Other: {currency}{other}\n\
         - Total: {currency}{total}\n\n\
         Start with the heading \"Proposed Monthly Budget\", then:\n\
         1. Budget proposal: start from the 50/30/20 rule (Needs/Wants/Savings), adjust it \
         realistically to the actual spending, and present categories, percentages and amounts as a table.\n\
         2. One actionable, encouraging tip based on the profile and spending.",
        profile = profile.trim(),
        months = baseline.months_observed,
        currency = currency,
        needs = format_amount(baseline.avg_monthly_needs),
        wants = format_amount(baseline.avg_monthly_wants),
        other = format_amount(baseline.avg_monthly_other),
        total = format_amount(baseline.total_avg_monthly),
    );

    NarrativeRequest {
        stage: NarrativeStage::BudgetPlan,
        system: BUDGET_SYSTEM.to_string(),
        prompt,
        temperature: 0.6,
        max_tokens: 500,
    }
}

fn movers(changes: &[CategoryChange], currency: &str) -> String {
    bullet_lines(changes.iter().map(|c| {
        let sign = if c.change > 0.0 { "+" } else { "-" };
        format!(
            "{}: {}{}{}",
            c.category,
            sign,
            currency,
            format_amount(c.change.abs())
        )
    }))
}

fn burst_lines(bursts: &BurstReport, currency: &str) -> String {
    match bursts {
        BurstReport::NoneDetected => format!("  {}", NO_BURST_MESSAGE),
        BurstReport::Detected(transactions) => bullet_lines(transactions.iter().map(|t| {
            let when = t
                .timestamp
                .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "undated".to_string());
            format!("{} | {} | {}{}", when, t.merchant_name, currency, format_amount(t.amount))
        })),
    }
}

fn bullet_lines(lines: impl Iterator<Item = String>) -> String {
    let rendered: Vec<String> = lines.map(|line| format!("  - {}", line)).collect();
    if rendered.is_empty() {
        "  - none".to_string()
    } else {
        rendered.join("\n")
    }
}
