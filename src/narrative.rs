//! Narrative stage orchestration.
//!
//! The text generator is a caller-supplied collaborator. The analysis core never
//! constructs or calls it; [`ReportComposer`] feeds it the structured summaries
//! and assembles the prose it returns into the final report.

use crate::error::{FinancialReportError, Result};
use crate::prompts::{budget_plan_request, profile_request, trends_request};
use crate::schema::{LedgerReport, StageOutcome};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CURRENCY: &str = "₹";

pub const REPORT_DISCLAIMER: &str = "*This report was automatically generated based on your transaction data. This is not financial advice. Please review for accuracy.*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeStage {
    Profile,
    Trends,
    BudgetPlan,
}

impl fmt::Display for NarrativeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NarrativeStage::Profile => "profile",
            NarrativeStage::Trends => "trends",
            NarrativeStage::BudgetPlan => "budget plan",
        };
        f.write_str(name)
    }
}

/// A single text-generation call: a system role, a user prompt and sampling knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    pub stage: NarrativeStage,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub trait NarrativeGenerator {
    fn generate(&self, request: &NarrativeRequest) -> Result<String>;
}

impl<F> NarrativeGenerator for F
where
    F: Fn(&NarrativeRequest) -> Result<String>,
{
    fn generate(&self, request: &NarrativeRequest) -> Result<String> {
        self(request)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSections {
    pub profile: String,
    pub trends: String,
    pub budget_plan: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub user_id: String,
    pub sections: NarrativeSections,
    pub markdown: String,
}

pub struct ReportComposer<'a, G: NarrativeGenerator + ?Sized> {
    generator: &'a G,
    currency: String,
}

impl<'a, G: NarrativeGenerator + ?Sized> ReportComposer<'a, G> {
    pub fn new(generator: &'a G) -> Self {
        Self {
            generator,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Runs profile, trends and budget plan in order, then assembles the report.
    ///
    /// A stage whose summary is a sentinel gets its canned message and the
    /// generator is not called for it.
    pub fn compose(&self, report: &LedgerReport) -> Result<FinalReport> {
        info!("Composing narrative report for user {}", report.user_id);

        let profile = match &report.analysis {
            StageOutcome::Complete(summary) => {
                self.run(&profile_request(summary, &self.currency))?
            }
            StageOutcome::InsufficientData(reason) => reason.message().to_string(),
        };

        let trends = match &report.trend {
            StageOutcome::Complete(trend) => self.run(&trends_request(trend, &self.currency))?,
            StageOutcome::InsufficientData(reason) => reason.message().to_string(),
        };

        let budget_plan = match &report.baseline {
            StageOutcome::Complete(baseline) => {
                self.run(&budget_plan_request(baseline, &profile, &self.currency))?
            }
            StageOutcome::InsufficientData(reason) => reason.message().to_string(),
        };

        let markdown = assemble_report(&profile, &trends, &budget_plan);

        Ok(FinalReport {
            user_id: report.user_id.clone(),
            sections: NarrativeSections {
                profile,
                trends,
                budget_plan,
            },
            markdown,
        })
    }

    fn run(&self, request: &NarrativeRequest) -> Result<String> {
        debug!("Requesting {} narrative", request.stage);
        let text = self.generator.generate(request)?;
        if text.trim().is_empty() {
            return Err(FinancialReportError::Narrative {
                stage: request.stage.to_string(),
                details: "generator returned empty text".to_string(),
            });
        }
        Ok(text.trim().to_string())
    }
}

/// Stitches the three narrative sections into the final markdown document.
pub fn assemble_report(profile: &str, trends: &str, budget_plan: &str) -> String {
    let report = format!(
        "# Personalized Financial & Budgeting Report\n\n\
         ## 1. Your Financial Profile\n{}\n\n---\n\n\
         ## 2. Recent Spending Trends\n{}\n\n---\n\n\
         ## 3. Your Personalized Budget Plan\n{}\n\n---\n{}",
        profile.trim(),
        trends.trim(),
        budget_plan.trim(),
        REPORT_DISCLAIMER
    );
    report.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        AnalysisSummary, BudgetBaseline, BurstReport, InsufficientData, NormalizationStats,
        TrendSummary,
    };
    use crate::utils::MonthKey;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    struct RecordingGenerator {
        calls: RefCell<Vec<NarrativeRequest>>,
    }

    impl RecordingGenerator {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl NarrativeGenerator for RecordingGenerator {
        fn generate(&self, request: &NarrativeRequest) -> Result<String> {
            self.calls.borrow_mut().push(request.clone());
            Ok(format!("  {} prose  ", request.stage))
        }
    }

    fn summary() -> AnalysisSummary {
        let mut category_spending = BTreeMap::new();
        category_spending.insert("Rent".to_string(), 1000.0);
        AnalysisSummary {
            category_spending,
            top_categories: Vec::new(),
            top_merchants: Vec::new(),
            total_debit: 1000.0,
            transaction_count: 1,
            mean_transaction_amount: 1000.0,
            unique_merchants: 1,
            transaction_samples: Vec::new(),
        }
    }

    fn trend() -> TrendSummary {
        let last = MonthKey::new(2024, 2).unwrap();
        let prev = MonthKey::new(2024, 1).unwrap();
        TrendSummary {
            last_month: last,
            prev_month: prev,
            last_month_label: last.label(),
            prev_month_label: prev.label(),
            last_month_total: 1200.0,
            prev_month_total: 1000.0,
            total_change_pct: 20.0,
            category_changes: Vec::new(),
            top_increases: Vec::new(),
            top_decreases: Vec::new(),
            burst_threshold: 5000.0,
            bursts: BurstReport::NoneDetected,
        }
    }

    fn baseline() -> BudgetBaseline {
        BudgetBaseline {
            avg_monthly_needs: 1100.0,
            avg_monthly_wants: 0.0,
            avg_monthly_other: 0.0,
            total_avg_monthly: 1100.0,
            months_observed: 2,
            monthly: Vec::new(),
        }
    }

    fn report(
        analysis: StageOutcome<AnalysisSummary>,
        trend: StageOutcome<TrendSummary>,
        baseline: StageOutcome<BudgetBaseline>,
    ) -> LedgerReport {
        LedgerReport {
            user_id: "u1".to_string(),
            normalization: NormalizationStats::default(),
            analysis,
            trend,
            baseline,
        }
    }

    #[test]
    fn test_compose_calls_every_stage_in_order() {
        let generator = RecordingGenerator::new();
        let composed = ReportComposer::new(&generator)
            .compose(&report(
                StageOutcome::Complete(summary()),
                StageOutcome::Complete(trend()),
                StageOutcome::Complete(baseline()),
            ))
            .unwrap();

        let stages: Vec<NarrativeStage> = generator.calls.borrow().iter().map(|c| c.stage).collect();
        assert_eq!(
            stages,
            vec![NarrativeStage::Profile, NarrativeStage::Trends, NarrativeStage::BudgetPlan]
        );

        assert_eq!(composed.sections.profile, "profile prose");
        assert!(generator.calls.borrow()[2].prompt.contains("profile prose"));
        assert!(composed.markdown.starts_with("# Personalized Financial & Budgeting Report"));
        assert!(composed.markdown.ends_with(REPORT_DISCLAIMER));
    }

    #[test]
    fn test_sentinels_skip_the_generator() {
        let generator = RecordingGenerator::new();
        let composed = ReportComposer::new(&generator)
            .compose(&report(
                StageOutcome::InsufficientData(InsufficientData::NoSpendingData),
                StageOutcome::InsufficientData(InsufficientData::NotEnoughMonths { found: 0 }),
                StageOutcome::InsufficientData(InsufficientData::NoSpendingData),
            ))
            .unwrap();

        assert!(generator.calls.borrow().is_empty());
        assert_eq!(
            composed.sections.profile,
            InsufficientData::NoSpendingData.message()
        );
        assert_eq!(
            composed.sections.trends,
            "Not enough data for a month-on-month comparison."
        );
    }

    #[test]
    fn test_generator_failure_propagates() {
        let failing = |request: &NarrativeRequest| -> Result<String> {
            Err(FinancialReportError::Narrative {
                stage: request.stage.to_string(),
                details: "service unavailable".to_string(),
            })
        };
        let result = ReportComposer::new(&failing).compose(&report(
            StageOutcome::Complete(summary()),
            StageOutcome::Complete(trend()),
            StageOutcome::Complete(baseline()),
        ));
        assert!(matches!(result, Err(FinancialReportError::Narrative { .. })));
    }

    #[test]
    fn test_empty_generator_output_is_an_error() {
        let blank = |_: &NarrativeRequest| -> Result<String> { Ok("   ".to_string()) };
        let result = ReportComposer::new(&blank).compose(&report(
            StageOutcome::Complete(summary()),
            StageOutcome::InsufficientData(InsufficientData::NotEnoughMonths { found: 1 }),
            StageOutcome::InsufficientData(InsufficientData::NoSpendingData),
        ));
        match result {
            Err(FinancialReportError::Narrative { stage, .. }) => assert_eq!(stage, "profile"),
            other => panic!("expected narrative error, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_report_layout() {
        let markdown = assemble_report("P", "T", "B");
        let profile_at = markdown.find("## 1. Your Financial Profile\nP").unwrap();
        let trends_at = markdown.find("## 2. Recent Spending Trends\nT").unwrap();
        let budget_at = markdown.find("## 3. Your Personalized Budget Plan\nB").unwrap();
        assert!(profile_at < trends_at && trends_at < budget_at);
    }
}
