use crate::error::Result;
use crate::utils::MonthKey;
use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const COLUMN_TIMESTAMP: &str = "timestamp";
pub const COLUMN_AMOUNT: &str = "amount";
pub const COLUMN_DIRECTION: &str = "direction";
pub const COLUMN_CATEGORY: &str = "category";
pub const COLUMN_MERCHANT: &str = "merchant_name";
pub const COLUMN_USER_ID: &str = "user_id";

pub const REQUIRED_COLUMNS: [&str; 6] = [
    COLUMN_TIMESTAMP,
    COLUMN_AMOUNT,
    COLUMN_DIRECTION,
    COLUMN_CATEGORY,
    COLUMN_MERCHANT,
    COLUMN_USER_ID,
];

/// Label used for a missing merchant, category or user id.
pub const UNKNOWN_LABEL: &str = "unknown";

/// An already-decoded ledger: named columns over row-major dynamic cells.
///
/// Rows shorter than the header read as null in the missing positions and any
/// column beyond the required set is carried but never inspected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl LedgerTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Required columns absent from the header, in canonical order.
    pub fn missing_columns(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Builds a table from JSON objects. Columns appear in order of first sight.
    pub fn from_json_records(records: &[Value]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            if let Value::Object(map) = record {
                for key in map.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Same header, only the rows at `indices`.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Debit,
    Credit,
    /// Raw value that matched neither direction; excluded from spend figures.
    Unrecognized(String),
}

impl Direction {
    pub fn is_debit(&self) -> bool {
        matches!(self, Direction::Debit)
    }
}

/// A ledger row after per-field coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    #[schemars(description = "Parsed timestamp; absent when the source value could not be parsed")]
    pub timestamp: Option<NaiveDateTime>,

    #[schemars(description = "Signed amount; non-numeric source values are coerced to 0")]
    pub amount: f64,

    pub direction: Direction,

    #[schemars(description = "Free-text spending category as it appears in the ledger")]
    pub category: String,

    #[schemars(description = "Merchant label, 'unknown' when missing")]
    pub merchant_name: String,

    pub user_id: String,
}

impl Transaction {
    pub fn month(&self) -> Option<MonthKey> {
        self.timestamp.as_ref().map(MonthKey::from_date)
    }
}

/// Coarse budget classification derived from a transaction's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum BudgetBucket {
    Needs,
    Wants,
    Other,
}

impl BudgetBucket {
    pub const ALL: [BudgetBucket; 3] = [BudgetBucket::Needs, BudgetBucket::Wants, BudgetBucket::Other];

    pub fn label(&self) -> &'static str {
        match self {
            BudgetBucket::Needs => "Needs",
            BudgetBucket::Wants => "Wants",
            BudgetBucket::Other => "Other",
        }
    }
}

/// Why a stage could not produce numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InsufficientData {
    /// No debit rows at all.
    NoSpendingData,
    /// Fewer than two distinct months of debit rows.
    NotEnoughMonths { found: usize },
    /// Debit rows exist but none carries a usable timestamp.
    NoDatedSpending,
}

impl InsufficientData {
    /// Canned text handed to the narrative stage in place of generated prose.
    pub fn message(&self) -> &'static str {
        match self {
            InsufficientData::NoSpendingData => {
                "This user has no spending (debit) transactions to analyze."
            }
            InsufficientData::NotEnoughMonths { .. } => {
                "Not enough data for a month-on-month comparison."
            }
            InsufficientData::NoDatedSpending => {
                "No dated spending transactions are available to build a monthly budget baseline."
            }
        }
    }
}

/// Result of a stage: either its summary or an explicit insufficient-data marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Complete(T),
    InsufficientData(InsufficientData),
}

impl<T> StageOutcome<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, StageOutcome::Complete(_))
    }

    pub fn complete(&self) -> Option<&T> {
        match self {
            StageOutcome::Complete(value) => Some(value),
            StageOutcome::InsufficientData(_) => None,
        }
    }

    pub fn insufficient(&self) -> Option<&InsufficientData> {
        match self {
            StageOutcome::Complete(_) => None,
            StageOutcome::InsufficientData(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryAmount {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MerchantCount {
    pub merchant_name: String,
    pub count: usize,
}

/// Spending profile of a single user's debit activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisSummary {
    #[schemars(description = "Summed debit amount per raw category label")]
    pub category_spending: BTreeMap<String, f64>,

    #[schemars(description = "Highest-spend categories, descending")]
    pub top_categories: Vec<CategoryAmount>,

    #[schemars(description = "Most frequent merchants by transaction count, descending")]
    pub top_merchants: Vec<MerchantCount>,

    pub total_debit: f64,
    pub transaction_count: usize,
    pub mean_transaction_amount: f64,

    #[schemars(description = "Distinct merchant labels among debits; 'unknown' counts once")]
    pub unique_merchants: usize,

    #[schemars(description = "Deterministic sample of ledger rows (all directions) for narrative context")]
    pub transaction_samples: Vec<Transaction>,
}

impl AnalysisSummary {
    pub fn category_amount(&self, category: &str) -> f64 {
        crate::utils::amount_or_zero(&self.category_spending, category)
    }
}

/// Month-over-month movement of one category between the two compared months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryChange {
    pub category: String,
    pub last_month: f64,
    pub prev_month: f64,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BurstTransaction {
    pub timestamp: Option<NaiveDateTime>,
    pub merchant_name: String,
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "transactions", rename_all = "snake_case")]
pub enum BurstReport {
    NoneDetected,
    Detected(Vec<BurstTransaction>),
}

impl BurstReport {
    pub fn transactions(&self) -> &[BurstTransaction] {
        match self {
            BurstReport::NoneDetected => &[],
            BurstReport::Detected(transactions) => transactions,
        }
    }
}

/// Comparison of the two latest months present in the debit data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendSummary {
    pub last_month: MonthKey,
    pub prev_month: MonthKey,
    pub last_month_label: String,
    pub prev_month_label: String,
    pub last_month_total: f64,
    pub prev_month_total: f64,

    #[schemars(description = "Percentage change of total spend; 0 when the previous month total is 0")]
    pub total_change_pct: f64,

    #[schemars(description = "Every category seen in either month, ordered by label")]
    pub category_changes: Vec<CategoryChange>,

    pub top_increases: Vec<CategoryChange>,
    pub top_decreases: Vec<CategoryChange>,

    pub burst_threshold: f64,
    pub bursts: BurstReport,
}

impl TrendSummary {
    pub fn change_for(&self, category: &str) -> f64 {
        self.category_changes
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.change)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyBucketSpend {
    pub month: MonthKey,
    pub needs: f64,
    pub wants: f64,
    pub other: f64,
}

impl MonthlyBucketSpend {
    pub fn amount(&self, bucket: BudgetBucket) -> f64 {
        match bucket {
            BudgetBucket::Needs => self.needs,
            BudgetBucket::Wants => self.wants,
            BudgetBucket::Other => self.other,
        }
    }
}

/// Average monthly spend per budget bucket across every observed month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetBaseline {
    pub avg_monthly_needs: f64,
    pub avg_monthly_wants: f64,
    pub avg_monthly_other: f64,

    #[schemars(description = "Sum of the three bucket averages")]
    pub total_avg_monthly: f64,

    pub months_observed: usize,

    #[schemars(description = "Month x bucket spend matrix, unobserved cells filled with 0")]
    pub monthly: Vec<MonthlyBucketSpend>,
}

impl BudgetBaseline {
    pub fn average_for(&self, bucket: BudgetBucket) -> f64 {
        match bucket {
            BudgetBucket::Needs => self.avg_monthly_needs,
            BudgetBucket::Wants => self.avg_monthly_wants,
            BudgetBucket::Other => self.avg_monthly_other,
        }
    }
}

/// Counts of per-field coercions applied while normalizing a ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizationStats {
    pub rows: usize,
    pub unparseable_timestamps: usize,
    pub coerced_amounts: usize,
    pub unrecognized_directions: usize,
}

/// Tunables for the analysis stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    #[schemars(description = "How many categories to report by amount")]
    pub top_categories: usize,

    #[schemars(description = "How many merchants to report by frequency")]
    pub top_merchants: usize,

    #[schemars(description = "How many category increases and decreases the trend reports")]
    pub top_movers: usize,

    #[schemars(description = "Burst threshold in standard deviations above the mean")]
    pub burst_sigma: f64,

    #[schemars(description = "Number of ledger rows sampled for narrative context; 0 disables sampling")]
    pub sample_size: usize,

    pub sample_seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_categories: 5,
            top_merchants: 5,
            top_movers: 3,
            burst_sigma: 3.0,
            sample_size: 10,
            sample_seed: 42,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        crate::validate_config(&config)?;
        Ok(config)
    }
}

/// Every structured output produced for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerReport {
    pub user_id: String,
    pub normalization: NormalizationStats,
    pub analysis: StageOutcome<AnalysisSummary>,
    pub trend: StageOutcome<TrendSummary>,
    pub baseline: StageOutcome<BudgetBaseline>,
}

impl LedgerReport {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(LedgerReport)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
