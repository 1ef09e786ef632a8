use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single scored coaching axis as returned to clients and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredDimension {
    pub score: u8,
    pub description: String,
}

impl ScoredDimension {
    pub fn zero(description: impl Into<String>) -> Self {
        Self {
            score: 0,
            description: description.into(),
        }
    }
}

/// Terminal evaluation of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub sbi_usage: ScoredDimension,
    pub action_plan: ScoredDimension,
    pub balance: ScoredDimension,
    pub overall: Vec<String>,
}

impl Feedback {
    pub fn is_zero_scored(&self) -> bool {
        self.sbi_usage.score == 0 && self.action_plan.score == 0 && self.balance.score == 0
    }
}

/// Shape the evaluator model is asked to produce. Scores arrive as JSON
/// numbers and may be fractional; they are rounded when converted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeedbackContract {
    pub sbi_usage: ScoredDimensionContract,
    pub action_plan: ScoredDimensionContract,
    pub balance: ScoredDimensionContract,
    pub overall: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScoredDimensionContract {
    #[schemars(range(min = 0, max = 100))]
    pub score: f64,
    pub description: String,
}

impl From<ScoredDimensionContract> for ScoredDimension {
    fn from(value: ScoredDimensionContract) -> Self {
        Self {
            score: value.score.round().clamp(0.0, 100.0) as u8,
            description: value.description,
        }
    }
}

impl From<FeedbackContract> for Feedback {
    fn from(value: FeedbackContract) -> Self {
        Self {
            sbi_usage: value.sbi_usage.into(),
            action_plan: value.action_plan.into(),
            balance: value.balance.into(),
            overall: value.overall,
        }
    }
}

pub fn feedback_schema() -> Value {
    serde_json::to_value(schema_for!(FeedbackContract))
        .expect("feedback contract schema should serialize")
}
