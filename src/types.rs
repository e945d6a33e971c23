//! Core data types for the engagement engine
//!
//! These types flow from a finished capture session through scoring and into
//! the persistence collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session-level metrics produced once when a capture session stops
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PracticeMetrics {
    /// Percentage of sampled frames that contained motion (0-100)
    pub engagement_score: u32,
    /// Currently identical to `engagement_score`
    pub motion_score: u32,
    /// Seconds from session start to first detected motion, or the session
    /// length when no motion was seen
    pub response_time_sec: f64,
    /// Wall-clock session length in seconds
    pub total_time_sec: f64,
}

/// Performance tier for a test session, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    NeedsPractice,
    Improving,
    Good,
    Excellent,
}

impl PerformanceTier {
    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "Excellent",
            PerformanceTier::Good => "Good",
            PerformanceTier::Improving => "Improving",
            PerformanceTier::NeedsPractice => "Needs Practice",
        }
    }
}

/// Derived result of a test session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub engagement: u32,
    pub motion_accuracy: u32,
    pub time_efficiency: u32,
    pub final_score: u32,
    pub performance_tier: PerformanceTier,
    pub total_time_sec: f64,
}

/// How evenly the child stayed with the routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionConsistency {
    High,
    Medium,
    Building,
}

impl CompletionConsistency {
    pub fn label(&self) -> &'static str {
        match self {
            CompletionConsistency::High => "High",
            CompletionConsistency::Medium => "Medium",
            CompletionConsistency::Building => "Building",
        }
    }
}

/// How steady attention was over the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusStability {
    Stable,
    Moderate,
    Variable,
}

impl FocusStability {
    pub fn label(&self) -> &'static str {
        match self {
            FocusStability::Stable => "Stable",
            FocusStability::Moderate => "Moderate",
            FocusStability::Variable => "Variable",
        }
    }
}

/// Summary shown after a practice session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSummary {
    pub metrics: PracticeMetrics,
    pub overall_score: u32,
    pub tip: String,
    pub completion_consistency: CompletionConsistency,
    pub focus_stability: FocusStability,
    pub reasoning_insight: String,
}

/// A practice session as handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeRecord {
    pub id: Uuid,
    pub user_id: String,
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flashcard_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_id: Option<String>,
    pub metrics: PracticeMetrics,
    pub created_at: DateTime<Utc>,
}

/// A test session as handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub id: Uuid,
    pub user_id: String,
    pub activity_type: String,
    pub result: TestResult,
    pub created_at: DateTime<Utc>,
}

/// Who and what a finished session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTag {
    pub user_id: String,
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flashcard_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_id: Option<String>,
}

impl SessionTag {
    pub fn new(user_id: impl Into<String>, activity_type: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            activity_type: activity_type.into(),
            flashcard_id: None,
            routine_id: None,
        }
    }

    pub fn with_routine(mut self, routine_id: impl Into<String>) -> Self {
        self.routine_id = Some(routine_id.into());
        self
    }

    pub fn with_flashcard(mut self, flashcard_id: impl Into<String>) -> Self {
        self.flashcard_id = Some(flashcard_id.into());
        self
    }
}

/// The slice of a past practice session used for trend insights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSession {
    pub engagement_score: u32,
    pub created_at: DateTime<Utc>,
}

impl From<&PracticeRecord> for HistoricalSession {
    fn from(record: &PracticeRecord) -> Self {
        Self {
            engagement_score: record.metrics.engagement_score,
            created_at: record.created_at,
        }
    }
}

/// Outcome of handing a result to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum SaveStatus {
    /// Stored under the returned identifier
    Saved(String),
    /// Not stored; the message is meant for a user-visible notification
    Failed(String),
    /// No store was configured
    Skipped,
}

impl SaveStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveStatus::Saved(_))
    }
}
