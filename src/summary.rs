//! Session summaries and persistence records
//!
//! Turns finished [`PracticeMetrics`] into what the presentation layer shows
//! (practice summary, test result) and what the persistence collaborator
//! stores (records with ids and timestamps).

use crate::scoring::{
    compute_practice_overall_score, compute_test_final_score, get_practice_ai_tip,
    get_test_performance_tier, TimeWindow,
};
use crate::types::{
    CompletionConsistency, FocusStability, PracticeMetrics, PracticeRecord, PracticeSummary,
    SessionTag, TestRecord, TestResult,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Build the practice session summary
pub fn summarize_practice(metrics: &PracticeMetrics) -> PracticeSummary {
    let engagement = metrics.engagement_score;
    let motion = metrics.motion_score;

    PracticeSummary {
        metrics: *metrics,
        overall_score: compute_practice_overall_score(engagement, motion),
        tip: get_practice_ai_tip(engagement, motion).to_string(),
        completion_consistency: completion_consistency(engagement, motion),
        focus_stability: focus_stability(engagement),
        reasoning_insight: reasoning_insight(engagement, motion).to_string(),
    }
}

/// Score a test session against the expected duration window
///
/// Engagement feeds `engagement`, motion score feeds `motion_accuracy`, and
/// the session length feeds time efficiency.
pub fn evaluate_test(metrics: &PracticeMetrics, window: TimeWindow) -> TestResult {
    let engagement = metrics.engagement_score;
    let motion_accuracy = metrics.motion_score;
    let time_efficiency = window.efficiency(metrics.total_time_sec);
    let final_score = compute_test_final_score(engagement, motion_accuracy, time_efficiency);

    TestResult {
        engagement,
        motion_accuracy,
        time_efficiency,
        final_score,
        performance_tier: get_test_performance_tier(final_score),
        total_time_sec: metrics.total_time_sec,
    }
}

/// Average of engagement and motion: 75+ high, 50+ medium
fn completion_consistency(engagement: u32, motion: u32) -> CompletionConsistency {
    let avg = (engagement as f64 + motion as f64) / 2.0;
    if avg >= 75.0 {
        CompletionConsistency::High
    } else if avg >= 50.0 {
        CompletionConsistency::Medium
    } else {
        CompletionConsistency::Building
    }
}

fn focus_stability(engagement: u32) -> FocusStability {
    match engagement {
        e if e >= 70 => FocusStability::Stable,
        e if e >= 50 => FocusStability::Moderate,
        _ => FocusStability::Variable,
    }
}

fn reasoning_insight(engagement: u32, motion: u32) -> &'static str {
    if engagement >= 70 && motion >= 70 {
        "You were more focused during the final phase."
    } else if engagement >= 60 {
        "Focus was consistent through the session."
    } else {
        "Try to face the camera a bit more next time for better tracking."
    }
}

/// Stamps results with ids and creation times for storage
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordEncoder;

impl RecordEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn practice_record(&self, tag: &SessionTag, metrics: PracticeMetrics) -> PracticeRecord {
        self.practice_record_at(tag, metrics, Utc::now())
    }

    pub fn practice_record_at(
        &self,
        tag: &SessionTag,
        metrics: PracticeMetrics,
        created_at: DateTime<Utc>,
    ) -> PracticeRecord {
        PracticeRecord {
            id: Uuid::new_v4(),
            user_id: tag.user_id.clone(),
            activity_type: tag.activity_type.clone(),
            flashcard_id: tag.flashcard_id.clone(),
            routine_id: tag.routine_id.clone(),
            metrics,
            created_at,
        }
    }

    pub fn test_record(&self, tag: &SessionTag, result: TestResult) -> TestRecord {
        self.test_record_at(tag, result, Utc::now())
    }

    pub fn test_record_at(
        &self,
        tag: &SessionTag,
        result: TestResult,
        created_at: DateTime<Utc>,
    ) -> TestRecord {
        TestRecord {
            id: Uuid::new_v4(),
            user_id: tag.user_id.clone(),
            activity_type: tag.activity_type.clone(),
            result,
            created_at,
        }
    }
}
