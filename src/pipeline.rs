//! Result pipeline orchestration
//!
//! Public API for turning finished session metrics into summaries, test
//! results and stored records. The one-shot functions are stateless; the
//! [`EngagementProcessor`] keeps a practice history across sessions and hands
//! records to a [`ResultStore`].

use crate::config::ScoringConfig;
use crate::error::EngageError;
use crate::history::SessionHistory;
use crate::scoring::{EngagementTrend, TimeWindow};
use crate::store::ResultStore;
use crate::summary::{evaluate_test, summarize_practice, RecordEncoder};
use crate::types::{
    HistoricalSession, PracticeMetrics, PracticeSummary, SaveStatus, SessionTag, TestResult,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Convert practice metrics JSON into a practice summary JSON (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let summary_json = practice_summary_json(r#"{"engagement_score": 60, ...}"#)?;
/// ```
pub fn practice_summary_json(metrics_json: &str) -> Result<String, EngageError> {
    let metrics = parse_metrics(metrics_json)?;
    let summary = summarize_practice(&metrics);
    serde_json::to_string_pretty(&summary).map_err(EngageError::JsonError)
}

/// Convert test session metrics JSON into a test result JSON (stateless, one-shot).
///
/// Time efficiency is scored against `window`.
pub fn test_result_json(metrics_json: &str, window: TimeWindow) -> Result<String, EngageError> {
    let metrics = parse_metrics(metrics_json)?;
    let result = evaluate_test(&metrics, window);
    serde_json::to_string_pretty(&result).map_err(EngageError::JsonError)
}

/// Parse and range-check a metrics payload
pub fn parse_metrics(metrics_json: &str) -> Result<PracticeMetrics, EngageError> {
    let metrics: PracticeMetrics = serde_json::from_str(metrics_json)?;
    if metrics.engagement_score > 100 || metrics.motion_score > 100 {
        return Err(EngageError::ParseError(format!(
            "scores must be within 0-100, got engagement {} and motion {}",
            metrics.engagement_score, metrics.motion_score
        )));
    }
    if !(metrics.total_time_sec >= 0.0) || !(metrics.response_time_sec >= 0.0) {
        return Err(EngageError::ParseError(
            "times must be non-negative".to_string(),
        ));
    }
    Ok(metrics)
}

/// Everything the practice results screen needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeOutcome {
    pub summary: PracticeSummary,
    pub trend: EngagementTrend,
    pub insight: String,
    pub save: SaveStatus,
}

/// Everything the test results screen needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub result: TestResult,
    pub save: SaveStatus,
}

/// Stateful processor keeping practice history and an optional store.
///
/// Computed results are always returned; a failed save is reported in the
/// outcome's `save` field for the host to surface.
pub struct EngagementProcessor<St: ResultStore> {
    store: Option<St>,
    history: SessionHistory,
    encoder: RecordEncoder,
    scoring: ScoringConfig,
}

impl<St: ResultStore> Default for EngagementProcessor<St> {
    fn default() -> Self {
        Self::new()
    }
}

impl<St: ResultStore> EngagementProcessor<St> {
    /// Processor without a store; results are scored but not persisted
    pub fn new() -> Self {
        Self {
            store: None,
            history: SessionHistory::default(),
            encoder: RecordEncoder::new(),
            scoring: ScoringConfig::default(),
        }
    }

    /// Processor persisting into `store`
    pub fn with_store(store: St) -> Self {
        Self {
            store: Some(store),
            ..Self::new()
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Score a finished practice session, record it and try to save it
    ///
    /// With a store, the trend compares against the user's latest stored
    /// session; without one, against the in-process history.
    pub fn complete_practice(&mut self, tag: &SessionTag, metrics: PracticeMetrics) -> PracticeOutcome {
        let summary = summarize_practice(&metrics);
        let record = self.encoder.practice_record(tag, metrics);
        self.history.record(HistoricalSession::from(&record));

        let (save, trend) = match self.store.as_mut() {
            Some(store) => {
                let previous = store
                    .recent_practice(&tag.user_id, 1)
                    .first()
                    .map(|s| s.engagement_score);
                let save = Self::save_status(store.save_practice(&record));
                let trend = EngagementTrend::classify(Some(metrics.engagement_score), previous);
                (save, trend)
            }
            None => (SaveStatus::Skipped, self.history.trend()),
        };

        PracticeOutcome {
            summary,
            trend,
            insight: trend.message().to_string(),
            save,
        }
    }

    /// Score a finished test session and try to save it
    pub fn complete_test(&mut self, tag: &SessionTag, metrics: PracticeMetrics) -> TestOutcome {
        let result = evaluate_test(&metrics, self.scoring.test_window);
        let save = match self.store.as_mut() {
            Some(store) => {
                let record = self.encoder.test_record(tag, result);
                Self::save_status(store.save_test(&record))
            }
            None => SaveStatus::Skipped,
        };
        TestOutcome { result, save }
    }

    /// Dashboard insight for a user, from the store when present, else from
    /// the in-process history
    pub fn insight_for(&self, user_id: &str) -> &'static str {
        let recent = match self.store.as_ref() {
            Some(store) => store.recent_practice(user_id, 2),
            None => self.history.last(2),
        };
        EngagementTrend::classify(
            recent.first().map(|s| s.engagement_score),
            recent.get(1).map(|s| s.engagement_score),
        )
        .message()
    }

    fn save_status(result: Result<String, EngageError>) -> SaveStatus {
        match result {
            Ok(id) => SaveStatus::Saved(id),
            Err(e) => {
                warn!(error = %e, "failed to save session result");
                SaveStatus::Failed(e.to_string())
            }
        }
    }

    pub fn store(&self) -> Option<&St> {
        self.store.as_ref()
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// Save practice history to JSON for persistence
    pub fn save_history(&self) -> Result<String, EngageError> {
        self.history
            .to_json()
            .map_err(|e| EngageError::ParseError(e.to_string()))
    }

    /// Load practice history from JSON
    pub fn load_history(&mut self, json: &str) -> Result<(), EngageError> {
        self.history = SessionHistory::from_json(json)
            .map_err(|e| EngageError::ParseError(e.to_string()))?;
        Ok(())
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{PerformanceTier, PracticeRecord, TestRecord};

    fn sample_metrics_json() -> &'static str {
        r#"{
            "engagement_score": 60,
            "motion_score": 60,
            "response_time_sec": 0.4,
            "total_time_sec": 2.0
        }"#
    }

    fn metrics(engagement: u32, total_time_sec: f64) -> PracticeMetrics {
        PracticeMetrics {
            engagement_score: engagement,
            motion_score: engagement,
            response_time_sec: 1.0,
            total_time_sec,
        }
    }

    struct OfflineStore;

    impl ResultStore for OfflineStore {
        fn save_practice(&mut self, _record: &PracticeRecord) -> Result<String, EngageError> {
            Err(EngageError::Persistence("network unavailable".to_string()))
        }

        fn save_test(&mut self, _record: &TestRecord) -> Result<String, EngageError> {
            Err(EngageError::Persistence("network unavailable".to_string()))
        }

        fn recent_practice(&self, _user_id: &str, _limit: usize) -> Vec<HistoricalSession> {
            Vec::new()
        }

        fn last_practice_for_routine(&self, _user_id: &str, _routine_id: &str) -> Option<HistoricalSession> {
            None
        }
    }

    #[test]
    fn test_practice_summary_json() {
        let json = practice_summary_json(sample_metrics_json()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["overall_score"], 60);
        assert_eq!(value["completion_consistency"], "medium");
        assert_eq!(value["focus_stability"], "moderate");
        assert_eq!(value["metrics"]["engagement_score"], 60);
    }

    #[test]
    fn test_test_result_json() {
        let json = test_result_json(sample_metrics_json(), TimeWindow::TEST).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        // 2s of 20s: efficiency 10, final 24 + 24 + 2
        assert_eq!(value["time_efficiency"], 10);
        assert_eq!(value["final_score"], 50);
        assert_eq!(value["performance_tier"], "improving");
    }

    #[test]
    fn test_invalid_metrics() {
        assert!(matches!(
            practice_summary_json("not valid json"),
            Err(EngageError::JsonError(_))
        ));
        let out_of_range = r#"{"engagement_score": 140, "motion_score": 60,
            "response_time_sec": 0.4, "total_time_sec": 2.0}"#;
        assert!(matches!(
            parse_metrics(out_of_range),
            Err(EngageError::ParseError(_))
        ));
        let negative = r#"{"engagement_score": 40, "motion_score": 40,
            "response_time_sec": 0.4, "total_time_sec": -2.0}"#;
        assert!(parse_metrics(negative).is_err());
    }

    #[test]
    fn test_practice_without_store() {
        let mut processor: EngagementProcessor<MemoryStore> = EngagementProcessor::new();
        let tag = SessionTag::new("alice", "Morning");

        let first = processor.complete_practice(&tag, metrics(60, 30.0));
        assert_eq!(first.save, SaveStatus::Skipped);
        assert_eq!(first.trend, EngagementTrend::FirstSession);

        let second = processor.complete_practice(&tag, metrics(80, 30.0));
        assert_eq!(second.trend, EngagementTrend::Improved);
        assert_eq!(second.insight, "Engagement improved compared to last session.");
        assert_eq!(processor.history().len(), 2);
        assert_eq!(
            processor.insight_for("alice"),
            "Engagement improved compared to last session."
        );
    }

    #[test]
    fn test_practice_with_store() {
        let mut processor = EngagementProcessor::with_store(MemoryStore::new());
        let tag = SessionTag::new("alice", "Morning").with_routine("r-1");

        let outcome = processor.complete_practice(&tag, metrics(75, 30.0));
        assert!(outcome.save.is_saved());

        let store = processor.store().unwrap();
        assert_eq!(store.practice_records().count(), 1);
        assert_eq!(
            store.last_practice_for_routine("alice", "r-1").unwrap().engagement_score,
            75
        );
        assert_eq!(
            processor.insight_for("alice"),
            "Great start! Keep practicing to see progress."
        );
        assert_eq!(
            processor.insight_for("bob"),
            "Complete a practice session to see AI insights."
        );
    }

    #[test]
    fn test_practice_trend_reads_reloaded_store() {
        let tag = SessionTag::new("alice", "Morning");
        let mut first = EngagementProcessor::with_store(MemoryStore::new());
        first.complete_practice(&tag, metrics(40, 30.0));
        let snapshot = first.store().unwrap().to_json().unwrap();

        let mut reloaded = EngagementProcessor::with_store(MemoryStore::from_json(&snapshot).unwrap());
        let outcome = reloaded.complete_practice(&tag, metrics(80, 30.0));
        assert_eq!(outcome.trend, EngagementTrend::Improved);
        assert_eq!(outcome.insight, reloaded.insight_for("alice"));

        // Other users' sessions do not count
        let bob = reloaded.complete_practice(&SessionTag::new("bob", "Morning"), metrics(10, 30.0));
        assert_eq!(bob.trend, EngagementTrend::FirstSession);
    }

    #[test]
    fn test_save_failure_keeps_results() {
        let mut processor = EngagementProcessor::with_store(OfflineStore);
        let tag = SessionTag::new("alice", "Morning");

        let practice = processor.complete_practice(&tag, metrics(75, 30.0));
        assert_eq!(practice.summary.overall_score, 75);
        assert!(matches!(practice.save, SaveStatus::Failed(ref msg) if msg.contains("network")));

        let test = processor.complete_test(&tag, metrics(95, 60.0));
        assert_eq!(test.result.performance_tier, PerformanceTier::Excellent);
        assert!(matches!(test.save, SaveStatus::Failed(_)));
    }

    #[test]
    fn test_complete_test_saves_record() {
        let mut processor = EngagementProcessor::with_store(MemoryStore::new());
        let tag = SessionTag::new("alice", "Bedtime");

        let outcome = processor.complete_test(&tag, metrics(70, 200.0));
        // 20s over the 180s window: 100 - 8.33 -> 92; 28 + 28 + 18.4 = 74.4
        assert_eq!(outcome.result.time_efficiency, 92);
        assert_eq!(outcome.result.final_score, 74);
        assert_eq!(outcome.result.performance_tier, PerformanceTier::Good);
        assert!(outcome.save.is_saved());
        assert_eq!(processor.store().unwrap().test_records().count(), 1);
    }

    #[test]
    fn test_complete_test_uses_configured_window() {
        let scoring = ScoringConfig {
            test_window: TimeWindow::new(60.0, 90.0),
        };
        let mut processor: EngagementProcessor<MemoryStore> =
            EngagementProcessor::new().with_scoring(scoring);
        let tag = SessionTag::new("alice", "Bedtime");

        // 30s of a 60s minimum
        let outcome = processor.complete_test(&tag, metrics(50, 30.0));
        assert_eq!(outcome.result.time_efficiency, 50);
        assert_eq!(outcome.save, SaveStatus::Skipped);
    }

    #[test]
    fn test_history_persistence() {
        let mut processor: EngagementProcessor<MemoryStore> = EngagementProcessor::new();
        let tag = SessionTag::new("alice", "Morning");
        processor.complete_practice(&tag, metrics(40, 30.0));

        let saved = processor.save_history().unwrap();

        let mut restored: EngagementProcessor<MemoryStore> = EngagementProcessor::new();
        restored.load_history(&saved).unwrap();
        assert_eq!(restored.history().len(), 1);

        let outcome = restored.complete_practice(&tag, metrics(20, 30.0));
        assert_eq!(outcome.trend, EngagementTrend::Lower);

        restored.clear_history();
        assert!(restored.history().is_empty());
        assert!(restored.load_history("not json").is_err());
    }
}
