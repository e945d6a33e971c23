//! Rolling practice history
//!
//! Keeps the most recent practice sessions (newest first) so the dashboard can
//! compare the last two and show an engagement trend.

use crate::scoring::EngagementTrend;
use crate::types::HistoricalSession;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of sessions kept
pub const DEFAULT_HISTORY_WINDOW: usize = 100;

/// Newest-first window of past practice sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistory {
    sessions: VecDeque<HistoricalSession>,
    window_size: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl SessionHistory {
    /// Create an empty history keeping at most `window_size` sessions
    pub fn new(window_size: usize) -> Self {
        Self {
            sessions: VecDeque::with_capacity(window_size.min(DEFAULT_HISTORY_WINDOW)),
            window_size,
        }
    }

    /// Add a finished session as the newest entry
    pub fn record(&mut self, session: HistoricalSession) {
        self.sessions.push_front(session);
        while self.sessions.len() > self.window_size {
            self.sessions.pop_back();
        }
    }

    /// Up to `limit` most recent sessions, newest first
    pub fn last(&self, limit: usize) -> Vec<HistoricalSession> {
        self.sessions.iter().take(limit).copied().collect()
    }

    pub fn latest(&self) -> Option<&HistoricalSession> {
        self.sessions.front()
    }

    pub fn previous(&self) -> Option<&HistoricalSession> {
        self.sessions.get(1)
    }

    /// Trend between the two most recent sessions
    pub fn trend(&self) -> EngagementTrend {
        EngagementTrend::classify(
            self.latest().map(|s| s.engagement_score),
            self.previous().map(|s| s.engagement_score),
        )
    }

    /// Dashboard insight for the two most recent sessions
    pub fn insight(&self) -> &'static str {
        self.trend().message()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Load history from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize history to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn session(engagement_score: u32, minute: i64) -> HistoricalSession {
        HistoricalSession {
            engagement_score,
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_empty_history_prompts_practice() {
        let history = SessionHistory::default();
        assert_eq!(history.trend(), EngagementTrend::NoSessions);
        assert_eq!(
            history.insight(),
            "Complete a practice session to see AI insights."
        );
    }

    #[test]
    fn test_single_session_encourages() {
        let mut history = SessionHistory::default();
        history.record(session(50, 0));
        assert_eq!(history.trend(), EngagementTrend::FirstSession);
    }

    #[test]
    fn test_compares_two_most_recent() {
        let mut history = SessionHistory::default();
        history.record(session(20, 0));
        history.record(session(60, 1));
        history.record(session(80, 2));

        assert_eq!(history.latest().unwrap().engagement_score, 80);
        assert_eq!(history.previous().unwrap().engagement_score, 60);
        assert_eq!(
            history.insight(),
            "Engagement improved compared to last session."
        );
    }

    #[test]
    fn test_window_drops_oldest() {
        let mut history = SessionHistory::new(3);
        for (i, score) in [10, 20, 30, 40, 50].iter().enumerate() {
            history.record(session(*score, i as i64));
        }
        assert_eq!(history.len(), 3);
        let scores: Vec<u32> = history.last(10).iter().map(|s| s.engagement_score).collect();
        assert_eq!(scores, vec![50, 40, 30]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut history = SessionHistory::new(5);
        history.record(session(70, 0));
        history.record(session(55, 1));

        let json = history.to_json().unwrap();
        let restored = SessionHistory::from_json(&json).unwrap();
        assert_eq!(restored, history);
    }

    #[test]
    fn test_clear() {
        let mut history = SessionHistory::default();
        history.record(session(70, 0));
        history.clear();
        assert!(history.is_empty());
    }
}
