//! Scoring formulas, performance tiers and coaching messages
//!
//! Everything here is a pure function of its arguments. Scores are integers in
//! the 0-100 range, rounded half up the same way the host application rounds
//! them for display.

use crate::types::PerformanceTier;
use serde::{Deserialize, Serialize};

/// Weight of engagement in the test final score
const FINAL_ENGAGEMENT_WEIGHT: f64 = 0.4;
/// Weight of motion accuracy in the test final score
const FINAL_MOTION_WEIGHT: f64 = 0.4;
/// Weight of time efficiency in the test final score
const FINAL_TIME_WEIGHT: f64 = 0.2;

/// Points lost per minute past the expected window
const OVERTIME_PENALTY_PER_MIN: f64 = 25.0;
/// Upper bound on the overtime penalty
const MAX_OVERTIME_PENALTY: f64 = 50.0;

/// Engagement delta (points) that counts as a real change between sessions
const INSIGHT_DELTA: i64 = 10;

/// Expected session duration window in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub min_sec: f64,
    pub max_sec: f64,
}

impl TimeWindow {
    /// Window used for practice sessions
    pub const PRACTICE: TimeWindow = TimeWindow {
        min_sec: 15.0,
        max_sec: 120.0,
    };

    /// Window used for test sessions
    pub const TEST: TimeWindow = TimeWindow {
        min_sec: 20.0,
        max_sec: 180.0,
    };

    pub fn new(min_sec: f64, max_sec: f64) -> Self {
        Self { min_sec, max_sec }
    }

    /// Time efficiency of `total_time_sec` against this window
    pub fn efficiency(&self, total_time_sec: f64) -> u32 {
        compute_time_efficiency(total_time_sec, self.min_sec, self.max_sec)
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::PRACTICE
    }
}

fn round_score(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

/// Compute the final score of a test session
///
/// Formula:
/// ```text
/// final = round(0.4 * engagement + 0.4 * motion_accuracy + 0.2 * time_efficiency)
/// ```
pub fn compute_test_final_score(engagement: u32, motion_accuracy: u32, time_efficiency: u32) -> u32 {
    round_score(
        FINAL_ENGAGEMENT_WEIGHT * engagement as f64
            + FINAL_MOTION_WEIGHT * motion_accuracy as f64
            + FINAL_TIME_WEIGHT * time_efficiency as f64,
    )
}

/// Compute time efficiency (0-100) of a session duration
///
/// - `total <= 0` scores 0
/// - inside `[min, max]` scores 100
/// - below `min` ramps linearly: `round(total / min * 100)`
/// - above `max` loses 25 points per minute over, at most 50:
///   `max(0, round(100 - min(50, (total - max) / 60 * 25)))`
///
/// Rounding still yields 100 up to 0.075s below a 15s `min` and up to 1.2s
/// over `max`.
pub fn compute_time_efficiency(total_time_sec: f64, expected_min_sec: f64, expected_max_sec: f64) -> u32 {
    // Also catches NaN
    if !(total_time_sec > 0.0) {
        return 0;
    }
    if total_time_sec >= expected_min_sec && total_time_sec <= expected_max_sec {
        return 100;
    }
    if total_time_sec < expected_min_sec {
        return round_score((total_time_sec / expected_min_sec) * 100.0).min(100);
    }
    let over_sec = total_time_sec - expected_max_sec;
    let penalty = ((over_sec / 60.0) * OVERTIME_PENALTY_PER_MIN).min(MAX_OVERTIME_PENALTY);
    round_score(100.0 - penalty)
}

/// Map a test final score to its performance tier
///
/// Lower bounds are inclusive: 90 excellent, 70 good, 50 improving.
pub fn get_test_performance_tier(final_score: u32) -> PerformanceTier {
    match final_score {
        s if s >= 90 => PerformanceTier::Excellent,
        s if s >= 70 => PerformanceTier::Good,
        s if s >= 50 => PerformanceTier::Improving,
        _ => PerformanceTier::NeedsPractice,
    }
}

/// Practice overall score: rounded mean of engagement and motion
pub fn compute_practice_overall_score(engagement_score: u32, motion_score: u32) -> u32 {
    round_score((engagement_score as f64 + motion_score as f64) / 2.0)
}

/// Trend between the two most recent practice sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementTrend {
    NoSessions,
    FirstSession,
    Improved,
    Lower,
    Similar,
}

impl EngagementTrend {
    /// Classify the latest engagement against the one before it
    pub fn classify(last: Option<u32>, previous: Option<u32>) -> Self {
        let Some(last) = last else {
            return EngagementTrend::NoSessions;
        };
        let Some(previous) = previous else {
            return EngagementTrend::FirstSession;
        };
        let diff = last as i64 - previous as i64;
        if diff > INSIGHT_DELTA {
            EngagementTrend::Improved
        } else if diff < -INSIGHT_DELTA {
            EngagementTrend::Lower
        } else {
            EngagementTrend::Similar
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            EngagementTrend::NoSessions => "Complete a practice session to see AI insights.",
            EngagementTrend::FirstSession => "Great start! Keep practicing to see progress.",
            EngagementTrend::Improved => "Engagement improved compared to last session.",
            EngagementTrend::Lower => "Engagement was lower than last time. Try facing the camera.",
            EngagementTrend::Similar => "Engagement similar to last session. Keep it up!",
        }
    }
}

/// Dashboard insight comparing the latest practice engagement with the previous one
pub fn compare_engagement_insight(last: Option<u32>, previous: Option<u32>) -> &'static str {
    EngagementTrend::classify(last, previous).message()
}

/// One-line coaching tip for a practice session summary
pub fn get_practice_ai_tip(engagement_score: u32, motion_score: u32) -> &'static str {
    let engaged = engagement_score >= 50;
    let moving = motion_score >= 50;

    if engagement_score >= 70 && motion_score >= 70 {
        "Great focus and movement!"
    } else if !engaged && moving {
        "Try to face the camera a bit more next time."
    } else if engaged && !moving {
        "Good focus! Try moving a little more during practice."
    } else if !engaged && !moving {
        "Next time, face the camera and try to follow the steps with movement."
    } else {
        "Nice job! Keep practicing to build the habit."
    }
}
