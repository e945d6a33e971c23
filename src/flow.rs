//! Practice/test screen flow
//!
//! `Intro → Recording → Results`, strictly forward. Cancelling while
//! recording drops the session without metrics and goes back to `Intro`;
//! `restart` returns to `Intro` from anywhere.

use crate::clock::Clock;
use crate::config::EngageConfig;
use crate::error::EngageError;
use crate::sampler::VideoSource;
use crate::scheduler::{FrameRequestId, FrameScheduler};
use crate::session::{FrameOutcome, PracticeSession};
use crate::summary::{evaluate_test, summarize_practice};
use crate::timer::ElapsedTimer;
use crate::types::{PracticeMetrics, PracticeSummary, TestResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which kind of screen is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Practice,
    Test,
}

/// Screen phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intro,
    Recording,
    Results,
}

/// Scored view of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Evaluation {
    Practice(PracticeSummary),
    Test(TestResult),
}

/// What the results phase shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub metrics: PracticeMetrics,
    pub evaluation: Evaluation,
}

/// One practice or test screen with its own capture session
pub struct ScreenFlow<C: Clock + Clone, S: FrameScheduler> {
    mode: SessionMode,
    config: EngageConfig,
    phase: Phase,
    session: PracticeSession<C, S>,
    timer: ElapsedTimer<C>,
    outcome: Option<SessionOutcome>,
}

impl<C: Clock + Clone, S: FrameScheduler> ScreenFlow<C, S> {
    pub fn new(mode: SessionMode, clock: C, scheduler: S) -> Self {
        Self::with_config(mode, clock, scheduler, EngageConfig::default())
    }

    pub fn with_config(mode: SessionMode, clock: C, scheduler: S, config: EngageConfig) -> Self {
        Self {
            mode,
            phase: Phase::Intro,
            session: PracticeSession::with_config(clock.clone(), scheduler, &config.sampler),
            timer: ElapsedTimer::new(clock),
            outcome: None,
            config,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Result of the last finished session, present only in `Results`
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Seconds shown on the recording timer
    pub fn elapsed_sec(&self) -> f64 {
        self.timer.elapsed_sec()
    }

    pub fn session(&self) -> &PracticeSession<C, S> {
        &self.session
    }

    /// `Intro → Recording`
    pub fn begin_recording(&mut self) -> Result<(), EngageError> {
        self.expect_phase(Phase::Intro, "begin recording")?;
        self.session.start()?;
        self.timer.reset();
        self.timer.start();
        self.phase = Phase::Recording;
        debug!(mode = ?self.mode, "recording");
        Ok(())
    }

    /// Forward a frame callback to the capture session
    pub fn on_frame<V: VideoSource + ?Sized>(&mut self, id: FrameRequestId, source: &V) -> FrameOutcome {
        if self.phase != Phase::Recording {
            return FrameOutcome::Ignored;
        }
        self.session.on_frame(id, source)
    }

    /// `Recording → Results`, scoring the session for this screen's mode
    pub fn finish(&mut self) -> Result<&SessionOutcome, EngageError> {
        self.expect_phase(Phase::Recording, "finish")?;
        let metrics = self.session.stop()?;
        self.timer.stop();

        let evaluation = match self.mode {
            SessionMode::Practice => Evaluation::Practice(summarize_practice(&metrics)),
            SessionMode::Test => {
                Evaluation::Test(evaluate_test(&metrics, self.config.scoring.test_window))
            }
        };
        self.phase = Phase::Results;
        Ok(self.outcome.insert(SessionOutcome { metrics, evaluation }))
    }

    /// `Recording → Intro` without producing metrics
    pub fn cancel(&mut self) -> Result<(), EngageError> {
        self.expect_phase(Phase::Recording, "cancel")?;
        self.session.cancel();
        self.timer.reset();
        self.phase = Phase::Intro;
        debug!(mode = ?self.mode, "recording cancelled");
        Ok(())
    }

    /// Back to `Intro` from any phase, discarding everything
    pub fn restart(&mut self) {
        self.session.cancel();
        self.timer.reset();
        self.outcome = None;
        self.phase = Phase::Intro;
    }

    fn expect_phase(&self, expected: Phase, action: &str) -> Result<(), EngageError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(EngageError::InvalidSessionState(format!(
                "cannot {action} in {:?} phase",
                self.phase
            )))
        }
    }
}
