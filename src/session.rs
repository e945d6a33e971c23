//! Capture sessions
//!
//! [`SessionAccumulator`] turns a stream of per-sample motion readings into
//! session counters. [`PracticeSession`] wires a clock, a frame scheduler, the
//! frame sampler, the motion estimator and one accumulator into the
//! start / frame callback / stop cycle the presentation layer drives.

use crate::clock::Clock;
use crate::config::SamplerConfig;
use crate::error::EngageError;
use crate::motion::{MotionEstimator, MOTION_NOISE_FLOOR_PCT};
use crate::sampler::{FrameSampler, SampleTick, VideoSource};
use crate::scheduler::{FrameRequestId, FrameScheduler};
use crate::types::PracticeMetrics;
use tracing::{debug, info};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Counters for one capture session
#[derive(Debug, Clone)]
pub struct SessionAccumulator {
    start_ms: i64,
    noise_floor_pct: f64,
    first_motion_at: Option<f64>,
    frames_with_motion: u32,
    total_frames: u32,
    last_frame: Option<Vec<u8>>,
}

impl SessionAccumulator {
    /// Start accumulating at `start_ms` with the default noise floor
    pub fn new(start_ms: i64) -> Self {
        Self::with_noise_floor(start_ms, MOTION_NOISE_FLOOR_PCT)
    }

    pub fn with_noise_floor(start_ms: i64, noise_floor_pct: f64) -> Self {
        Self {
            start_ms,
            noise_floor_pct,
            first_motion_at: None,
            frames_with_motion: 0,
            total_frames: 0,
            last_frame: None,
        }
    }

    /// Record one sample's motion percentage taken at `now_ms`
    pub fn on_sample(&mut self, motion_pct: f64, now_ms: i64) {
        self.total_frames += 1;
        if motion_pct > self.noise_floor_pct {
            self.frames_with_motion += 1;
            if self.first_motion_at.is_none() {
                self.first_motion_at = Some((now_ms - self.start_ms) as f64 / 1000.0);
            }
        }
    }

    /// The previously sampled frame, if any
    pub fn last_frame(&self) -> Option<&[u8]> {
        self.last_frame.as_deref()
    }

    /// Replace the previous frame, reusing its allocation
    pub fn store_frame(&mut self, frame: &[u8]) {
        match self.last_frame.as_mut() {
            Some(last) => {
                last.clear();
                last.extend_from_slice(frame);
            }
            None => self.last_frame = Some(frame.to_vec()),
        }
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn frames_with_motion(&self) -> u32 {
        self.frames_with_motion
    }

    /// Seconds from start to the first sample with motion
    pub fn first_motion_at(&self) -> Option<f64> {
        self.first_motion_at
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    /// Close the session at `now_ms` and produce its metrics
    ///
    /// ```text
    /// engagement = round(min(100, frames_with_motion / max(1, total_frames) * 100))
    /// motion     = engagement
    /// response   = first_motion_at or total, rounded to 2 decimals
    /// ```
    pub fn finish(self, now_ms: i64) -> PracticeMetrics {
        let total_sec = ((now_ms - self.start_ms) as f64 / 1000.0).max(0.0);
        let total_frames = self.total_frames.max(1) as f64;
        let ratio_pct = (self.frames_with_motion as f64 / total_frames) * 100.0;
        let engagement_score = ratio_pct.min(100.0).round() as u32;
        let response_time_sec = self.first_motion_at.unwrap_or(total_sec);

        PracticeMetrics {
            engagement_score,
            motion_score: engagement_score,
            response_time_sec: round2(response_time_sec),
            total_time_sec: round2(total_sec),
        }
    }
}

/// What a frame callback did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Callback did not belong to the outstanding request; nothing recorded
    Ignored,
    /// Too early for another sample; re-armed
    NotDue,
    /// A sample was recorded; re-armed
    Sampled { motion_pct: f64, has_motion: bool },
}

#[derive(Debug)]
struct ActiveCapture {
    accumulator: SessionAccumulator,
    pending: Option<FrameRequestId>,
}

/// One camera practice or test session
///
/// Each active screen owns its own session. Dropping a running session
/// cancels its outstanding frame request and releases its buffers.
pub struct PracticeSession<C: Clock, S: FrameScheduler> {
    clock: C,
    scheduler: S,
    sampler: FrameSampler,
    estimator: MotionEstimator,
    noise_floor_pct: f64,
    active: Option<ActiveCapture>,
}

impl<C: Clock, S: FrameScheduler> PracticeSession<C, S> {
    /// Create an idle session with default sampling parameters
    pub fn new(clock: C, scheduler: S) -> Self {
        Self::with_config(clock, scheduler, &SamplerConfig::default())
    }

    pub fn with_config(clock: C, scheduler: S, config: &SamplerConfig) -> Self {
        Self {
            clock,
            scheduler,
            sampler: FrameSampler::new(config.sample_interval_ms, config.downscale),
            estimator: MotionEstimator::new(config.motion_threshold, config.motion_noise_floor_pct),
            noise_floor_pct: config.motion_noise_floor_pct,
            active: None,
        }
    }

    /// Begin capturing and arm the first frame callback
    pub fn start(&mut self) -> Result<(), EngageError> {
        if self.active.is_some() {
            return Err(EngageError::InvalidSessionState(
                "session already running".to_string(),
            ));
        }
        let now = self.clock.now_ms();
        self.sampler.reset();
        let pending = Some(self.scheduler.request_frame());
        self.active = Some(ActiveCapture {
            accumulator: SessionAccumulator::with_noise_floor(now, self.noise_floor_pct),
            pending,
        });
        info!(start_ms = now, "capture session started");
        Ok(())
    }

    /// Frame callback for request `id`
    ///
    /// Samples when due, records the result and re-arms. Callbacks for any
    /// request other than the outstanding one are ignored.
    pub fn on_frame<V: VideoSource + ?Sized>(&mut self, id: FrameRequestId, source: &V) -> FrameOutcome {
        let Some(active) = self.active.as_mut() else {
            debug!(request = id.0, "frame callback with no running session");
            return FrameOutcome::Ignored;
        };
        if active.pending != Some(id) {
            debug!(request = id.0, "stale frame callback ignored");
            return FrameOutcome::Ignored;
        }
        active.pending = None;

        let now = self.clock.now_ms();
        let outcome = match self.sampler.poll(now, source) {
            SampleTick::NotDue => FrameOutcome::NotDue,
            SampleTick::NotReady => {
                active.accumulator.on_sample(0.0, now);
                FrameOutcome::Sampled {
                    motion_pct: 0.0,
                    has_motion: false,
                }
            }
            SampleTick::Frame(bytes) => {
                let motion_pct = self.estimator.estimate(bytes, active.accumulator.last_frame());
                active.accumulator.store_frame(bytes);
                active.accumulator.on_sample(motion_pct, now);
                FrameOutcome::Sampled {
                    motion_pct,
                    has_motion: self.estimator.has_motion(motion_pct),
                }
            }
        };

        active.pending = Some(self.scheduler.request_frame());
        outcome
    }

    /// Stop capturing and produce the session metrics
    ///
    /// The outstanding frame request is cancelled before the counters are read.
    pub fn stop(&mut self) -> Result<PracticeMetrics, EngageError> {
        let Some(mut active) = self.active.take() else {
            return Err(EngageError::InvalidSessionState(
                "session is not running".to_string(),
            ));
        };
        if let Some(id) = active.pending.take() {
            self.scheduler.cancel_frame(id);
        }
        let now = self.clock.now_ms();
        let frames = active.accumulator.total_frames();
        let metrics = active.accumulator.finish(now);
        self.sampler.release();

        info!(
            frames,
            engagement = metrics.engagement_score,
            total_time_sec = metrics.total_time_sec,
            "capture session stopped"
        );
        Ok(metrics)
    }

    /// Abandon a running session without producing metrics
    ///
    /// Returns `false` if nothing was running.
    pub fn cancel(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };
        if let Some(id) = active.pending.take() {
            self.scheduler.cancel_frame(id);
        }
        self.sampler.release();
        info!(
            frames = active.accumulator.total_frames(),
            "capture session cancelled"
        );
        true
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Samples recorded so far in the running session
    pub fn frames_sampled(&self) -> u32 {
        self.active
            .as_ref()
            .map_or(0, |active| active.accumulator.total_frames())
    }

    /// The outstanding frame request, if any
    pub fn pending_request(&self) -> Option<FrameRequestId> {
        self.active.as_ref().and_then(|active| active.pending)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

impl<C: Clock, S: FrameScheduler> Drop for PracticeSession<C, S> {
    fn drop(&mut self) {
        if let Some(id) = self.active.as_mut().and_then(|active| active.pending.take()) {
            self.scheduler.cancel_frame(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sampler::{RasterBuffer, RgbaFrameSource};
    use crate::scheduler::ManualScheduler;
    use pretty_assertions::assert_eq;

    const W: u32 = 20;
    const H: u32 = 20;

    fn frame(value: u8) -> Vec<u8> {
        let mut data = Vec::new();
        for _ in 0..(W * H) {
            data.extend_from_slice(&[value, value, value, 255]);
        }
        data
    }

    struct Harness {
        clock: ManualClock,
        frames: ManualScheduler,
        session: PracticeSession<ManualClock, ManualScheduler>,
        source: RgbaFrameSource,
    }

    impl Harness {
        fn new() -> Self {
            let clock = ManualClock::new(10_000);
            let frames = ManualScheduler::new();
            let session = PracticeSession::new(clock.clone(), frames.clone());
            Self {
                clock,
                frames,
                session,
                source: RgbaFrameSource::new(),
            }
        }

        /// Advance to `offset_ms` after the start and fire the next frame
        fn fire_at(&mut self, offset_ms: i64, value: u8) -> FrameOutcome {
            self.clock.set(10_000 + offset_ms);
            self.source.push_frame(W, H, &frame(value)).unwrap();
            let id = self.frames.next_frame().expect("a frame should be armed");
            self.session.on_frame(id, &self.source)
        }
    }

    #[test]
    fn test_accumulator_scenario() {
        // 10 samples at 200ms, 6 with motion, first motion on sample 2
        let mut acc = SessionAccumulator::new(0);
        let motion = [0.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 0.0, 0.0, 0.0];
        for (i, pct) in motion.iter().enumerate() {
            acc.on_sample(*pct, (i as i64 + 1) * 200);
        }
        assert_eq!(acc.total_frames(), 10);
        assert_eq!(acc.frames_with_motion(), 6);

        let metrics = acc.finish(2_000);
        assert_eq!(
            metrics,
            PracticeMetrics {
                engagement_score: 60,
                motion_score: 60,
                response_time_sec: 0.4,
                total_time_sec: 2.0,
            }
        );
    }

    #[test]
    fn test_first_motion_is_set_once() {
        let mut acc = SessionAccumulator::new(1_000);
        acc.on_sample(0.5, 1_200);
        acc.on_sample(30.0, 1_400);
        acc.on_sample(30.0, 1_600);
        assert_eq!(acc.first_motion_at(), Some(0.4));
    }

    #[test]
    fn test_no_motion_uses_total_time_as_response() {
        let mut acc = SessionAccumulator::new(0);
        acc.on_sample(0.0, 200);
        let metrics = acc.finish(3_456);
        assert_eq!(metrics.engagement_score, 0);
        assert_eq!(metrics.response_time_sec, 3.46);
        assert_eq!(metrics.total_time_sec, 3.46);
    }

    #[test]
    fn test_empty_session() {
        let metrics = SessionAccumulator::new(500).finish(500);
        assert_eq!(metrics.engagement_score, 0);
        assert_eq!(metrics.total_time_sec, 0.0);
        assert_eq!(metrics.response_time_sec, 0.0);
    }

    #[test]
    fn test_store_frame_reuses_buffer() {
        let mut acc = SessionAccumulator::new(0);
        acc.store_frame(&[1, 2, 3, 4]);
        acc.store_frame(&[5, 6, 7, 8]);
        assert_eq!(acc.last_frame(), Some(&[5u8, 6, 7, 8][..]));
    }

    #[test]
    fn test_session_scenario_end_to_end() {
        let mut h = Harness::new();
        h.session.start().unwrap();

        // Sample 1 has no reference frame; samples 2-7 alternate; 8-10 hold still
        let values = [0, 200, 0, 200, 0, 200, 0, 0, 0, 0];
        for (i, value) in values.iter().enumerate() {
            let outcome = h.fire_at((i as i64 + 1) * 200, *value);
            assert!(matches!(outcome, FrameOutcome::Sampled { .. }));
        }

        h.clock.set(12_000);
        let metrics = h.session.stop().unwrap();
        assert_eq!(metrics.engagement_score, 60);
        assert_eq!(metrics.motion_score, 60);
        assert!((metrics.response_time_sec - 0.4).abs() < 1e-9);
        assert_eq!(metrics.total_time_sec, 2.0);
    }

    #[test]
    fn test_frames_between_samples_are_not_due() {
        let mut h = Harness::new();
        h.session.start().unwrap();

        assert!(matches!(h.fire_at(16, 0), FrameOutcome::Sampled { .. }));
        assert_eq!(h.fire_at(33, 200), FrameOutcome::NotDue);
        assert_eq!(h.fire_at(200, 200), FrameOutcome::NotDue);
        match h.fire_at(216, 200) {
            FrameOutcome::Sampled { motion_pct, has_motion } => {
                assert_eq!(motion_pct, 100.0);
                assert!(has_motion);
            }
            other => panic!("expected sample, got {other:?}"),
        }
        assert_eq!(h.session.frames_sampled(), 2);
        // Always exactly one request armed while running
        assert_eq!(h.frames.pending_count(), 1);
    }

    #[test]
    fn test_stop_cancels_pending_callback() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.fire_at(200, 0);
        let armed = h.session.pending_request().unwrap();

        h.session.stop().unwrap();
        assert_eq!(h.frames.pending_count(), 0);
        assert_eq!(h.frames.cancelled_count(), 1);

        // A late callback for the cancelled request must not reach the next session
        h.session.start().unwrap();
        assert_eq!(h.session.on_frame(armed, &h.source), FrameOutcome::Ignored);
        assert_eq!(h.session.frames_sampled(), 0);
    }

    #[test]
    fn test_callback_after_stop_is_ignored() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        let armed = h.session.pending_request().unwrap();
        h.session.stop().unwrap();
        assert_eq!(h.session.on_frame(armed, &h.source), FrameOutcome::Ignored);
    }

    #[test]
    fn test_cancel_discards_session() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        h.fire_at(200, 0);
        h.fire_at(400, 200);

        assert!(h.session.cancel());
        assert!(!h.session.is_running());
        assert_eq!(h.frames.pending_count(), 0);
        assert!(matches!(
            h.session.stop(),
            Err(EngageError::InvalidSessionState(_))
        ));
        assert!(!h.session.cancel());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut h = Harness::new();
        h.session.start().unwrap();
        assert!(matches!(
            h.session.start(),
            Err(EngageError::InvalidSessionState(_))
        ));
    }

    #[test]
    fn test_drop_cancels_pending_request() {
        let clock = ManualClock::new(0);
        let frames = ManualScheduler::new();
        {
            let mut session = PracticeSession::new(clock.clone(), frames.clone());
            session.start().unwrap();
            assert_eq!(frames.pending_count(), 1);
        }
        assert_eq!(frames.pending_count(), 0);
    }

    struct NeverReady;

    impl VideoSource for NeverReady {
        fn is_ready(&self) -> bool {
            false
        }
        fn native_dimensions(&self) -> (u32, u32) {
            (0, 0)
        }
        fn draw_into(&self, _target: &mut RasterBuffer) {}
    }

    #[test]
    fn test_unready_source_records_zero_motion() {
        let clock = ManualClock::new(0);
        let frames = ManualScheduler::new();
        let mut session = PracticeSession::new(clock.clone(), frames.clone());
        session.start().unwrap();

        for step in 1..=5 {
            clock.set(step * 200);
            let id = frames.next_frame().unwrap();
            session.on_frame(id, &NeverReady);
        }
        assert_eq!(session.frames_sampled(), 5);

        let metrics = session.stop().unwrap();
        assert_eq!(metrics.engagement_score, 0);
        assert_eq!(metrics.response_time_sec, metrics.total_time_sec);
    }

    #[test]
    fn test_response_never_exceeds_total() {
        let mut seed: u64 = 42;
        for _ in 0..200 {
            let mut acc = SessionAccumulator::new(0);
            let mut now = 0;
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let samples = (seed >> 59) as i64 + 1;
            for _ in 0..samples {
                seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                now += 150 + (seed >> 56) as i64;
                let pct = ((seed >> 40) % 10) as f64;
                acc.on_sample(pct, now);
            }
            let metrics = acc.finish(now + 7);
            assert!(metrics.engagement_score <= 100);
            assert_eq!(metrics.motion_score, metrics.engagement_score);
            assert!(metrics.response_time_sec <= metrics.total_time_sec + 0.005);
        }
    }
}
