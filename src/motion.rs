//! Frame-difference motion estimation
//!
//! Motion is the share of pixels whose summed absolute RGB change between two
//! consecutive downscaled frames exceeds a fixed threshold. The heuristic is
//! cheap and tolerant of sensor noise; it does not try to find a face or pose.

/// Per-pixel |ΔR|+|ΔG|+|ΔB| above which a pixel counts as changed
pub const MOTION_THRESHOLD: u32 = 25;

/// Motion percentage above which a sample counts as "has motion"
pub const MOTION_NOISE_FLOOR_PCT: f64 = 1.0;

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Percentage (0-100) of pixels that changed between `previous` and `current`
///
/// Both buffers are tightly packed RGBA; alpha is ignored. Returns 0 when
/// there is no previous frame, when the frame has no pixels, or when the two
/// buffers differ in size.
pub fn motion_percentage(current: &[u8], previous: Option<&[u8]>, threshold: u32) -> f64 {
    let Some(previous) = previous else {
        return 0.0;
    };
    let total_pixels = current.len() / BYTES_PER_PIXEL;
    if total_pixels == 0 || previous.len() != current.len() {
        return 0.0;
    }

    let changed = current
        .chunks_exact(BYTES_PER_PIXEL)
        .zip(previous.chunks_exact(BYTES_PER_PIXEL))
        .filter(|(cur, prev)| channel_delta(cur, prev) > threshold)
        .count();

    (changed as f64 / total_pixels as f64) * 100.0
}

fn channel_delta(cur: &[u8], prev: &[u8]) -> u32 {
    cur[..3]
        .iter()
        .zip(&prev[..3])
        .map(|(a, b)| a.abs_diff(*b) as u32)
        .sum()
}

/// Stateless estimator carrying its thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEstimator {
    threshold: u32,
    noise_floor_pct: f64,
}

impl Default for MotionEstimator {
    fn default() -> Self {
        Self::new(MOTION_THRESHOLD, MOTION_NOISE_FLOOR_PCT)
    }
}

impl MotionEstimator {
    pub fn new(threshold: u32, noise_floor_pct: f64) -> Self {
        Self {
            threshold,
            noise_floor_pct,
        }
    }

    /// Motion percentage between two consecutive frames
    pub fn estimate(&self, current: &[u8], previous: Option<&[u8]>) -> f64 {
        motion_percentage(current, previous, self.threshold)
    }

    /// Whether a sample's motion percentage clears the noise floor
    pub fn has_motion(&self, motion_pct: f64) -> bool {
        motion_pct > self.noise_floor_pct
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn noise_floor_pct(&self) -> f64 {
        self.noise_floor_pct
    }
}
