//! Frame sampling
//!
//! The sampler rate-limits frame grabs to one per sample interval and draws
//! each accepted frame into a small RGBA raster that is allocated once per
//! session and reused for every sample.

use crate::error::EngageError;
use crate::motion::BYTES_PER_PIXEL;
use tracing::warn;

/// Minimum spacing between accepted samples (5 samples per second)
pub const SAMPLE_INTERVAL_MS: i64 = 200;

/// Linear scale applied to native frame dimensions before analysis
pub const DOWNSCALE: f64 = 0.2;

/// Dimensions of the analysis raster for a native frame size
///
/// Each side is `max(1, floor(side * downscale))`.
pub fn downscaled_dimensions(native_width: u32, native_height: u32, downscale: f64) -> (u32, u32) {
    let scale = |side: u32| ((side as f64 * downscale).floor() as u32).max(1);
    (scale(native_width), scale(native_height))
}

/// Byte length of a `width` x `height` RGBA image
fn rgba_len(width: u32, height: u32) -> Result<usize, EngageError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| EngageError::InvalidFrame(format!("{width}x{height} RGBA frame is too large")))
}

/// Offscreen RGBA raster the sampler draws frames into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterBuffer {
    pub fn new(width: u32, height: u32) -> Result<Self, EngageError> {
        Ok(Self {
            width,
            height,
            data: vec![0; rgba_len(width, height)?],
        })
    }

    /// Change dimensions, keeping the allocation where possible.
    /// On error the buffer is left unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), EngageError> {
        let len = rgba_len(width, height)?;
        self.width = width;
        self.height = height;
        self.data.resize(len, 0);
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// A live video input the sampler reads from. It is only ever read.
pub trait VideoSource {
    /// Whether a current frame is available
    fn is_ready(&self) -> bool;

    /// Native frame width and height in pixels
    fn native_dimensions(&self) -> (u32, u32);

    /// Draw the current frame scaled to fill `target`
    fn draw_into(&self, target: &mut RasterBuffer);
}

impl<S: VideoSource + ?Sized> VideoSource for &S {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn native_dimensions(&self) -> (u32, u32) {
        (**self).native_dimensions()
    }

    fn draw_into(&self, target: &mut RasterBuffer) {
        (**self).draw_into(target)
    }
}

/// Video source backed by native RGBA frames pushed by the host
#[derive(Debug, Clone, Default)]
pub struct RgbaFrameSource {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbaFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame. `data` must be `width * height` RGBA pixels.
    pub fn push_frame(&mut self, width: u32, height: u32, data: &[u8]) -> Result<(), EngageError> {
        let expected = rgba_len(width, height)?;
        if data.len() != expected {
            return Err(EngageError::InvalidFrame(format!(
                "expected {expected} bytes for {width}x{height} RGBA, got {}",
                data.len()
            )));
        }
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.extend_from_slice(data);
        Ok(())
    }

    /// Drop the current frame; the source reports not ready until the next push
    pub fn clear(&mut self) {
        self.width = 0;
        self.height = 0;
        self.data.clear();
    }
}

impl VideoSource for RgbaFrameSource {
    fn is_ready(&self) -> bool {
        !self.data.is_empty()
    }

    fn native_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_into(&self, target: &mut RasterBuffer) {
        let (tw, th) = (target.width() as usize, target.height() as usize);
        let (sw, sh) = (self.width as usize, self.height as usize);
        if sw == 0 || sh == 0 {
            return;
        }
        let out = target.as_bytes_mut();
        // Nearest neighbour, sampling the centre of each target pixel
        for ty in 0..th {
            let sy = ((2 * ty + 1) * sh / (2 * th)).min(sh - 1);
            for tx in 0..tw {
                let sx = ((2 * tx + 1) * sw / (2 * tw)).min(sw - 1);
                let src = (sy * sw + sx) * BYTES_PER_PIXEL;
                let dst = (ty * tw + tx) * BYTES_PER_PIXEL;
                out[dst..dst + BYTES_PER_PIXEL]
                    .copy_from_slice(&self.data[src..src + BYTES_PER_PIXEL]);
            }
        }
    }
}

/// Result of one scheduling opportunity
#[derive(Debug, PartialEq)]
pub enum SampleTick<'a> {
    /// Less than one sample interval since the last accepted sample
    NotDue,
    /// Sample accepted but the source had no frame
    NotReady,
    /// Sample accepted; downscaled RGBA bytes of the current frame
    Frame(&'a [u8]),
}

/// Rate-limited frame grabber
#[derive(Debug)]
pub struct FrameSampler {
    interval_ms: i64,
    downscale: f64,
    last_sample_ms: Option<i64>,
    raster: Option<RasterBuffer>,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(SAMPLE_INTERVAL_MS, DOWNSCALE)
    }
}

impl FrameSampler {
    pub fn new(interval_ms: i64, downscale: f64) -> Self {
        Self {
            interval_ms,
            downscale,
            last_sample_ms: None,
            raster: None,
        }
    }

    /// Forget the last sample time so the next poll is due immediately
    pub fn reset(&mut self) {
        self.last_sample_ms = None;
    }

    /// Handle one scheduling opportunity at `now_ms`
    pub fn poll<S: VideoSource + ?Sized>(&mut self, now_ms: i64, source: &S) -> SampleTick<'_> {
        if let Some(last) = self.last_sample_ms {
            if now_ms - last < self.interval_ms {
                return SampleTick::NotDue;
            }
        }
        self.last_sample_ms = Some(now_ms);

        let (native_w, native_h) = source.native_dimensions();
        if !source.is_ready() || native_w == 0 || native_h == 0 {
            return SampleTick::NotReady;
        }

        let (w, h) = downscaled_dimensions(native_w, native_h, self.downscale);
        if self.raster.as_ref().map_or(true, |r| r.width() != w || r.height() != h) {
            let fitted = match self.raster.take() {
                Some(mut raster) => raster.resize(w, h).map(|()| raster),
                None => RasterBuffer::new(w, h),
            };
            match fitted {
                Ok(raster) => self.raster = Some(raster),
                Err(e) => {
                    warn!(error = %e, "cannot sample frame");
                    return SampleTick::NotReady;
                }
            }
        }
        let Some(raster) = self.raster.as_mut() else {
            return SampleTick::NotReady;
        };
        source.draw_into(raster);
        SampleTick::Frame(raster.as_bytes())
    }

    /// Release the raster buffer
    pub fn release(&mut self) {
        self.raster = None;
        self.last_sample_ms = None;
    }

    pub fn has_raster(&self) -> bool {
        self.raster.is_some()
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unready;

    impl VideoSource for Unready {
        fn is_ready(&self) -> bool {
            false
        }
        fn native_dimensions(&self) -> (u32, u32) {
            (0, 0)
        }
        fn draw_into(&self, _target: &mut RasterBuffer) {
            panic!("unready source must not be drawn");
        }
    }

    fn gradient_source(width: u32, height: u32) -> RgbaFrameSource {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        let mut source = RgbaFrameSource::new();
        source.push_frame(width, height, &data).unwrap();
        source
    }

    #[test]
    fn test_downscaled_dimensions() {
        assert_eq!(downscaled_dimensions(640, 480, DOWNSCALE), (128, 96));
        assert_eq!(downscaled_dimensions(642, 487, DOWNSCALE), (128, 97));
        // Never collapses to zero
        assert_eq!(downscaled_dimensions(3, 2, DOWNSCALE), (1, 1));
    }

    #[test]
    fn test_throttles_to_interval() {
        let source = gradient_source(20, 10);
        let mut sampler = FrameSampler::default();

        assert!(matches!(sampler.poll(1_000, &source), SampleTick::Frame(_)));
        assert_eq!(sampler.poll(1_016, &source), SampleTick::NotDue);
        assert_eq!(sampler.poll(1_199, &source), SampleTick::NotDue);
        assert!(matches!(sampler.poll(1_200, &source), SampleTick::Frame(_)));
    }

    #[test]
    fn test_unready_source_is_skipped_silently() {
        let mut sampler = FrameSampler::default();
        assert_eq!(sampler.poll(0, &Unready), SampleTick::NotReady);
        assert!(!sampler.has_raster());
        // The not-ready tick still counts toward the cadence
        assert_eq!(sampler.poll(100, &Unready), SampleTick::NotDue);
    }

    #[test]
    fn test_frame_is_downscaled() {
        let source = gradient_source(20, 10);
        let mut sampler = FrameSampler::default();

        match sampler.poll(0, &source) {
            SampleTick::Frame(bytes) => assert_eq!(bytes.len(), 4 * 2 * BYTES_PER_PIXEL),
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn test_raster_reused_and_resized() {
        let mut sampler = FrameSampler::default();
        sampler.poll(0, &gradient_source(20, 10));
        assert!(sampler.has_raster());

        match sampler.poll(200, &gradient_source(40, 40)) {
            SampleTick::Frame(bytes) => assert_eq!(bytes.len(), 8 * 8 * BYTES_PER_PIXEL),
            other => panic!("expected frame, got {other:?}"),
        }

        sampler.release();
        assert!(!sampler.has_raster());
    }

    #[test]
    fn test_nearest_neighbour_sampling() {
        let source = gradient_source(10, 10);
        let mut raster = RasterBuffer::new(2, 2).unwrap();
        source.draw_into(&mut raster);
        let bytes = raster.as_bytes();
        // Target pixel (0, 0) samples source (2, 2); (1, 1) samples (7, 7)
        assert_eq!(&bytes[0..4], &[2, 2, 0, 255]);
        assert_eq!(&bytes[12..16], &[7, 7, 0, 255]);
    }

    #[test]
    fn test_push_frame_rejects_bad_length() {
        let mut source = RgbaFrameSource::new();
        let err = source.push_frame(2, 2, &[0; 15]).unwrap_err();
        assert!(matches!(err, EngageError::InvalidFrame(_)));
        assert!(!source.is_ready());
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut source = RgbaFrameSource::new();
        let err = source.push_frame(u32::MAX, u32::MAX, &[0; 16]).unwrap_err();
        assert!(matches!(err, EngageError::InvalidFrame(_)));
        assert!(!source.is_ready());

        let mut raster = RasterBuffer::new(2, 2).unwrap();
        assert!(raster.resize(u32::MAX, u32::MAX).is_err());
        assert_eq!((raster.width(), raster.height()), (2, 2));
        assert_eq!(raster.as_bytes().len(), 16);
    }

    struct Huge;

    impl VideoSource for Huge {
        fn is_ready(&self) -> bool {
            true
        }
        fn native_dimensions(&self) -> (u32, u32) {
            (u32::MAX, u32::MAX)
        }
        fn draw_into(&self, _target: &mut RasterBuffer) {
            panic!("oversized source must not be drawn");
        }
    }

    #[test]
    fn test_oversized_source_is_not_ready() {
        let mut sampler = FrameSampler::new(SAMPLE_INTERVAL_MS, 1.0);
        assert_eq!(sampler.poll(0, &Huge), SampleTick::NotReady);
        assert!(!sampler.has_raster());
    }
}
