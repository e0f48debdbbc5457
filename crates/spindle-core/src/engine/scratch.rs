//! Jog accumulator and variable-rate sample generation
//!
//! Playback at a fractional rate reads between two stored frames. Linear
//! interpolation is used throughout: the ring only guarantees the frame at
//! the cursor and its successor, so wider kernels would read outside the
//! buffered window near its edges.

use crate::types::StereoSample;

use super::ring::RingBuffer;

/// Jog values below this are treated as zero
const JOG_EPSILON: f64 = 1e-6;

/// Linear interpolation between two frames
#[inline]
pub fn lerp(a: StereoSample, b: StereoSample, frac: f32) -> StereoSample {
    a + (b - a) * frac
}

/// Jog (scratch) accumulator
///
/// Deltas from the wheel add up; each render block a fraction of the value
/// decays away so a released wheel glides back to the continuous rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JogState {
    value: f64,
}

impl JogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current jog value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Add a jog delta
    pub fn push(&mut self, delta: f64) {
        if delta.is_finite() {
            self.value += delta;
        }
    }

    /// Decay by `smoothing` (fraction removed per block, 0..=1)
    pub fn decay(&mut self, smoothing: f64) {
        self.value *= 1.0 - smoothing;
        if self.value.abs() < JOG_EPSILON {
            self.value = 0.0;
        }
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Render one block of interpolated frames from the ring
///
/// Each output frame reads track position `*position`, then advances it by
/// `rate` frames and clamps it to `[0, track_length]`. Positions at or past
/// the last frame never read beyond it: the final frame is held for the
/// fractional part and the end of the track itself is silent. Returns the
/// number of frames during which the position was pinned at a bound.
pub fn render_block(
    ring: &RingBuffer,
    position: &mut f64,
    rate: f64,
    track_length: f64,
    out: &mut [StereoSample],
) -> usize {
    let capacity = ring.capacity();
    let end = track_length as u64;
    let mut pinned = 0;

    for frame in out.iter_mut() {
        let base = position.floor();
        let base_frame = base as u64;

        *frame = if base_frame >= end {
            StereoSample::silence()
        } else {
            let frac = (*position - base) as f32;
            let index = ring.slot(base_frame);
            let next = if base_frame + 1 >= end {
                index
            } else if index + 1 == capacity {
                0
            } else {
                index + 1
            };
            lerp(ring.get(index), ring.get(next), frac)
        };

        let advanced = *position + rate;
        *position = advanced.clamp(0.0, track_length);
        if *position != advanced {
            pinned += 1;
        }
    }

    pinned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_ring(capacity: usize) -> RingBuffer {
        let ring = RingBuffer::new(capacity);
        for i in 0..capacity {
            ring.set(i, StereoSample::new(i as f32, -(i as f32)));
        }
        ring
    }

    #[test]
    fn test_lerp_midpoint() {
        let a = StereoSample::new(0.0, 1.0);
        let b = StereoSample::new(1.0, -1.0);
        assert_eq!(lerp(a, b, 0.5), StereoSample::new(0.5, 0.0));
        assert_eq!(lerp(a, b, 0.0), a);
    }

    #[test]
    fn test_position_advances_by_rate_per_frame() {
        let ring = ramp_ring(1000);
        let mut out = vec![StereoSample::silence(); 64];

        let mut position = 100.0;
        render_block(&ring, &mut position, 0.75, 1000.0, &mut out);
        assert!((position - (100.0 + 0.75 * 64.0)).abs() < 1e-9);

        let mut position = 500.0;
        render_block(&ring, &mut position, -1.5, 1000.0, &mut out);
        assert!((position - (500.0 - 1.5 * 64.0)).abs() < 1e-9);
    }

    #[test]
    fn test_interpolates_between_frames() {
        let ring = ramp_ring(1000);
        let mut out = [StereoSample::silence(); 3];
        let mut position = 10.0;
        render_block(&ring, &mut position, 0.5, 1000.0, &mut out);

        assert_eq!(out[0], StereoSample::new(10.0, -10.0));
        assert_eq!(out[1], StereoSample::new(10.5, -10.5));
        assert_eq!(out[2], StereoSample::new(11.0, -11.0));
    }

    #[test]
    fn test_next_wraps_independently() {
        let ring = ramp_ring(8);
        let mut out = [StereoSample::silence(); 1];
        // Track frame 15 lives in slot 7; its successor in slot 0
        let mut position = 15.5;
        render_block(&ring, &mut position, 0.0, 100.0, &mut out);
        assert_eq!(out[0].left, 3.5);
        assert_eq!(out[0].right, -3.5);
    }

    #[test]
    fn test_position_pins_at_bounds() {
        let ring = ramp_ring(100);
        let mut out = vec![StereoSample::silence(); 32];

        let mut position = 95.0;
        let pinned = render_block(&ring, &mut position, 1.0, 100.0, &mut out);
        assert_eq!(position, 100.0);
        assert_eq!(pinned, 27);

        let mut position = 3.0;
        render_block(&ring, &mut position, -2.0, 100.0, &mut out);
        assert_eq!(position, 0.0);
    }

    #[test]
    fn test_track_end_is_silent() {
        // Frame 100 maps to slot 0, which holds unrelated data
        let ring = ramp_ring(100);
        ring.set(0, StereoSample::new(1000.0, 1000.0));
        let mut out = vec![StereoSample::silence(); 8];

        let mut position = 98.0;
        render_block(&ring, &mut position, 1.0, 100.0, &mut out);
        assert_eq!(out[0], StereoSample::new(98.0, -98.0));
        assert_eq!(out[1], StereoSample::new(99.0, -99.0));
        for sample in &out[2..] {
            assert_eq!(*sample, StereoSample::silence());
        }
        assert_eq!(position, 100.0);
    }

    #[test]
    fn test_last_frame_does_not_blend_past_end() {
        let ring = ramp_ring(100);
        ring.set(0, StereoSample::new(1000.0, 1000.0));
        let mut out = [StereoSample::silence(); 1];

        let mut position = 99.5;
        render_block(&ring, &mut position, 0.0, 100.0, &mut out);
        assert_eq!(out[0], StereoSample::new(99.0, -99.0));
    }

    #[test]
    fn test_jog_decays_to_zero() {
        let mut jog = JogState::new();
        jog.push(0.5);
        jog.push(0.25);
        assert_eq!(jog.value(), 0.75);

        jog.decay(0.3);
        assert!((jog.value() - 0.525).abs() < 1e-12);

        for _ in 0..200 {
            jog.decay(0.3);
        }
        assert_eq!(jog.value(), 0.0);

        jog.push(f64::NAN);
        assert_eq!(jog.value(), 0.0);
    }
}
