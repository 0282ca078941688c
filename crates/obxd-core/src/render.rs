//! Float to 16-bit interleaved output conversion.
//!
//! Everything here runs on the audio thread: no allocation, no locking, and
//! a fixed cost per frame.

use crate::engine::Engine;

/// Full-scale multiplier for 16-bit output.
const FULL_SCALE: f32 = 32767.0;

/// Convert one gained sample to 16 bits.
///
/// Truncates toward zero, then clips to the `i16` range.
#[inline]
pub fn to_i16(sample: f32, gain: f32) -> i16 {
    // `as` saturates on overflow and maps NaN to zero.
    let scaled = (sample * gain * FULL_SCALE) as i32;
    scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Render `out.len() / 2` interleaved stereo frames from `engine`.
///
/// A trailing odd sample, if any, is zeroed.
pub fn render_interleaved<E: Engine + ?Sized>(engine: &mut E, gain: f32, out: &mut [i16]) {
    let mut frames = out.chunks_exact_mut(2);
    for frame in &mut frames {
        let (left, right) = engine.process_sample();
        frame[0] = to_i16(left, gain);
        frame[1] = to_i16(right, gain);
    }
    frames.into_remainder().fill(0);
}

/// Fill an output block with silence.
#[inline]
pub fn render_silence(out: &mut [i16]) {
    out.fill(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;

    #[test]
    fn test_conversion_truncates_and_clips() {
        assert_eq!(to_i16(0.0, 0.5), 0);
        assert_eq!(to_i16(1.0, 1.0), 32767);
        assert_eq!(to_i16(-1.0, 1.0), -32767);
        assert_eq!(to_i16(4.0, 1.0), 32767);
        assert_eq!(to_i16(-4.0, 1.0), -32768);
        // 0.5 * 0.5 * 32767 = 8191.75, truncated
        assert_eq!(to_i16(0.5, 0.5), 8191);
        assert_eq!(to_i16(-0.5, 0.5), -8191);
        assert_eq!(to_i16(f32::NAN, 1.0), 0);
    }

    #[test]
    fn test_render_interleaves_channels() {
        let mut engine = MockEngine::with_output(1.0, -1.0);
        let mut out = [7i16; 8];
        render_interleaved(&mut engine, 0.5, &mut out);
        assert_eq!(out, [16383, -16383, 16383, -16383, 16383, -16383, 16383, -16383]);
        assert_eq!(engine.samples_rendered, 4);
    }

    #[test]
    fn test_odd_tail_is_zeroed() {
        let mut engine = MockEngine::with_output(1.0, 1.0);
        let mut out = [7i16; 5];
        render_interleaved(&mut engine, 1.0, &mut out);
        assert_eq!(out[4], 0);
        assert_eq!(engine.samples_rendered, 2);
    }

    #[test]
    fn test_silence() {
        let mut out = [1234i16; 256];
        render_silence(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }
}
