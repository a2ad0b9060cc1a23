use crate::audio::streamer::Frame;

/// Converts stereo `f32` frames into interleaved S16 samples, reusing `out`.
///
/// Samples outside `[-1.0, 1.0]` are clamped, which is what keeps large gains
/// from wrapping around.
pub fn frames_to_s16(frames: &[Frame], out: &mut Vec<i16>) {
    out.clear();
    out.reserve(frames.len() * 2);
    for frame in frames {
        out.push(f32_to_s16(frame[0]));
        out.push(f32_to_s16(frame[1]));
    }
}

#[inline]
pub fn f32_to_s16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
