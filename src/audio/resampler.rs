//! Block-averaging downsampler for captured audio.

use std::borrow::Cow;

/// Convert a block of samples from `source_rate` to `target_rate`.
///
/// When the rates match the input is returned borrowed, without a copy.
/// Otherwise each output sample is the mean of the source samples whose
/// index falls in `[round(i * ratio), round((i + 1) * ratio))` with
/// `ratio = source_rate / target_rate`, and the output length is
/// `round(len / ratio)`. This is a downsampling scheme; the caller is
/// responsible for never asking to upsample.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Cow<'_, [f32]> {
    if source_rate == target_rate {
        return Cow::Borrowed(samples);
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let out_len = (samples.len() as f64 / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    let mut offset = 0usize;
    for i in 0..out_len {
        let next_offset = (((i + 1) as f64) * ratio).round() as usize;
        let end = next_offset.min(samples.len());
        let start = offset.min(end);
        let window = &samples[start..end];
        let mean = if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f32>() / window.len() as f32
        };
        out.push(mean);
        offset = next_offset;
    }

    Cow::Owned(out)
}
