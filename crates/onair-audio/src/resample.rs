//! Sample-rate conversion between the show rate and the telephone rate.
//!
//! The two rates are related by an exact factor of three, so both
//! directions work on whole sample groups without fractional phase.

use onair_core::SAMPLE_RATE;

/// Narrowband telephone rate (Hz).
pub const TELEPHONY_SAMPLE_RATE: u32 = 8_000;

/// Show samples per telephone sample.
pub const RATIO: usize = (SAMPLE_RATE / TELEPHONY_SAMPLE_RATE) as usize;

/// Symmetric low-pass applied after interpolation (binomial, sums to 16).
const SMOOTHING_KERNEL: [f32; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];
const SMOOTHING_NORM: f32 = 16.0;

/// 24 kHz → 8 kHz: average each group of three samples.
///
/// Averaging is a cheap box filter in front of the decimation; a trailing
/// partial group is averaged over what is there.
#[must_use]
pub fn downsample_to_telephony(samples: &[i16]) -> Vec<i16> {
    samples
        .chunks(RATIO)
        .map(|group| {
            let sum: i32 = group.iter().map(|&s| i32::from(s)).sum();
            (sum / group.len() as i32) as i16
        })
        .collect()
}

/// 8 kHz → 24 kHz: Catmull-Rom interpolation, smoothing, then `gain` with
/// saturation.
#[must_use]
pub fn upsample_from_telephony(samples: &[i16], gain: f32) -> Vec<i16> {
    if samples.is_empty() {
        return Vec::new();
    }

    let last = samples.len() - 1;
    let at = |i: usize| f32::from(samples[i.min(last)]);

    let mut interpolated = Vec::with_capacity(samples.len() * RATIO);
    for i in 0..samples.len() {
        let p0 = at(i.saturating_sub(1));
        let p1 = at(i);
        let p2 = at(i + 1);
        let p3 = at(i + 2);
        for step in 0..RATIO {
            let t = step as f32 / RATIO as f32;
            interpolated.push(catmull_rom(p0, p1, p2, p3, t));
        }
    }

    smooth(&interpolated)
        .into_iter()
        .map(|v| saturate(v * gain))
        .collect()
}

fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0f32.mul_add(p0, -5.0 * p1) + 4.0f32.mul_add(p2, -p3)) * t2
        + (3.0f32.mul_add(p1, -p0) + (-3.0f32).mul_add(p2, p3)) * t3)
}

fn smooth(input: &[f32]) -> Vec<f32> {
    let half = SMOOTHING_KERNEL.len() / 2;
    let last = input.len().saturating_sub(1);
    (0..input.len())
        .map(|i| {
            let acc: f32 = SMOOTHING_KERNEL
                .iter()
                .enumerate()
                .map(|(k, &w)| {
                    let idx = (i + k).saturating_sub(half).min(last);
                    w * input[idx]
                })
                .sum();
            acc / SMOOTHING_NORM
        })
        .collect()
}

fn saturate(value: f32) -> i16 {
    value
        .round()
        .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}
