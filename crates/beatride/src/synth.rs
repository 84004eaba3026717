//! Procedurally synthesized PCM clips.
//!
//! The demo ships no binary audio assets; every clip is generated at startup
//! and registered with the audio host. All clips are 44.1 kHz mono with an
//! attack/decay envelope so they start and end silent.

use engine::Clip;

pub const SAMPLE_RATE: u32 = 44_100;

/// xorshift32 step. The sequence permutes the nonzero 32-bit values, so the
/// seed must not be zero.
pub fn xorshift(state: &mut u32) -> u32 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    *state = x;
    x
}

fn envelope(index: usize, total: usize) -> f32 {
    let t = index as f32 / total.max(1) as f32;
    let attack = 0.08;
    if t < attack {
        t / attack
    } else {
        let fall = (t - attack) / (1.0 - attack);
        (1.0 - fall) * (1.0 - fall)
    }
}

pub fn sine_blip(freq: f32, secs: f32) -> Clip {
    let total = (SAMPLE_RATE as f32 * secs) as usize;
    let mut samples = Vec::with_capacity(total);
    for index in 0..total {
        let t = index as f32 / SAMPLE_RATE as f32;
        let wave = (std::f32::consts::TAU * freq * t).sin();
        samples.push(wave * envelope(index, total) * 0.6);
    }
    Clip::from_samples(SAMPLE_RATE, samples)
}

pub fn square_blip(freq: f32, secs: f32) -> Clip {
    let total = (SAMPLE_RATE as f32 * secs) as usize;
    let mut samples = Vec::with_capacity(total);
    for index in 0..total {
        let t = index as f32 / SAMPLE_RATE as f32;
        let wave = if (std::f32::consts::TAU * freq * t).sin() >= 0.0 {
            1.0
        } else {
            -1.0
        };
        // Squares carry far more energy than sines at the same amplitude.
        samples.push(wave * envelope(index, total) * 0.3);
    }
    Clip::from_samples(SAMPLE_RATE, samples)
}

/// Loopable broadband hum: low-passed white noise under a slow sine sway.
/// The sway completes a whole cycle over the clip, so looping stays smooth.
pub fn noise_hum(secs: f32) -> Clip {
    let total = (SAMPLE_RATE as f32 * secs) as usize;
    let mut state: u32 = 0x9e37_79b9;
    let mut filtered = 0.0f32;
    let mut samples = Vec::with_capacity(total);
    for index in 0..total {
        let white = (xorshift(&mut state) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        filtered += 0.04 * (white - filtered);
        let t = index as f32 / total.max(1) as f32;
        let sway = 0.75 + 0.25 * (std::f32::consts::TAU * t).sin();
        samples.push((filtered * sway * 1.5).clamp(-1.0, 1.0));
    }
    Clip::from_samples(SAMPLE_RATE, samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clips_have_the_requested_duration() {
        let clip = sine_blip(440.0, 0.25);
        assert_eq!(clip.sample_rate(), SAMPLE_RATE);
        assert_eq!(clip.samples().len(), (SAMPLE_RATE as f32 * 0.25) as usize);
        assert!((clip.duration_secs() - 0.25).abs() < 1e-3);
    }

    #[test]
    fn envelope_starts_silent_and_peaks_early() {
        let clip = sine_blip(440.0, 0.1);
        let samples = clip.samples();
        assert!(samples[0].abs() < 1e-3);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.3, "peak {peak} too quiet");
        assert!(samples[samples.len() - 1].abs() < 0.01);
    }

    #[test]
    fn all_generators_stay_in_range() {
        for clip in [
            sine_blip(880.0, 0.1),
            square_blip(110.0, 0.2),
            noise_hum(0.5),
        ] {
            assert!(clip.samples().iter().all(|s| s.abs() <= 1.0));
        }
    }

    #[test]
    fn xorshift_is_deterministic_and_avoids_zero() {
        let mut a = 7;
        let mut b = 7;
        for _ in 0..1000 {
            let value = xorshift(&mut a);
            assert_eq!(value, xorshift(&mut b));
            assert_ne!(value, 0);
        }
    }
}
