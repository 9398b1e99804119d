//! Two-operator FM voice: a quantized-ratio carrier/modulator pair driven through
//! a quarter-wave sine LUT, with a 3-band envelope follower shaping the FM index
//! over time and a slew limiter smoothing ratio/index changes.
//!
//! Grounded on `plaits_fm.rs`'s 2-operator topology and v/oct frequency conversion,
//! and, for the envelope-follower shape, the `other_examples` port of Mutable
//! Instruments' `Voice`/`StringEngine` brightness-envelope handling.

use crate::math::{clamp, interpolate, voct_to_hz};

pub const RATIO_TABLE_SIZE: usize = 129;
const SINE_TABLE_SIZE: usize = 2048;

lazy_static::lazy_static! {
    /// Quantized modulator/carrier frequency ratios, biased towards small musical
    /// integer ratios near the table's center and spreading out towards inharmonic
    /// extremes at the edges — the FM equivalent of the modal bank's stiffness LUT.
    static ref LUT_FM_RATIO: Vec<f32> = (0..RATIO_TABLE_SIZE)
        .map(|i| {
            let x = (i as f32 / (RATIO_TABLE_SIZE - 1) as f32) * 2.0 - 1.0;
            2f32.powf(x * 4.0)
        })
        .collect();

    static ref LUT_QUARTER_SINE: Vec<f32> = (0..=SINE_TABLE_SIZE)
        .map(|i| (std::f32::consts::FRAC_PI_2 * i as f32 / SINE_TABLE_SIZE as f32).sin())
        .collect();
}

/// Full-period sine lookup built from the quarter-wave table via the standard
/// quadrant-mirroring trick, with 20-bit fractional interpolation between entries.
fn sine_lookup(phase: f32) -> f32 {
    let wrapped = phase - phase.floor();
    let quadrant = (wrapped * 4.0) as u32 % 4;
    let within = (wrapped * 4.0).fract();
    let index = within * SINE_TABLE_SIZE as f32;
    let i0 = index as usize;
    let frac = index - i0 as f32;
    let a = LUT_QUARTER_SINE[i0.min(SINE_TABLE_SIZE)];
    let b = LUT_QUARTER_SINE[(i0 + 1).min(SINE_TABLE_SIZE)];
    let quarter_value = a + (b - a) * frac;

    match quadrant {
        0 => quarter_value,
        1 => interpolate(&LUT_QUARTER_SINE, 1.0 - within, SINE_TABLE_SIZE),
        2 => -quarter_value,
        _ => -interpolate(&LUT_QUARTER_SINE, 1.0 - within, SINE_TABLE_SIZE),
    }
}

/// A 3-band envelope follower: fast/mid/slow one-pole rectified-energy trackers,
/// giving the FM amount a shape that reacts differently to attack transients and
/// sustained tone.
struct BandFollower {
    fast: f32,
    mid: f32,
    slow: f32,
}

impl BandFollower {
    fn new() -> Self {
        Self { fast: 0.0, mid: 0.0, slow: 0.0 }
    }

    fn update(&mut self, input: f32) -> f32 {
        let rectified = input.abs();
        self.fast += 0.35 * (rectified - self.fast);
        self.mid += 0.01 * (rectified - self.mid);
        self.slow += 0.0005 * (rectified - self.slow);
        (self.fast * 0.5 + self.mid * 0.35 + self.slow * 0.15).min(1.5)
    }
}

pub struct FmVoice {
    carrier_phase: f32,
    modulator_phase: f32,
    carrier_freq: f32,
    modulator_freq: f32,
    ratio_index: f32,
    fm_amount: f32,
    fm_amount_target: f32,
    follower: BandFollower,
    sample_rate: f32,
}

impl FmVoice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            carrier_phase: 0.0,
            modulator_phase: 0.0,
            carrier_freq: 220.0,
            modulator_freq: 220.0,
            ratio_index: (RATIO_TABLE_SIZE / 2) as f32,
            fm_amount: 0.0,
            fm_amount_target: 0.0,
            follower: BandFollower::new(),
            sample_rate,
        }
    }

    pub fn reset(&mut self) {
        self.carrier_phase = 0.0;
        self.modulator_phase = 0.0;
        self.follower = BandFollower::new();
    }

    /// `voct`: carrier 1V/oct pitch. `ratio_norm`: `0..1`, indexes [`LUT_FM_RATIO`].
    /// `fm_amount`: `0..1` target modulation index, approached via slew to avoid
    /// zipper noise on fast modulation-source changes.
    pub fn configure(&mut self, voct: f32, ratio_norm: f32, fm_amount: f32) {
        self.carrier_freq = voct_to_hz(voct).clamp(20.0, self.sample_rate * 0.45);
        self.ratio_index = clamp(ratio_norm, 0.0, 1.0) * (RATIO_TABLE_SIZE - 1) as f32;
        let ratio = interpolate(&LUT_FM_RATIO, ratio_norm, RATIO_TABLE_SIZE - 1);
        self.modulator_freq = self.carrier_freq * ratio;
        self.fm_amount_target = clamp(fm_amount, 0.0, 1.0);
    }

    pub fn process(&mut self) -> f32 {
        // Slew the FM index by 1/256th of the remaining distance per sample.
        self.fm_amount += (self.fm_amount_target - self.fm_amount) * (1.0 / 256.0);

        let modulator = sine_lookup(self.modulator_phase);
        let tracked_amount = self.follower.update(modulator) * self.fm_amount;

        let carrier = sine_lookup(self.carrier_phase + modulator * tracked_amount);

        self.carrier_phase += self.carrier_freq / self.sample_rate;
        if self.carrier_phase >= 1.0 {
            self.carrier_phase -= 1.0;
        }
        self.modulator_phase += self.modulator_freq / self.sample_rate;
        if self.modulator_phase >= 1.0 {
            self.modulator_phase -= 1.0;
        }

        carrier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_lookup_matches_reference_within_tolerance() {
        for i in 0..200 {
            let phase = i as f32 / 200.0;
            let got = sine_lookup(phase);
            let want = (phase * std::f32::consts::TAU).sin();
            assert!((got - want).abs() < 0.01, "phase={phase} got={got} want={want}");
        }
    }

    #[test]
    fn output_is_bounded_across_fm_amounts() {
        let mut voice = FmVoice::new(48_000.0);
        voice.configure(0.0, 1.0, 1.0);
        for _ in 0..20_000 {
            let y = voice.process();
            assert!(y.is_finite());
            assert!(y.abs() <= 1.2);
        }
    }

    #[test]
    fn fm_amount_slews_rather_than_jumping() {
        let mut voice = FmVoice::new(48_000.0);
        voice.configure(0.0, 0.5, 0.0);
        for _ in 0..100 {
            voice.process();
        }
        voice.configure(0.0, 0.5, 1.0);
        voice.process();
        assert!(voice.fm_amount < 1.0);
        assert!(voice.fm_amount > 0.0);
    }
}
