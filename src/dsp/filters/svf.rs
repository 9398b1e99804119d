//! Topology-preserving state-variable filter, grounded on the original
//! `StateVariableFilter` (`lowpass/bandpass/highpass` + `z1_low`/`z1_band` state) but
//! replacing its naive one-pole `f`/`q` pair with an exact zero-delay-feedback
//! recurrence and coefficient derivation.

use crate::math::{clamp, fast_tan, TanApprox};

/// Cutoff-frequency tan approximation quality, reused for every SVF instance in the
/// crate so a single place controls the accuracy/CPU tradeoff.
pub const DEFAULT_TAN_APPROX: TanApprox = TanApprox::Dirty;

/// Zero-delay-feedback state-variable filter: `hp = (x - r*s1 - g*s1 - s2) * h`,
/// `bp = g*hp + s1`, `lp = g*bp + s2`, `h = 1 / (1 + r*g + g^2)`.
#[derive(Debug, Clone)]
pub struct StateVariableFilter {
    g: f32,
    r: f32,
    h: f32,
    s1: f32,
    s2: f32,
    sample_rate: f32,
    tan_approx: TanApprox,
}

/// The four SVF output taps available per sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvfOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    /// Normalized bandpass: `bandpass * r`, unity gain at the center frequency.
    pub bandpass_normalized: f32,
}

impl StateVariableFilter {
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            g: 0.0,
            r: 1.0,
            h: 1.0,
            s1: 0.0,
            s2: 0.0,
            sample_rate,
            tan_approx: DEFAULT_TAN_APPROX,
        };
        filter.set_coefficients(1000.0, 0.5);
        filter
    }

    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }

    /// `resonance` in `[0, 1)`; `1.0` would produce infinite `Q` so callers should keep
    /// below the ceiling.
    pub fn set_coefficients(&mut self, cutoff_hz: f32, resonance: f32) {
        let nyquist = self.sample_rate * 0.5;
        let f = clamp(cutoff_hz / self.sample_rate, 0.0, 0.497);
        let f = f.min(nyquist / self.sample_rate);
        self.g = fast_tan(f, self.tan_approx);
        self.r = 2.0 * (1.0 - clamp(resonance, 0.0, 0.995));
        self.h = 1.0 / (1.0 + self.r * self.g + self.g * self.g);
    }

    pub fn set_tan_approx(&mut self, approx: TanApprox) {
        self.tan_approx = approx;
    }

    pub fn process(&mut self, input: f32) -> SvfOutputs {
        let hp = (input - self.r * self.s1 - self.g * self.s1 - self.s2) * self.h;
        let bp = self.g * hp + self.s1;
        let lp = self.g * bp + self.s2;

        self.s1 = self.g * hp + bp;
        self.s2 = self.g * bp + lp;

        SvfOutputs {
            lowpass: lp,
            bandpass: bp,
            highpass: hp,
            bandpass_normalized: bp * self.r,
        }
    }
}

/// A cheaper, non-zero-delay-feedback SVF matching the original `f * highpass + z1`
/// topology, kept for the granular/clouds path and the onset detector's band
/// splits, where exact tracking matters less than raw throughput.
#[derive(Debug, Clone)]
pub struct NaiveSvf {
    z1_low: f32,
    z1_band: f32,
    sample_rate: f32,
}

impl NaiveSvf {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            z1_low: 0.0,
            z1_band: 0.0,
            sample_rate,
        }
    }

    pub fn reset(&mut self) {
        self.z1_low = 0.0;
        self.z1_band = 0.0;
    }

    pub fn process(&mut self, input: f32, cutoff_hz: f32, q: f32) -> SvfOutputs {
        let freq_clamped = clamp(cutoff_hz, 20.0, self.sample_rate * 0.45);
        let f = 2.0 * (std::f32::consts::PI * freq_clamped / self.sample_rate).sin();
        let q_clamped = (1.0 - q).max(0.05);

        let highpass = input - self.z1_low - q_clamped * self.z1_band;
        let bandpass = f * highpass + self.z1_band;
        let lowpass = f * bandpass + self.z1_low;

        self.z1_band = bandpass;
        self.z1_low = lowpass;

        SvfOutputs {
            lowpass: clamp(lowpass, -5.0, 5.0),
            bandpass: clamp(bandpass, -5.0, 5.0),
            highpass: clamp(highpass, -5.0, 5.0),
            bandpass_normalized: bandpass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h_coefficient_matches_invariant() {
        let filter = StateVariableFilter::new(48_000.0);
        let expected = 1.0 / (1.0 + filter.r * filter.g + filter.g * filter.g);
        assert!((filter.h - expected).abs() < 1e-6);
    }

    #[test]
    fn dc_input_settles_to_zero_highpass() {
        let mut filter = StateVariableFilter::new(48_000.0);
        filter.set_coefficients(1000.0, 0.1);
        let mut last = SvfOutputs::default();
        for _ in 0..5000 {
            last = filter.process(1.0);
        }
        assert!(last.highpass.abs() < 0.05);
    }

    #[test]
    fn cutoff_is_clamped_near_nyquist() {
        let mut filter = StateVariableFilter::new(48_000.0);
        filter.set_coefficients(1_000_000.0, 0.1);
        assert!(filter.g.is_finite());
        assert!(filter.g > 0.0);
    }

    #[test]
    fn naive_svf_outputs_stay_bounded() {
        let mut filter = NaiveSvf::new(48_000.0);
        for i in 0..1000 {
            let out = filter.process((i as f32 * 0.37).sin() * 10.0, 800.0, 0.8);
            assert!(out.lowpass.abs() <= 5.0);
            assert!(out.bandpass.abs() <= 5.0);
            assert!(out.highpass.abs() <= 5.0);
        }
    }
}
