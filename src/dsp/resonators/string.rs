//! Karplus-Strong string with dispersion: two delay lines (a long
//! "string" line and a short "stretch" line feeding a dispersion all-pass), an FIR
//! damping filter, a bridge-curving rectified nonlinearity for brightness, and an
//! IIR lowpass closing the loop.
//!
//! Grounded on the `other_examples` port of Mutable Instruments' string engine
//! (`string_engine.rs`/`StringVoice`: per-string `f0`, dust/click excitation,
//! aux signal for a comb-filtered second output) — this module is the single-string
//! voice that engine wraps several of; the round-robin `NUM_STRINGS` dispatch lives
//! one level up in `src/dsp/part.rs`.

use crate::dsp::delay_line::DelayLine;
use crate::dsp::filters::svf::StateVariableFilter;
use crate::math::Xorshift32;

const MAX_STRING_SAMPLES: usize = 2048;
const MAX_STRETCH_SAMPLES: usize = 1024;

pub struct KarplusString {
    string: DelayLine,
    stretch: DelayLine,
    feedback_filter: StateVariableFilter,
    rng: Xorshift32,
    sample_rate: f32,
    fir_h0: f32,
    fir_h1: f32,
    fir_z1: f32,
    fir_z2: f32,
    frequency_hz: f32,
    dispersion: f32,
    damping: f32,
    brightness: f32,
    aux_comb: DelayLine,
}

impl KarplusString {
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        Self {
            string: DelayLine::new(MAX_STRING_SAMPLES),
            stretch: DelayLine::new(MAX_STRETCH_SAMPLES),
            feedback_filter: StateVariableFilter::new(sample_rate),
            rng: Xorshift32::new(seed),
            sample_rate,
            fir_h0: 0.5,
            fir_h1: 0.25,
            fir_z1: 0.0,
            fir_z2: 0.0,
            frequency_hz: 110.0,
            dispersion: 0.0,
            damping: 0.5,
            brightness: 0.5,
            aux_comb: DelayLine::new(MAX_STRING_SAMPLES),
        }
    }

    pub fn reset(&mut self) {
        self.string.reset();
        self.stretch.reset();
        self.aux_comb.reset();
        self.feedback_filter.reset();
        self.fir_z1 = 0.0;
        self.fir_z2 = 0.0;
    }

    /// `dispersion`: `-1..1`; positive values mix in a fractional all-pass stretch
    /// (stiff, inharmonic string), negative values mix in a rectified bridge-curving
    /// nonlinearity instead — two distinct regimes rather than one path scaled by
    /// sign. `damping`: `0..1`, overall decay time. `brightness`: `0..1`, shapes the
    /// FIR damping filter's `h0`/`h1` split — higher brightness keeps more
    /// high-frequency content per loop pass.
    pub fn configure(&mut self, frequency_hz: f32, dispersion: f32, damping: f32, brightness: f32) {
        self.frequency_hz = frequency_hz.max(20.0);
        self.dispersion = dispersion.clamp(-1.0, 1.0);
        self.damping = damping.clamp(0.0, 1.0);
        self.brightness = brightness.clamp(0.0, 1.0);

        let b2 = self.brightness * self.brightness;
        self.fir_h0 = (1.0 + b2) * 0.5;
        self.fir_h1 = (1.0 - b2) * 0.25;

        let loop_hz = (self.sample_rate * 0.45).min(self.frequency_hz * 8.0);
        let resonance = 0.7 + self.damping * 0.28;
        self.feedback_filter.set_coefficients(loop_hz, resonance);
    }

    /// Pluck the string: injects filtered white noise into the delay loop and
    /// resets the loop decay coefficient from the current `damping`.
    pub fn excite(&mut self, velocity: f32) {
        let period_samples = (self.sample_rate / self.frequency_hz).max(2.0);
        let burst_len = (period_samples * 0.5) as usize;
        for _ in 0..burst_len.min(self.string.capacity() - 1) {
            let noise = self.rng.next_bipolar() * velocity;
            self.string.write(noise);
        }
    }

    /// One sample of the closed Karplus-Strong loop, returning `(main, aux)` where
    /// `aux` is a comb-filtered variant of the same signal for a second voice tap.
    pub fn process(&mut self) -> (f32, f32) {
        let period_samples = (self.sample_rate / self.frequency_hz).max(2.0);
        let delay = period_samples - 2.0; // 2 samples absorbed by the FIR + feedback filter

        let raw = self.string.read_float(delay.max(0.0));

        // FIR damping filter: three-tap, brightness-squared weighted.
        let fir_out = self.fir_h0 * self.fir_z1 + self.fir_h1 * (raw + self.fir_z2);
        self.fir_z2 = self.fir_z1;
        self.fir_z1 = raw;

        // Dispersion splits into two regimes by sign: positive stretches the delay
        // path through a fractional all-pass (stiff, inharmonic string); negative
        // curves it through a rectified nonlinearity standing in for bridge contact.
        let abs_dispersion = self.dispersion.abs();
        let stretch_delay = (period_samples * (abs_dispersion * (2.0 - abs_dispersion) * 0.475))
            .clamp(0.0, (MAX_STRETCH_SAMPLES - 3) as f32);
        let blended = if self.dispersion >= 0.0 {
            let dispersive = self.stretch.allpass(fir_out, stretch_delay as usize, 0.5 * abs_dispersion);
            fir_out * (1.0 - abs_dispersion) + dispersive * abs_dispersion
        } else {
            let _ = self.stretch.allpass(fir_out, stretch_delay as usize, 0.5 * abs_dispersion);
            let curved = fir_out.abs().sqrt().copysign(fir_out);
            fir_out * (1.0 - abs_dispersion) + curved * abs_dispersion
        };

        let damped = self.feedback_filter.process(blended).lowpass;
        let loop_signal = damped * (0.9 + self.damping * 0.0995);

        self.string.write(loop_signal);

        let aux = self.aux_comb.allpass(loop_signal, (delay * 0.5).max(1.0) as usize, 0.3);

        (loop_signal, aux)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plucked_string_rings_and_decays() {
        let mut string = KarplusString::new(48_000.0, 7);
        string.configure(220.0, 0.2, 0.6, 0.5);
        string.excite(1.0);

        let mut early_energy = 0.0;
        let mut late_energy = 0.0;
        for i in 0..40_000 {
            let (y, _aux) = string.process();
            if i < 200 {
                early_energy += y * y;
            }
            if (30_000..30_200).contains(&i) {
                late_energy += y * y;
            }
        }
        assert!(late_energy < early_energy);
    }

    #[test]
    fn higher_dispersion_changes_timbre_without_blowing_up() {
        let mut string = KarplusString::new(48_000.0, 3);
        string.configure(440.0, 0.9, 0.5, 0.8);
        string.excite(1.0);
        for _ in 0..10_000 {
            let (y, aux) = string.process();
            assert!(y.is_finite());
            assert!(aux.is_finite());
            assert!(y.abs() < 10.0);
        }
    }
}
