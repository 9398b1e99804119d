//! 64-mode modal resonator bank: a struck-object model built from a bank of
//! [`StateVariableFilter`] band-pass resonators, one per partial, with per-mode
//! frequency stretch from the stiffness LUT and a position-dependent odd/even
//! harmonic weighting.
//!
//! Grounded on `PlaitsModal` (`plaits_modal.rs`: per-mode damping
//! derived from `timbre`, per-mode amplitude falling off with mode index, xorshift32
//! noise exciter) but replaces its free-running sine-per-mode approximation with an
//! SVF-bank topology, which rings in response to an impulse instead of being
//! re-triggered with a fixed amplitude envelope.

use crate::dsp::filters::svf::StateVariableFilter;
use crate::math::{clamp, interpolate, LUT_FOUR_DECADES, LUT_STIFFNESS};

pub const MAX_MODES: usize = 64;

struct Mode {
    filter: StateVariableFilter,
    gain: f32,
    partial: f32,
}

pub struct ModalResonator {
    modes: Vec<Mode>,
    sample_rate: f32,
    /// Strike position last requested by `configure`; `position_current` chases
    /// this once per sample rather than jumping, so a live position change
    /// interpolates across the block instead of stepping.
    position_target: f32,
    position_current: f32,
}

impl ModalResonator {
    pub fn new(sample_rate: f32, num_modes: usize) -> Self {
        let num_modes = num_modes.clamp(1, MAX_MODES);
        let modes = (0..num_modes)
            .map(|_| Mode {
                filter: StateVariableFilter::new(sample_rate),
                gain: 0.0,
                partial: 1.0,
            })
            .collect();
        Self {
            modes,
            sample_rate,
            position_target: 0.5,
            position_current: 0.5,
        }
    }

    /// Recomputes every mode's center frequency, Q and gain.
    ///
    /// - `frequency_hz`: fundamental.
    /// - `structure`: `0..1`, indexes [`LUT_STIFFNESS`] to stretch/compress partials
    ///   away from a purely harmonic series (0.5 is exactly harmonic).
    /// - `brightness`: `0..1`, high modes are attenuated by `(1 - structure)^8`
    ///   scaled further by `brightness`, giving a steep high-mode rolloff for a
    ///   "dull to bright" brightness control.
    /// - `damping`: `0..1`, looked up through [`LUT_FOUR_DECADES`] to set each
    ///   mode's Q across roughly four orders of magnitude of decay time.
    /// - `position`: `0..1`, strike position along the object; modes are weighted by
    ///   `|cos(pi * mode_index * position)|`, so a central strike suppresses even
    ///   harmonics the way a real struck bar does.
    pub fn configure(
        &mut self,
        frequency_hz: f32,
        structure: f32,
        brightness: f32,
        damping: f32,
        position: f32,
    ) {
        let structure = clamp(structure, 0.0, 1.0);
        let brightness = clamp(brightness, 0.0, 1.0);
        let damping = clamp(damping, 0.0, 1.0);
        let position = clamp(position, 0.0, 1.0);
        self.position_target = position;

        let n = self.modes.len();
        let brightness_rolloff = (1.0 - structure).powi(8);
        let q_loss = interpolate(&LUT_FOUR_DECADES, damping, LUT_FOUR_DECADES.len() - 1);

        for (i, mode) in self.modes.iter_mut().enumerate() {
            let partial = (i + 1) as f32;
            let stretch = interpolate(&LUT_STIFFNESS, structure, LUT_STIFFNESS.len() - 1);
            let mode_freq = frequency_hz * partial * (1.0 + stretch * partial);
            let mode_freq = clamp(mode_freq, 20.0, self.sample_rate * 0.49);

            let high_mode_atten = brightness_rolloff.powf(partial / n as f32) * brightness.max(0.05);
            let position_weight = (std::f32::consts::PI * partial * position).cos().abs();

            mode.gain = (1.0 / partial.sqrt()) * high_mode_atten.max(0.02) * position_weight.max(0.05);
            mode.partial = partial;

            let resonance = clamp(1.0 - q_loss / (q_loss + partial), 0.01, 0.999);
            mode.filter.set_coefficients(mode_freq, resonance);
        }
    }

    /// Inject an impulse (struck excitation) scaled per mode.
    pub fn excite(&mut self, amplitude: f32) {
        for mode in &mut self.modes {
            mode.filter.process(amplitude * mode.gain);
        }
    }

    /// Advance one sample of free ringing (no new excitation), summing all modes'
    /// band-pass output.
    ///
    /// Each mode's static `gain` (set by `configure`) is further weighted every
    /// sample by `|cos(pi * partial * position)|` evaluated at a position that
    /// chases `position_target` rather than the configured value directly — this
    /// per-sample re-evaluation, not a one-time gain, is what produces the
    /// position-dependent harmonic cancellation that defines this bank's timbre.
    pub fn process(&mut self) -> f32 {
        self.position_current += 0.002 * (self.position_target - self.position_current);
        let mut sum = 0.0;
        for mode in &mut self.modes {
            let out = mode.filter.process(0.0);
            let position_mod = (std::f32::consts::PI * mode.partial * self.position_current).cos().abs();
            sum += out.bandpass_normalized * mode.gain * position_mod;
        }
        sum / (self.modes.len() as f32).sqrt()
    }

    pub fn reset(&mut self) {
        for mode in &mut self.modes {
            mode.filter.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_produces_decaying_ring() {
        let mut resonator = ModalResonator::new(48_000.0, 16);
        resonator.configure(220.0, 0.5, 0.8, 0.5, 0.3);
        resonator.excite(1.0);

        let mut early_energy = 0.0;
        let mut late_energy = 0.0;
        for i in 0..20_000 {
            let y = resonator.process();
            if i < 100 {
                early_energy += y * y;
            }
            if (10_000..10_100).contains(&i) {
                late_energy += y * y;
            }
        }
        assert!(late_energy < early_energy, "ring did not decay: {late_energy} vs {early_energy}");
    }

    #[test]
    fn central_strike_position_suppresses_even_harmonics() {
        let mut resonator = ModalResonator::new(48_000.0, 4);
        resonator.configure(100.0, 0.5, 1.0, 0.5, 0.5);
        // second mode (index 1, partial=2) should be heavily attenuated at position 0.5
        assert!(resonator.modes[1].gain < resonator.modes[0].gain);
    }

    #[test]
    fn output_stays_finite_across_parameter_extremes() {
        let mut resonator = ModalResonator::new(48_000.0, 64);
        resonator.configure(20.0, 1.0, 1.0, 1.0, 1.0);
        resonator.excite(10.0);
        for _ in 0..1000 {
            let y = resonator.process();
            assert!(y.is_finite());
        }
    }
}
