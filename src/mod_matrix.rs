//! Global modulation matrix: a single shared LFO with a sample-and-hold tap,
//! routed at fixed depths into pulse-width, pitch and filter cutoff — distinct
//! from the per-parameter [`crate::modulation::ModulationBus`], which is
//! per-voice/per-parameter rather than a single shared source.

use crate::dsp::oscillators::{CosineMode, CosineOscillator};
use crate::math::Xorshift32;

#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingDepths {
    pub pwm: f32,
    pub pitch: f32,
    pub filter_cutoff: f32,
}

pub struct ModMatrix {
    lfo: CosineOscillator,
    sample_and_hold: Xorshift32,
    held_value: f32,
    sample_and_hold_phase: f32,
    sample_and_hold_rate_hz: f32,
    sample_rate: f32,
    pub depths: RoutingDepths,
}

impl ModMatrix {
    pub fn new(sample_rate: f32) -> Self {
        let mut lfo = CosineOscillator::new(CosineMode::Approximate);
        lfo.set_frequency(2.0 / sample_rate);
        Self {
            lfo,
            sample_and_hold: Xorshift32::new(0xc0ffee),
            held_value: 0.0,
            sample_and_hold_phase: 0.0,
            sample_and_hold_rate_hz: 8.0,
            sample_rate,
            // Subtle by default: a gentle tone wobble rather than silence.
            // `set_pwm_depth`/`set_pitch_depth`/`set_filter_cutoff_depth` (reachable
            // from the host via `ParamId::ModMatrix*Depth`) retune these.
            depths: RoutingDepths { pwm: 0.0, pitch: 0.0, filter_cutoff: 400.0 },
        }
    }

    pub fn set_lfo_frequency(&mut self, frequency_hz: f32) {
        self.lfo.set_frequency((frequency_hz / self.sample_rate).min(0.497));
    }

    pub fn set_sample_and_hold_rate(&mut self, rate_hz: f32) {
        self.sample_and_hold_rate_hz = rate_hz.max(0.01);
    }

    pub fn set_pwm_depth(&mut self, depth: f32) {
        self.depths.pwm = depth;
    }

    pub fn set_pitch_depth(&mut self, depth: f32) {
        self.depths.pitch = depth;
    }

    pub fn set_filter_cutoff_depth(&mut self, depth: f32) {
        self.depths.filter_cutoff = depth;
    }

    /// Advances the LFO and sample-and-hold by one sample, returning
    /// `(lfo_value, sample_and_hold_value)`.
    pub fn process(&mut self) -> (f32, f32) {
        let lfo_value = self.lfo.next();

        self.sample_and_hold_phase += self.sample_and_hold_rate_hz / self.sample_rate;
        if self.sample_and_hold_phase >= 1.0 {
            self.sample_and_hold_phase -= 1.0;
            self.held_value = self.sample_and_hold.next_bipolar();
        }

        (lfo_value, self.held_value)
    }

    /// Applies the configured routing depths, returning
    /// `(pwm_offset, pitch_offset_semitones, filter_cutoff_offset_hz)`.
    pub fn route(&mut self) -> (f32, f32, f32) {
        let (lfo, held) = self.process();
        (
            lfo * self.depths.pwm,
            held * self.depths.pitch,
            lfo * self.depths.filter_cutoff,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_and_hold_only_changes_at_its_own_rate() {
        let mut matrix = ModMatrix::new(48_000.0);
        matrix.set_sample_and_hold_rate(1.0);
        let mut changes = 0;
        let mut last = matrix.process().1;
        for _ in 0..48_000 {
            let (_, held) = matrix.process();
            if held != last {
                changes += 1;
                last = held;
            }
        }
        assert!(changes <= 2, "sample-and-hold changed too often: {changes}");
    }

    #[test]
    fn zero_depth_routing_produces_zero_offsets() {
        let mut matrix = ModMatrix::new(48_000.0);
        matrix.depths = RoutingDepths::default();
        for _ in 0..1000 {
            let (pwm, pitch, cutoff) = matrix.route();
            assert_eq!(pwm, 0.0);
            assert_eq!(pitch, 0.0);
            assert_eq!(cutoff, 0.0);
        }
    }
}
