//! Chorus/ensemble effect: a handful of modulated delay taps, the second consumer
//! of the [`FxEngine`] stack machine the reverb also runs on. Grounded on the
//! Vital reverb port's quadrature-LFO modulated delay lines, simplified to a
//! dedicated small arena instead of sharing the tank network.

use crate::dsp::fx::engine::{layout, FxEngine, Segment};

const NUM_VOICES: usize = 3;
const TAP_LENGTH: usize = 2400;

pub struct Ensemble {
    engine: FxEngine,
    taps: [Segment; NUM_VOICES],
    depth_samples: f32,
    mix: f32,
}

impl Ensemble {
    pub fn new() -> Self {
        let (segments, total) = layout(&[TAP_LENGTH; NUM_VOICES]);
        let taps = std::array::from_fn(|i| segments[i]);
        Self {
            engine: FxEngine::new(total, [0.19, 0.23]),
            taps,
            depth_samples: 30.0,
            mix: 0.5,
        }
    }

    pub fn set_depth(&mut self, depth_samples: f32) {
        self.depth_samples = depth_samples.max(0.0);
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn process(&mut self, input: f32) -> (f32, f32) {
        let mut ctx = self.engine.start();
        for tap in &self.taps {
            ctx.load(input).write(*tap, 0, 0.0);
        }

        let centre = TAP_LENGTH as f32 * 0.5;
        let a = ctx
            .load(0.0)
            .interpolate_lfo(self.taps[0], centre, 0, self.depth_samples, 1.0)
            .accumulator();
        let b = ctx
            .load(0.0)
            .interpolate_lfo(self.taps[1], centre, 1, self.depth_samples, 1.0)
            .accumulator();
        let c = ctx
            .load(0.0)
            .interpolate_lfo(self.taps[2], centre, 0, -self.depth_samples, 1.0)
            .accumulator();

        let wet_left = (a + c) * 0.5;
        let wet_right = b;

        let dry = input * (1.0 - self.mix);
        (
            dry + wet_left * self.mix,
            dry + wet_right * self.mix,
        )
    }
}

impl Default for Ensemble {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_signal_passes_through_at_zero_mix() {
        let mut ensemble = Ensemble::new();
        ensemble.set_mix(0.0);
        for _ in 0..100 {
            let (l, r) = ensemble.process(0.5);
            assert!((l - 0.5).abs() < 1e-5);
            assert!((r - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn output_stays_bounded_for_sustained_input() {
        let mut ensemble = Ensemble::new();
        ensemble.set_mix(1.0);
        for i in 0..10_000 {
            let (l, r) = ensemble.process((i as f32 * 0.01).sin());
            assert!(l.abs() <= 2.0);
            assert!(r.abs() <= 2.0);
        }
    }
}
