//! Excitation filter shared by the string and modal resonators: shapes a raw
//! velocity-scaled noise/impulse burst before it is injected into the resonant
//! model.

use crate::dsp::filters::svf::NaiveSvf;
use crate::math::Xorshift32;

pub struct Plucker {
    noise: Xorshift32,
    shaping_filter: NaiveSvf,
    brightness: f32,
}

impl Plucker {
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        Self {
            noise: Xorshift32::new(seed),
            shaping_filter: NaiveSvf::new(sample_rate),
            brightness: 0.5,
        }
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness.clamp(0.0, 1.0);
    }

    pub fn reset(&mut self) {
        self.shaping_filter.reset();
    }

    /// Generates one sample of a filtered-noise pluck burst, scaled by `velocity`.
    /// `active` gates the noise source so the burst is finite rather than
    /// free-running hiss.
    pub fn next(&mut self, velocity: f32, active: bool) -> f32 {
        if !active {
            return 0.0;
        }
        let raw = self.noise.next_bipolar() * velocity;
        let cutoff = 200.0 + self.brightness * 8000.0;
        self.shaping_filter.process(raw, cutoff, 0.4).lowpass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_plucker_is_silent() {
        let mut plucker = Plucker::new(48_000.0, 11);
        for _ in 0..100 {
            assert_eq!(plucker.next(1.0, false), 0.0);
        }
    }

    #[test]
    fn active_plucker_produces_bounded_noise() {
        let mut plucker = Plucker::new(48_000.0, 11);
        plucker.set_brightness(0.8);
        for _ in 0..1000 {
            let y = plucker.next(0.9, true);
            assert!(y.abs() <= 5.0);
        }
    }
}
