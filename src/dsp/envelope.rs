//! Segment envelope generator (AD/AR, linear or quartic curve).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeCurve {
    Linear,
    Quartic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeMode {
    /// Attack then fixed decay, free-running (percussive).
    AttackDecay,
    /// Attack then hold at sustain until `release()` is called, then decay.
    AttackRelease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
}

#[derive(Debug, Clone)]
pub struct SegmentEnvelope {
    mode: EnvelopeMode,
    curve: EnvelopeCurve,
    stage: Stage,
    phase: f32,
    attack_increment: f32,
    decay_increment: f32,
    value: f32,
    held: bool,
}

impl SegmentEnvelope {
    pub fn new(mode: EnvelopeMode, curve: EnvelopeCurve) -> Self {
        Self {
            mode,
            curve,
            stage: Stage::Idle,
            phase: 0.0,
            attack_increment: 1.0,
            decay_increment: 1.0,
            value: 0.0,
            held: false,
        }
    }

    /// `attack_seconds`/`decay_seconds` converted with `sample_rate` into per-sample
    /// phase increments.
    pub fn trigger(&mut self, attack_seconds: f32, decay_seconds: f32, sample_rate: f32) {
        self.attack_increment = 1.0 / (attack_seconds.max(1.0 / sample_rate) * sample_rate);
        self.decay_increment = 1.0 / (decay_seconds.max(1.0 / sample_rate) * sample_rate);
        self.stage = Stage::Attack;
        self.phase = 0.0;
        self.held = true;
    }

    /// For `AttackRelease` mode: leave the sustained attack plateau and begin decay.
    pub fn release(&mut self) {
        if self.mode == EnvelopeMode::AttackRelease && self.held {
            self.stage = Stage::Decay;
            self.phase = 0.0;
            self.held = false;
        }
    }

    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    fn shape(&self, phase: f32) -> f32 {
        match self.curve {
            EnvelopeCurve::Linear => phase,
            EnvelopeCurve::Quartic => phase * phase * phase * phase,
        }
    }

    pub fn process(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => {
                self.value = 0.0;
            }
            Stage::Attack => {
                let shaped = self.shape(self.phase);
                self.value = shaped;
                self.phase += self.attack_increment;
                if self.phase >= 1.0 {
                    self.value = 1.0;
                    match self.mode {
                        EnvelopeMode::AttackDecay => {
                            self.stage = Stage::Decay;
                            self.phase = 0.0;
                        }
                        EnvelopeMode::AttackRelease => {
                            // hold at the plateau until release() is called
                            self.phase = 1.0;
                        }
                    }
                }
            }
            Stage::Decay => {
                let shaped = self.shape(self.phase);
                self.value = 1.0 - shaped;
                self.phase += self.decay_increment;
                if self.phase >= 1.0 {
                    self.value = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_envelope_returns_to_idle() {
        let mut env = SegmentEnvelope::new(EnvelopeMode::AttackDecay, EnvelopeCurve::Linear);
        env.trigger(0.001, 0.001, 48_000.0);
        let mut reached_idle = false;
        for _ in 0..10_000 {
            env.process();
            if env.is_idle() {
                reached_idle = true;
                break;
            }
        }
        assert!(reached_idle);
    }

    #[test]
    fn ar_envelope_holds_until_released() {
        let mut env = SegmentEnvelope::new(EnvelopeMode::AttackRelease, EnvelopeCurve::Linear);
        env.trigger(0.0001, 0.001, 48_000.0);
        for _ in 0..100 {
            env.process();
        }
        let plateau = env.process();
        assert!((plateau - 1.0).abs() < 1e-3);
        env.release();
        let mut reached_idle = false;
        for _ in 0..10_000 {
            env.process();
            if env.is_idle() {
                reached_idle = true;
                break;
            }
        }
        assert!(reached_idle);
    }

    #[test]
    fn quartic_curve_is_slower_to_rise_than_linear() {
        let mut linear = SegmentEnvelope::new(EnvelopeMode::AttackDecay, EnvelopeCurve::Linear);
        let mut quartic = SegmentEnvelope::new(EnvelopeMode::AttackDecay, EnvelopeCurve::Quartic);
        linear.trigger(0.01, 1.0, 48_000.0);
        quartic.trigger(0.01, 1.0, 48_000.0);
        for _ in 0..200 {
            linear.process();
            quartic.process();
        }
        assert!(quartic.value < linear.value);
    }
}
