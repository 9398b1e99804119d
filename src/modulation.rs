//! Per-parameter modulation bus: each declared parameter can be driven by one of
//! several modulation sources, applied at a slow "k-rate" (~30Hz) rather than
//! per-sample, since none of these sources need audio-rate precision and running
//! them less often keeps the control thread cheap.

use crate::dsp::oscillators::{CosineMode, CosineOscillator};
use crate::math::Xorshift32;
use crate::message::ParamId;

pub const K_RATE_HZ: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModulationMode {
    /// A free-running low-frequency oscillator.
    Lfo { frequency_hz: f32 },
    /// Driven by the step sequencer's current step value.
    Sequence,
    /// Driven by a voice's envelope level.
    Envelope,
    /// Sample-and-hold random, re-rolled at a configurable rate.
    Random { rate_hz: f32 },
    /// A length-`length` shift register clocked once per tick: the outgoing bit is
    /// flipped with probability `flip_probability` before being fed back in as the
    /// new incoming bit (the classic "Turing Machine" sequencer topology). Read out
    /// as the register's value interpreted as an unsigned fixed-point fraction.
    TuringMachine { length: u32, flip_probability: f32 },
    /// Driven by the onset-detector envelope follower.
    EnvelopeFollower,
}

struct Lane {
    id: ParamId,
    mode: ModulationMode,
    amount: f32,
    /// The parameter's value before modulation is applied; set directly by the
    /// host via `SetParam`, distinct from `amount` (the modulation depth).
    base_value: f32,
    /// A constant added after the modulated depth, before the final range clamp —
    /// distinct from `base_value`, which the source multiplies against.
    offset: f32,
    lfo: CosineOscillator,
    rng: Xorshift32,
    tm_register: u32,
    held_random: f32,
    samples_since_reroll: u32,
    external_input: f32,
    current_value: f32,
}

impl Lane {
    fn new(id: ParamId, seed: u32) -> Self {
        Self {
            id,
            mode: ModulationMode::Lfo { frequency_hz: 0.5 },
            amount: 0.0,
            base_value: 0.0,
            offset: 0.0,
            lfo: CosineOscillator::new(CosineMode::Approximate),
            rng: Xorshift32::new(seed),
            tm_register: 0,
            held_random: 0.0,
            samples_since_reroll: 0,
            external_input: 0.0,
            current_value: 0.0,
        }
    }
}

/// Drives every declared parameter's modulation lane at `K_RATE_HZ`, producing a
/// `base + amount * source` value each tick.
pub struct ModulationBus {
    lanes: Vec<Lane>,
    k_rate_period_samples: u32,
    samples_until_tick: u32,
}

impl ModulationBus {
    pub fn new(sample_rate: f32, param_ids: &[ParamId]) -> Self {
        let lanes = param_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| Lane::new(id, 0x2545F491 ^ (i as u32 + 1)))
            .collect();
        let period = (sample_rate / K_RATE_HZ).max(1.0) as u32;
        Self {
            lanes,
            k_rate_period_samples: period,
            samples_until_tick: period,
        }
    }

    pub fn set_mode(&mut self, id: ParamId, mode: ModulationMode) {
        if let Some(lane) = self.lanes.iter_mut().find(|l| l.id == id) {
            lane.mode = mode;
            if let ModulationMode::Lfo { frequency_hz } = mode {
                lane.lfo.set_frequency(frequency_hz / K_RATE_HZ);
            }
        }
    }

    pub fn set_amount(&mut self, id: ParamId, amount: f32) {
        if let Some(lane) = self.lanes.iter_mut().find(|l| l.id == id) {
            lane.amount = amount.clamp(-1.0, 1.0);
        }
    }

    /// Sets the parameter's unmodulated base value, as the host intends it before
    /// any LFO/sequencer/envelope/random/Turing-machine/follower depth is mixed in.
    pub fn set_base_value(&mut self, id: ParamId, value: f32) {
        if let Some(lane) = self.lanes.iter_mut().find(|l| l.id == id) {
            let d = id.descriptor();
            lane.base_value = value.clamp(d.min, d.max);
        }
    }

    /// Sets a constant offset added after the modulation depth, before the final
    /// range clamp.
    pub fn set_offset(&mut self, id: ParamId, offset: f32) {
        if let Some(lane) = self.lanes.iter_mut().find(|l| l.id == id) {
            lane.offset = offset;
        }
    }

    /// Feeds an external driving value (sequencer step, envelope level, onset
    /// follower output, ...) into whichever lanes are configured to use it.
    pub fn set_external_input(&mut self, id: ParamId, value: f32) {
        if let Some(lane) = self.lanes.iter_mut().find(|l| l.id == id) {
            lane.external_input = value;
        }
    }

    /// Advances the audio-thread sample counter, ticking every lane's source at
    /// `K_RATE_HZ` when the slow-rate counter elapses. Returns `true` on a tick, so
    /// the caller knows when fresh values are worth pushing to their destinations.
    pub fn advance_sample(&mut self) -> bool {
        self.samples_until_tick = self.samples_until_tick.saturating_sub(1);
        if self.samples_until_tick == 0 {
            self.samples_until_tick = self.k_rate_period_samples;
            self.tick();
            true
        } else {
            false
        }
    }

    fn tick(&mut self) {
        for lane in &mut self.lanes {
            let source = match lane.mode {
                ModulationMode::Lfo { .. } => lane.lfo.next(),
                ModulationMode::Sequence | ModulationMode::Envelope | ModulationMode::EnvelopeFollower => {
                    lane.external_input
                }
                ModulationMode::Random { rate_hz } => {
                    let reroll_period = (K_RATE_HZ / rate_hz.max(0.01)).max(1.0) as u32;
                    lane.samples_since_reroll += 1;
                    if lane.samples_since_reroll >= reroll_period {
                        lane.samples_since_reroll = 0;
                        lane.held_random = lane.rng.next_bipolar();
                    }
                    lane.held_random
                }
                ModulationMode::TuringMachine { length, flip_probability } => {
                    let length = length.clamp(1, 16);
                    let outgoing = (lane.tm_register >> (length - 1)) & 1;
                    let flip = lane.rng.next_unit() < flip_probability.clamp(0.0, 1.0);
                    let incoming = if flip { outgoing ^ 1 } else { outgoing };
                    let mask = (1u32 << length) - 1;
                    lane.tm_register = ((lane.tm_register << 1) | incoming) & mask;
                    (lane.tm_register as f32 / mask as f32) * 2.0 - 1.0
                }
            };
            let d = lane.id.descriptor();
            lane.current_value = (lane.base_value + lane.amount * source + lane.offset).clamp(d.min, d.max);
        }
    }

    pub fn value(&self, id: ParamId) -> f32 {
        self.lanes.iter().find(|l| l.id == id).map(|l| l.current_value).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lfo_lane_oscillates_within_amount_bounds() {
        let mut bus = ModulationBus::new(48_000.0, &[ParamId::Structure]);
        bus.set_mode(ParamId::Structure, ModulationMode::Lfo { frequency_hz: 2.0 });
        bus.set_amount(ParamId::Structure, 0.5);
        let mut max_seen: f32 = 0.0;
        for _ in 0..48_000 {
            bus.advance_sample();
            max_seen = max_seen.max(bus.value(ParamId::Structure).abs());
        }
        assert!(max_seen <= 0.51);
        assert!(max_seen > 0.01);
    }

    #[test]
    fn random_lane_holds_value_between_rerolls() {
        let mut bus = ModulationBus::new(48_000.0, &[ParamId::Damping]);
        bus.set_mode(ParamId::Damping, ModulationMode::Random { rate_hz: 1.0 });
        bus.set_amount(ParamId::Damping, 1.0);
        bus.advance_sample();
        for _ in 0..(48_000 / 30) {
            bus.advance_sample();
        }
        let first = bus.value(ParamId::Damping);
        bus.advance_sample();
        let second = bus.value(ParamId::Damping);
        assert_eq!(first, second);
    }

    #[test]
    fn external_input_drives_sequence_mode_directly() {
        let mut bus = ModulationBus::new(48_000.0, &[ParamId::Position]);
        bus.set_mode(ParamId::Position, ModulationMode::Sequence);
        bus.set_amount(ParamId::Position, 1.0);
        bus.set_external_input(ParamId::Position, 0.7);
        for _ in 0..48_000 {
            bus.advance_sample();
        }
        assert!((bus.value(ParamId::Position) - 0.7).abs() < 1e-6);
    }
}
