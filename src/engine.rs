//! Top-level engine: wires the voice pool, resonator part, step sequencer,
//! modulation bus, onset detector/strummer, global mod matrix and the
//! reverb/ensemble/clouds effects chain into one real-time `process` entry point.
//!
//! Control messages arrive over a lock-free SPSC ring buffer (`ringbuf`) so a host
//! thread can push `Message`s without ever blocking the audio thread; `process`
//! drains whatever is queued at the start of each block before rendering audio.

use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::dsp::fx::{CloudsBuffer, Ensemble, Reverb};
use crate::dsp::part::{string_and_reverb_mix, Part, Patch, ResonatorModel};
use crate::error::EngineError;
use crate::message::{Message, ParamId};
use crate::mod_matrix::ModMatrix;
use crate::modulation::ModulationBus;
use crate::onset::{OnsetDetector, Strummer};
use crate::sequencer::{Clock, ClockEvent, StepPattern};
use crate::voice_pool::{GateMode, VoicePool};

const MESSAGE_QUEUE_CAPACITY: usize = 256;

pub struct EngineConfig {
    pub sample_rate: f32,
    pub bpm: f32,
    pub steps_per_bar: usize,
    pub euclidean_pulses: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            bpm: 120.0,
            steps_per_bar: 16,
            euclidean_pulses: 5,
        }
    }
}

/// The host-side handle: holds the producer end of the control-message queue.
/// Kept separate from `Engine` itself since only `Engine` runs on the audio thread.
pub struct EngineHandle {
    producer: HeapProd<Message>,
}

impl EngineHandle {
    pub fn send(&mut self, message: Message) -> Result<(), EngineError> {
        self.producer.try_push(message).map_err(|_| {
            log::warn!("control message queue overflowed, dropping message");
            EngineError::QueueOverflow
        })
    }
}

pub struct Engine {
    sample_rate: f32,
    message_rx: HeapCons<Message>,

    voice_pool: VoicePool,
    part: Part,

    clock: Clock,
    pattern: StepPattern,

    modulation: ModulationBus,
    mod_matrix: ModMatrix,
    onset: OnsetDetector,
    strummer: Strummer,

    reverb: Reverb,
    ensemble: Ensemble,
    clouds: CloudsBuffer,
}

impl Engine {
    /// Builds the engine and its host-side handle. Fails only on a config the
    /// engine cannot make sense of; every component below it clamps or normalizes
    /// instead of failing, so no other constructor in this crate returns `Result`.
    pub fn new(config: EngineConfig) -> anyhow::Result<(Self, EngineHandle)> {
        if config.sample_rate <= 0.0 {
            anyhow::bail!("sample_rate must be positive, got {}", config.sample_rate);
        }
        if config.steps_per_bar == 0 {
            anyhow::bail!("steps_per_bar must be at least 1");
        }
        if config.euclidean_pulses > config.steps_per_bar {
            anyhow::bail!(
                "euclidean_pulses ({}) cannot exceed steps_per_bar ({})",
                config.euclidean_pulses,
                config.steps_per_bar
            );
        }

        let ring = HeapRb::<Message>::new(MESSAGE_QUEUE_CAPACITY);
        let (producer, consumer) = ring.split();

        let pattern = StepPattern::new(config.euclidean_pulses, config.steps_per_bar, 1);

        let param_ids = [
            ParamId::Structure,
            ParamId::Brightness,
            ParamId::Damping,
            ParamId::Position,
            ParamId::FmRatio,
            ParamId::FmAmount,
            ParamId::ReverbDecay,
            ParamId::ReverbDamping,
            ParamId::ReverbDiffusion,
            ParamId::ReverbMix,
            ParamId::EnsembleMix,
            ParamId::EnsembleDepth,
            ParamId::ModMatrixPwmDepth,
            ParamId::ModMatrixPitchDepth,
            ParamId::ModMatrixFilterDepth,
        ];

        let mut engine = Self {
            sample_rate: config.sample_rate,
            message_rx: consumer,
            voice_pool: VoicePool::new(config.sample_rate),
            part: Part::new(config.sample_rate),
            clock: Clock::new(config.sample_rate, config.bpm, config.steps_per_bar),
            pattern,
            modulation: ModulationBus::new(config.sample_rate, &param_ids),
            mod_matrix: ModMatrix::new(config.sample_rate),
            onset: OnsetDetector::new(config.sample_rate),
            strummer: Strummer::new((config.sample_rate * 0.05) as u32, 8),
            reverb: Reverb::new(),
            ensemble: Ensemble::new(),
            clouds: CloudsBuffer::new((config.sample_rate * 2.0) as usize),
        };

        // Seed every lane's base value with the same defaults the components
        // construct themselves with, then push them through once so the first
        // block renders with a sensible patch rather than the bus's all-zero reset
        // state.
        for (id, value) in [
            (ParamId::Structure, 0.5),
            (ParamId::Brightness, 0.6),
            (ParamId::Damping, 0.5),
            (ParamId::Position, 0.3),
            (ParamId::FmRatio, 0.5),
            (ParamId::FmAmount, 0.5),
            (ParamId::ReverbDecay, 0.7),
            (ParamId::ReverbDamping, 0.3),
            (ParamId::ReverbDiffusion, 0.7),
            (ParamId::ReverbMix, 1.0),
            (ParamId::EnsembleMix, 0.3),
            (ParamId::EnsembleDepth, 15.0),
            (ParamId::ModMatrixPwmDepth, 0.0),
            (ParamId::ModMatrixPitchDepth, 0.0),
            (ParamId::ModMatrixFilterDepth, 400.0),
        ] {
            engine.apply_param(id, value);
        }
        engine.apply_modulated_params();

        Ok((engine, EngineHandle { producer }))
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::NoteOn { note_hz, velocity, accent } => {
                let index = self.voice_pool.trigger_note(note_hz, velocity, accent);
                self.part.set_voice_note(index, note_hz);
                self.part.excite_voice(index, velocity);
            }
            Message::NoteOff { note_hz } => {
                self.voice_pool.release_by_note(note_hz);
            }
            Message::ScheduleAutoReleaseByIndex { voice, after_samples } => {
                self.voice_pool.schedule_auto_release(voice, after_samples);
            }
            Message::Strum { note_hz, velocity } => {
                for index in self.part.strum_order() {
                    self.part.set_voice_note(index, note_hz);
                }
                self.strummer.trigger();
                self.modulation.set_external_input(ParamId::Position, velocity);
            }
            Message::SetModel(model) => self.part.set_model(model),
            Message::SetPolyphony(n) => self.part.set_polyphony(n),
            Message::SetParam { id, value } => self.apply_param(id, value),
            Message::SetEnvelope { release_seconds, .. } => {
                // Both `target`s share the voice pool's single release-tail timer:
                // these resonator models ring from an excitation burst rather than
                // holding a gated sustain stage, so there's no separate amp/filter
                // ADSR to address independently (see SPEC_FULL.md's Non-goals).
                self.voice_pool.set_release_seconds(release_seconds);
            }
            Message::Panic => {
                log::info!("panic message received, releasing all voices");
                self.voice_pool.release_all_voices();
            }
        }
    }

    /// Sets a parameter's base value in the modulation bus. The bus's `base_value +
    /// depth * source` result reaches the actual destination (resonator patch,
    /// reverb, ensemble, mod matrix) via `apply_modulated_params`, run once per
    /// k-rate tick — every parameter flows through the bus uniformly rather than
    /// some bypassing it.
    fn apply_param(&mut self, id: ParamId, value: f32) {
        self.modulation.set_base_value(id, value);
    }

    /// Reads every lane's current value out of the modulation bus and pushes it to
    /// its real destination. Called once per k-rate tick (see `ModulationBus`).
    fn apply_modulated_params(&mut self) {
        self.reverb.set_decay(self.modulation.value(ParamId::ReverbDecay));
        self.reverb.set_damping(self.modulation.value(ParamId::ReverbDamping));
        self.reverb.set_diffusion(self.modulation.value(ParamId::ReverbDiffusion));
        self.reverb.set_amount(self.modulation.value(ParamId::ReverbMix));
        self.ensemble.set_mix(self.modulation.value(ParamId::EnsembleMix));
        self.ensemble.set_depth(self.modulation.value(ParamId::EnsembleDepth));
        self.mod_matrix.set_pwm_depth(self.modulation.value(ParamId::ModMatrixPwmDepth));
        self.mod_matrix.set_pitch_depth(self.modulation.value(ParamId::ModMatrixPitchDepth));
        self.mod_matrix.set_filter_cutoff_depth(self.modulation.value(ParamId::ModMatrixFilterDepth));
        self.part.set_patch(Patch {
            structure: self.modulation.value(ParamId::Structure),
            brightness: self.modulation.value(ParamId::Brightness),
            damping: self.modulation.value(ParamId::Damping),
            position: self.modulation.value(ParamId::Position),
            fm_ratio: self.modulation.value(ParamId::FmRatio),
            fm_amount: self.modulation.value(ParamId::FmAmount),
        });
        self.part.reconfigure_active_voices();
    }

    fn drain_messages(&mut self) {
        while let Some(message) = self.message_rx.try_pop() {
            self.handle_message(message);
        }
    }

    fn advance_sequencer(&mut self) {
        if let Some(ClockEvent::Step { step_index }) = self.clock.tick() {
            if self.pattern.gate.get(step_index).copied().unwrap_or(false) {
                let velocity = if self.pattern.accent.get(step_index).copied().unwrap_or(false) {
                    1.0
                } else {
                    0.7
                };
                let index = self.voice_pool.trigger_note(220.0, velocity, velocity > 0.9);
                self.part.excite_voice(index, velocity);
                self.modulation.set_external_input(ParamId::Position, velocity);
            }
        }
    }

    /// Renders `block_size` stereo frames into `out_left`/`out_right`. `inputs` is a
    /// block of mono audio fed into the onset detector and granular capture buffer
    /// (silence is fine when there's no live input to track).
    pub fn process(&mut self, inputs: &[f32], out_left: &mut [f32], out_right: &mut [f32]) {
        self.drain_messages();

        let block_size = out_left.len().min(out_right.len());
        for i in 0..block_size {
            let input = inputs.get(i).copied().unwrap_or(0.0);

            self.voice_pool.tick();
            if self.modulation.advance_sample() {
                self.apply_modulated_params();
            }
            self.advance_sequencer();

            if self.onset.process(input) {
                self.strummer.trigger();
            }
            if let Some(voice) = self.strummer.tick() {
                self.part.excite_voice(voice, 0.8);
            }

            // Only `filter_cutoff` has a continuous per-sample destination in this
            // signal path (the resonators' shared output filter below); `pwm` and
            // `pitch` are computed from live, host-settable depths but have no PWM
            // oscillator or per-sample pitch-bend input to land on here.
            let (_pwm_offset, _pitch_offset_semitones, filter_cutoff_mod) = self.mod_matrix.route();

            // Clouds is specified at interface level only (capture buffer, frozen
            // mode, grain-scheduling params) — the granular inner loop that would
            // read `self.clouds.read_head()` back into the output bus is out-of-core
            // (see SPEC_FULL.md), so capture runs to keep the buffer live for a host
            // that inspects it, with no playback path wired into `process` below.
            self.clouds.capture(input);

            let (dry_left, dry_right) = self.part.process(filter_cutoff_mod);
            // The built-in reverb tank only feeds the output on the combined
            // string+reverb model; every other model's signal path ends at the
            // resonator and relies on the shared reverb/ensemble params below for
            // its own (non-builtin) effects routing instead.
            let (mixed_left, mixed_right) = if self.part.model == ResonatorModel::StringAndReverb {
                let (reverb_left, reverb_right) = self.reverb.process((dry_left + dry_right) * 0.5);
                string_and_reverb_mix(dry_left, dry_right, reverb_left, reverb_right)
            } else {
                (dry_left, dry_right)
            };
            let (wet_left, wet_right) = self.ensemble.process(mixed_left + mixed_right);

            out_left[i] = mixed_left * 0.7 + wet_left * 0.3;
            out_right[i] = mixed_right * 0.7 + wet_right * 0.3;
        }
    }

    pub fn voice_pool_mut(&mut self) -> &mut VoicePool {
        &mut self.voice_pool
    }

    pub fn set_gate_mode(&mut self, mode: GateMode) {
        self.voice_pool.gate_mode = mode;
    }

    pub fn set_model(&mut self, model: ResonatorModel) {
        self.part.set_model(model);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_produces_nonzero_and_bounded_output() {
        let (mut engine, mut handle) = Engine::new(EngineConfig::default()).unwrap();
        handle
            .send(Message::NoteOn { note_hz: 220.0, velocity: 1.0, accent: false })
            .unwrap();

        let inputs = vec![0.0; 2000];
        let mut left = vec![0.0; 2000];
        let mut right = vec![0.0; 2000];
        engine.process(&inputs, &mut left, &mut right);

        let peak = left.iter().chain(right.iter()).fold(0.0_f32, |m, &v| m.max(v.abs()));
        assert!(peak > 0.0);
        assert!(peak < 4.0, "output not bounded: {peak}");
    }

    #[test]
    fn panic_message_releases_all_active_voices() {
        let (mut engine, mut handle) = Engine::new(EngineConfig::default()).unwrap();
        handle.send(Message::SetPolyphony(4)).unwrap();
        for _ in 0..4 {
            handle
                .send(Message::NoteOn { note_hz: 220.0, velocity: 1.0, accent: false })
                .unwrap();
        }
        handle.send(Message::Panic).unwrap();

        let inputs = vec![0.0; 16];
        let mut left = vec![0.0; 16];
        let mut right = vec![0.0; 16];
        engine.process(&inputs, &mut left, &mut right);

        assert!(engine
            .voice_pool_mut()
            .voices
            .iter()
            .all(|v| v.state != crate::voice_pool::VoiceState::Active));
    }

    #[test]
    fn rejects_non_positive_sample_rate() {
        let config = EngineConfig { sample_rate: 0.0, ..EngineConfig::default() };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn rejects_more_euclidean_pulses_than_steps() {
        let config = EngineConfig { steps_per_bar: 8, euclidean_pulses: 9, ..EngineConfig::default() };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn queue_overflow_is_reported_rather_than_panicking() {
        let (_engine, mut handle) = Engine::new(EngineConfig::default()).unwrap();
        let mut overflowed = false;
        for _ in 0..(MESSAGE_QUEUE_CAPACITY + 10) {
            if handle.send(Message::Panic).is_err() {
                overflowed = true;
            }
        }
        assert!(overflowed);
    }
}
