//! Voice orchestrator ("Part"): dispatches to one of the three resonator models,
//! routes up to 8 string voices or 1-4 modal/FM voices, mixes to stereo and runs a
//! soft limiter with a per-model pre-gain.
//!
//! Grounded on the `other_examples` Plaits `Voice`/`ChannelPostProcessor`
//! (`get_engine` model dispatch table with a per-engine gain pair, limiter-then-gain
//! post-processing chain) — this module plays the same role for the three resonator
//! models this crate implements instead of Plaits' sixteen.

use crate::dsp::filters::svf::StateVariableFilter;
use crate::dsp::resonators::{FmVoice, KarplusString, ModalResonator, Plucker};
use crate::math::{semitones_to_ratio, soft_limit};

pub const MAX_STRING_VOICES: usize = 8;
pub const MAX_OTHER_VOICES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResonatorModel {
    Modal,
    String,
    Fm,
    /// A chord of detuned modal resonators, excited by the same pluck the main
    /// voice receives, ringing sympathetically rather than doubling in unison.
    SympatheticString,
    /// [`ResonatorModel::SympatheticString`] with each chord voice's detune
    /// snapped to the nearest semitone instead of ringing freely.
    SympatheticStringQuantized,
    /// The string model with its own per-voice reverb send cross-mixed in, rather
    /// than routed through a separate send bus.
    StringAndReverb,
}

impl ResonatorModel {
    /// Per-model output pre-gain, applied before the stereo limiter: modal and
    /// string voices run hot at 1.4x since their SVF/Karplus loops are
    /// conservatively normalized, sympathetic chords sit at unity since they sum
    /// several detuned voices already, and FM is pulled back to 0.7x since its
    /// sine-on-sine output already sits close to full scale.
    fn pre_gain(self) -> f32 {
        match self {
            ResonatorModel::Modal => 1.4,
            ResonatorModel::String | ResonatorModel::StringAndReverb => 1.4,
            ResonatorModel::SympatheticString | ResonatorModel::SympatheticStringQuantized => 1.0,
            ResonatorModel::Fm => 0.7,
        }
    }

    fn voice_ceiling(self) -> usize {
        match self {
            ResonatorModel::String | ResonatorModel::StringAndReverb => MAX_STRING_VOICES,
            _ => MAX_OTHER_VOICES,
        }
    }
}

/// Detune offsets (in semitones) for the chord voices a sympathetic-string model
/// rings: root, an octave down, and a fifth above/below — a small consonant chord
/// rather than unison doubling.
const SYMPATHETIC_CHORD_SEMITONES: [f32; 4] = [0.0, -12.0, -7.02, 7.02];

/// Resonator patch values shared across all active voices of a [`Part`]: the six
/// parameters the per-parameter modulation bus drives (`Structure..FmAmount`).
#[derive(Debug, Clone, Copy)]
pub struct Patch {
    pub structure: f32,
    pub brightness: f32,
    pub damping: f32,
    pub position: f32,
    pub fm_ratio: f32,
    pub fm_amount: f32,
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            structure: 0.5,
            brightness: 0.6,
            damping: 0.5,
            position: 0.3,
            fm_ratio: 0.5,
            fm_amount: 0.5,
        }
    }
}

/// Configures a single voice slot's active resonator model from the current patch.
/// Shared by `set_voice_note` (new note) and `reconfigure_active_voices` (patch
/// changed while a voice rings) so both paths compute coefficients identically.
fn configure_voice(voice: &mut VoiceSlot, model: ResonatorModel, note_hz: f32, patch: Patch) {
    match model {
        ResonatorModel::Modal | ResonatorModel::SympatheticString | ResonatorModel::SympatheticStringQuantized => {
            voice.modal.configure(note_hz, patch.structure, patch.brightness, patch.damping, patch.position);
        }
        ResonatorModel::String | ResonatorModel::StringAndReverb => {
            voice.string.configure(note_hz, patch.structure * 2.0 - 1.0, patch.damping, patch.brightness);
        }
        ResonatorModel::Fm => voice.fm.configure(0.0, patch.fm_ratio, patch.fm_amount),
    }
    voice.last_note_hz = note_hz;
}

/// 4-sample median filter followed by two cascaded exponential smoothers, used to
/// clean up a note/pitch control signal before it reaches the resonator.
pub struct NoteFilter {
    history: [f32; 4],
    write_index: usize,
    smoother_a: f32,
    smoother_b: f32,
}

impl NoteFilter {
    pub fn new(initial: f32) -> Self {
        Self {
            history: [initial; 4],
            write_index: 0,
            smoother_a: initial,
            smoother_b: initial,
        }
    }

    fn median4(values: &[f32; 4]) -> f32 {
        let mut sorted = *values;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        (sorted[1] + sorted[2]) * 0.5
    }

    pub fn process(&mut self, note: f32) -> f32 {
        self.history[self.write_index] = note;
        self.write_index = (self.write_index + 1) % self.history.len();
        let median = Self::median4(&self.history);

        self.smoother_a += 0.3 * (median - self.smoother_a);
        self.smoother_b += 0.15 * (self.smoother_a - self.smoother_b);
        self.smoother_b
    }
}

/// A single resonating voice slot: one of the three models, plus shared excitation
/// and per-voice output filtering.
pub struct VoiceSlot {
    pub model: ResonatorModel,
    pub modal: ModalResonator,
    pub string: KarplusString,
    pub fm: FmVoice,
    pub plucker: Plucker,
    pub note_filter: NoteFilter,
    pub output_filter: StateVariableFilter,
    pub pan: f32,
    pub last_note_hz: f32,
}

impl VoiceSlot {
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        Self {
            model: ResonatorModel::Modal,
            modal: ModalResonator::new(sample_rate, 24),
            string: KarplusString::new(sample_rate, seed),
            fm: FmVoice::new(sample_rate),
            plucker: Plucker::new(sample_rate, seed.wrapping_mul(2654435761)),
            note_filter: NoteFilter::new(0.0),
            output_filter: StateVariableFilter::new(sample_rate),
            pan: 0.5,
            last_note_hz: 0.0,
        }
    }

    pub fn excite(&mut self, velocity: f32) {
        match self.model {
            ResonatorModel::Modal | ResonatorModel::SympatheticString | ResonatorModel::SympatheticStringQuantized => {
                self.modal.excite(velocity)
            }
            ResonatorModel::String | ResonatorModel::StringAndReverb => self.string.excite(velocity),
            ResonatorModel::Fm => {}
        }
    }

    pub fn process(&mut self, cutoff_offset_hz: f32) -> f32 {
        let raw = match self.model {
            ResonatorModel::Modal | ResonatorModel::SympatheticString | ResonatorModel::SympatheticStringQuantized => {
                self.modal.process()
            }
            ResonatorModel::String | ResonatorModel::StringAndReverb => self.string.process().0,
            ResonatorModel::Fm => self.fm.process(),
        };
        let cutoff = (OUTPUT_FILTER_BASE_CUTOFF_HZ + cutoff_offset_hz).clamp(200.0, 18_000.0);
        self.output_filter.set_coefficients(cutoff, 0.3);
        self.output_filter.process(raw).lowpass
    }
}

/// Center cutoff for each voice's post-resonator tone filter; the global
/// modulation matrix's `filter_cutoff` routing offsets this per sample.
const OUTPUT_FILTER_BASE_CUTOFF_HZ: f32 = 6000.0;

/// A simple feed-forward stereo soft limiter: a fast-attack, slow-release gain
/// reduction envelope, falling back on the crate's shared [`soft_limit`]
/// nonlinearity as a hard ceiling.
#[derive(Default)]
pub struct StereoLimiter {
    gain: f32,
}

impl StereoLimiter {
    pub fn new() -> Self {
        Self { gain: 1.0 }
    }

    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let peak = left.abs().max(right.abs());
        let target_gain = if peak > 1.0 { 1.0 / peak } else { 1.0 };
        if target_gain < self.gain {
            self.gain += (target_gain - self.gain) * 0.5; // fast attack
        } else {
            self.gain += (target_gain - self.gain) * 0.001; // slow release
        }
        (soft_limit(left * self.gain), soft_limit(right * self.gain))
    }
}

/// Stereo mixing rule for string voices routed into the reverb: the reverb's right
/// channel is cross-fed from the dry left signal and inverted, widening the stereo
/// image without adding a second reverb instance.
pub fn string_and_reverb_mix(dry_left: f32, dry_right: f32, reverb_left: f32, reverb_right: f32) -> (f32, f32) {
    let left = dry_left + reverb_left;
    let right = dry_right - reverb_right + dry_left * -0.2;
    (left, right)
}

pub struct Part {
    pub model: ResonatorModel,
    pub voices: Vec<VoiceSlot>,
    pub polyphony: usize,
    pub limiter: StereoLimiter,
    pub patch: Patch,
    sample_rate: f32,
    seed_counter: u32,
}

impl Part {
    pub fn new(sample_rate: f32) -> Self {
        let voices = (0..MAX_STRING_VOICES)
            .map(|i| VoiceSlot::new(sample_rate, 0x9e3779b9 ^ (i as u32 + 1)))
            .collect();
        Self {
            model: ResonatorModel::Modal,
            voices,
            polyphony: 1,
            limiter: StereoLimiter::new(),
            patch: Patch::default(),
            sample_rate,
            seed_counter: 1,
        }
    }

    /// Switches model and clamps polyphony to that model's ceiling (8 for the
    /// string-based models, 4 otherwise).
    pub fn set_model(&mut self, model: ResonatorModel) {
        self.model = model;
        for voice in &mut self.voices {
            voice.model = model;
        }
        self.polyphony = self.polyphony.min(model.voice_ceiling()).max(1);
    }

    pub fn set_polyphony(&mut self, polyphony: usize) {
        self.polyphony = polyphony.clamp(1, self.model.voice_ceiling());
    }

    /// Updates the shared patch; takes effect for already-ringing voices once
    /// [`Part::reconfigure_active_voices`] is called.
    pub fn set_patch(&mut self, patch: Patch) {
        self.patch = patch;
    }

    /// Strum: excites active voices one at a time across `strum_samples`,
    /// interleaved per the "PING_PATTERN" ordering (odd voices first, then even,
    /// spreading the onset energy instead of a single synchronous hit).
    pub fn strum_order(&self) -> Vec<usize> {
        let n = self.polyphony;
        let mut order: Vec<usize> = (0..n).filter(|i| i % 2 == 1).collect();
        order.extend((0..n).filter(|i| i % 2 == 0));
        order
    }

    pub fn excite_voice(&mut self, index: usize, velocity: f32) {
        if let Some(voice) = self.voices.get_mut(index) {
            voice.excite(velocity);
        }
    }

    pub fn set_voice_note(&mut self, index: usize, note_hz: f32) {
        if matches!(self.model, ResonatorModel::SympatheticString | ResonatorModel::SympatheticStringQuantized) {
            let filtered = self
                .voices
                .get_mut(index)
                .map(|v| v.note_filter.process(note_hz))
                .unwrap_or(note_hz);
            let ratios: Vec<f32> = SYMPATHETIC_CHORD_SEMITONES.iter().map(|&s| semitones_to_ratio(s)).collect();
            self.configure_sympathetic_chord(filtered, &ratios);
            return;
        }
        let model = self.model;
        let patch = self.patch;
        if let Some(voice) = self.voices.get_mut(index) {
            let filtered = voice.note_filter.process(note_hz);
            configure_voice(voice, model, filtered, patch);
        }
    }

    /// Re-applies the current patch to every currently-active voice at its last
    /// played note, so modulation-bus changes reach voices already ringing rather
    /// than only the next note-on.
    pub fn reconfigure_active_voices(&mut self) {
        let model = self.model;
        let patch = self.patch;
        for voice in self.voices.iter_mut().take(self.polyphony) {
            let note_hz = voice.last_note_hz;
            configure_voice(voice, model, note_hz, patch);
        }
    }

    /// Renders one sample across all active voices and returns the stereo mix,
    /// after the per-model pre-gain and the stereo limiter. `filter_cutoff_offset_hz`
    /// comes from the global modulation matrix's filter-cutoff routing.
    pub fn process(&mut self, filter_cutoff_offset_hz: f32) -> (f32, f32) {
        let pre_gain = self.model.pre_gain();
        let mut left = 0.0;
        let mut right = 0.0;
        for voice in self.voices.iter_mut().take(self.polyphony) {
            let sample = voice.process(filter_cutoff_offset_hz) * pre_gain;
            left += sample * (1.0 - voice.pan);
            right += sample * voice.pan;
        }
        let norm = (self.polyphony as f32).sqrt();
        self.limiter.process(left / norm, right / norm)
    }

    /// Assigns detuned pan/pitch-offset positions for sympathetic-string chord
    /// voicing: voices beyond the first are spread across the stereo field and
    /// detuned by a small chord table so they ring sympathetically rather than
    /// doubling in unison. [`ResonatorModel::SympatheticStringQuantized`] snaps
    /// each ratio to the nearest semitone instead of ringing it freely.
    pub fn configure_sympathetic_chord(&mut self, root_hz: f32, chord_ratios: &[f32]) {
        self.seed_counter = self.seed_counter.wrapping_add(1);
        let quantize = self.model == ResonatorModel::SympatheticStringQuantized;
        let patch = self.patch;
        let polyphony = self.polyphony;
        for (i, voice) in self.voices.iter_mut().enumerate().take(polyphony) {
            let mut ratio = chord_ratios.get(i % chord_ratios.len().max(1)).copied().unwrap_or(1.0);
            if quantize {
                ratio = 2f32.powf((ratio.log2() * 12.0).round() / 12.0);
            }
            voice.pan = (i as f32 / polyphony.max(1) as f32).clamp(0.0, 1.0);
            let filtered = voice.note_filter.process(root_hz * ratio);
            voice.modal.configure(filtered, patch.structure, patch.brightness, patch.damping, patch.position);
            voice.last_note_hz = filtered;
        }
    }
}
