//! Tagged control message enum, the sole way a host talks to the audio thread —
//! a fixed sum type the compiler can exhaustively match, rather than a dynamic
//! string-keyed parameter dispatch.

use crate::dsp::part::ResonatorModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    /// Triggers a note. The voice pool — not the sender — picks which slot plays
    /// it, since a fire-and-forget queue gives the host no way to learn that slot
    /// back; `NoteOff` below addresses by pitch instead for the same reason.
    NoteOn { note_hz: f32, velocity: f32, accent: bool },
    /// Releases the most recently triggered active voice still playing `note_hz`.
    NoteOff { note_hz: f32 },
    ScheduleAutoReleaseByIndex { voice: usize, after_samples: u32 },
    Strum { note_hz: f32, velocity: f32 },
    SetModel(ResonatorModel),
    SetPolyphony(usize),
    SetParam { id: ParamId, value: f32 },
    SetEnvelope {
        target: EnvelopeTarget,
        attack_seconds: f32,
        decay_seconds: f32,
        sustain_level: f32,
        release_seconds: f32,
    },
    Panic,
}

/// Which stage of the voice's life `SetEnvelope` is shaping. Both targets share a
/// single release-tail timer on the voice pool, since the resonator models here
/// ring from an excitation burst rather than holding a gated sustain stage — see
/// `Engine::handle_message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeTarget {
    Amp,
    Filter,
}

/// Declared modulation-bus parameter ids, each with a `{module, label, min, max,
/// step}` descriptor returned by `descriptor()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ParamId {
    Structure = 0,
    Brightness = 1,
    Damping = 2,
    Position = 3,
    FmRatio = 4,
    FmAmount = 5,
    ReverbDecay = 6,
    ReverbDamping = 7,
    EnsembleMix = 8,
    EnsembleDepth = 9,
    ReverbDiffusion = 10,
    ReverbMix = 11,
    ModMatrixPwmDepth = 12,
    ModMatrixPitchDepth = 13,
    ModMatrixFilterDepth = 14,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamDescriptor {
    pub id: ParamId,
    pub module: &'static str,
    pub label: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl ParamId {
    pub fn descriptor(self) -> ParamDescriptor {
        match self {
            ParamId::Structure => ParamDescriptor {
                id: self,
                module: "resonator",
                label: "structure",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::Brightness => ParamDescriptor {
                id: self,
                module: "resonator",
                label: "brightness",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::Damping => ParamDescriptor {
                id: self,
                module: "resonator",
                label: "damping",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::Position => ParamDescriptor {
                id: self,
                module: "resonator",
                label: "position",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::FmRatio => ParamDescriptor {
                id: self,
                module: "fm_voice",
                label: "ratio",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::FmAmount => ParamDescriptor {
                id: self,
                module: "fm_voice",
                label: "fm_amount",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::ReverbDecay => ParamDescriptor {
                id: self,
                module: "reverb",
                label: "decay",
                min: 0.0,
                max: 0.99,
                step: 0.001,
            },
            ParamId::ReverbDamping => ParamDescriptor {
                id: self,
                module: "reverb",
                label: "damping",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::EnsembleMix => ParamDescriptor {
                id: self,
                module: "ensemble",
                label: "mix",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::EnsembleDepth => ParamDescriptor {
                id: self,
                module: "ensemble",
                label: "depth",
                min: 0.0,
                max: 200.0,
                step: 0.1,
            },
            ParamId::ReverbDiffusion => ParamDescriptor {
                id: self,
                module: "reverb",
                label: "diffusion",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::ReverbMix => ParamDescriptor {
                id: self,
                module: "reverb",
                label: "amount",
                min: 0.0,
                max: 1.0,
                step: 0.001,
            },
            ParamId::ModMatrixPwmDepth => ParamDescriptor {
                id: self,
                module: "mod_matrix",
                label: "pwm_depth",
                min: -0.5,
                max: 0.5,
                step: 0.001,
            },
            ParamId::ModMatrixPitchDepth => ParamDescriptor {
                id: self,
                module: "mod_matrix",
                label: "pitch_depth",
                min: -12.0,
                max: 12.0,
                step: 0.01,
            },
            ParamId::ModMatrixFilterDepth => ParamDescriptor {
                id: self,
                module: "mod_matrix",
                label: "filter_cutoff_depth",
                min: 0.0,
                max: 4000.0,
                step: 1.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_param_descriptor_has_a_sane_range() {
        let all = [
            ParamId::Structure,
            ParamId::Brightness,
            ParamId::Damping,
            ParamId::Position,
            ParamId::FmRatio,
            ParamId::FmAmount,
            ParamId::ReverbDecay,
            ParamId::ReverbDamping,
            ParamId::EnsembleMix,
            ParamId::EnsembleDepth,
            ParamId::ReverbDiffusion,
            ParamId::ReverbMix,
            ParamId::ModMatrixPwmDepth,
            ParamId::ModMatrixPitchDepth,
            ParamId::ModMatrixFilterDepth,
        ];
        for id in all {
            let d = id.descriptor();
            assert!(d.min < d.max);
            assert!(d.step > 0.0);
        }
    }
}
