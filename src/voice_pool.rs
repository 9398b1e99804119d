//! 8-slot subtractive voice pool: gate/retrigger lifecycle, glide, trill automation
//! and voice-stealing.

pub const POOL_SIZE: usize = 8;

/// How long a quick-released voice (stolen or cut off) rings before the slot goes
/// inactive — short enough to avoid an audible click, too short to be heard as a
/// release.
const QUICK_RELEASE_SECONDS: f32 = 0.008;
/// Extra tail held after a normal release before the slot is freed, on top of
/// whatever release time the host configured via `set_release_seconds`.
const RELEASE_TAIL_SECONDS: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Inactive,
    Active,
    Releasing,
    QuickReleasing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateMode {
    /// Only mono retriggering is allowed: a new note on the same voice restarts the
    /// envelope rather than gating.
    MonoRetrigger,
    /// Only polyphonic gating is allowed: the pool steals the lowest-scoring voice
    /// rather than retriggering in place.
    PolyGate,
}

#[derive(Debug, Clone, Copy)]
pub struct Voice {
    pub state: VoiceState,
    pub note_hz: f32,
    pub target_note_hz: f32,
    pub velocity: f32,
    pub accented: bool,
    pub age_samples: u64,
    pub auto_release_after: Option<u32>,
    pub portamento_rate: f32,
    /// Samples remaining before a `Releasing`/`QuickReleasing` voice is forced
    /// `Inactive`. `None` for `Active`/`Inactive` voices.
    pub release_countdown: Option<u32>,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            state: VoiceState::Inactive,
            note_hz: 0.0,
            target_note_hz: 0.0,
            velocity: 0.0,
            accented: false,
            age_samples: 0,
            auto_release_after: None,
            portamento_rate: 1.0,
            release_countdown: None,
        }
    }
}

pub struct VoicePool {
    pub voices: [Voice; POOL_SIZE],
    pub gate_mode: GateMode,
    pub portamento_seconds: f32,
    release_seconds: f32,
    sample_rate: f32,
}

impl VoicePool {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            voices: [Voice::default(); POOL_SIZE],
            gate_mode: GateMode::PolyGate,
            portamento_seconds: 0.0,
            release_seconds: 0.2,
            sample_rate,
        }
    }

    /// Sets the release tail (in seconds) applied on top of
    /// [`RELEASE_TAIL_SECONDS`] before a released voice's slot goes inactive.
    pub fn set_release_seconds(&mut self, release_seconds: f32) {
        self.release_seconds = release_seconds.max(0.0);
    }

    /// Voice-stealing score: older, quieter, unaccented low notes are stolen
    /// first. Higher score = stolen first.
    fn steal_score(voice: &Voice) -> f32 {
        let age_term = voice.age_samples as f32 * 1e-6;
        let velocity_term = 0.5 * (1.0 - voice.velocity);
        let accent_term = if voice.accented { 2.0 } else { 0.0 };
        let low_note_term = if voice.note_hz < 440.0 * 2f32.powf((48.0 - 69.0) / 12.0) {
            0.3
        } else {
            0.0
        };
        age_term + velocity_term - accent_term - low_note_term
    }

    fn find_free_slot(&self) -> Option<usize> {
        self.voices.iter().position(|v| v.state == VoiceState::Inactive)
    }

    fn find_steal_candidate(&self) -> usize {
        self.voices
            .iter()
            .enumerate()
            .max_by(|a, b| {
                Self::steal_score(a.1)
                    .partial_cmp(&Self::steal_score(b.1))
                    .unwrap()
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Triggers a new note, returning the voice index used. In `MonoRetrigger` mode
    /// this always reuses voice 0; in `PolyGate` mode it finds a free slot or steals
    /// the lowest-scoring active one.
    pub fn trigger_note(&mut self, note_hz: f32, velocity: f32, accented: bool) -> usize {
        let index = match self.gate_mode {
            GateMode::MonoRetrigger => 0,
            GateMode::PolyGate => self.find_free_slot().unwrap_or_else(|| self.find_steal_candidate()),
        };

        let voice = &mut self.voices[index];
        if self.portamento_seconds > 0.0 && voice.state != VoiceState::Inactive {
            voice.target_note_hz = note_hz;
            voice.portamento_rate = 1.0 / (self.portamento_seconds * self.sample_rate).max(1.0);
        } else {
            voice.note_hz = note_hz;
            voice.target_note_hz = note_hz;
        }
        voice.velocity = velocity;
        voice.accented = accented;
        voice.age_samples = 0;
        voice.state = VoiceState::Active;
        voice.release_countdown = None;
        index
    }

    /// Releases the most recently triggered active voice still playing `note_hz`,
    /// returning its index. Used by the message queue, which can't learn back which
    /// slot a prior `NoteOn` landed on.
    pub fn release_by_note(&mut self, note_hz: f32) -> Option<usize> {
        let index = self
            .voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.state == VoiceState::Active && (v.target_note_hz - note_hz).abs() < 1e-3)
            .min_by_key(|(_, v)| v.age_samples)
            .map(|(i, _)| i)?;
        self.release_voice(index);
        Some(index)
    }

    pub fn release_voice(&mut self, index: usize) {
        let release_seconds = self.release_seconds;
        let sample_rate = self.sample_rate;
        if let Some(voice) = self.voices.get_mut(index) {
            if voice.state == VoiceState::Active {
                voice.state = VoiceState::Releasing;
                let seconds = release_seconds + RELEASE_TAIL_SECONDS;
                voice.release_countdown = Some((seconds * sample_rate).max(0.0) as u32);
            }
        }
    }

    pub fn release_voice_by_index(&mut self, index: usize) {
        self.release_voice(index);
    }

    pub fn quick_release_voice(&mut self, index: usize) {
        let sample_rate = self.sample_rate;
        if let Some(voice) = self.voices.get_mut(index) {
            voice.state = VoiceState::QuickReleasing;
            voice.release_countdown = Some((QUICK_RELEASE_SECONDS * sample_rate).max(0.0) as u32);
        }
    }

    pub fn schedule_auto_release(&mut self, index: usize, after_samples: u32) {
        if let Some(voice) = self.voices.get_mut(index) {
            voice.auto_release_after = Some(after_samples);
        }
    }

    /// Immediately clears every slot: `active = false`, `releasing = false`, no
    /// voice id held anywhere, per the panic-stop invariant — not a graceful
    /// release, a hard reset.
    pub fn release_all_voices(&mut self) {
        for voice in &mut self.voices {
            *voice = Voice::default();
        }
    }

    /// Advances glide, auto-release and release-deadline bookkeeping by one
    /// sample. Callers are expected to drive their own resonator's decay
    /// separately; this only updates pool-level scheduling state.
    pub fn tick(&mut self) {
        for i in 0..POOL_SIZE {
            if self.voices[i].state == VoiceState::Inactive {
                continue;
            }
            self.voices[i].age_samples += 1;

            if (self.voices[i].note_hz - self.voices[i].target_note_hz).abs() > 1e-4 {
                let delta = (self.voices[i].target_note_hz - self.voices[i].note_hz)
                    * self.voices[i].portamento_rate;
                self.voices[i].note_hz += delta;
            }

            if self.voices[i].auto_release_after == Some(0) {
                self.voices[i].auto_release_after = None;
                self.release_voice_by_index(i);
            } else if let Some(remaining) = self.voices[i].auto_release_after {
                self.voices[i].auto_release_after = Some(remaining - 1);
            }

            if matches!(self.voices[i].state, VoiceState::Releasing | VoiceState::QuickReleasing) {
                match self.voices[i].release_countdown {
                    Some(0) => self.deactivate(i),
                    Some(remaining) => self.voices[i].release_countdown = Some(remaining - 1),
                    None => {}
                }
            }
        }
    }

    pub fn deactivate(&mut self, index: usize) {
        if let Some(voice) = self.voices.get_mut(index) {
            *voice = Voice::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_retrigger_always_reuses_voice_zero() {
        let mut pool = VoicePool::new(48_000.0);
        pool.gate_mode = GateMode::MonoRetrigger;
        let a = pool.trigger_note(220.0, 1.0, false);
        let b = pool.trigger_note(440.0, 1.0, false);
        assert_eq!(a, 0);
        assert_eq!(b, 0);
    }

    #[test]
    fn poly_gate_fills_free_slots_before_stealing() {
        let mut pool = VoicePool::new(48_000.0);
        pool.gate_mode = GateMode::PolyGate;
        let mut used = Vec::new();
        for i in 0..POOL_SIZE {
            used.push(pool.trigger_note(220.0 + i as f32, 1.0, false));
        }
        let unique: std::collections::HashSet<_> = used.iter().collect();
        assert_eq!(unique.len(), POOL_SIZE);
    }

    #[test]
    fn voice_stealing_prefers_oldest_quietest_unaccented() {
        let mut pool = VoicePool::new(48_000.0);
        for i in 0..POOL_SIZE {
            pool.trigger_note(220.0, 1.0, i == 0);
        }
        for _ in 0..1000 {
            pool.tick();
        }
        // voice 0 is accented, others are equally old/loud — steal should avoid it
        let stolen = pool.trigger_note(330.0, 1.0, false);
        assert_ne!(stolen, 0);
    }

    #[test]
    fn auto_release_fires_after_scheduled_samples() {
        let mut pool = VoicePool::new(48_000.0);
        let idx = pool.trigger_note(220.0, 1.0, false);
        pool.schedule_auto_release(idx, 10);
        for _ in 0..10 {
            pool.tick();
        }
        assert_eq!(pool.voices[idx].state, VoiceState::Releasing);
    }

    #[test]
    fn release_by_note_targets_the_newest_matching_voice() {
        let mut pool = VoicePool::new(48_000.0);
        let first = pool.trigger_note(220.0, 1.0, false);
        for _ in 0..100 {
            pool.tick();
        }
        let second = pool.trigger_note(220.0, 1.0, false);
        assert_ne!(first, second);

        let released = pool.release_by_note(220.0).unwrap();
        assert_eq!(released, second);
        assert_eq!(pool.voices[first].state, VoiceState::Active);
        assert_eq!(pool.voices[second].state, VoiceState::Releasing);
    }

    #[test]
    fn released_voice_goes_inactive_once_its_deadline_elapses() {
        let mut pool = VoicePool::new(48_000.0);
        pool.set_release_seconds(0.0);
        let idx = pool.trigger_note(220.0, 1.0, false);
        pool.release_voice(idx);
        assert_eq!(pool.voices[idx].state, VoiceState::Releasing);

        let deadline = pool.voices[idx].release_countdown.unwrap();
        for _ in 0..deadline {
            pool.tick();
            assert_ne!(pool.voices[idx].state, VoiceState::Inactive);
        }
        pool.tick();
        assert_eq!(pool.voices[idx].state, VoiceState::Inactive);
        assert_eq!(pool.voices[idx].note_hz, 0.0);
    }

    #[test]
    fn panic_immediately_clears_every_slot() {
        let mut pool = VoicePool::new(48_000.0);
        for i in 0..POOL_SIZE {
            pool.trigger_note(220.0 + i as f32, 1.0, false);
        }
        pool.release_all_voices();
        for voice in &pool.voices {
            assert_eq!(voice.state, VoiceState::Inactive);
            assert_eq!(voice.note_hz, 0.0);
        }
    }

    #[test]
    fn portamento_glides_towards_target_note() {
        let mut pool = VoicePool::new(48_000.0);
        pool.gate_mode = GateMode::MonoRetrigger;
        pool.portamento_seconds = 0.1;
        let idx = pool.trigger_note(220.0, 1.0, false);
        pool.voices[idx].state = VoiceState::Active;
        let idx2 = pool.trigger_note(440.0, 1.0, false);
        assert_eq!(idx, idx2);
        let start = pool.voices[idx].note_hz;
        for _ in 0..100 {
            pool.tick();
        }
        let moved = pool.voices[idx].note_hz;
        assert!(moved > start, "expected glide toward 440: {moved}");
    }
}
