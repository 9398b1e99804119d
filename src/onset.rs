//! Onset detector and strummer: splits the input into three bands, tracks each
//! band's energy, derives an onset-detection-function value, flags outliers with
//! a running z-score, and drives a strum trigger with a refractory inhibition
//! timer.

use crate::dsp::filters::svf::NaiveSvf;

const LOW_CUTOFF_HZ: f32 = 250.0;
const HIGH_CUTOFF_HZ: f32 = 3000.0;
const INHIBIT_SAMPLES_DEFAULT: u32 = 2400; // ~50ms at 48kHz

struct Band {
    filter: NaiveSvf,
    cutoff_hz: f32,
    envelope: f32,
}

impl Band {
    fn new(sample_rate: f32, cutoff_hz: f32) -> Self {
        Self {
            filter: NaiveSvf::new(sample_rate),
            cutoff_hz,
            envelope: 0.0,
        }
    }

    fn update(&mut self, input: f32) -> f32 {
        let out = self.filter.process(input, self.cutoff_hz, 0.3);
        let rectified = out.lowpass.abs();
        let coeff = if rectified > self.envelope { 0.5 } else { 0.01 };
        self.envelope += coeff * (rectified - self.envelope);
        self.envelope
    }
}

/// Running mean/variance for a z-score outlier test, updated with an exponential
/// moving average rather than an exact windowed computation (cheap, stable, and
/// adequate for onset detection's "is this unusually loud" question).
struct RunningStats {
    mean: f32,
    variance: f32,
}

impl RunningStats {
    fn new() -> Self {
        Self { mean: 0.0, variance: 1.0 }
    }

    fn update(&mut self, value: f32) -> f32 {
        let delta = value - self.mean;
        self.mean += 0.01 * delta;
        self.variance += 0.01 * (delta * delta - self.variance);
        let std_dev = self.variance.sqrt().max(1e-6);
        delta / std_dev
    }
}

pub struct OnsetDetector {
    low: Band,
    mid: Band,
    high: Band,
    odf_stats: RunningStats,
    previous_odf: f32,
    inhibit_counter: u32,
    inhibit_period: u32,
    pub z_score_threshold: f32,
}

impl OnsetDetector {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            low: Band::new(sample_rate, LOW_CUTOFF_HZ),
            mid: Band::new(sample_rate, (LOW_CUTOFF_HZ + HIGH_CUTOFF_HZ) * 0.5),
            high: Band::new(sample_rate, HIGH_CUTOFF_HZ),
            odf_stats: RunningStats::new(),
            previous_odf: 0.0,
            inhibit_counter: 0,
            inhibit_period: INHIBIT_SAMPLES_DEFAULT,
            z_score_threshold: 2.5,
        }
    }

    pub fn set_inhibit_period_samples(&mut self, samples: u32) {
        self.inhibit_period = samples;
    }

    /// Processes one sample, returning `true` exactly on an accepted onset (a
    /// positive-going energy jump whose z-score clears the threshold, outside the
    /// refractory window opened by the previous onset).
    pub fn process(&mut self, input: f32) -> bool {
        let low_energy = self.low.update(input);
        let mid_energy = self.mid.update(input);
        let high_energy = self.high.update(input);

        let odf = low_energy * 0.5 + mid_energy * 0.3 + high_energy * 0.2;
        let flux = (odf - self.previous_odf).max(0.0);
        self.previous_odf = odf;

        let z = self.odf_stats.update(flux);

        if self.inhibit_counter > 0 {
            self.inhibit_counter -= 1;
            return false;
        }

        if z > self.z_score_threshold {
            self.inhibit_counter = self.inhibit_period;
            true
        } else {
            false
        }
    }
}

/// Drives a strum gesture from detected onsets: each accepted onset schedules a
/// short burst of per-voice strike events spread over `strum_samples`.
pub struct Strummer {
    pub strum_samples: u32,
    samples_remaining: u32,
    voices_fired: usize,
    total_voices: usize,
}

impl Strummer {
    pub fn new(strum_samples: u32, total_voices: usize) -> Self {
        Self {
            strum_samples: strum_samples.max(1),
            samples_remaining: 0,
            voices_fired: 0,
            total_voices: total_voices.max(1),
        }
    }

    pub fn trigger(&mut self) {
        self.samples_remaining = self.strum_samples;
        self.voices_fired = 0;
    }

    /// Advances one sample, returning `Some(voice_index)` the instant that voice's
    /// strike should fire.
    pub fn tick(&mut self) -> Option<usize> {
        if self.samples_remaining == 0 || self.voices_fired >= self.total_voices {
            return None;
        }
        let per_voice = self.strum_samples / self.total_voices as u32;
        let elapsed = self.strum_samples - self.samples_remaining;
        self.samples_remaining -= 1;

        if elapsed % per_voice.max(1) == 0 && self.voices_fired < self.total_voices {
            let voice = self.voices_fired;
            self.voices_fired += 1;
            Some(voice)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_never_triggers_an_onset() {
        let mut detector = OnsetDetector::new(48_000.0);
        for _ in 0..10_000 {
            assert!(!detector.process(0.0));
        }
    }

    #[test]
    fn a_loud_transient_after_silence_is_detected() {
        let mut detector = OnsetDetector::new(48_000.0);
        for _ in 0..2000 {
            detector.process(0.0);
        }
        let mut detected = false;
        for i in 0..200 {
            let input = if i < 50 { (i as f32 * 2.0).sin() } else { 0.0 };
            if detector.process(input) {
                detected = true;
            }
        }
        assert!(detected);
    }

    #[test]
    fn inhibition_suppresses_immediate_repeat_onsets() {
        let mut detector = OnsetDetector::new(48_000.0);
        detector.set_inhibit_period_samples(10_000);
        for _ in 0..2000 {
            detector.process(0.0);
        }
        let mut onset_count = 0;
        for i in 0..5000 {
            let input = if i % 500 < 50 { 1.0 } else { 0.0 };
            if detector.process(input) {
                onset_count += 1;
            }
        }
        assert!(onset_count <= 1, "inhibition window should suppress repeats: {onset_count}");
    }

    #[test]
    fn strummer_fires_each_voice_exactly_once_per_trigger() {
        let mut strummer = Strummer::new(480, 4);
        strummer.trigger();
        let mut fired = Vec::new();
        for _ in 0..480 {
            if let Some(voice) = strummer.tick() {
                fired.push(voice);
            }
        }
        assert_eq!(fired, vec![0, 1, 2, 3]);
    }
}
