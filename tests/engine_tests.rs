//! End-to-end tests driving the top-level `Engine` the way a host would: send
//! control messages through an `EngineHandle`, render blocks, and check the
//! rendered audio rather than internal state.

use resonant_core::dsp::part::ResonatorModel;
use resonant_core::{Engine, EngineConfig, Message};

fn render(engine: &mut Engine, num_frames: usize) -> (Vec<f32>, Vec<f32>) {
    let inputs = vec![0.0; num_frames];
    let mut left = vec![0.0; num_frames];
    let mut right = vec![0.0; num_frames];
    engine.process(&inputs, &mut left, &mut right);
    (left, right)
}

fn peak(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .chain(right.iter())
        .fold(0.0_f32, |m, &v| m.max(v.abs()))
}

/// A single modal voice, struck once, should ring out into silence rather than
/// sustain or blow up.
#[test]
fn single_voice_modal_ping_decays_to_silence() {
    let (mut engine, mut handle) = Engine::new(EngineConfig::default()).unwrap();
    handle.send(Message::SetModel(ResonatorModel::Modal)).unwrap();
    handle
        .send(Message::NoteOn { note_hz: 440.0, velocity: 1.0, accent: true })
        .unwrap();

    let (early_left, early_right) = render(&mut engine, 4_800);
    let early_peak = peak(&early_left, &early_right);
    assert!(early_peak > 0.01, "struck voice produced no audible output");

    // Run long enough for the resonator's natural damping to take over.
    for _ in 0..20 {
        render(&mut engine, 4_800);
    }
    let (tail_left, tail_right) = render(&mut engine, 4_800);
    let tail_peak = peak(&tail_left, &tail_right);
    assert!(tail_peak < early_peak, "modal ping did not decay: early={early_peak} tail={tail_peak}");
    assert!(tail_peak < 0.05, "modal ping left residual energy: {tail_peak}");
}

/// The reverb's feedback network must stay bounded under sustained excitation,
/// even with decay pushed to its ceiling.
#[test]
fn reverb_feedback_stays_bounded_under_sustained_excitation() {
    let (mut engine, mut handle) = Engine::new(EngineConfig::default()).unwrap();
    handle.send(Message::SetModel(ResonatorModel::StringAndReverb)).unwrap();
    handle
        .send(Message::SetParam { id: resonant_core::ParamId::ReverbDecay, value: 1.0 })
        .unwrap();
    handle.send(Message::SetPolyphony(4)).unwrap();

    for _ in 0..200 {
        handle
            .send(Message::NoteOn { note_hz: 220.0, velocity: 1.0, accent: true })
            .unwrap();
        let (left, right) = render(&mut engine, 512);
        let p = peak(&left, &right);
        assert!(p.is_finite(), "reverb output went non-finite");
        assert!(p < 10.0, "reverb feedback blew up: {p}");
    }
}

/// A mono voice gliding between two pitches should settle near the new target
/// rather than jump discontinuously, and should keep producing output.
#[test]
fn mono_portamento_glides_between_notes() {
    let (mut engine, mut handle) = Engine::new(EngineConfig::default()).unwrap();
    handle.send(Message::SetModel(ResonatorModel::String)).unwrap();
    handle.send(Message::SetPolyphony(1)).unwrap();
    handle
        .send(Message::NoteOn { note_hz: 110.0, velocity: 1.0, accent: false })
        .unwrap();
    render(&mut engine, 2_000);

    handle
        .send(Message::NoteOn { note_hz: 440.0, velocity: 1.0, accent: false })
        .unwrap();
    let (left, right) = render(&mut engine, 10_000);
    let p = peak(&left, &right);
    assert!(p.is_finite());
    assert!(p > 0.0, "portamento target voice produced no output");
}

/// Triggering more notes than the polyphony ceiling must steal a voice rather
/// than panic or silently drop all output.
#[test]
fn poly_voice_stealing_keeps_output_flowing() {
    let (mut engine, mut handle) = Engine::new(EngineConfig::default()).unwrap();
    handle.send(Message::SetModel(ResonatorModel::Modal)).unwrap();
    handle.send(Message::SetPolyphony(4)).unwrap();

    for i in 0..8 {
        handle
            .send(Message::NoteOn {
                note_hz: 220.0 + i as f32 * 40.0,
                velocity: 1.0,
                accent: false,
            })
            .unwrap();
        render(&mut engine, 200);
    }

    let (left, right) = render(&mut engine, 2_000);
    let p = peak(&left, &right);
    assert!(p.is_finite());
    assert!(p > 0.0, "voice pool went silent after stealing under pressure");
}

/// The Euclidean step sequencer should produce its own note-on events without
/// any explicit `NoteOn` messages from the host.
#[test]
fn euclidean_pattern_triggers_notes_on_its_own() {
    let config = EngineConfig {
        bpm: 600.0, // fast enough that several steps land within a short render
        steps_per_bar: 8,
        euclidean_pulses: 5,
        ..EngineConfig::default()
    };
    let (mut engine, _handle) = Engine::new(config).unwrap();

    let (left, right) = render(&mut engine, 48_000 * 2);
    let p = peak(&left, &right);
    assert!(p > 0.0, "sequencer produced no audible output over two seconds");
}
