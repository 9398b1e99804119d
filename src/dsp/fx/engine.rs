//! Shared delay-line arena and per-sample scoped context, the stack machine that the
//! reverb and ensemble effects are built on top of.
//!
//! Grounded on the feedback-delay-network idiom of the `other_examples` Vital reverb
//! port (single write cursor shared by many logical delay lines, Lagrange/linear
//! interpolated reads, quadrature LFOs advanced on a slow tick) but reshaped into the
//! scoped accumulator/"previous read" context style so effects read like a sequence
//! of named operations instead of a 400-line `process()` body.

use crate::dsp::oscillators::{CosineMode, CosineOscillator};
use crate::math::soft_limit;

/// A named region of the shared arena: `offset` into the arena, `length` samples.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub offset: usize,
    pub length: usize,
}

/// Builds non-overlapping segments back to back and returns their total length, in
/// the order the lengths were given.
pub fn layout(lengths: &[usize]) -> (Vec<Segment>, usize) {
    let mut segments = Vec::with_capacity(lengths.len());
    let mut offset = 0;
    for &length in lengths {
        segments.push(Segment { offset, length });
        offset += length;
    }
    (segments, offset)
}

/// The shared circular arena plus the two onboard LFOs used to modulate tank reads.
#[derive(Debug)]
pub struct FxEngine {
    buffer: Vec<f32>,
    write_ptr: usize,
    lfo: [CosineOscillator; 2],
    lfo_value: [f32; 2],
    tick: u32,
}

const LFO_UPDATE_PERIOD: u32 = 32;

impl FxEngine {
    pub fn new(total_size: usize, lfo_frequencies: [f32; 2]) -> Self {
        let mut lfo0 = CosineOscillator::new(CosineMode::Approximate);
        let mut lfo1 = CosineOscillator::new(CosineMode::Approximate);
        lfo0.set_frequency(lfo_frequencies[0]);
        lfo1.set_frequency(lfo_frequencies[1]);
        Self {
            buffer: vec![0.0; total_size.max(1)],
            write_ptr: 0,
            lfo: [lfo0, lfo1],
            lfo_value: [0.0, 0.0],
            tick: 0,
        }
    }

    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.write_ptr = 0;
        self.tick = 0;
    }

    /// Detects a non-finite sample having reached the arena, so the caller can
    /// clear the whole arena rather than letting NaN/inf propagate forever through
    /// the feedback network.
    pub fn has_fault(&self) -> bool {
        self.buffer.iter().any(|s| !s.is_finite())
    }

    /// Begin a new per-sample scope: decrements the write cursor and, every
    /// `LFO_UPDATE_PERIOD` samples, advances the onboard LFOs.
    pub fn start(&mut self) -> FxContext<'_> {
        let size = self.buffer.len();
        self.write_ptr = (self.write_ptr + size - 1) % size;

        self.tick += 1;
        if self.tick >= LFO_UPDATE_PERIOD {
            self.tick = 0;
            self.lfo_value[0] = self.lfo[0].next();
            self.lfo_value[1] = self.lfo[1].next();
        }

        FxContext {
            buffer: &mut self.buffer,
            write_ptr: self.write_ptr,
            lfo_value: self.lfo_value,
            accumulator: 0.0,
            previous_read: 0.0,
        }
    }
}

/// Per-sample scoped view into the arena: an accumulator `A` threaded through
/// `load`/`read`/`write`/`lp`/`hp`/`soft_limit` calls, plus `previous_read` (`P`)
/// which `write_allpass` folds back in to realize a Schroeder all-pass without a
/// second read.
pub struct FxContext<'a> {
    buffer: &'a mut [f32],
    write_ptr: usize,
    lfo_value: [f32; 2],
    accumulator: f32,
    previous_read: f32,
}

impl<'a> FxContext<'a> {
    #[inline]
    fn index(&self, segment: Segment, offset: i64) -> usize {
        let size = self.buffer.len() as i64;
        let absolute = self.write_ptr as i64 + segment.offset as i64 + offset;
        (absolute.rem_euclid(size)) as usize
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    pub fn load(&mut self, value: f32) -> &mut Self {
        self.accumulator = value;
        self
    }

    pub fn read(&mut self, value: f32) -> &mut Self {
        self.accumulator += value;
        self
    }

    pub fn read_scaled(&mut self, value: f32, scale: f32) -> &mut Self {
        self.accumulator += value * scale;
        self
    }

    /// Write the accumulator into `segment` at a fixed integer `offset`, then scale
    /// the accumulator in place (`scale` of `0.0` leaves nothing behind for a
    /// following `write_allpass`/read chain; pass `1.0` to keep it unchanged).
    pub fn write(&mut self, segment: Segment, offset: i64, scale: f32) -> &mut Self {
        let i = self.index(segment, offset);
        self.buffer[i] = self.accumulator;
        self.accumulator *= scale;
        self
    }

    /// `write` followed by folding `previous_read` back into the accumulator —
    /// the classic Schroeder all-pass combination.
    pub fn write_allpass(&mut self, segment: Segment, offset: i64, scale: f32) -> &mut Self {
        self.write(segment, offset, scale);
        self.accumulator += self.previous_read;
        self
    }

    /// Read a fixed integer-delay tap out of `segment`, remembering it in
    /// `previous_read` for a subsequent `write_allpass`.
    pub fn read_tap(&mut self, segment: Segment, offset: i64, scale: f32) -> &mut Self {
        let i = self.index(segment, offset);
        let sample = self.buffer[i];
        self.previous_read = sample;
        self.accumulator += sample * scale;
        self
    }

    /// Linearly interpolated read at a fractional offset within `segment`.
    pub fn interpolate(&mut self, segment: Segment, offset: f32, scale: f32) -> &mut Self {
        let base = offset.floor();
        let frac = offset - base;
        let a = self.index(segment, base as i64);
        let b = self.index(segment, base as i64 + 1);
        let sample = self.buffer[a] + (self.buffer[b] - self.buffer[a]) * frac;
        self.previous_read = sample;
        self.accumulator += sample * scale;
        self
    }

    /// Like `interpolate`, but the fractional offset is itself modulated by one of
    /// the engine's two onboard LFOs (`lfo_index` 0 or 1), scaled by `amplitude`.
    pub fn interpolate_lfo(
        &mut self,
        segment: Segment,
        offset: f32,
        lfo_index: usize,
        amplitude: f32,
        scale: f32,
    ) -> &mut Self {
        let modulated = offset + self.lfo_value[lfo_index] * amplitude;
        self.interpolate(segment, modulated, scale)
    }

    /// One-pole lowpass applied to the accumulator, `state` persisted by the caller.
    pub fn lp(&mut self, state: &mut f32, coefficient: f32) -> &mut Self {
        *state += coefficient * (self.accumulator - *state);
        self.accumulator = *state;
        self
    }

    /// One-pole highpass (`input - lowpass`), `state` persisted by the caller.
    pub fn hp(&mut self, state: &mut f32, coefficient: f32) -> &mut Self {
        *state += coefficient * (self.accumulator - *state);
        self.accumulator -= *state;
        self
    }

    /// Mandatory in every feedback path — omitting it is a bug.
    pub fn soft_limit(&mut self) -> &mut Self {
        self.accumulator = soft_limit(self.accumulator);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_produces_non_overlapping_segments() {
        let (segments, total) = layout(&[100, 200, 50]);
        assert_eq!(total, 350);
        assert_eq!(segments[0].offset, 0);
        assert_eq!(segments[1].offset, 100);
        assert_eq!(segments[2].offset, 300);
    }

    #[test]
    fn write_then_read_round_trips_through_arena() {
        let (segments, total) = layout(&[64]);
        let mut engine = FxEngine::new(total, [0.5, 0.3]);
        let seg = segments[0];

        {
            let mut ctx = engine.start();
            ctx.load(1.0).write(seg, 10, 1.0);
        }
        // advance 10 samples so the write lands exactly at the read offset
        for _ in 0..10 {
            engine.start();
        }
        let mut ctx = engine.start();
        ctx.load(0.0).read_tap(seg, 0, 1.0);
        assert!((ctx.accumulator() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn soft_limit_keeps_feedback_bounded() {
        let (segments, total) = layout(&[16]);
        let mut engine = FxEngine::new(total, [0.1, 0.1]);
        let seg = segments[0];
        for _ in 0..1000 {
            let mut ctx = engine.start();
            ctx.load(5.0).write(seg, 0, 1.0).soft_limit();
            assert!(ctx.accumulator().abs() < 1.6);
        }
    }

    #[test]
    fn fault_detection_flags_non_finite_state() {
        let mut engine = FxEngine::new(16, [0.1, 0.1]);
        assert!(!engine.has_fault());
        {
            let mut ctx = engine.start();
            ctx.load(f32::NAN).write(Segment { offset: 0, length: 16 }, 0, 1.0);
        }
        assert!(engine.has_fault());
        engine.clear();
        assert!(!engine.has_fault());
    }
}
