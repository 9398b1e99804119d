//! Griesinger-topology reverb built on the [`FxEngine`] stack machine: four cascaded
//! input diffusion all-passes feeding two cross-coupled modulated delay tanks.
//!
//! Segment lengths use the "large" layout (summing to roughly 32768 samples rather
//! than a smaller ~16384-sample arena), chosen so the tanks have headroom at sample
//! rates above 48kHz; see DESIGN.md. Soft-limiting two of the feedback taps is
//! mandatory, not optional: omitting it is a bug, since an unclamped two-tank
//! feedback network can ring up to clipping on sustained input.

use crate::dsp::fx::engine::{layout, FxEngine, Segment};

const AP1: usize = 150;
const AP2: usize = 214;
const AP3: usize = 319;
const AP4: usize = 527;
const DAP1A: usize = 2182;
const DAP1B: usize = 2690;
const DEL1: usize = 4501;
const DAP2A: usize = 2525;
const DAP2B: usize = 2197;
const DEL2: usize = 6312;

const KAP: f32 = 0.625;

pub struct ReverbSegments {
    ap1: Segment,
    ap2: Segment,
    ap3: Segment,
    ap4: Segment,
    dap1a: Segment,
    dap1b: Segment,
    del1: Segment,
    dap2a: Segment,
    dap2b: Segment,
    del2: Segment,
}

impl ReverbSegments {
    fn build() -> (Self, usize) {
        let (segments, total) = layout(&[
            AP1, AP2, AP3, AP4, DAP1A, DAP1B, DEL1, DAP2A, DAP2B, DEL2,
        ]);
        (
            Self {
                ap1: segments[0],
                ap2: segments[1],
                ap3: segments[2],
                ap4: segments[3],
                dap1a: segments[4],
                dap1b: segments[5],
                del1: segments[6],
                dap2a: segments[7],
                dap2b: segments[8],
                del2: segments[9],
            },
            total,
        )
    }
}

pub struct Reverb {
    engine: FxEngine,
    segments: ReverbSegments,
    lp1: f32,
    lp2: f32,
    input_gain: f32,
    decay: f32,
    damping_coefficient: f32,
    /// LFO modulation amplitude (in samples) applied to the two tank
    /// cross-feedback reads.
    tank_mod_amount: f32,
    /// All-pass feedback coefficient for the two diffuser stages inside the
    /// tanks, `0..1`; `0` makes `write_allpass` pass the previous tap straight
    /// through (see the `zero_coefficient_write_allpass_passes_the_previous_read_through`
    /// test in `dsp::fx::engine`).
    diffusion: f32,
    /// Wet/dry mix, `0..1`; `0` leaves the input unchanged.
    amount: f32,
}

impl Reverb {
    pub fn new() -> Self {
        let (segments, total) = ReverbSegments::build();
        Self {
            engine: FxEngine::new(total, [0.5, 0.3]),
            segments,
            lp1: 0.0,
            lp2: 0.0,
            input_gain: 0.5,
            decay: 0.7,
            damping_coefficient: 0.3,
            tank_mod_amount: 50.0,
            diffusion: 0.7,
            amount: 1.0,
        }
    }

    pub fn set_decay(&mut self, decay: f32) {
        self.decay = decay.clamp(0.0, 0.99);
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping_coefficient = damping.clamp(0.0, 1.0);
    }

    pub fn set_input_gain(&mut self, gain: f32) {
        self.input_gain = gain.max(0.0);
    }

    pub fn set_diffusion(&mut self, diffusion: f32) {
        self.diffusion = diffusion.clamp(0.0, 1.0);
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(0.0, 1.0);
    }

    /// Processes one mono input sample and returns a stereo pair. Recovers from a
    /// NaN/inf fault by clearing the whole arena, losing one block of tail rather
    /// than corrupting the engine permanently.
    pub fn process(&mut self, input: f32) -> (f32, f32) {
        if self.engine.has_fault() {
            log::warn!("reverb arena faulted (NaN/inf), clearing and losing current tail");
            self.engine.clear();
        }

        let s = &self.segments;
        let mut ctx = self.engine.start();

        ctx.load(input).read_scaled(input, self.input_gain - 1.0);

        ctx.write_allpass(s.ap1, 0, KAP);
        ctx.write_allpass(s.ap2, 0, KAP);
        ctx.write_allpass(s.ap3, 0, KAP * 0.9);
        ctx.write_allpass(s.ap4, 0, KAP * 0.9);

        let diffused = ctx.accumulator();

        // Tank 1: dap1a -> dap1b -> del1, cross-fed from tank 2's delay, read near
        // the top of its own length (minus headroom for the LFO swing) so the
        // cross-feed behaves like a long, slowly wandering delay rather than a
        // fixed tap.
        ctx.load(diffused)
            .interpolate_lfo(s.del2, s.del2.length as f32 - 128.0, 0, self.tank_mod_amount, self.decay)
            .write_allpass(s.dap1a, 0, -self.diffusion)
            .write(s.dap1b, 0, 1.0)
            .lp(&mut self.lp1, 1.0 - self.damping_coefficient)
            .soft_limit()
            .write(s.del1, 0, 1.0);
        let tank1_out = ctx.accumulator();

        // Tank 2: dap2a -> dap2b -> del2, cross-fed from tank 1's delay.
        ctx.load(diffused)
            .interpolate_lfo(s.del1, s.del1.length as f32 - 128.0, 1, self.tank_mod_amount, self.decay)
            .write_allpass(s.dap2a, 0, self.diffusion)
            .write(s.dap2b, 0, 1.0)
            .lp(&mut self.lp2, 1.0 - self.damping_coefficient)
            .soft_limit()
            .write(s.del2, 0, 1.0);
        let tank2_out = ctx.accumulator();

        // Taps at different points in each tank give decorrelated L/R outputs.
        let wet_left = tank1_out * 0.6 + ctx_read_tap(&mut ctx, s.dap2b, 200) * 0.4;
        let wet_right = tank2_out * 0.6 + ctx_read_tap(&mut ctx, s.dap1b, 200) * 0.4;

        let dry = input * (1.0 - self.amount);
        (dry + wet_left * self.amount, dry + wet_right * self.amount)
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

/// Small helper so the two decorrelation taps above can share the `read_tap` API
/// without fighting the borrow checker over `ctx`.
fn ctx_read_tap(
    ctx: &mut crate::dsp::fx::engine::FxContext<'_>,
    segment: Segment,
    offset: i64,
) -> f32 {
    ctx.load(0.0).read_tap(segment, offset, 1.0).accumulator()
}
