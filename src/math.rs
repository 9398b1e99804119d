//! Fixed-point & math tables: LUTs, interpolation, soft-limit, tan approximations.
//!
//! Tables are generated once at first use via `lazy_static` rather than baked in as
//! literals, matching the rest of this crate's preference for computed constants
//! (see the regex statics in earlier revisions of this module).

use std::f32::consts::PI;

pub const SINE_TABLE_SIZE: usize = 1024;
pub const STIFFNESS_LUT_SIZE: usize = 257;
pub const DECADES_LUT_SIZE: usize = 257;
pub const PITCH_RATIO_SIZE: usize = 257;

lazy_static::lazy_static! {
    /// One period of a sine wave, oversampled for linear-interpolated lookup.
    pub static ref LUT_SINE: Vec<f32> = (0..=SINE_TABLE_SIZE)
        .map(|i| (2.0 * PI * i as f32 / SINE_TABLE_SIZE as f32).sin())
        .collect();

    /// Maps the `structure` knob (0..1) to a per-mode frequency stretch/compression
    /// factor. Monotonically increasing, mildly convex, matching the inharmonicity
    /// curve used throughout the corpus's modal-synthesis code.
    pub static ref LUT_STIFFNESS: Vec<f32> = (0..STIFFNESS_LUT_SIZE)
        .map(|i| {
            let x = i as f32 / (STIFFNESS_LUT_SIZE - 1) as f32;
            // Signed stiffness: negative below the midpoint (compressive), positive
            // above (stretching), zero at dead center (perfectly harmonic).
            let centered = x * 2.0 - 1.0;
            centered.signum() * centered.abs().powf(1.8) * 0.05
        })
        .collect();

    /// 4-decades damping LUT: maps `damping` (0..1) to a Q-ish multiplier spanning
    /// roughly four orders of magnitude.
    pub static ref LUT_FOUR_DECADES: Vec<f32> = (0..DECADES_LUT_SIZE)
        .map(|i| {
            let x = i as f32 / (DECADES_LUT_SIZE - 1) as f32;
            10f32.powf(x * 4.0 - 2.0)
        })
        .collect();

    /// `pitchRatioHigh[i]` holds `2^((i-128)/12)` for semitone offsets; paired with
    /// `pitchRatioLow` for sub-semitone (cents) interpolation so that
    /// `pitchRatioHigh[i+128] * pitchRatioLow[0] == 2^(i/12)`.
    pub static ref LUT_PITCH_RATIO_HIGH: Vec<f32> = (0..PITCH_RATIO_SIZE)
        .map(|i| 2f32.powf((i as f32 - 128.0) / 12.0))
        .collect();

    /// Sub-semitone correction table indexed by fractional semitone * 256.
    pub static ref LUT_PITCH_RATIO_LOW: Vec<f32> = (0..=256)
        .map(|i| 2f32.powf((i as f32 / 256.0) / 12.0))
        .collect();
}

/// Clamp a value into `[min, max]`.
#[inline]
pub fn clamp(val: f32, min: f32, max: f32) -> f32 {
    if val < min {
        min
    } else if val > max {
        max
    } else {
        val
    }
}

/// Wrap a value into `[0, 1)`.
#[inline]
pub fn wrap_unit(mut val: f32) -> f32 {
    while val >= 1.0 {
        val -= 1.0;
    }
    while val < 0.0 {
        val += 1.0;
    }
    val
}

/// Linear-interpolated lookup into a unit-period table of `size` + 1 entries
/// (the last entry duplicates the first so that `index` near 1.0 never reads past
/// the end).
pub fn interpolate(table: &[f32], index: f32, size: usize) -> f32 {
    let scaled = wrap_unit(index) * size as f32;
    let i0 = scaled as usize;
    let frac = scaled - i0 as f32;
    let a = table[i0];
    let b = table[(i0 + 1).min(table.len() - 1)];
    a + (b - a) * frac
}

/// `semitones_to_ratio`: maps a semitone offset to a frequency ratio using the
/// paired high/low pitch-ratio LUTs.
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    let pitch = (semitones + 128.0).clamp(0.0, (PITCH_RATIO_SIZE - 2) as f32);
    let integral = pitch as usize;
    let fractional = pitch - integral as f32;
    LUT_PITCH_RATIO_HIGH[integral] * LUT_PITCH_RATIO_LOW[(fractional * 256.0) as usize]
}

/// `voct_to_hz`: 1 volt/octave signal to frequency, 0V = A0 (27.5 Hz), matching the
/// convention used across this crate's oscillators.
pub fn voct_to_hz(volts: f32) -> f32 {
    27.5 * 2f32.powf(volts)
}

/// The soft-limit nonlinearity used in every feedback path:
/// `x * (27 + x^2) / (27 + 9x^2)`. Monotone, odd, bounded in `(-1.5, 1.5)`.
#[inline]
pub fn soft_limit(x: f32) -> f32 {
    x * (27.0 + x * x) / (27.0 + 9.0 * x * x)
}

/// Tan(pi*f) approximation quality used by the state-variable filter's `g` coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TanApprox {
    Exact,
    Accurate,
    Fast,
    #[default]
    Dirty,
}

/// Approximate `tan(pi * f)` for `f` in `[0, 0.5)`. `Dirty` is the default and
/// cheapest: `f * (pi + 0.3736 * pi^3 * f^2)`.
pub fn fast_tan(f: f32, approx: TanApprox) -> f32 {
    let f = clamp(f, 0.0, 0.497);
    match approx {
        TanApprox::Exact => (PI * f).tan(),
        TanApprox::Accurate => {
            let f2 = f * f;
            f * PI * (1.0 + f2 * (0.32 + f2 * 0.18))
        }
        TanApprox::Fast => {
            let f2 = f * f;
            f * (PI + f2 * PI * PI * PI * 0.33333)
        }
        TanApprox::Dirty => {
            let f2 = f * f;
            f * (PI + 0.3736 * PI * PI * PI * f2)
        }
    }
}

/// A minimal xorshift32 PRNG, the crate's single shared noise source (grounded on
/// `PlaitsModal::random`; reused here for dust excitation, dispersion string noise
/// and grain scheduling jitter rather than depending on `rand`).
#[derive(Debug, Clone, Copy)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9e3779b9 } else { seed },
        }
    }

    /// Next raw `u32`.
    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    /// Next sample uniform in `[-1, 1]`.
    pub fn next_bipolar(&mut self) -> f32 {
        (self.next_u32() as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    /// Next sample uniform in `[0, 1]`.
    pub fn next_unit(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }
}
