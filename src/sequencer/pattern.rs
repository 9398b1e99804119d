//! Step pattern: a Euclidean rhythm plus accent/slide/trill decoration layers
//! distributed over the filled steps with the same algorithm.
//!
//! The TB-303-convention slide lookup resolves a wrap-boundary ambiguity: when
//! `slide` is set on the pattern's last step, `next_step_for` below wraps to the
//! first gated step rather than treating the last step as un-slideable — decided
//! and recorded in DESIGN.md, since this pattern loops continuously and a step at
//! the end of one lap is musically no different from one in the middle.

use super::euclidean::{decorate, euclidean, rotate};

#[derive(Debug, Clone)]
pub struct StepPattern {
    pub gate: Vec<bool>,
    pub accent: Vec<bool>,
    pub slide: Vec<bool>,
    pub trill: Vec<bool>,
}

impl StepPattern {
    /// `rotation` is 1-indexed: rotation `1` leaves the raw Euclidean pattern
    /// untouched, rotation `2` is the first left-rotation, and so on — matching the
    /// worked example this crate's rotation convention is checked against (`E(3,8)`
    /// rotated by `2` reads `[F,F,T,F,F,T,F,T]`). The `- 1` below belongs here, at
    /// the call site, rather than inside [`rotate`] itself: `rotate` is a pure
    /// cyclic group action (`rotate(a) then rotate(b) == rotate(a+b)`), and folding
    /// a constant offset into it would break that composability law for every other
    /// caller.
    pub fn new(pulses: usize, steps: usize, rotation: i32) -> Self {
        let gate = rotate(&euclidean(pulses, steps), rotation - 1);
        Self {
            accent: vec![false; gate.len()],
            slide: vec![false; gate.len()],
            trill: vec![false; gate.len()],
            gate,
        }
    }

    pub fn len(&self) -> usize {
        self.gate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gate.is_empty()
    }

    /// Distributes `count` accents across the gated steps.
    pub fn set_accents(&mut self, count: usize) {
        self.accent = decorate(&self.gate, count);
    }

    pub fn set_slides(&mut self, count: usize) {
        self.slide = decorate(&self.gate, count);
    }

    pub fn set_trills(&mut self, count: usize) {
        self.trill = decorate(&self.gate, count);
    }

    /// Following the TB-303 convention: a slide on step `index` means the note at
    /// `index` glides into whatever the *next gated* step plays, wrapping past the
    /// end of the pattern back to its first gated step.
    pub fn next_step_for(&self, index: usize) -> Option<usize> {
        if self.gate.is_empty() {
            return None;
        }
        let len = self.gate.len();
        for offset in 1..=len {
            let candidate = (index + offset) % len;
            if self.gate[candidate] {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slide_wraps_past_the_last_step() {
        let mut pattern = StepPattern::new(3, 8, 0);
        pattern.set_slides(1);
        let last_gated = pattern
            .gate
            .iter()
            .enumerate()
            .filter(|(_, &on)| on)
            .last()
            .unwrap()
            .0;
        let first_gated = pattern.gate.iter().position(|&on| on).unwrap();
        assert_eq!(pattern.next_step_for(last_gated), Some(first_gated));
    }

    #[test]
    fn decorations_never_exceed_gated_step_count() {
        let mut pattern = StepPattern::new(5, 16, 2);
        pattern.set_accents(10);
        let gated = pattern.gate.iter().filter(|&&b| b).count();
        let accented = pattern.accent.iter().filter(|&&b| b).count();
        assert!(accented <= gated);
    }

    #[test]
    fn rotation_two_matches_the_worked_example() {
        let pattern = StepPattern::new(3, 8, 2);
        assert_eq!(
            pattern.gate,
            vec![false, false, true, false, false, true, false, true]
        );
    }
}
