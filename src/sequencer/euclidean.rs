//! Euclidean rhythm generation `E(k, n)` with rotation, and the accent/slide/trill
//! decoration distribution that reapplies the same algorithm to the filled steps.

/// Distributes `pulses` onsets as evenly as possible across `steps` via the
/// running-bucket method (`floor(i*k/n)` changing marks an onset) — equivalent to
/// Bjorklund's algorithm's output for the patterns this engine uses.
pub fn euclidean(pulses: usize, steps: usize) -> Vec<bool> {
    if steps == 0 {
        return Vec::new();
    }
    let pulses = pulses.min(steps);
    if pulses == 0 {
        return vec![false; steps];
    }

    let mut pattern = Vec::with_capacity(steps);
    let mut previous_bucket = usize::MAX;
    for i in 0..steps {
        let bucket = (i * pulses) / steps;
        pattern.push(bucket != previous_bucket);
        previous_bucket = bucket;
    }
    pattern
}

/// Rotates a pattern left by `amount` steps, treated as a cyclic group action.
pub fn rotate(pattern: &[bool], amount: i32) -> Vec<bool> {
    let len = pattern.len();
    if len == 0 {
        return Vec::new();
    }
    let shift = amount.rem_euclid(len as i32) as usize;
    let mut rotated = Vec::with_capacity(len);
    rotated.extend_from_slice(&pattern[shift..]);
    rotated.extend_from_slice(&pattern[..shift]);
    rotated
}

/// Distributes a decoration (accent/slide/trill) across the steps a base pattern
/// has filled, by running the Euclidean algorithm again over just those filled
/// step positions.
pub fn decorate(base_pattern: &[bool], decoration_count: usize) -> Vec<bool> {
    let filled_indices: Vec<usize> = base_pattern
        .iter()
        .enumerate()
        .filter(|(_, &on)| on)
        .map(|(i, _)| i)
        .collect();

    let mut decoration_mask = vec![false; base_pattern.len()];
    if filled_indices.is_empty() {
        return decoration_mask;
    }

    let sub_pattern = euclidean(decoration_count, filled_indices.len());
    for (sub_index, &on) in sub_pattern.iter().enumerate() {
        if on {
            decoration_mask[filled_indices[sub_index]] = true;
        }
    }
    decoration_mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_tresillo_pattern() {
        // E(3,8) is the well-known tresillo: x..x..x.
        let pattern = euclidean(3, 8);
        assert_eq!(pattern, vec![true, false, false, true, false, false, true, false]);
    }

    #[test]
    fn pulse_count_is_preserved() {
        for pulses in 0..=16 {
            let pattern = euclidean(pulses, 16);
            assert_eq!(pattern.iter().filter(|&&b| b).count(), pulses.min(16));
        }
    }

    #[test]
    fn rotation_is_a_cyclic_group_action() {
        let pattern = euclidean(3, 8);
        let rotated_full_circle = rotate(&pattern, 8);
        assert_eq!(pattern, rotated_full_circle);

        let step1 = rotate(&pattern, 1);
        let step2 = rotate(&step1, 1);
        let combined = rotate(&pattern, 2);
        assert_eq!(step2, combined);
    }

    #[test]
    fn decoration_only_lands_on_filled_steps() {
        let base = euclidean(5, 16);
        let decoration = decorate(&base, 2);
        for (i, &on) in decoration.iter().enumerate() {
            if on {
                assert!(base[i], "decoration landed on an empty step at {i}");
            }
        }
    }
}
