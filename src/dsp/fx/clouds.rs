//! Granular/pitch-shifting capture buffer ("Clouds"), exposed only at the
//! interface level — no sample loading, no pitch-shift DSP kernel. This module
//! owns the circular capture buffer, frozen-mode toggle and the grain scheduling
//! parameters; the inner grain-synthesis loop is intentionally left as a stub
//! callers are expected not to rely on for audio output yet.

#[derive(Debug, Clone, Copy)]
pub struct GrainParams {
    /// Playback head position within the capture buffer, `0..1`.
    pub position: f32,
    /// Grain length, `0..1` mapped to a few ms .. full buffer.
    pub size: f32,
    /// Grains per second, `0..1` mapped to a sparse .. dense schedule.
    pub density: f32,
    /// Spectral/granular character blend, `0..1`.
    pub texture: f32,
}

impl Default for GrainParams {
    fn default() -> Self {
        Self {
            position: 0.0,
            size: 0.5,
            density: 0.5,
            texture: 0.5,
        }
    }
}

pub struct CloudsBuffer {
    buffer: Vec<f32>,
    write_pos: usize,
    frozen: bool,
    params: GrainParams,
}

impl CloudsBuffer {
    pub fn new(capacity_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity_samples.max(1)],
            write_pos: 0,
            frozen: false,
            params: GrainParams::default(),
        }
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_params(&mut self, params: GrainParams) {
        self.params = params;
    }

    pub fn params(&self) -> GrainParams {
        self.params
    }

    /// Capture one input sample, unless frozen (a frozen buffer keeps replaying its
    /// last captured contents).
    pub fn capture(&mut self, input: f32) {
        if self.frozen {
            return;
        }
        self.buffer[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Interface-level-only readout: a single nearest-sample tap at `position`,
    /// standing in for the grain scheduler's eventual overlap-add output.
    pub fn read_head(&self) -> f32 {
        let len = self.buffer.len();
        let index = ((self.params.position.clamp(0.0, 1.0) * len as f32) as usize).min(len - 1);
        self.buffer[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_buffer_stops_capturing() {
        let mut clouds = CloudsBuffer::new(8);
        clouds.capture(1.0);
        clouds.set_frozen(true);
        clouds.capture(2.0);
        clouds.capture(3.0);
        assert_eq!(clouds.buffer[1], 1.0);
        assert_eq!(clouds.buffer[2], 0.0);
    }

    #[test]
    fn position_param_is_clamped_when_reading() {
        let mut clouds = CloudsBuffer::new(4);
        clouds.set_params(GrainParams {
            position: 5.0,
            ..Default::default()
        });
        let _ = clouds.read_head();
    }
}
