//! Doppler pitch shifter

use std::f32::consts::PI;

use super::{ms_to_samples, DelayLine};
use crate::domain::effect::Effect;

const MAX_WINDOW_MS: f32 = 100.0;

/// Pitch shifter built from two crossfaded, sweeping delay taps
///
/// A phasor sweeps each tap's delay across the window; the sweep rate sets
/// the pitch ratio. The taps are half a window apart and weighted with
/// complementary `sin²` windows so the reset of one tap is hidden by the
/// other.
#[derive(Debug, Clone)]
pub struct Detune {
    line: DelayLine,
    phase: f32,
    increment: f32,
    window_samples: f32,
    pitch_ratio: f32,
    blend: f32,
    sample_rate: u32,
    enabled: bool,
}

impl Detune {
    pub const PARAMS: &'static [&'static str] = &["pitchRatio", "windowSize", "blend"];

    pub fn new(sample_rate: u32) -> Self {
        let max = ms_to_samples(MAX_WINDOW_MS, sample_rate).ceil() as usize + 1;
        let mut detune = Self {
            line: DelayLine::new(max),
            phase: 0.0,
            increment: 0.0,
            window_samples: 1.0,
            pitch_ratio: 1.0,
            blend: 0.0,
            sample_rate,
            enabled: true,
        };
        detune.set_params(&[0.99, 22.0, 0.5]);
        detune
    }

    pub fn pitch_ratio(&self) -> f32 {
        self.pitch_ratio
    }

    #[inline]
    fn tap(&self, phase: f32) -> f32 {
        let weight = (PI * phase).sin();
        self.line.read(1.0 + phase * self.window_samples) * weight * weight
    }
}

impl Effect for Detune {
    fn name(&self) -> &str {
        "Detune"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [pitch_ratio, window_ms, blend] = *params {
            self.pitch_ratio = pitch_ratio.clamp(0.5, 2.0);
            self.window_samples =
                ms_to_samples(window_ms.clamp(1.0, MAX_WINDOW_MS), self.sample_rate).max(1.0);
            // Delay shrinks when shifting up, grows when shifting down
            self.increment = (1.0 - self.pitch_ratio) / self.window_samples;
            self.blend = blend.clamp(0.0, 1.0);
        }
    }

    fn toggle(&mut self, enabled: bool) {
        if self.enabled && !enabled {
            self.reset();
        }
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        self.line.write(x);

        let second = (self.phase + 0.5).fract();
        let wet = self.tap(self.phase) + self.tap(second);

        self.phase = (self.phase + self.increment).rem_euclid(1.0);

        x * (1.0 - self.blend) + wet * self.blend
    }

    fn reset(&mut self) {
        self.line.reset();
        self.phase = 0.0;
    }
}
