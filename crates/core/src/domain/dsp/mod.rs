//! Digital Signal Processing effects for audio processing
//!
//! This module provides the mono, sample-at-a-time effects hosted by the rack:
//! - Gain and clamp (utility stages)
//! - Chorus, flanger, phaser and tremolo (LFO modulation)
//! - Compressor with soft knee
//! - Damped feedback delay and comb-bank reverb
//! - Doppler pitch shifter (detune)
//!
//! All effects are designed for:
//! - Zero allocations after construction (delay lines are sized up front)
//! - Deterministic output: state depends only on the samples fed in
//! - Finite output for finite input

mod ambience;
mod basic;
mod dynamics;
mod modulation;
mod pitch;

pub use ambience::{Delay, Reverb};
pub use basic::{ClampEffect, GainEffect};
pub use dynamics::Compressor;
pub use modulation::{Chorus, Flanger, Phaser, Tremolo};
pub use pitch::Detune;

use std::f32::consts::PI;

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels, floored at -120 dB
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-6).log10()
}

#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: u32) -> f32 {
    ms * sample_rate as f32 / 1000.0
}

/// One-pole smoothing coefficient for a time constant in milliseconds
#[inline]
pub(crate) fn time_coeff(ms: f32, sample_rate: u32) -> f32 {
    let samples = ms_to_samples(ms, sample_rate);
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}

// ============================================================================
// DELAY LINE
// ============================================================================

/// Circular delay line with linear-interpolated fractional reads
///
/// Storage is allocated once in [`DelayLine::new`].
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_samples.max(1) + 2],
            write_pos: 0,
        }
    }

    /// Longest readable delay in samples
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - 2) as f32
    }

    /// Read `delay` samples behind the next write; 1.0 is the latest sample
    #[inline]
    pub fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(1.0, self.max_delay());
        let whole = delay.floor();
        let frac = delay - whole;
        let i = whole as usize;

        let a = self.buffer[(self.write_pos + len - i) % len];
        let b = self.buffer[(self.write_pos + len - i - 1) % len];
        a + (b - a) * frac
    }

    #[inline]
    pub fn write(&mut self, x: f32) {
        self.buffer[self.write_pos] = x;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

// ============================================================================
// LFO
// ============================================================================

/// Low-frequency oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoShape {
    Sine,
    Triangle,
    Square,
}

impl LfoShape {
    pub const LABELS: [&'static str; 3] = ["sine", "triangle", "square"];

    /// Map a choice index (as carried by `set_params`) to a shape
    pub fn from_index(index: f32) -> Self {
        match index.round() as i32 {
            1 => LfoShape::Triangle,
            2 => LfoShape::Square,
            _ => LfoShape::Sine,
        }
    }
}

/// Phase-accumulating LFO, output in [-1, 1]
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f32,
    increment: f32,
    sample_rate: f32,
}

impl Lfo {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            increment: 0.0,
            sample_rate: sample_rate.max(1) as f32,
        }
    }

    pub fn set_rate(&mut self, hz: f32) {
        self.increment = (hz / self.sample_rate).clamp(0.0, 0.5);
    }

    #[inline]
    pub fn next(&mut self, shape: LfoShape) -> f32 {
        let value = match shape {
            LfoShape::Sine => (2.0 * PI * self.phase).sin(),
            LfoShape::Triangle => 4.0 * (self.phase - 0.5).abs() - 1.0,
            LfoShape::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };

        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        value
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}
