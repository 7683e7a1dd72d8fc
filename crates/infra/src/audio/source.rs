//! Looping test-signal source
//!
//! Replays a fixed sample table with a wrapping playhead, standing in for a
//! live input when no capture device is attached.

use std::f32::consts::PI;

use fxrack_core::domain::error::{RackError, Result};

/// Fixed sample table played back in a loop
#[derive(Debug, Clone)]
pub struct LoopPlayer {
    samples: Vec<f32>,
    playhead: usize,
}

impl LoopPlayer {
    /// Wrap a sample table; the table must not be empty
    pub fn new(samples: Vec<f32>) -> Result<Self> {
        if samples.is_empty() {
            return Err(RackError::InvalidConfiguration(
                "loop source needs at least one sample".to_string(),
            ));
        }

        Ok(Self {
            samples,
            playhead: 0,
        })
    }

    /// `len` samples of a unit-amplitude sine at `frequency` Hz
    pub fn sine(frequency: f32, sample_rate: u32, len: usize) -> Result<Self> {
        if sample_rate == 0 || !frequency.is_finite() || frequency < 0.0 {
            return Err(RackError::InvalidConfiguration(format!(
                "invalid sine source: {} Hz at {} Hz",
                frequency, sample_rate
            )));
        }

        let step = 2.0 * PI * frequency / sample_rate as f32;
        Self::new((0..len).map(|i| (step * i as f32).sin()).collect())
    }

    /// Next sample, wrapping to the start at the end of the table
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let x = self.samples[self.playhead];
        self.playhead += 1;
        if self.playhead == self.samples.len() {
            self.playhead = 0;
        }
        x
    }

    pub fn playhead(&self) -> usize {
        self.playhead
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn rewind(&mut self) {
        self.playhead = 0;
    }
}
