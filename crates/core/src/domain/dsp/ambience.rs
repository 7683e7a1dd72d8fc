//! Time-based effects: damped feedback delay and a comb-bank reverb

use super::{ms_to_samples, DelayLine};
use crate::domain::effect::Effect;

/// Longest delay time accepted by [`Delay`], in milliseconds
const MAX_DELAY_MS: f32 = 2000.0;

/// Longest reverb predelay, in seconds
const MAX_PREDELAY_S: f32 = 0.5;

/// Longest room dimension, in meters
const MAX_ROOM_LENGTH: f32 = 100.0;

const SPEED_OF_SOUND: f32 = 343.0;

/// Comb lengths relative to the room's base reflection time
const COMB_SPREAD: [f32; 4] = [1.0, 1.13, 1.27, 1.41];

#[inline]
fn mix(dry: f32, wet: f32, blend: f32) -> f32 {
    dry * (1.0 - blend) + wet * blend
}

/// One-pole lowpass used to darken feedback paths
#[derive(Debug, Clone, Default)]
struct Damper {
    state: f32,
}

impl Damper {
    #[inline]
    fn process(&mut self, x: f32, damping: f32) -> f32 {
        self.state = x * (1.0 - damping) + self.state * damping;
        self.state
    }

    fn reset(&mut self) {
        self.state = 0.0;
    }
}

// ============================================================================
// DELAY
// ============================================================================

/// Feedback delay with a lowpass in the feedback loop
#[derive(Debug, Clone)]
pub struct Delay {
    line: DelayLine,
    damper: Damper,
    delay_samples: f32,
    feedback: f32,
    damping: f32,
    blend: f32,
    sample_rate: u32,
    enabled: bool,
}

impl Delay {
    pub const PARAMS: &'static [&'static str] = &["time", "feedback", "damping", "blend"];

    pub fn new(sample_rate: u32) -> Self {
        let max = ms_to_samples(MAX_DELAY_MS, sample_rate).ceil() as usize;
        let mut delay = Self {
            line: DelayLine::new(max),
            damper: Damper::default(),
            delay_samples: 1.0,
            feedback: 0.0,
            damping: 0.0,
            blend: 0.0,
            sample_rate,
            enabled: true,
        };
        delay.set_params(&[398.0, 0.3, 0.5, 0.5]);
        delay
    }

    pub fn delay_samples(&self) -> f32 {
        self.delay_samples
    }
}

impl Effect for Delay {
    fn name(&self) -> &str {
        "Delay"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [time, feedback, damping, blend] = *params {
            let samples = ms_to_samples(time.clamp(0.0, MAX_DELAY_MS), self.sample_rate);
            self.delay_samples = samples.clamp(1.0, self.line.max_delay());
            self.feedback = feedback.clamp(0.0, 0.99);
            self.damping = damping.clamp(0.0, 1.0);
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
        let delayed = self.line.read(self.delay_samples);
        let fed_back = self.damper.process(delayed, self.damping) * self.feedback;
        self.line.write(x + fed_back);
        mix(x, delayed, self.blend)
    }

    fn reset(&mut self) {
        self.line.reset();
        self.damper.reset();
    }
}

// ============================================================================
// REVERB
// ============================================================================

#[derive(Debug, Clone)]
struct Comb {
    line: DelayLine,
    damper: Damper,
    length: f32,
}

impl Comb {
    #[inline]
    fn process(&mut self, x: f32, feedback: f32, damping: f32) -> f32 {
        let out = self.line.read(self.length);
        let filtered = self.damper.process(out, damping);
        self.line.write(x + filtered * feedback);
        out
    }

    fn reset(&mut self) {
        self.line.reset();
        self.damper.reset();
    }
}

/// Predelay into a bank of parallel damped comb filters
///
/// Comb lengths derive from the room length and the speed of sound; the
/// absorption coefficient scales down the regeneration.
#[derive(Debug, Clone)]
pub struct Reverb {
    predelay: DelayLine,
    combs: [Comb; 4],
    predelay_samples: f32,
    feedback: f32,
    damping: f32,
    blend: f32,
    sample_rate: u32,
    enabled: bool,
}

impl Reverb {
    pub const PARAMS: &'static [&'static str] = &[
        "time",
        "regen",
        "damping",
        "blend",
        "roomLength",
        "absorptionCoefficient",
    ];

    const WET_SCALE: f32 = 0.25;

    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        let predelay_max = (MAX_PREDELAY_S * sr).ceil() as usize;
        let comb_max = (MAX_ROOM_LENGTH / SPEED_OF_SOUND * sr * COMB_SPREAD[3]).ceil() as usize;
        let comb = || Comb {
            line: DelayLine::new(comb_max),
            damper: Damper::default(),
            length: 1.0,
        };

        let mut reverb = Self {
            predelay: DelayLine::new(predelay_max),
            combs: [comb(), comb(), comb(), comb()],
            predelay_samples: 1.0,
            feedback: 0.0,
            damping: 0.0,
            blend: 0.0,
            sample_rate,
            enabled: true,
        };
        reverb.set_params(&[0.03, 0.3, 0.5, 0.5, 50.0, 0.9]);
        reverb
    }

    /// Current comb feedback after absorption
    pub fn feedback(&self) -> f32 {
        self.feedback
    }
}

impl Effect for Reverb {
    fn name(&self) -> &str {
        "Reverb"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [time, regen, damping, blend, room_length, absorption] = *params {
            let sr = self.sample_rate as f32;
            self.predelay_samples =
                (time.clamp(0.0, MAX_PREDELAY_S) * sr).clamp(1.0, self.predelay.max_delay());

            let absorption = absorption.clamp(0.0, 1.0);
            self.feedback = regen.clamp(0.0, 0.99) * (1.0 - 0.5 * absorption);
            self.damping = damping.clamp(0.0, 1.0);
            self.blend = blend.clamp(0.0, 1.0);

            let base = room_length.clamp(1.0, MAX_ROOM_LENGTH) / SPEED_OF_SOUND * sr;
            for (comb, spread) in self.combs.iter_mut().zip(COMB_SPREAD) {
                comb.length = (base * spread).clamp(1.0, comb.line.max_delay());
            }
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
        let pre = self.predelay.read(self.predelay_samples);
        self.predelay.write(x);

        let (feedback, damping) = (self.feedback, self.damping);
        let wet: f32 = self
            .combs
            .iter_mut()
            .map(|comb| comb.process(pre, feedback, damping))
            .sum();

        mix(x, wet * Self::WET_SCALE, self.blend)
    }

    fn reset(&mut self) {
        self.predelay.reset();
        for comb in &mut self.combs {
            comb.reset();
        }
    }
}
