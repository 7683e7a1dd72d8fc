//! LFO-driven effects: chorus, flanger, phaser, tremolo

use super::{ms_to_samples, DelayLine, Lfo, LfoShape};
use crate::domain::effect::Effect;
use std::f32::consts::PI;

// ============================================================================
// MODULATED DELAY (shared by chorus and flanger)
// ============================================================================

/// Delay line whose read tap is swept by a sine LFO around a base delay
#[derive(Debug, Clone)]
struct ModulatedDelay {
    line: DelayLine,
    lfo: Lfo,
    base_samples: f32,
    depth_samples: f32,
    sample_rate: u32,
}

impl ModulatedDelay {
    fn new(sample_rate: u32, base_ms: f32, max_depth_ms: f32) -> Self {
        let max = ms_to_samples(base_ms + max_depth_ms, sample_rate).ceil() as usize + 2;
        Self {
            line: DelayLine::new(max),
            lfo: Lfo::new(sample_rate),
            base_samples: ms_to_samples(base_ms, sample_rate),
            depth_samples: 0.0,
            sample_rate,
        }
    }

    fn set(&mut self, rate_hz: f32, depth_ms: f32) {
        self.lfo.set_rate(rate_hz);
        self.depth_samples = ms_to_samples(depth_ms.max(0.0), self.sample_rate);
    }

    /// Tap the swept delay, then write `input` into the line
    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let sweep = 0.5 * (1.0 + self.lfo.next(LfoShape::Sine));
        let wet = self
            .line
            .read(self.base_samples + self.depth_samples * sweep);
        self.line.write(input);
        wet
    }

    /// Read the tap without writing, for feedback topologies
    #[inline]
    fn tap(&mut self) -> f32 {
        let sweep = 0.5 * (1.0 + self.lfo.next(LfoShape::Sine));
        self.line
            .read(self.base_samples + self.depth_samples * sweep)
    }

    fn reset(&mut self) {
        self.line.reset();
        self.lfo.reset();
    }
}

#[inline]
fn blend(dry: f32, wet: f32, amount: f32) -> f32 {
    dry * (1.0 - amount) + wet * amount
}

// ============================================================================
// CHORUS
// ============================================================================

/// Chorus: a slowly swept ~20 ms delay mixed with the dry signal
#[derive(Debug, Clone)]
pub struct Chorus {
    delay: ModulatedDelay,
    blend: f32,
    enabled: bool,
}

impl Chorus {
    pub const PARAMS: &'static [&'static str] = &["rate", "depth", "blend"];
    const BASE_MS: f32 = 20.0;
    const MAX_DEPTH_MS: f32 = 30.0;

    pub fn new(sample_rate: u32) -> Self {
        let mut chorus = Self {
            delay: ModulatedDelay::new(sample_rate, Self::BASE_MS, Self::MAX_DEPTH_MS),
            blend: 0.5,
            enabled: true,
        };
        chorus.set_params(&[0.2, 10.0, 0.5]);
        chorus
    }
}

impl Effect for Chorus {
    fn name(&self) -> &str {
        "Chorus"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [rate, depth, blend] = *params {
            self.delay.set(rate, depth.min(Self::MAX_DEPTH_MS));
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
        let wet = self.delay.tick(x);
        blend(x, wet, self.blend)
    }

    fn reset(&mut self) {
        self.delay.reset();
    }
}

// ============================================================================
// FLANGER
// ============================================================================

/// Flanger: a short swept delay with internal feedback
#[derive(Debug, Clone)]
pub struct Flanger {
    delay: ModulatedDelay,
    blend: f32,
    enabled: bool,
}

impl Flanger {
    pub const PARAMS: &'static [&'static str] = &["rate", "depth", "blend"];
    const BASE_MS: f32 = 1.0;
    const MAX_DEPTH_MS: f32 = 10.0;
    const FEEDBACK: f32 = 0.5;

    pub fn new(sample_rate: u32) -> Self {
        let mut flanger = Self {
            delay: ModulatedDelay::new(sample_rate, Self::BASE_MS, Self::MAX_DEPTH_MS),
            blend: 0.5,
            enabled: true,
        };
        flanger.set_params(&[0.2, 3.0, 0.5]);
        flanger
    }
}

impl Effect for Flanger {
    fn name(&self) -> &str {
        "Flanger"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [rate, depth, blend] = *params {
            self.delay.set(rate, depth.min(Self::MAX_DEPTH_MS));
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
        let wet = self.delay.tap();
        self.delay.line.write(x + wet * Self::FEEDBACK);
        blend(x, wet, self.blend)
    }

    fn reset(&mut self) {
        self.delay.reset();
    }
}

// ============================================================================
// PHASER
// ============================================================================

const PHASER_STAGES: usize = 4;

/// Four first-order allpass stages swept between 200 Hz and 1.6 kHz
#[derive(Debug, Clone)]
pub struct Phaser {
    lfo: Lfo,
    states: [f32; PHASER_STAGES],
    last: f32,
    feedback: f32,
    sample_rate: f32,
    enabled: bool,
}

impl Phaser {
    pub const PARAMS: &'static [&'static str] = &["rate", "feedback"];
    const MIN_HZ: f32 = 200.0;
    const MAX_HZ: f32 = 1600.0;
    // Unity loop gain would ring forever
    const MAX_FEEDBACK: f32 = 0.95;

    pub fn new(sample_rate: u32) -> Self {
        let mut phaser = Self {
            lfo: Lfo::new(sample_rate),
            states: [0.0; PHASER_STAGES],
            last: 0.0,
            feedback: 0.0,
            sample_rate: sample_rate.max(1) as f32,
            enabled: true,
        };
        phaser.set_params(&[0.2, 0.7]);
        phaser
    }
}

impl Effect for Phaser {
    fn name(&self) -> &str {
        "Phaser"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [rate, feedback] = *params {
            self.lfo.set_rate(rate);
            self.feedback = feedback.clamp(-Self::MAX_FEEDBACK, Self::MAX_FEEDBACK);
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
        let sweep = 0.5 * (1.0 + self.lfo.next(LfoShape::Sine));
        let freq = Self::MIN_HZ * (Self::MAX_HZ / Self::MIN_HZ).powf(sweep);
        let t = (PI * freq / self.sample_rate).tan();
        let a = (t - 1.0) / (t + 1.0);

        let mut y = x + self.last * self.feedback;
        for z in self.states.iter_mut() {
            let out = a * y + *z;
            *z = y - a * out;
            y = out;
        }
        self.last = y;

        0.5 * (x + y)
    }

    fn reset(&mut self) {
        self.states = [0.0; PHASER_STAGES];
        self.last = 0.0;
        self.lfo.reset();
    }
}

// ============================================================================
// TREMOLO
// ============================================================================

/// Amplitude modulation with a selectable LFO shape
#[derive(Debug, Clone)]
pub struct Tremolo {
    lfo: Lfo,
    depth: f32,
    shape: LfoShape,
    enabled: bool,
}

impl Tremolo {
    pub const PARAMS: &'static [&'static str] = &["speed", "depth", "shape"];

    pub fn new(sample_rate: u32) -> Self {
        let mut tremolo = Self {
            lfo: Lfo::new(sample_rate),
            depth: 0.5,
            shape: LfoShape::Sine,
            enabled: true,
        };
        tremolo.set_params(&[4.0, 0.5, 0.0]);
        tremolo
    }

    pub fn shape(&self) -> LfoShape {
        self.shape
    }
}

impl Effect for Tremolo {
    fn name(&self) -> &str {
        "Tremolo"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [speed, depth, shape] = *params {
            self.lfo.set_rate(speed);
            self.depth = depth.clamp(0.0, 1.0);
            self.shape = LfoShape::from_index(shape);
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
        let lfo = 0.5 * (1.0 + self.lfo.next(self.shape));
        x * (1.0 - self.depth * lfo)
    }

    fn reset(&mut self) {
        self.lfo.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48000;

    fn sine(samples: usize, frequency: f32) -> Vec<f32> {
        (0..samples)
            .map(|i| (2.0 * PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    fn run(effect: &mut dyn Effect, input: &[f32]) -> Vec<f32> {
        input.iter().map(|&x| effect.process_sample(x)).collect()
    }

    #[test]
    fn test_chorus_dry_blend_is_identity() {
        let mut chorus = Chorus::new(SAMPLE_RATE);
        chorus.set_params(&[1.0, 10.0, 0.0]);

        let input = sine(512, 440.0);
        assert_eq!(run(&mut chorus, &input), input);
    }

    #[test]
    fn test_chorus_wet_is_delayed() {
        let mut chorus = Chorus::new(SAMPLE_RATE);
        chorus.set_params(&[0.5, 0.0, 1.0]);

        let mut input = vec![0.0; 2048];
        input[0] = 1.0;
        let output = run(&mut chorus, &input);

        // Impulse comes back after the ~20 ms base delay
        let peak = output
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert!((955..=965).contains(&peak), "peak at {}", peak);
    }

    #[test]
    fn test_flanger_output_finite() {
        let mut flanger = Flanger::new(SAMPLE_RATE);
        flanger.set_params(&[5.0, 10.0, 1.0]);

        let output = run(&mut flanger, &sine(48000, 220.0));
        assert!(output.iter().all(|s| s.is_finite() && s.abs() < 4.0));
    }

    #[test]
    fn test_phaser_stable_at_extreme_feedback() {
        let mut phaser = Phaser::new(SAMPLE_RATE);
        phaser.set_params(&[10.0, -1.0]);

        let output = run(&mut phaser, &sine(48000, 1000.0));
        assert!(output.iter().all(|s| s.is_finite() && s.abs() < 50.0));
    }

    #[test]
    fn test_tremolo_depth_zero_is_identity() {
        let mut tremolo = Tremolo::new(SAMPLE_RATE);
        tremolo.set_params(&[5.0, 0.0, 2.0]);

        let input = sine(256, 440.0);
        assert_eq!(run(&mut tremolo, &input), input);
        assert_eq!(tremolo.shape(), LfoShape::Square);
    }

    #[test]
    fn test_tremolo_square_gates() {
        let mut tremolo = Tremolo::new(SAMPLE_RATE);
        tremolo.set_params(&[10.0, 1.0, 2.0]);

        let output = run(&mut tremolo, &vec![1.0; 4800]);
        // First half-cycle of the square LFO is fully attenuated
        assert_eq!(output[0], 0.0);
        assert_eq!(output[3000], 1.0);
    }

    #[test]
    fn test_toggle_off_resets_state() {
        let mut chorus = Chorus::new(SAMPLE_RATE);
        chorus.set_params(&[0.5, 0.0, 1.0]);
        run(&mut chorus, &vec![1.0; 2048]);

        chorus.toggle(false);
        chorus.toggle(true);

        // Delay line was cleared: wet output of silence is silence
        assert!(run(&mut chorus, &vec![0.0; 2048]).iter().all(|&s| s == 0.0));
    }
}
