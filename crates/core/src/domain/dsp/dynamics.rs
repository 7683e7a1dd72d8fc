//! Dynamic range compressor

use super::{db_to_gain, gain_to_db, time_coeff};
use crate::domain::effect::Effect;

/// Parameter constraints for the compressor
///
/// Values outside these ranges are clamped in `set_params` to keep the
/// envelope follower and gain computer numerically stable.
pub mod limits {
    pub const THRESHOLD_MIN: f32 = -60.0;
    pub const THRESHOLD_MAX: f32 = 0.0;
    pub const RATIO_MIN: f32 = 1.0;
    pub const RATIO_MAX: f32 = 20.0;
    pub const MAKEUP_MAX: f32 = 24.0;
    pub const KNEE_MAX: f32 = 12.0;
    pub const ATTACK_MIN_MS: f32 = 0.1;
    pub const RELEASE_MIN_MS: f32 = 1.0;
}

/// Feed-forward peak compressor with a soft knee
///
/// Reduces the level of signals above the threshold. The envelope follower
/// uses separate attack/release time constants to avoid pumping artifacts.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    makeup_db: f32,
    knee_db: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    sample_rate: u32,
    enabled: bool,
}

impl Compressor {
    pub const PARAMS: &'static [&'static str] =
        &["threshold", "ratio", "makeup", "knee", "attack", "release"];

    pub fn new(sample_rate: u32) -> Self {
        let mut comp = Self {
            threshold_db: -20.0,
            ratio: 4.0,
            makeup_db: 0.0,
            knee_db: 2.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            sample_rate,
            enabled: true,
        };
        comp.set_params(&[-20.0, 4.0, 0.0, 2.0, 3.5, 100.0]);
        comp
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Gain change in dB for an input level in dB (zero or negative)
    #[inline]
    pub fn gain_reduction_db(&self, level_db: f32) -> f32 {
        let slope = 1.0 / self.ratio - 1.0;
        let over = level_db - self.threshold_db;
        let half_knee = self.knee_db * 0.5;

        if self.knee_db > 0.0 && over.abs() <= half_knee {
            let x = over + half_knee;
            slope * x * x / (2.0 * self.knee_db)
        } else if over > 0.0 {
            slope * over
        } else {
            0.0
        }
    }

    #[inline]
    fn update_envelope(&mut self, x: f32) {
        let level = x.abs();
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;
    }
}

impl Effect for Compressor {
    fn name(&self) -> &str {
        "Compressor"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [threshold, ratio, makeup, knee, attack, release] = *params {
            self.threshold_db = threshold.clamp(limits::THRESHOLD_MIN, limits::THRESHOLD_MAX);
            self.ratio = ratio.clamp(limits::RATIO_MIN, limits::RATIO_MAX);
            self.makeup_db = makeup.clamp(0.0, limits::MAKEUP_MAX);
            self.knee_db = knee.clamp(0.0, limits::KNEE_MAX);
            self.attack_coeff = time_coeff(attack.max(limits::ATTACK_MIN_MS), self.sample_rate);
            self.release_coeff =
                time_coeff(release.max(limits::RELEASE_MIN_MS), self.sample_rate);
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
        self.update_envelope(x);
        let reduction = self.gain_reduction_db(gain_to_db(self.envelope));
        x * db_to_gain(reduction + self.makeup_db)
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }
}
