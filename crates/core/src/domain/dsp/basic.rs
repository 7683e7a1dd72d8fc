//! Utility stages: linear gain and symmetric hard clamp

use crate::domain::effect::Effect;

/// Linear gain stage
#[derive(Debug, Clone)]
pub struct GainEffect {
    gain: f32,
    enabled: bool,
}

impl GainEffect {
    pub const PARAMS: &'static [&'static str] = &["gain"];

    pub fn new() -> Self {
        Self {
            gain: 1.0,
            enabled: true,
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Default for GainEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for GainEffect {
    fn name(&self) -> &str {
        "Gain"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [gain] = *params {
            self.gain = gain;
        }
    }

    fn toggle(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        x * self.gain
    }

    fn reset(&mut self) {}
}

/// Hard clamp to `[-ceiling, ceiling]`
#[derive(Debug, Clone)]
pub struct ClampEffect {
    ceiling: f32,
    enabled: bool,
}

impl ClampEffect {
    pub const PARAMS: &'static [&'static str] = &["ceiling"];

    pub fn new() -> Self {
        Self {
            ceiling: 1.0,
            enabled: true,
        }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }
}

impl Default for ClampEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for ClampEffect {
    fn name(&self) -> &str {
        "Clamp"
    }

    fn param_names(&self) -> &'static [&'static str] {
        Self::PARAMS
    }

    fn set_params(&mut self, params: &[f32]) {
        if let [ceiling] = *params {
            self.ceiling = ceiling.abs();
        }
    }

    fn toggle(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        x.clamp(-self.ceiling, self.ceiling)
    }

    fn reset(&mut self) {}
}
