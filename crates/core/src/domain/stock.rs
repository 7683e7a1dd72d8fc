//! Stock rack: eight effects and their flat parameter surface
//!
//! Processing order is chorus, compressor, delay, detune, flanger, phaser,
//! reverb, tremolo. Every effect starts bypassed. Tunables are declared in
//! the positional order each effect's `set_params` expects.

use crate::domain::dsp::{
    Chorus, Compressor, Delay, Detune, Flanger, LfoShape, Phaser, Reverb, Tremolo,
};
use crate::domain::effect::Effect;
use crate::domain::error::{RackError, Result};
use crate::domain::parameter::{Parameter, ParameterBundle, ParameterStack};
use crate::domain::rack::Rack;

/// Bundle names in processing order
pub const STOCK_EFFECTS: [&str; 8] = [
    "chorus",
    "compressor",
    "delay",
    "detune",
    "flanger",
    "phaser",
    "reverb",
    "tremolo",
];

pub static CHORUS: [Parameter; 4] = [
    Parameter::boolean("chorusToggle", false),
    Parameter::float("chorusRate", 0.01, 10.0, 0.2),
    Parameter::float("chorusDepth", 0.0, 30.0, 10.0),
    Parameter::float("chorusBlend", 0.0, 1.0, 0.5),
];

pub static COMPRESSOR: [Parameter; 7] = [
    Parameter::boolean("compressorToggle", false),
    Parameter::float("compressorThreshold", -60.0, 0.0, -20.0),
    Parameter::float("compressorRatio", 1.0, 20.0, 4.0),
    Parameter::float("compressorMakeup", 0.0, 24.0, 0.0),
    Parameter::float("compressorKnee", 0.0, 12.0, 2.0),
    Parameter::float("compressorAttack", 0.1, 100.0, 3.5),
    Parameter::float("compressorRelease", 1.0, 1000.0, 100.0),
];

pub static DELAY: [Parameter; 5] = [
    Parameter::boolean("delayToggle", false),
    Parameter::float("delayTime", 1.0, 2000.0, 398.0),
    Parameter::float("delayFeedback", 0.0, 0.99, 0.3),
    Parameter::float("delayDamping", 0.0, 1.0, 0.5),
    Parameter::float("delayBlend", 0.0, 1.0, 0.5),
];

pub static DETUNE: [Parameter; 4] = [
    Parameter::boolean("detuneToggle", false),
    Parameter::float("detunePitchRatio", 0.5, 2.0, 0.99),
    Parameter::float("detuneWindowSize", 5.0, 100.0, 22.0),
    Parameter::float("detuneBlend", 0.0, 1.0, 0.5),
];

pub static FLANGER: [Parameter; 4] = [
    Parameter::boolean("flangerToggle", false),
    Parameter::float("flangerRate", 0.01, 5.0, 0.2),
    Parameter::float("flangerDepth", 0.0, 10.0, 3.0),
    Parameter::float("flangerBlend", 0.0, 1.0, 0.5),
];

pub static PHASER: [Parameter; 3] = [
    Parameter::boolean("phaserToggle", false),
    Parameter::float("phaserRate", 0.01, 10.0, 0.2),
    Parameter::float("phaserFeedback", -1.0, 1.0, 0.7),
];

pub static REVERB: [Parameter; 7] = [
    Parameter::boolean("reverbToggle", false),
    Parameter::float("reverbTime", 0.001, 0.5, 0.03),
    Parameter::float("reverbRegen", 0.0, 0.99, 0.3),
    Parameter::float("reverbDamping", 0.0, 1.0, 0.5),
    Parameter::float("reverbBlend", 0.0, 1.0, 0.5),
    Parameter::float("reverbRoomLength", 1.0, 100.0, 50.0),
    Parameter::float("reverbAbsorptionCoefficient", 0.0, 1.0, 0.9),
];

pub static TREMOLO: [Parameter; 4] = [
    Parameter::boolean("tremoloToggle", false),
    Parameter::float("tremoloSpeed", 0.1, 20.0, 4.0),
    Parameter::float("tremoloDepth", 0.0, 1.0, 0.5),
    Parameter::choice("tremoloShape", &LfoShape::LABELS, 0),
];

/// One bundle per stock effect, in processing order
pub fn stock_bundles() -> Vec<ParameterBundle<'static>> {
    let declarations: [&'static [Parameter]; 8] = [
        &CHORUS,
        &COMPRESSOR,
        &DELAY,
        &DETUNE,
        &FLANGER,
        &PHASER,
        &REVERB,
        &TREMOLO,
    ];

    STOCK_EFFECTS
        .into_iter()
        .zip(declarations)
        .map(|(name, params)| ParameterBundle::new(name, params))
        .collect()
}

/// Build the stock effect configured by the bundle called `name`
pub fn stock_effect(name: &str, sample_rate: u32) -> Result<Box<dyn Effect>> {
    let effect: Box<dyn Effect> = match name {
        "chorus" => Box::new(Chorus::new(sample_rate)),
        "compressor" => Box::new(Compressor::new(sample_rate)),
        "delay" => Box::new(Delay::new(sample_rate)),
        "detune" => Box::new(Detune::new(sample_rate)),
        "flanger" => Box::new(Flanger::new(sample_rate)),
        "phaser" => Box::new(Phaser::new(sample_rate)),
        "reverb" => Box::new(Reverb::new(sample_rate)),
        "tremolo" => Box::new(Tremolo::new(sample_rate)),
        other => {
            return Err(RackError::InvalidConfiguration(format!(
                "no stock effect for bundle {}",
                other
            )))
        }
    };
    Ok(effect)
}

/// Assemble the full stock rack at `sample_rate`
pub fn stock_rack(sample_rate: u32) -> Result<Rack> {
    if sample_rate == 0 {
        return Err(RackError::InvalidConfiguration(
            "sample rate must be positive".to_string(),
        ));
    }

    let bundles = stock_bundles();
    let stack = ParameterStack::new(&bundles);
    Rack::build(&stack, |bundle| stock_effect(bundle.name(), sample_rate))
}
