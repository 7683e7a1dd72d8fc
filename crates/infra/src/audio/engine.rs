//! Real-time rack engine driving interleaved audio buffers
//!
//! This module provides the RackEngine which sits inside an audio callback:
//! one parameter sync per callback, then per frame a mono sample runs through
//! the rack, is fanned out to every channel, and is mirrored into the input
//! and output scopes.

use std::sync::Arc;
use tracing::{debug, info};

use fxrack_core::domain::config::AppConfig;
use fxrack_core::domain::error::Result;
use fxrack_core::domain::rack::Rack;
use fxrack_core::domain::store::ParameterStore;

use super::{LoopPlayer, ScopeBuffer};

/// Audio engine wrapping a bound rack
pub struct RackEngine {
    rack: Rack,
    channels: usize,
    block_size: usize,
    source: Option<LoopPlayer>,
    input_scope: Arc<ScopeBuffer>,
    output_scope: Arc<ScopeBuffer>,
    frames_processed: u64,
}

impl RackEngine {
    /// Create a new engine for `rack` with the given settings
    ///
    /// Fails with a configuration error when the settings cannot drive an
    /// audio callback (zero channels, zero scope capacity, ...).
    pub fn new(rack: Rack, config: &AppConfig) -> Result<Self> {
        config.validate()?;

        info!(
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            channels = config.channels,
            effects = rack.chain().len(),
            "Rack engine created"
        );

        Ok(Self {
            rack,
            channels: config.channels,
            block_size: config.block_size,
            source: None,
            input_scope: Arc::new(ScopeBuffer::with_capacity(config.scope_capacity)),
            output_scope: Arc::new(ScopeBuffer::with_capacity(config.scope_capacity)),
            frames_processed: 0,
        })
    }

    /// Feed the rack from a looping source instead of the buffer's input
    pub fn set_source(&mut self, source: Option<LoopPlayer>) {
        debug!(looped = source.is_some(), "Engine input source changed");
        self.source = source;
    }

    /// Process one callback's worth of interleaved frames in place
    ///
    /// A trailing partial frame is left untouched.
    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        debug_assert_eq!(buffer.len() % self.channels, 0);

        self.rack.sync_parameters();

        for frame in buffer.chunks_exact_mut(self.channels) {
            let input = match self.source.as_mut() {
                Some(source) => source.next_sample(),
                None => frame[0],
            };
            self.input_scope.push_sample(input);

            let output = self.rack.process_sample(input);
            frame.fill(output);

            self.output_scope.push_sample(output);
        }

        self.frames_processed += (buffer.len() / self.channels) as u64;
    }

    /// Buffer length (in samples) of one block at the configured size
    pub fn block_len(&self) -> usize {
        self.block_size * self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Pre-chain signal, for a render thread
    pub fn input_scope(&self) -> Arc<ScopeBuffer> {
        Arc::clone(&self.input_scope)
    }

    /// Post-chain signal, for a render thread
    pub fn output_scope(&self) -> Arc<ScopeBuffer> {
        Arc::clone(&self.output_scope)
    }

    /// Shared parameter store for control surfaces
    pub fn store(&self) -> &Arc<ParameterStore> {
        self.rack.store()
    }

    pub fn rack(&self) -> &Rack {
        &self.rack
    }

    /// Clear effect state, scopes and the loop playhead
    pub fn reset(&mut self) {
        self.rack.reset();
        self.input_scope.clear();
        self.output_scope.clear();
        if let Some(source) = self.source.as_mut() {
            source.rewind();
        }
        self.frames_processed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxrack_core::domain::dsp::{ClampEffect, GainEffect};
    use fxrack_core::domain::effect::Effect;
    use fxrack_core::domain::error::RackError;
    use fxrack_core::domain::parameter::{
        Parameter, ParameterBundle, ParameterStack, ParameterValue,
    };

    static GAIN: [Parameter; 2] = [
        Parameter::boolean("gainToggle", true),
        Parameter::float("gain", 0.0, 2.0, 2.0),
    ];
    static CLAMP: [Parameter; 2] = [
        Parameter::boolean("clampToggle", true),
        Parameter::float("clampCeiling", 0.0, 4.0, 1.0),
    ];

    fn rack() -> Rack {
        let gain = ParameterBundle::new("gain", &GAIN);
        let clamp = ParameterBundle::new("clamp", &CLAMP);
        Rack::build(&ParameterStack::new([&gain, &clamp]), |bundle| {
            let effect: Box<dyn Effect> = match bundle.name() {
                "gain" => Box::new(GainEffect::new()),
                _ => Box::new(ClampEffect::new()),
            };
            Ok(effect)
        })
        .unwrap()
    }

    fn config(channels: usize) -> AppConfig {
        AppConfig {
            channels,
            scope_capacity: 8,
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_engine_rejects_bad_settings() {
        let err = RackEngine::new(rack(), &config(0)).err().unwrap();
        assert!(matches!(err, RackError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_engine_fans_out_first_channel() {
        let mut engine = RackEngine::new(rack(), &config(2)).unwrap();

        // Second channel is ignored on input
        let mut buffer = vec![0.25, 9.0, 0.75, -9.0];
        engine.process_interleaved(&mut buffer);

        assert_eq!(buffer, vec![0.5, 0.5, 1.0, 1.0]);
        assert_eq!(engine.frames_processed(), 2);
    }

    #[test]
    fn test_engine_feeds_scopes() {
        let mut engine = RackEngine::new(rack(), &config(1)).unwrap();
        let input_scope = engine.input_scope();
        let output_scope = engine.output_scope();

        let mut buffer = vec![0.1, 0.3, 0.8];
        engine.process_interleaved(&mut buffer);

        assert_eq!(input_scope.snapshot(), vec![0.1, 0.3, 0.8]);
        assert_eq!(output_scope.snapshot(), vec![0.2, 0.6, 1.0]);
    }

    #[test]
    fn test_engine_syncs_once_per_callback() {
        let mut engine = RackEngine::new(rack(), &config(1)).unwrap();
        let store = Arc::clone(engine.store());

        let mut first = vec![0.25; 4];
        engine.process_interleaved(&mut first);

        store.set("gain", ParameterValue::Float(1.0)).unwrap();
        let mut second = vec![0.25; 4];
        engine.process_interleaved(&mut second);

        assert_eq!(first, vec![0.5; 4]);
        assert_eq!(second, vec![0.25; 4]);
    }

    #[test]
    fn test_engine_loop_source_replaces_input() {
        let mut engine = RackEngine::new(rack(), &config(2)).unwrap();
        engine.set_source(Some(LoopPlayer::new(vec![0.1, 0.2]).unwrap()));

        let mut buffer = vec![0.0; 6];
        engine.process_interleaved(&mut buffer);

        assert_eq!(engine.input_scope().snapshot(), vec![0.1, 0.2, 0.1]);
        assert_eq!(buffer[0], 0.2);
        assert_eq!(buffer[3], 0.4);

        engine.reset();
        assert!(engine.input_scope().is_empty());
        assert_eq!(engine.frames_processed(), 0);
    }
}
