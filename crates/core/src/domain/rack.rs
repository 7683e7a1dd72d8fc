//! Rack assembly: store, chain and sync bound together
//!
//! A [`Rack`] is what the audio callback drives. It is built once, off the
//! audio thread, and every structural check happens there. Afterwards:
//! - control surfaces write through the shared [`ParameterStore`]
//! - the audio thread calls [`Rack::process_block`] (or
//!   [`Rack::sync_parameters`] followed by [`Rack::process_sample`] per
//!   sample), neither of which can fail or allocate

use std::sync::Arc;

use tracing::info;

use crate::domain::effect::{Effect, EffectsChain};
use crate::domain::error::Result;
use crate::domain::parameter::{ParameterBundle, ParameterStack};
use crate::domain::store::ParameterStore;
use crate::domain::sync::ParameterSync;

/// A bound parameter store and effects chain
pub struct Rack {
    store: Arc<ParameterStore>,
    chain: EffectsChain,
    sync: ParameterSync,
}

impl Rack {
    /// Register `stack` into a fresh store and create one effect per bundle.
    ///
    /// `factory` is called for each bundle in stack order, so the stack's
    /// bundle order becomes the chain's processing order.
    pub fn build<F>(stack: &ParameterStack<'_>, mut factory: F) -> Result<Self>
    where
        F: FnMut(&ParameterBundle<'_>) -> Result<Box<dyn Effect>>,
    {
        let mut store = ParameterStore::new();
        stack.add_to_store(&mut store)?;

        let effects = stack
            .bundles()
            .iter()
            .map(|&bundle| factory(bundle))
            .collect::<Result<Vec<_>>>()?;

        Self::from_parts(stack, Arc::new(store), effects)
    }

    /// Bind an already registered store to externally built effects
    pub fn from_parts(
        stack: &ParameterStack<'_>,
        store: Arc<ParameterStore>,
        effects: Vec<Box<dyn Effect>>,
    ) -> Result<Self> {
        let chain = EffectsChain::new(effects);
        let sync = ParameterSync::new(stack, &store, &chain)?;

        let mut rack = Self { store, chain, sync };
        rack.sync_parameters();

        info!(
            effects = rack.chain.len(),
            parameters = rack.store.len(),
            "Rack built"
        );
        Ok(rack)
    }

    /// Shared store for control surfaces
    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    pub fn chain(&self) -> &EffectsChain {
        &self.chain
    }

    /// Block-rate update: push current store values into every effect
    #[inline]
    pub fn sync_parameters(&mut self) {
        self.sync.apply(&self.store, &mut self.chain);
    }

    /// Per-sample entry point
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        self.chain.process_sample(x)
    }

    /// Sync once, then process every sample of a mono block in place
    pub fn process_block(&mut self, block: &mut [f32]) {
        self.sync_parameters();
        self.chain.process_buffer(block);
    }

    /// Clear the internal state of every effect
    pub fn reset(&mut self) {
        self.chain.reset();
    }
}

impl std::fmt::Debug for Rack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rack")
            .field("chain", &self.chain)
            .field("parameters", &self.store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dsp::{ClampEffect, GainEffect};
    use crate::domain::error::RackError;
    use crate::domain::parameter::{Parameter, ParameterValue};

    static GAIN: [Parameter; 2] = [
        Parameter::boolean("gainToggle", false),
        Parameter::float("gain", 0.0, 2.0, 1.0),
    ];
    static CLAMP: [Parameter; 2] = [
        Parameter::boolean("clampToggle", true),
        Parameter::float("clampCeiling", 0.0, 4.0, 1.0),
    ];

    fn factory(bundle: &ParameterBundle<'_>) -> Result<Box<dyn Effect>> {
        match bundle.name() {
            "gain" => Ok(Box::new(GainEffect::new())),
            "clamp" => Ok(Box::new(ClampEffect::new())),
            other => Err(RackError::InvalidConfiguration(other.to_string())),
        }
    }

    fn run(rack: &mut Rack, input: &[f32]) -> Vec<f32> {
        let mut block = input.to_vec();
        rack.process_block(&mut block);
        block
    }

    // -------------------------------------------------------------------------
    // Scenario Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_gain_bypassed_clamp_applied() {
        let (gain, clamp) = (
            ParameterBundle::new("gain", &GAIN),
            ParameterBundle::new("clamp", &CLAMP),
        );
        let mut rack = Rack::build(&ParameterStack::new([&gain, &clamp]), factory).unwrap();

        assert_eq!(run(&mut rack, &[0.5, 2.0, -3.0]), vec![0.5, 1.0, -1.0]);
    }

    #[test]
    fn test_gain_enabled_then_clamp() {
        let (gain, clamp) = (
            ParameterBundle::new("gain", &GAIN),
            ParameterBundle::new("clamp", &CLAMP),
        );
        let mut rack = Rack::build(&ParameterStack::new([&gain, &clamp]), factory).unwrap();

        rack.store()
            .set("gainToggle", ParameterValue::Bool(true))
            .unwrap();
        rack.store().set("gain", ParameterValue::Float(1.5)).unwrap();

        assert_eq!(run(&mut rack, &[0.5, 2.0, -3.0]), vec![0.75, 1.0, -1.0]);
    }

    #[test]
    fn test_bundle_order_is_processing_order() {
        let (gain, clamp) = (
            ParameterBundle::new("gain", &GAIN),
            ParameterBundle::new("clamp", &CLAMP),
        );

        let mut gain_first = Rack::build(&ParameterStack::new([&gain, &clamp]), factory).unwrap();
        let mut clamp_first = Rack::build(&ParameterStack::new([&clamp, &gain]), factory).unwrap();

        for rack in [&mut gain_first, &mut clamp_first] {
            rack.store()
                .set("gainToggle", ParameterValue::Bool(true))
                .unwrap();
            rack.store().set("gain", ParameterValue::Float(2.0)).unwrap();
        }

        let names: Vec<_> = clamp_first.chain().names().collect();
        assert_eq!(names, vec!["Clamp", "Gain"]);

        assert_eq!(run(&mut gain_first, &[0.8]), vec![1.0]);
        assert_eq!(run(&mut clamp_first, &[0.8]), vec![1.6]);
    }

    #[test]
    fn test_all_bypassed_is_identity() {
        let (gain, clamp) = (
            ParameterBundle::new("gain", &GAIN),
            ParameterBundle::new("clamp", &CLAMP),
        );
        let mut rack = Rack::build(&ParameterStack::new([&gain, &clamp]), factory).unwrap();
        rack.store()
            .set("clampToggle", ParameterValue::Bool(false))
            .unwrap();

        let input = [0.5, 2.0, -3.0, 7.25];
        assert_eq!(run(&mut rack, &input), input.to_vec());
    }

    #[test]
    fn test_rack_reads_only_its_own_store() {
        let gain = ParameterBundle::new("gain", &GAIN);
        let stack = ParameterStack::new([&gain]);
        let mut first = Rack::build(&stack, factory).unwrap();
        let mut second = Rack::build(&stack, factory).unwrap();
        assert!(!Arc::ptr_eq(first.store(), second.store()));

        second
            .store()
            .set("gainToggle", ParameterValue::Bool(true))
            .unwrap();
        second.store().set("gain", ParameterValue::Float(2.0)).unwrap();

        assert_eq!(run(&mut first, &[0.25]), vec![0.25]);
        assert_eq!(run(&mut second, &[0.25]), vec![0.5]);
    }

    // -------------------------------------------------------------------------
    // Construction Failures
    // -------------------------------------------------------------------------

    #[test]
    fn test_build_propagates_factory_error() {
        static OTHER: [Parameter; 1] = [Parameter::boolean("otherToggle", false)];
        let other = ParameterBundle::new("other", &OTHER);

        let err = Rack::build(&ParameterStack::new([&other]), factory).unwrap_err();
        assert_eq!(err, RackError::InvalidConfiguration("other".to_string()));
    }

    #[test]
    fn test_build_rejects_duplicate_keys() {
        let gain = ParameterBundle::new("gain", &GAIN);
        let err = Rack::build(&ParameterStack::new([&gain, &gain]), factory).unwrap_err();
        assert_eq!(err, RackError::DuplicateParameter("gainToggle".to_string()));
    }

    #[test]
    fn test_from_parts_rejects_count_mismatch() {
        let gain = ParameterBundle::new("gain", &GAIN);
        let stack = ParameterStack::new([&gain]);
        let mut store = ParameterStore::new();
        stack.add_to_store(&mut store).unwrap();

        let effects: Vec<Box<dyn Effect>> =
            vec![Box::new(GainEffect::new()), Box::new(ClampEffect::new())];
        let err = Rack::from_parts(&stack, Arc::new(store), effects).unwrap_err();
        assert!(matches!(err, RackError::ChainMismatch { .. }));
    }

    #[test]
    fn test_from_parts_runs_initial_sync() {
        let gain = ParameterBundle::new("gain", &GAIN);
        let stack = ParameterStack::new([&gain]);
        let mut store = ParameterStore::new();
        stack.add_to_store(&mut store).unwrap();
        store.set("gain", ParameterValue::Float(0.5)).unwrap();

        let mut effect = GainEffect::new();
        effect.toggle(true);
        let rack = Rack::from_parts(&stack, Arc::new(store), vec![Box::new(effect)]).unwrap();

        // Toggle default wins over the effect's own construction state
        assert!(!rack.chain().effects()[0].is_enabled());
    }
}
