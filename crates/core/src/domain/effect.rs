//! Effect capability and the serial effects chain
//!
//! An [`Effect`] is an opaque, stateful DSP unit transforming one sample at a
//! time. The [`EffectsChain`] folds a sample through its effects in a fixed
//! order, skipping bypassed ones:
//!
//! `output = fold(effects, x, |acc, e| if e.enabled { e.process(acc) } else { acc })`
//!
//! The chain has no insert/remove/reorder API; its order is fixed when it is
//! built, which keeps output reproducible for a given parameter history.

use tracing::debug;

/// Core trait for all audio effects
///
/// Implementations must not allocate, block or log inside
/// [`Effect::process_sample`] or [`Effect::set_params`].
pub trait Effect: Send + Sync {
    /// Effect name for debugging/display
    fn name(&self) -> &str;

    /// Names of the positional arguments accepted by [`Effect::set_params`],
    /// in order. The matching parameter bundle must declare its tunables in
    /// this same order.
    fn param_names(&self) -> &'static [&'static str];

    /// Number of arguments expected by [`Effect::set_params`]
    fn arity(&self) -> usize {
        self.param_names().len()
    }

    /// Update all tunables at once, positionally
    ///
    /// Called once per block. A slice of the wrong length is ignored.
    fn set_params(&mut self, params: &[f32]);

    /// Enable or bypass the effect
    ///
    /// Going from enabled to bypassed clears internal state.
    fn toggle(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Transform one sample
    fn process_sample(&mut self, x: f32) -> f32;

    /// Clear internal buffers and state
    fn reset(&mut self);
}

/// Serial chain of effects with a fixed processing order
pub struct EffectsChain {
    effects: Vec<Box<dyn Effect>>,
}

impl EffectsChain {
    pub fn new(effects: Vec<Box<dyn Effect>>) -> Self {
        debug!(
            effects = ?effects.iter().map(|e| e.name()).collect::<Vec<_>>(),
            "Effects chain created"
        );
        Self { effects }
    }

    /// Run one sample through every enabled effect, in order
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        self.effects.iter_mut().fold(x, |acc, effect| {
            if effect.is_enabled() {
                effect.process_sample(acc)
            } else {
                acc
            }
        })
    }

    /// Process a mono buffer in place, sample by sample
    pub fn process_buffer(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset all effects in the chain
    pub fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.effects.iter().map(|e| e.name())
    }

    pub fn effects(&self) -> &[Box<dyn Effect>] {
        &self.effects
    }

    /// Mutable access to the effects, for parameter updates only
    pub(crate) fn effects_mut(&mut self) -> &mut [Box<dyn Effect>] {
        &mut self.effects
    }
}

impl std::fmt::Debug for EffectsChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectsChain")
            .field("effects", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
