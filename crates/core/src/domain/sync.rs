//! Block-rate parameter synchronization
//!
//! Once per audio block, before the first sample, every effect in the chain
//! receives its bypass flag and its full positional argument list, read from
//! the shared store:
//!
//! ```text
//! for (bundle, effect) in zip(stack, chain):
//!     effect.toggle(store[bundle.toggle])
//!     effect.set_params([store[p] for p in bundle.tunables])
//! ```
//!
//! All key lookups and shape checks happen in [`ParameterSync::new`]. After
//! that, [`ParameterSync::apply`] performs only atomic loads and writes into
//! a scratch buffer sized up front.

use std::ops::Range;

use tracing::debug;

use crate::domain::effect::EffectsChain;
use crate::domain::error::{RackError, Result};
use crate::domain::parameter::ParameterStack;
use crate::domain::store::{ParameterHandle, ParameterStore};

/// Resolved keys for one effect
#[derive(Debug, Clone)]
struct Binding {
    toggle: ParameterHandle,
    args: Range<usize>,
}

/// Pre-resolved mapping from a parameter stack onto an effects chain
#[derive(Debug, Clone)]
pub struct ParameterSync {
    bindings: Vec<Binding>,
    handles: Vec<ParameterHandle>,
    scratch: Vec<f32>,
}

impl ParameterSync {
    /// Bind `stack` to `chain` through `store`.
    ///
    /// Fails with a configuration error when the stack and the chain do not
    /// line up one-to-one, when a bundle's tunable count differs from its
    /// effect's arity, or when a declared key is missing from the store.
    pub fn new(
        stack: &ParameterStack<'_>,
        store: &ParameterStore,
        chain: &EffectsChain,
    ) -> Result<Self> {
        if stack.len() != chain.len() {
            return Err(RackError::ChainMismatch {
                bundles: stack.len(),
                effects: chain.len(),
            });
        }

        let mut bindings = Vec::with_capacity(stack.len());
        let mut handles = Vec::new();
        let mut max_arity = 0;

        for (bundle, effect) in stack.bundles().iter().zip(chain.effects()) {
            bundle.validate()?;

            let declared = bundle.arity();
            if declared != effect.arity() {
                return Err(RackError::ArityMismatch {
                    effect: effect.name().to_string(),
                    expected: effect.arity(),
                    declared,
                });
            }

            let toggle = bundle.toggle().ok_or_else(|| {
                RackError::InvalidConfiguration(format!("bundle {} has no toggle", bundle.name()))
            })?;
            let toggle = resolve(store, toggle.name())?;

            let start = handles.len();
            for param in bundle.tunables() {
                handles.push(resolve(store, param.name())?);
            }

            bindings.push(Binding {
                toggle,
                args: start..handles.len(),
            });
            max_arity = max_arity.max(declared);
        }

        debug!(
            effects = bindings.len(),
            parameters = handles.len() + bindings.len(),
            "Parameter sync bound"
        );

        Ok(Self {
            bindings,
            handles,
            scratch: vec![0.0; max_arity],
        })
    }

    /// Number of bound effects
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Push current store values into every effect.
    ///
    /// `store` and `chain` must be the ones this sync was bound to, which
    /// [`Rack`](crate::domain::rack::Rack) guarantees by owning all three.
    /// Never allocates.
    pub(crate) fn apply(&mut self, store: &ParameterStore, chain: &mut EffectsChain) {
        debug_assert_eq!(self.bindings.len(), chain.len());

        for (binding, effect) in self.bindings.iter().zip(chain.effects_mut()) {
            effect.toggle(store.load(binding.toggle).as_bool());

            let handles = &self.handles[binding.args.clone()];
            let args = &mut self.scratch[..handles.len()];
            for (slot, &handle) in args.iter_mut().zip(handles) {
                *slot = store.load_f32(handle);
            }
            effect.set_params(args);
        }
    }
}

fn resolve(store: &ParameterStore, name: &str) -> Result<ParameterHandle> {
    store
        .handle(name)
        .map_err(|_| RackError::UnregisteredParameter(name.to_string()))
}
