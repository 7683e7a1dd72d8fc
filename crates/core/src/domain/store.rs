//! Shared parameter store ("tree")
//!
//! Maps every declared key to its current value. The store is filled once,
//! single-threaded, before audio starts; afterwards it is shared behind an
//! `Arc` and accessed through `&self` only:
//! - control surfaces write with [`ParameterStore::set`] from any thread
//! - the audio thread reads through pre-resolved [`ParameterHandle`]s
//!
//! Every key owns its own atomic word, so reads never block and never see a
//! half-written value. There is no store-wide lock.

use crate::domain::error::{RackError, Result};
use crate::domain::parameter::{ParameterKind, ParameterValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, trace};

/// Pre-resolved index of a key in one particular store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterHandle(usize);

impl ParameterHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Slot {
    name: String,
    kind: ParameterKind,
    bits: AtomicU32,
}

impl Slot {
    #[inline]
    fn load(&self) -> ParameterValue {
        self.kind.decode(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, value: ParameterValue) {
        self.bits.store(self.kind.encode(value), Ordering::Relaxed);
    }
}

/// Key → current value map with per-key atomic storage
#[derive(Debug, Default)]
pub struct ParameterStore {
    index: HashMap<String, usize>,
    slots: Vec<Slot>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key exactly once.
    ///
    /// Fails with a configuration error if the key exists or the initial
    /// value does not lie in the declared domain; the store is unchanged
    /// in both cases.
    pub fn register(
        &mut self,
        name: &str,
        kind: ParameterKind,
        initial: ParameterValue,
    ) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(RackError::DuplicateParameter(name.to_string()));
        }

        let value = kind.coerce(name, initial).map_err(|e| RackError::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        if value != initial {
            return Err(RackError::InvalidParameter {
                name: name.to_string(),
                reason: format!("initial value {:?} outside declared range", initial),
            });
        }

        let slot = Slot {
            name: name.to_string(),
            kind,
            bits: AtomicU32::new(kind.encode(value)),
        };

        self.index.insert(name.to_string(), self.slots.len());
        self.slots.push(slot);

        debug!(name, kind = kind.type_name(), ?value, "Registered parameter");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered keys in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    pub fn kind(&self, name: &str) -> Result<ParameterKind> {
        self.slot(name).map(|slot| slot.kind)
    }

    /// Resolve a key once, for allocation-free reads later
    pub fn handle(&self, name: &str) -> Result<ParameterHandle> {
        self.index
            .get(name)
            .map(|&i| ParameterHandle(i))
            .ok_or_else(|| RackError::ParameterNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<ParameterValue> {
        self.slot(name).map(Slot::load)
    }

    /// Read for contexts that must not fail.
    ///
    /// A missing key is a programming error: it trips a debug assertion, and
    /// release builds fall back to `Float(0.0)`.
    pub fn value_or_default(&self, name: &str) -> ParameterValue {
        match self.slot(name) {
            Ok(slot) => slot.load(),
            Err(_) => {
                debug_assert!(false, "parameter {} read before registration", name);
                ParameterValue::Float(0.0)
            }
        }
    }

    /// Write a value, returning what was actually stored.
    ///
    /// Continuous values are clamped into `[min, max]`. Discrete values
    /// outside their domain, NaN, and mismatched kinds are rejected and the
    /// previous value is kept.
    pub fn set(&self, name: &str, value: ParameterValue) -> Result<ParameterValue> {
        let slot = self.slot(name)?;
        let stored = slot.kind.coerce(name, value)?;
        slot.store(stored);
        trace!(name, ?stored, "Parameter set");
        Ok(stored)
    }

    /// Audio-thread read by handle
    ///
    /// The handle must come from this store.
    #[inline]
    pub fn load(&self, handle: ParameterHandle) -> ParameterValue {
        self.slots[handle.0].load()
    }

    /// Audio-thread read in positional-argument form
    #[inline]
    pub fn load_f32(&self, handle: ParameterHandle) -> f32 {
        let slot = &self.slots[handle.0];
        slot.kind.decode_f32(slot.bits.load(Ordering::Relaxed))
    }

    /// Current value of every key, in registration order
    pub fn snapshot(&self) -> Vec<(String, ParameterValue)> {
        self.slots
            .iter()
            .map(|slot| (slot.name.clone(), slot.load()))
            .collect()
    }

    /// Put every key back to its declared default
    pub fn reset_to_defaults(&self) {
        for slot in &self.slots {
            slot.store(slot.kind.default_value());
        }
        debug!(count = self.slots.len(), "Parameters reset to defaults");
    }

    fn slot(&self, name: &str) -> Result<&Slot> {
        self.index
            .get(name)
            .map(|&i| &self.slots[i])
            .ok_or_else(|| RackError::ParameterNotFound(name.to_string()))
    }
}
