//! Parameter declarations and their grouping
//!
//! A [`Parameter`] is a static, immutable declaration: a flat key, a kind
//! (toggle, continuous range, or enumerated choice) and a default. Bundles
//! group the parameters of one effect, stacks order the bundles of a whole
//! rack. Both only borrow their elements; the declaring module owns them.
//!
//! Declaration order is load-bearing: the tunables of a bundle are handed to
//! its effect positionally, and the bundle order of a stack is the order in
//! which effects process audio.

use crate::domain::error::{RackError, Result};
use crate::domain::store::ParameterStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Current value of a parameter as held by the store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParameterValue {
    Bool(bool),
    Float(f32),
    Choice(usize),
}

impl ParameterValue {
    /// Positional argument form handed to `Effect::set_params`
    #[inline]
    pub fn as_f32(&self) -> f32 {
        match *self {
            ParameterValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            ParameterValue::Float(v) => v,
            ParameterValue::Choice(i) => i as f32,
        }
    }

    /// Interpret as a toggle state; non-zero numbers count as on
    #[inline]
    pub fn as_bool(&self) -> bool {
        match *self {
            ParameterValue::Bool(b) => b,
            ParameterValue::Float(v) => v != 0.0,
            ParameterValue::Choice(i) => i != 0,
        }
    }
}

/// Kind and domain of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterKind {
    /// On/off toggle
    Bool { default: bool },
    /// Continuous value on the closed interval `[min, max]`
    Float { min: f32, max: f32, default: f32 },
    /// Index into an ordered list of labels
    Choice {
        labels: &'static [&'static str],
        default: usize,
    },
}

impl ParameterKind {
    pub fn default_value(&self) -> ParameterValue {
        match *self {
            ParameterKind::Bool { default } => ParameterValue::Bool(default),
            ParameterKind::Float { default, .. } => ParameterValue::Float(default),
            ParameterKind::Choice { default, .. } => ParameterValue::Choice(default),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterKind::Bool { .. } => "bool",
            ParameterKind::Float { .. } => "float",
            ParameterKind::Choice { .. } => "choice",
        }
    }

    /// Fit `value` into this domain.
    ///
    /// Continuous values are clamped; discrete values outside the domain are
    /// rejected so the caller can keep the previous value.
    pub fn coerce(&self, name: &str, value: ParameterValue) -> Result<ParameterValue> {
        match (*self, value) {
            (ParameterKind::Bool { .. }, ParameterValue::Bool(b)) => Ok(ParameterValue::Bool(b)),
            (ParameterKind::Float { min, max, .. }, ParameterValue::Float(v)) => {
                if v.is_nan() {
                    return Err(RackError::OutOfRange {
                        name: name.to_string(),
                        reason: "NaN is not a valid value".to_string(),
                    });
                }
                Ok(ParameterValue::Float(v.clamp(min, max)))
            }
            (ParameterKind::Choice { labels, .. }, ParameterValue::Choice(index)) => {
                Self::check_index(name, labels, index)
            }
            // Hosts and config files often carry choice indices as plain numbers
            (ParameterKind::Choice { labels, .. }, ParameterValue::Float(v))
                if v >= 0.0 && v.fract() == 0.0 =>
            {
                Self::check_index(name, labels, v as usize)
            }
            (kind, _) => Err(RackError::TypeMismatch {
                name: name.to_string(),
                expected: kind.type_name(),
            }),
        }
    }

    fn check_index(
        name: &str,
        labels: &'static [&'static str],
        index: usize,
    ) -> Result<ParameterValue> {
        if index < labels.len() {
            Ok(ParameterValue::Choice(index))
        } else {
            Err(RackError::OutOfRange {
                name: name.to_string(),
                reason: format!("choice index {} outside [0, {})", index, labels.len()),
            })
        }
    }

    /// Pack a value of this kind into the store's atomic word
    #[inline]
    pub(crate) fn encode(&self, value: ParameterValue) -> u32 {
        match value {
            ParameterValue::Bool(b) => b as u32,
            ParameterValue::Float(v) => v.to_bits(),
            ParameterValue::Choice(i) => i as u32,
        }
    }

    #[inline]
    pub(crate) fn decode(&self, bits: u32) -> ParameterValue {
        match self {
            ParameterKind::Bool { .. } => ParameterValue::Bool(bits != 0),
            ParameterKind::Float { .. } => ParameterValue::Float(f32::from_bits(bits)),
            ParameterKind::Choice { .. } => ParameterValue::Choice(bits as usize),
        }
    }

    /// Same as `decode(bits).as_f32()` without building the enum
    #[inline]
    pub(crate) fn decode_f32(&self, bits: u32) -> f32 {
        match self {
            ParameterKind::Float { .. } => f32::from_bits(bits),
            ParameterKind::Bool { .. } | ParameterKind::Choice { .. } => bits as f32,
        }
    }
}

/// A named, typed, range-bounded parameter declaration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameter {
    name: &'static str,
    kind: ParameterKind,
}

impl Parameter {
    pub const fn boolean(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: ParameterKind::Bool { default },
        }
    }

    pub const fn float(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            kind: ParameterKind::Float { min, max, default },
        }
    }

    pub const fn choice(
        name: &'static str,
        labels: &'static [&'static str],
        default: usize,
    ) -> Self {
        Self {
            name,
            kind: ParameterKind::Choice { labels, default },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn is_toggle(&self) -> bool {
        matches!(self.kind, ParameterKind::Bool { .. })
    }

    pub fn is_choice(&self) -> bool {
        matches!(self.kind, ParameterKind::Choice { .. })
    }

    /// Check the declaration's own invariants
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| RackError::InvalidParameter {
            name: self.name.to_string(),
            reason,
        };

        if self.name.is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }

        match self.kind {
            ParameterKind::Bool { .. } => Ok(()),
            ParameterKind::Float { min, max, default } => {
                if !(min.is_finite() && max.is_finite() && default.is_finite()) {
                    Err(invalid("range and default must be finite".to_string()))
                } else if min > max {
                    Err(invalid(format!("min {} exceeds max {}", min, max)))
                } else if !(min..=max).contains(&default) {
                    Err(invalid(format!(
                        "default {} outside [{}, {}]",
                        default, min, max
                    )))
                } else {
                    Ok(())
                }
            }
            ParameterKind::Choice { labels, default } => {
                if labels.is_empty() {
                    Err(invalid("choice list is empty".to_string()))
                } else if default >= labels.len() {
                    Err(invalid(format!(
                        "default index {} outside [0, {})",
                        default,
                        labels.len()
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Register this parameter in the store with its default value
    pub fn add_to_store(&self, store: &mut ParameterStore) -> Result<()> {
        self.validate()?;
        store.register(self.name, self.kind, self.kind.default_value())
    }

    /// Append this declaration to a host parameter list
    pub fn add_to_tree<'a>(&'a self, list: &mut Vec<&'a Parameter>) {
        list.push(self);
    }
}

/// The parameters configuring one effect, including its bypass toggle
#[derive(Debug, Clone)]
pub struct ParameterBundle<'a> {
    name: &'a str,
    params: Vec<&'a Parameter>,
}

impl<'a> ParameterBundle<'a> {
    pub fn new(name: &'a str, params: impl IntoIterator<Item = &'a Parameter>) -> Self {
        Self {
            name,
            params: params.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn params(&self) -> &[&'a Parameter] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The bypass toggle (the bundle's single Bool parameter)
    pub fn toggle(&self) -> Option<&'a Parameter> {
        self.params.iter().copied().find(|p| p.is_toggle())
    }

    /// Float and choice parameters, in declaration order
    pub fn tunables(&self) -> impl Iterator<Item = &'a Parameter> + '_ {
        self.params.iter().copied().filter(|p| !p.is_toggle())
    }

    /// Number of arguments the bundle hands to `set_params`
    pub fn arity(&self) -> usize {
        self.tunables().count()
    }

    pub fn validate(&self) -> Result<()> {
        for param in &self.params {
            param.validate()?;
        }

        let toggles = self.params.iter().filter(|p| p.is_toggle()).count();
        if toggles != 1 {
            return Err(RackError::InvalidConfiguration(format!(
                "bundle {} must declare exactly one toggle, found {}",
                self.name, toggles
            )));
        }

        Ok(())
    }

    pub fn add_to_store(&self, store: &mut ParameterStore) -> Result<()> {
        for param in &self.params {
            param.add_to_store(store)?;
        }
        Ok(())
    }

    pub fn add_to_tree(&self, list: &mut Vec<&'a Parameter>) {
        list.extend(self.params.iter().copied());
    }
}

/// The complete, ordered parameter surface of a rack
///
/// Bundle order is effect processing order.
#[derive(Debug, Clone)]
pub struct ParameterStack<'a> {
    bundles: Vec<&'a ParameterBundle<'a>>,
}

impl<'a> ParameterStack<'a> {
    pub fn new(bundles: impl IntoIterator<Item = &'a ParameterBundle<'a>>) -> Self {
        Self {
            bundles: bundles.into_iter().collect(),
        }
    }

    pub fn bundles(&self) -> &[&'a ParameterBundle<'a>] {
        &self.bundles
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Every declared parameter, bundle by bundle
    pub fn parameters(&self) -> impl Iterator<Item = &'a Parameter> + '_ {
        self.bundles
            .iter()
            .flat_map(|bundle| bundle.params().iter().copied())
    }

    /// Validate every bundle and the uniqueness of keys across the stack
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for bundle in &self.bundles {
            bundle.validate()?;
            for param in bundle.params() {
                if !seen.insert(param.name()) {
                    return Err(RackError::DuplicateParameter(param.name().to_string()));
                }
            }
        }
        Ok(())
    }

    /// Register the whole stack.
    ///
    /// Everything is checked before the first key is inserted, so a failing
    /// stack leaves the store as it was.
    pub fn add_to_store(&self, store: &mut ParameterStore) -> Result<()> {
        self.validate()?;

        if let Some(existing) = self.parameters().find(|p| store.contains(p.name())) {
            return Err(RackError::DuplicateParameter(existing.name().to_string()));
        }

        for bundle in &self.bundles {
            bundle.add_to_store(store)?;
        }
        Ok(())
    }

    pub fn add_to_tree(&self, list: &mut Vec<&'a Parameter>) {
        for bundle in &self.bundles {
            bundle.add_to_tree(list);
        }
    }
}
