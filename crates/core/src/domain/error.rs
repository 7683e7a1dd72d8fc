//! Error taxonomy for the parameter store and effects rack
//!
//! Every failure is detected before the audio loop starts (configuration),
//! when a control surface writes a value (range), or when a caller asks for
//! a key that was never registered (lookup).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RackError>;

/// Broad class of a [`RackError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal at startup, the rack must not enter the audio loop
    Configuration,
    /// A written value lies outside the parameter's domain
    Range,
    /// A key was read that was never registered
    Lookup,
}

/// Errors raised while declaring, registering, binding or writing parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RackError {
    /// The same key was registered twice
    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    /// A declaration violates its own invariants (range, default, labels)
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Structural problem with bundles, stacks or engine settings
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Number of bundles and number of effects differ
    #[error("Chain mismatch: {bundles} parameter bundles for {effects} effects")]
    ChainMismatch { bundles: usize, effects: usize },

    /// A bundle does not declare as many tunables as its effect expects
    #[error("Effect {effect} expects {expected} parameters, bundle declares {declared}")]
    ArityMismatch {
        effect: String,
        expected: usize,
        declared: usize,
    },

    /// A bound bundle references a key absent from the store
    #[error("Parameter {0} is not registered in the store")]
    UnregisteredParameter(String),

    /// A discrete value outside its domain, or a NaN
    #[error("Value out of range for {name}: {reason}")]
    OutOfRange { name: String, reason: String },

    /// The value variant does not fit the parameter kind
    #[error("Type mismatch for {name}: expected {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    /// Read of an unregistered key
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),
}

impl RackError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RackError::DuplicateParameter(_)
            | RackError::InvalidParameter { .. }
            | RackError::InvalidConfiguration(_)
            | RackError::ChainMismatch { .. }
            | RackError::ArityMismatch { .. }
            | RackError::UnregisteredParameter(_) => ErrorKind::Configuration,
            RackError::OutOfRange { .. } | RackError::TypeMismatch { .. } => ErrorKind::Range,
            RackError::ParameterNotFound(_) => ErrorKind::Lookup,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    pub fn is_range(&self) -> bool {
        self.kind() == ErrorKind::Range
    }

    pub fn is_lookup(&self) -> bool {
        self.kind() == ErrorKind::Lookup
    }
}
