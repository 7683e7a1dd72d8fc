//! Audio-thread plumbing around a bound rack
//!
//! This module provides:
//! - `ScopeBuffer`: lock-free overwrite-oldest buffer for visualization
//! - `LoopPlayer`: looping test-signal source
//! - `RackEngine`: interleaved block/sample driver with input and output scopes

pub mod engine;
pub mod scope;
pub mod source;

pub use engine::RackEngine;
pub use scope::ScopeBuffer;
pub use source::LoopPlayer;
