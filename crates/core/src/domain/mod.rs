//! Domain entities and business rules

pub mod config;
pub mod control;
pub mod dsp;
pub mod effect;
pub mod error;
pub mod parameter;
pub mod rack;
pub mod stock;
pub mod store;
pub mod sync;

// Re-export specific items to avoid ambiguous glob imports
pub use config::{
    AppConfig, ConfigError, ConfigManager, ConfigWatcher, ParameterSetting, Preset, PresetManager,
    RackConfig,
};
pub use control::{CommandExecutor, CommandResult, ControlCommand, ControlSurface};
pub use effect::{Effect, EffectsChain};
pub use error::{ErrorKind, RackError, Result};
pub use parameter::{Parameter, ParameterBundle, ParameterKind, ParameterStack, ParameterValue};
pub use rack::Rack;
pub use stock::{stock_bundles, stock_effect, stock_rack, STOCK_EFFECTS};
pub use store::{ParameterHandle, ParameterStore};
pub use sync::ParameterSync;
