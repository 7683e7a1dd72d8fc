//! Control surface: the non-real-time writer of the parameter store
//!
//! UI events, scripts and preset reloads arrive as [`ControlCommand`]s and
//! are executed against the shared store. Nothing here touches the effects
//! chain directly; the audio thread picks changes up at the next block.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::config::{Preset, PresetManager};
use crate::domain::parameter::ParameterValue;
use crate::domain::store::ParameterStore;

/// Command types for runtime parameter management
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SetParameter { name: String, value: ParameterValue },
    LoadPreset { name: String },
    SavePreset { name: String },
    Snapshot,
}

/// Result of command execution
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Value actually stored, after clamping
    ParameterChanged {
        name: String,
        stored: ParameterValue,
    },
    PresetLoaded {
        name: String,
        applied: usize,
    },
    PresetSaved {
        name: String,
    },
    Snapshot(Vec<(String, ParameterValue)>),
    Error(String),
}

impl CommandResult {
    pub fn is_error(&self) -> bool {
        matches!(self, CommandResult::Error(_))
    }
}

/// Trait for command execution
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: ControlCommand) -> CommandResult;
}

/// Executes commands against a store and a preset directory
pub struct ControlSurface {
    store: Arc<ParameterStore>,
    presets: PresetManager,
}

impl ControlSurface {
    pub fn new(store: Arc<ParameterStore>, presets: PresetManager) -> Self {
        Self { store, presets }
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    /// Reload each preset whose file changes, until the sender side closes.
    ///
    /// `changes` is typically a [`ConfigWatcher`](crate::domain::config::ConfigWatcher)
    /// subscription on this surface's preset directory. Returns the number of
    /// successful reloads.
    pub async fn follow_presets(&self, mut changes: broadcast::Receiver<PathBuf>) -> usize {
        let mut reloads = 0;

        loop {
            let path = match changes.recv().await {
                Ok(path) => path,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Preset change events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let name = match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            // A file caught mid-write fails to parse; its next event retries
            match self.execute(ControlCommand::LoadPreset { name }).await {
                CommandResult::PresetLoaded { .. } => reloads += 1,
                result => debug!(path = %path.display(), ?result, "Preset reload skipped"),
            }
        }

        info!(reloads, "Preset follower stopped");
        reloads
    }
}

#[async_trait::async_trait]
impl CommandExecutor for ControlSurface {
    async fn execute(&self, command: ControlCommand) -> CommandResult {
        debug!(?command, "Executing control command");

        match command {
            ControlCommand::SetParameter { name, value } => match self.store.set(&name, value) {
                Ok(stored) => CommandResult::ParameterChanged { name, stored },
                Err(e) => {
                    warn!(name = %name, error = %e, "Parameter write rejected");
                    CommandResult::Error(e.to_string())
                }
            },
            ControlCommand::LoadPreset { name } => match self.presets.load_preset(&name).await {
                Ok(preset) => {
                    let applied = preset.apply(&self.store);
                    info!(name = %name, applied, "Preset loaded");
                    CommandResult::PresetLoaded { name, applied }
                }
                Err(e) => CommandResult::Error(e.to_string()),
            },
            ControlCommand::SavePreset { name } => {
                let preset = Preset::capture(&self.store);
                match self.presets.save_preset(&name, &preset).await {
                    Ok(()) => CommandResult::PresetSaved { name },
                    Err(e) => CommandResult::Error(e.to_string()),
                }
            }
            ControlCommand::Snapshot => CommandResult::Snapshot(self.store.snapshot()),
        }
    }
}
