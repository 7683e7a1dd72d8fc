//! Configuration management for fxrack
//!
//! This module provides:
//! - Application settings (sample rate, block size, scopes, preset location)
//! - Parameter settings applied to the store at startup
//! - Preset system with TOML serialization
//! - Hot-reload support via file system watcher

use crate::domain::error::RackError;
use crate::domain::parameter::{ParameterKind, ParameterValue};
use crate::domain::stock;
use crate::domain::store::ParameterStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error(transparent)]
    Rack(#[from] RackError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Frames per processing block (parameter sync granularity)
    pub block_size: usize,

    /// Interleaved channels per frame
    pub channels: usize,

    /// Samples retained by each scope buffer
    pub scope_capacity: usize,

    /// Preset directory
    pub preset_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
            channels: 2,
            scope_capacity: 4096,
            preset_dir: PathBuf::from("presets"),
        }
    }
}

impl AppConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> std::result::Result<(), RackError> {
        let checks = [
            (self.sample_rate == 0, "sample_rate must be positive"),
            (self.block_size == 0, "block_size must be positive"),
            (self.channels == 0, "channels must be positive"),
            (self.scope_capacity == 0, "scope_capacity must be positive"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(RackError::InvalidConfiguration(reason.to_string())),
            None => Ok(()),
        }
    }

    /// Preset directory with a relative path resolved against `base`
    pub fn preset_dir_in(&self, base: &Path) -> PathBuf {
        if self.preset_dir.is_absolute() {
            self.preset_dir.clone()
        } else {
            base.join(&self.preset_dir)
        }
    }
}

// ============================================================================
// PARAMETER SETTINGS
// ============================================================================

/// A parameter value as written in TOML
///
/// Choices may be given either as a label (`"triangle"`) or as an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterSetting {
    Bool(bool),
    Number(f32),
    Label(String),
}

impl ParameterSetting {
    /// Render a stored value for a file, choices by label
    pub fn from_value(value: ParameterValue, kind: ParameterKind) -> Self {
        match (value, kind) {
            (ParameterValue::Bool(b), _) => ParameterSetting::Bool(b),
            (ParameterValue::Float(f), _) => ParameterSetting::Number(f),
            (ParameterValue::Choice(i), ParameterKind::Choice { labels, .. }) => labels
                .get(i)
                .map(|label| ParameterSetting::Label(label.to_string()))
                .unwrap_or(ParameterSetting::Number(i as f32)),
            (ParameterValue::Choice(i), _) => ParameterSetting::Number(i as f32),
        }
    }

    /// Interpret the setting against a declared kind
    pub fn to_value(
        &self,
        name: &str,
        kind: ParameterKind,
    ) -> std::result::Result<ParameterValue, RackError> {
        match (self, kind) {
            (ParameterSetting::Bool(b), _) => Ok(ParameterValue::Bool(*b)),
            (ParameterSetting::Number(n), _) => Ok(ParameterValue::Float(*n)),
            (ParameterSetting::Label(label), ParameterKind::Choice { labels, .. }) => labels
                .iter()
                .position(|l| l == label)
                .map(ParameterValue::Choice)
                .ok_or_else(|| RackError::OutOfRange {
                    name: name.to_string(),
                    reason: format!("unknown choice {:?}", label),
                }),
            (ParameterSetting::Label(_), kind) => Err(RackError::TypeMismatch {
                name: name.to_string(),
                expected: kind.type_name(),
            }),
        }
    }
}

/// Write settings into a store, skipping (and logging) the ones it rejects.
///
/// Returns how many settings were applied.
fn apply_settings(settings: &BTreeMap<String, ParameterSetting>, store: &ParameterStore) -> usize {
    let mut applied = 0;

    for (name, setting) in settings {
        let result = store
            .kind(name)
            .and_then(|kind| setting.to_value(name, kind))
            .and_then(|value| {
                let stored = store.set(name, value)?;
                if stored != value {
                    warn!(name = %name, requested = ?value, ?stored, "Parameter clamped");
                }
                Ok(stored)
            });

        match result {
            Ok(_) => applied += 1,
            Err(e) => warn!(name = %name, error = %e, "Skipping parameter setting"),
        }
    }

    applied
}

fn capture_settings(store: &ParameterStore) -> BTreeMap<String, ParameterSetting> {
    store
        .snapshot()
        .into_iter()
        .filter_map(|(name, value)| {
            let kind = store.kind(&name).ok()?;
            Some((name, ParameterSetting::from_value(value, kind)))
        })
        .collect()
}

// ============================================================================
// RACK CONFIG
// ============================================================================

/// Complete fxrack configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RackConfig {
    #[serde(default)]
    pub app: AppConfig,

    /// Startup values keyed by parameter name
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSetting>,
}

impl RackConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!(parameters = config.parameters.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.app.validate()?;
        Ok(())
    }

    /// Write the configured parameter values into a store
    pub fn apply_parameters(&self, store: &ParameterStore) -> usize {
        let applied = apply_settings(&self.parameters, store);
        info!(applied, configured = self.parameters.len(), "Configured parameters applied");
        applied
    }

    /// Default settings with every stock parameter at its declared default
    pub fn factory_default() -> Self {
        let parameters = stock::stock_bundles()
            .iter()
            .flat_map(|bundle| bundle.params().iter().copied())
            .map(|param| {
                let kind = param.kind();
                (
                    param.name().to_string(),
                    ParameterSetting::from_value(kind.default_value(), kind),
                )
            })
            .collect();

        Self {
            app: AppConfig::default(),
            parameters,
        }
    }
}

// ============================================================================
// PRESETS
// ============================================================================

/// A named set of parameter values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSetting>,
}

impl Preset {
    /// Capture every current value in the store
    pub fn capture(store: &ParameterStore) -> Self {
        Self {
            parameters: capture_settings(store),
        }
    }

    /// Write the preset into a store, returning the number of values applied.
    ///
    /// Keys the store does not know and values it rejects are skipped.
    pub fn apply(&self, store: &ParameterStore) -> usize {
        apply_settings(&self.parameters, store)
    }

    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        Ok(toml::from_str(&contents)?)
    }

    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, toml::to_string_pretty(self)?).await?;
        Ok(())
    }
}

/// File system watcher for hot-reload
pub struct ConfigWatcher {
    _watcher: notify::RecommendedWatcher,
    config_tx: broadcast::Sender<PathBuf>,
}

impl ConfigWatcher {
    /// Watch `preset_dir` for created or modified `.toml` files
    pub async fn new(preset_dir: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (config_tx, _config_rx) = broadcast::channel(32);

        fs::create_dir_all(&preset_dir).await?;

        let tx_clone = config_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) {
                    for path in event.paths {
                        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
                            // No subscribers is not an error
                            if tx_clone.receiver_count() > 0 {
                                if let Err(e) = tx_clone.send(path) {
                                    error!("Failed to send preset change event: {}", e);
                                }
                            }
                        }
                    }
                }
            }
        })?;

        watcher.watch(&preset_dir, notify::RecursiveMode::NonRecursive)?;

        info!(path = %preset_dir.display(), "Preset watcher started");

        Ok(Self {
            _watcher: watcher,
            config_tx,
        })
    }

    /// Subscribe to preset change events
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.config_tx.subscribe()
    }
}

/// Preset manager
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    pub fn preset_dir(&self) -> &Path {
        &self.preset_dir
    }

    /// Path of a named preset; names must stay inside the preset directory
    fn preset_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!("invalid preset name {:?}", name)));
        }
        Ok(self.preset_dir.join(format!("{}.toml", name)))
    }

    /// List all available presets, sorted by name
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        if !self.preset_dir.exists() {
            return Ok(presets);
        }

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "toml").unwrap_or(false) {
                if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                    presets.push(name.to_string());
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<Preset> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        Preset::load_from_file(&path).await
    }

    #[instrument(skip(self, preset))]
    pub async fn save_preset(&self, name: &str, preset: &Preset) -> Result<()> {
        preset.save_to_file(self.preset_path(name)?).await?;
        info!(name, parameters = preset.parameters.len(), "Preset saved");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    pub async fn preset_exists(&self, name: &str) -> bool {
        self.preset_path(name).map(|path| path.exists()).unwrap_or(false)
    }
}

/// Manager for the main fxrack config file
///
/// Manages `<config dir>/fxrack/config.toml`.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");

        Self {
            config_dir,
            config_path,
        }
    }

    /// Platform config directory joined with `fxrack`
    ///
    /// `~/.config/fxrack` on Linux, `%APPDATA%\fxrack` on Windows.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("fxrack"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// A missing file yields the factory default, which is written out for
    /// next time. A corrupt file is copied aside as `config.toml.corrupt`
    /// and the factory default is returned.
    #[instrument(skip(self))]
    pub async fn load(&self) -> RackConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = RackConfig::factory_default();
            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }

            return config;
        }

        match RackConfig::load_from_file(&self.config_path).await {
            Ok(config) => {
                info!(path = %self.config_path.display(), "Configuration loaded successfully");
                config
            }
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                RackConfig::factory_default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &RackConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }

    /// Delete the config file if present
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.config_path.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(path = %self.config_path.display(), "Configuration cleared");
        }

        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
