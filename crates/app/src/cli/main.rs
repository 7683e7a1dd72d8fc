//! fxrack CLI Application

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use fxrack_core::domain::config::{
    ConfigManager, ConfigWatcher, ParameterSetting, PresetManager, RackConfig,
};
use fxrack_core::domain::control::{CommandExecutor, CommandResult, ControlCommand, ControlSurface};
use fxrack_core::domain::parameter::{ParameterKind, ParameterValue};
use fxrack_core::domain::stock::{stock_bundles, stock_rack};
use fxrack_core::domain::store::ParameterStore;
use fxrack_infra::audio::{LoopPlayer, RackEngine};

#[derive(Parser)]
#[command(name = "fxrack")]
#[command(about = "Block-synchronized audio effects rack", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a looped sine through the stock rack and report levels
    Render {
        /// Configuration file (the user config directory is used when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Preset to apply after the configuration
        #[arg(long)]
        preset: Option<String>,

        /// Parameter override, e.g. `--set delayToggle=true`
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        overrides: Vec<(String, String)>,

        /// Number of blocks to render
        #[arg(long, default_value_t = 100)]
        blocks: usize,

        /// Test tone frequency in Hz
        #[arg(long, default_value_t = 440.0)]
        frequency: f32,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the stock parameter surface in chain order
    Params {
        #[arg(long)]
        json: bool,
    },

    /// List presets in the preset directory
    Presets {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the stock rack in real time, reloading presets as their files change
    Watch {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Preset to apply before starting
        #[arg(long)]
        preset: Option<String>,

        /// Stop after this many seconds (runs until Ctrl-C when omitted)
        #[arg(long)]
        seconds: Option<u64>,

        /// Test tone frequency in Hz
        #[arg(long, default_value_t = 440.0)]
        frequency: f32,
    },
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", s)),
    }
}

// ============================================================================
// REPORTS
// ============================================================================

/// Peak and RMS of a mono signal
#[derive(Debug, Default, Serialize)]
struct SignalStats {
    peak: f32,
    rms: f32,
    #[serde(skip)]
    sum_squares: f64,
    #[serde(skip)]
    count: u64,
}

impl SignalStats {
    fn add(&mut self, x: f32) {
        self.peak = self.peak.max(x.abs());
        self.sum_squares += f64::from(x) * f64::from(x);
        self.count += 1;
    }

    fn finish(mut self) -> Self {
        if self.count > 0 {
            self.rms = (self.sum_squares / self.count as f64).sqrt() as f32;
        }
        self
    }
}

#[derive(Serialize)]
struct ParameterEntry {
    name: String,
    value: ParameterValue,
}

#[derive(Serialize)]
struct RenderReport {
    sample_rate: u32,
    frames: u64,
    input: SignalStats,
    output: SignalStats,
    parameters: Vec<ParameterEntry>,
}

#[derive(Serialize)]
struct ParameterInfo {
    effect: &'static str,
    name: &'static str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'static [&'static str]>,
    default: ParameterValue,
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Load the given file, or the user config (created on first run).
///
/// A relative preset directory is resolved against the config file's directory.
async fn load_config(path: Option<PathBuf>) -> anyhow::Result<RackConfig> {
    let (mut config, base) = match path {
        Some(path) => {
            let config = RackConfig::load_from_file(&path)
                .await
                .with_context(|| format!("loading {}", path.display()))?;
            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (config, base)
        }
        None => {
            let manager = ConfigManager::new(ConfigManager::default_config_dir()?);
            let config = manager.load().await;
            (config, manager.config_dir().to_path_buf())
        }
    };

    config.app.preset_dir = config.app.preset_dir_in(&base);
    debug!(preset_dir = %config.app.preset_dir.display(), "Configuration resolved");
    Ok(config)
}

fn apply_override(store: &ParameterStore, name: &str, raw: &str) -> anyhow::Result<()> {
    let setting = match raw {
        "true" => ParameterSetting::Bool(true),
        "false" => ParameterSetting::Bool(false),
        _ => match raw.parse::<f32>() {
            Ok(n) => ParameterSetting::Number(n),
            Err(_) => ParameterSetting::Label(raw.to_string()),
        },
    };

    let kind = store.kind(name)?;
    let stored = store.set(name, setting.to_value(name, kind)?)?;
    debug!(name, ?stored, "Override applied");
    Ok(())
}

async fn render(
    config: Option<PathBuf>,
    preset: Option<String>,
    overrides: Vec<(String, String)>,
    blocks: usize,
    frequency: f32,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(config).await?;
    let sample_rate = config.app.sample_rate;

    let rack = stock_rack(sample_rate)?;
    config.apply_parameters(rack.store());

    if let Some(name) = preset {
        let presets = PresetManager::new(config.app.preset_dir.clone());
        let applied = presets.load_preset(&name).await?.apply(rack.store());
        info!(name = %name, applied, "Preset applied");
    }

    for (name, raw) in &overrides {
        apply_override(rack.store(), name, raw)
            .with_context(|| format!("applying {}={}", name, raw))?;
    }

    let mut engine = RackEngine::new(rack, &config.app)?;
    let mut tone = LoopPlayer::sine(frequency, sample_rate, sample_rate as usize)?;

    let channels = engine.channels();
    let mut buffer = vec![0.0; engine.block_len()];
    let mut input = SignalStats::default();
    let mut output = SignalStats::default();

    for _ in 0..blocks {
        for frame in buffer.chunks_exact_mut(channels) {
            let x = tone.next_sample();
            input.add(x);
            frame.fill(x);
        }

        engine.process_interleaved(&mut buffer);

        for frame in buffer.chunks_exact(channels) {
            output.add(frame[0]);
        }
    }

    let report = RenderReport {
        sample_rate,
        frames: engine.frames_processed(),
        input: input.finish(),
        output: output.finish(),
        parameters: engine
            .store()
            .snapshot()
            .into_iter()
            .map(|(name, value)| ParameterEntry { name, value })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Rendered {} frames at {} Hz",
            report.frames, report.sample_rate
        );
        println!(
            "  input:  peak {:.4}  rms {:.4}",
            report.input.peak, report.input.rms
        );
        println!(
            "  output: peak {:.4}  rms {:.4}",
            report.output.peak, report.output.rms
        );
        for entry in &report.parameters {
            println!("  {:<30} {}", entry.name, describe(entry.value));
        }
    }

    Ok(())
}

fn describe(value: ParameterValue) -> String {
    match value {
        ParameterValue::Bool(b) => String::from(if b { "on" } else { "off" }),
        ParameterValue::Float(f) => format!("{}", f),
        ParameterValue::Choice(i) => format!("#{}", i),
    }
}

fn params(json: bool) -> anyhow::Result<()> {
    let bundles = stock_bundles();
    let infos: Vec<ParameterInfo> = bundles
        .iter()
        .flat_map(|bundle| {
            bundle.params().iter().map(move |param| {
                let kind = param.kind();
                let (range, labels) = match kind {
                    ParameterKind::Float { min, max, .. } => (Some([min, max]), None),
                    ParameterKind::Choice { labels, .. } => (None, Some(labels)),
                    ParameterKind::Bool { .. } => (None, None),
                };
                ParameterInfo {
                    effect: bundle.name(),
                    name: param.name(),
                    kind: kind.type_name(),
                    range,
                    labels,
                    default: kind.default_value(),
                }
            })
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    for info in &infos {
        let domain = match (info.range, info.labels) {
            (Some([min, max]), _) => format!("[{}, {}]", min, max),
            (_, Some(labels)) => labels.join("|"),
            _ => String::new(),
        };
        println!(
            "{:<12} {:<30} {:<6} {:<16} default {}",
            info.effect,
            info.name,
            info.kind,
            domain,
            describe(info.default)
        );
    }

    Ok(())
}

async fn presets(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config).await?;
    let manager = PresetManager::new(config.app.preset_dir.clone());

    let names = manager.list_presets().await?;
    if names.is_empty() {
        println!("No presets in {}", manager.preset_dir().display());
    }
    for name in names {
        println!("{}", name);
    }

    Ok(())
}

async fn watch(
    config: Option<PathBuf>,
    preset: Option<String>,
    seconds: Option<u64>,
    frequency: f32,
) -> anyhow::Result<()> {
    let config = load_config(config).await?;
    let sample_rate = config.app.sample_rate;
    let preset_dir = config.app.preset_dir.clone();

    let rack = stock_rack(sample_rate)?;
    config.apply_parameters(rack.store());

    let surface = Arc::new(ControlSurface::new(
        Arc::clone(rack.store()),
        PresetManager::new(preset_dir.clone()),
    ));
    if let Some(name) = preset {
        if let CommandResult::Error(e) = surface.execute(ControlCommand::LoadPreset { name }).await {
            bail!(e);
        }
    }

    let watcher = ConfigWatcher::new(preset_dir.clone()).await?;
    let follower = {
        let surface = Arc::clone(&surface);
        let changes = watcher.subscribe();
        tokio::spawn(async move { surface.follow_presets(changes).await })
    };

    let mut engine = RackEngine::new(rack, &config.app)?;
    engine.set_source(Some(LoopPlayer::sine(
        frequency,
        sample_rate,
        sample_rate as usize,
    )?));

    let output_scope = engine.output_scope();
    let mut scope_frame = vec![0.0; config.app.scope_capacity];
    let mut buffer = vec![0.0; engine.block_len()];

    let block_period = Duration::from_secs_f64(engine.block_size() as f64 / sample_rate as f64);
    let mut blocks = tokio::time::interval(block_period);
    blocks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut meter = tokio::time::interval(Duration::from_secs(1));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let deadline = tokio::time::sleep(Duration::from_secs(seconds.unwrap_or(0)));
    tokio::pin!(deadline);

    info!(preset_dir = %preset_dir.display(), "Watching presets");

    loop {
        tokio::select! {
            _ = blocks.tick() => engine.process_interleaved(&mut buffer),
            _ = meter.tick() => {
                let n = output_scope.copy_snapshot(&mut scope_frame);
                let peak = scope_frame[..n].iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
                info!(frames = engine.frames_processed(), peak, "Output level");
            }
            _ = &mut shutdown => break,
            _ = &mut deadline, if seconds.is_some() => break,
        }
    }

    drop(watcher);
    let reloads = follower.await?;
    println!(
        "Processed {} frames, {} preset reloads",
        engine.frames_processed(),
        reloads
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("fxrack starting");

    match cli.command {
        Command::Render {
            config,
            preset,
            overrides,
            blocks,
            frequency,
            json,
        } => {
            if blocks == 0 {
                bail!("--blocks must be at least 1");
            }
            render(config, preset, overrides, blocks, frequency, json).await
        }
        Command::Params { json } => params(json),
        Command::Presets { config } => presets(config).await,
        Command::Watch {
            config,
            preset,
            seconds,
            frequency,
        } => watch(config, preset, seconds, frequency).await,
    }
}
