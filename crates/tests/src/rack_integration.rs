//! Integration tests for the effects rack
//!
//! These tests drive the complete pipeline: declarations registered into a
//! store, effects bound through the sync, block/sample processing through the
//! engine, and control surfaces writing from other threads.

use fxrack_core::domain::config::{ConfigManager, ConfigWatcher, PresetManager, RackConfig};
use fxrack_core::domain::control::{CommandExecutor, CommandResult, ControlCommand, ControlSurface};
use fxrack_core::domain::dsp::{ClampEffect, GainEffect};
use fxrack_core::domain::effect::Effect;
use fxrack_core::domain::error::{RackError, Result};
use fxrack_core::domain::parameter::{
    Parameter, ParameterBundle, ParameterStack, ParameterValue,
};
use fxrack_core::domain::rack::Rack;
use fxrack_core::domain::stock::{stock_rack, STOCK_EFFECTS};
use fxrack_core::domain::store::ParameterStore;
use fxrack_infra::audio::{LoopPlayer, RackEngine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SAMPLE_RATE: u32 = 48000;

static GAIN: [Parameter; 2] = [
    Parameter::boolean("gainToggle", false),
    Parameter::float("gain", 0.0, 2.0, 1.0),
];

static CLAMP: [Parameter; 2] = [
    Parameter::boolean("clampToggle", true),
    Parameter::float("clampCeiling", 0.0, 4.0, 1.0),
];

fn gain_clamp_factory(bundle: &ParameterBundle<'_>) -> Result<Box<dyn Effect>> {
    match bundle.name() {
        "gain" => Ok(Box::new(GainEffect::new())),
        "clamp" => Ok(Box::new(ClampEffect::new())),
        other => Err(RackError::InvalidConfiguration(other.to_string())),
    }
}

fn gain_clamp_rack() -> Rack {
    let gain = ParameterBundle::new("gain", &GAIN);
    let clamp = ParameterBundle::new("clamp", &CLAMP);
    Rack::build(&ParameterStack::new([&gain, &clamp]), gain_clamp_factory).unwrap()
}

fn generate_sine_wave(frequency: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| 2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE as f32)
        .map(|phase| phase.sin())
        .collect()
}

fn bits(samples: &[f32]) -> Vec<u32> {
    samples.iter().map(|s| s.to_bits()).collect()
}

// ============================================================================
// SCENARIO TESTS
// ============================================================================

#[test]
fn test_gain_bypassed_clamp_applied() {
    let mut rack = gain_clamp_rack();

    let mut block = vec![0.5, 2.0, -3.0];
    rack.process_block(&mut block);

    assert_eq!(block, vec![0.5, 1.0, -1.0]);
}

#[test]
fn test_gain_enabled_then_clamped() {
    let mut rack = gain_clamp_rack();
    rack.store()
        .set("gainToggle", ParameterValue::Bool(true))
        .unwrap();
    rack.store().set("gain", ParameterValue::Float(1.5)).unwrap();

    let mut block = vec![0.5, 2.0, -3.0];
    rack.process_block(&mut block);

    assert_eq!(block, vec![0.75, 1.0, -1.0]);
}

#[test]
fn test_set_clamps_to_declared_range() {
    let rack = gain_clamp_rack();
    let store = rack.store();

    assert_eq!(
        store.set("gain", ParameterValue::Float(5.0)).unwrap(),
        ParameterValue::Float(2.0)
    );
    assert_eq!(
        store.set("gain", ParameterValue::Float(-1.0)).unwrap(),
        ParameterValue::Float(0.0)
    );
    assert_eq!(
        store.set("gain", ParameterValue::Float(0.3)).unwrap(),
        ParameterValue::Float(0.3)
    );
}

#[test]
fn test_duplicate_registration_leaves_store_unmodified() {
    let gain = ParameterBundle::new("gain", &GAIN);
    let mut store = ParameterStore::new();
    ParameterStack::new([&gain]).add_to_store(&mut store).unwrap();
    let before = store.snapshot();

    let clamp = ParameterBundle::new("clamp", &CLAMP);
    let err = ParameterStack::new([&clamp, &gain])
        .add_to_store(&mut store)
        .unwrap_err();

    assert_eq!(err, RackError::DuplicateParameter("gainToggle".to_string()));
    assert!(err.is_configuration());
    assert_eq!(store.snapshot(), before);
    assert!(!store.contains("clampToggle"));
}

#[test]
fn test_lookup_of_unknown_key() {
    let rack = gain_clamp_rack();
    let err = rack.store().get("reverbTime").unwrap_err();
    assert!(err.is_lookup());
}

// ============================================================================
// STOCK RACK TESTS
// ============================================================================

#[test]
fn test_stock_rack_bypassed_is_identity() {
    let mut rack = stock_rack(SAMPLE_RATE).unwrap();
    let input = generate_sine_wave(440.0, 2048);

    let mut block = input.clone();
    rack.process_block(&mut block);

    assert_eq!(bits(&block), bits(&input));
}

#[test]
fn test_stock_rack_is_deterministic() {
    let render = || {
        let mut rack = stock_rack(SAMPLE_RATE).unwrap();
        for name in ["chorus", "delay", "reverb", "tremolo"] {
            rack.store()
                .set(&format!("{}Toggle", name), ParameterValue::Bool(true))
                .unwrap();
        }

        let mut signal = generate_sine_wave(220.0, 8192);
        for block in signal.chunks_mut(512) {
            rack.process_block(block);
        }
        signal
    };

    assert_eq!(bits(&render()), bits(&render()));
}

#[test]
fn test_stock_rack_single_effect_changes_signal() {
    let input = generate_sine_wave(440.0, 4096);

    for name in STOCK_EFFECTS {
        let mut rack = stock_rack(SAMPLE_RATE).unwrap();
        rack.store()
            .set(&format!("{}Toggle", name), ParameterValue::Bool(true))
            .unwrap();

        let mut block = input.clone();
        rack.process_block(&mut block);

        assert!(block.iter().all(|s| s.is_finite()), "{} produced non-finite output", name);
        assert_ne!(bits(&block), bits(&input), "{} had no effect", name);
    }
}

#[test]
fn test_disabling_resets_effect_state() {
    let mut rack = stock_rack(SAMPLE_RATE).unwrap();
    let store = Arc::clone(rack.store());
    store.set("delayToggle", ParameterValue::Bool(true)).unwrap();
    store.set("delayTime", ParameterValue::Float(10.0)).unwrap();
    store.set("delayBlend", ParameterValue::Float(1.0)).unwrap();

    let mut loud = vec![1.0; 4800];
    rack.process_block(&mut loud);

    store.set("delayToggle", ParameterValue::Bool(false)).unwrap();
    rack.process_block(&mut [0.0; 16]);
    store.set("delayToggle", ParameterValue::Bool(true)).unwrap();

    // The old echo tail is gone, so silence in gives silence out
    let mut quiet = vec![0.0; 4800];
    rack.process_block(&mut quiet);
    assert!(quiet.iter().all(|&s| s == 0.0));
}

// ============================================================================
// CONCURRENCY TESTS
// ============================================================================

#[test]
fn test_control_thread_writes_during_processing() {
    let mut rack = stock_rack(SAMPLE_RATE).unwrap();
    let store = Arc::clone(rack.store());
    let running = Arc::new(AtomicBool::new(true));

    let writer = {
        let store = Arc::clone(&store);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut i = 0u32;
            while running.load(Ordering::Relaxed) {
                let on = i % 2 == 0;
                store.set("tremoloToggle", ParameterValue::Bool(on)).unwrap();
                store
                    .set("tremoloDepth", ParameterValue::Float((i % 100) as f32 / 100.0))
                    .unwrap();
                store
                    .set("tremoloShape", ParameterValue::Choice((i % 3) as usize))
                    .unwrap();
                i = i.wrapping_add(1);
            }
        })
    };

    let mut block = vec![0.0; 256];
    for n in 0..200 {
        block.copy_from_slice(&generate_sine_wave(440.0 + n as f32, 256));
        rack.process_block(&mut block);
        assert!(block.iter().all(|s| s.is_finite() && s.abs() <= 1.0 + 1e-6));
    }

    running.store(false, Ordering::Relaxed);
    writer.join().unwrap();

    // Every value the audio side can see is one that was written whole
    match store.get("tremoloDepth").unwrap() {
        ParameterValue::Float(v) => assert!((0.0..=0.99).contains(&v)),
        other => panic!("unexpected value {:?}", other),
    }
}

#[test]
fn test_engine_scopes_read_from_render_thread() {
    let rack = gain_clamp_rack();
    let config = RackConfig::default();
    let mut engine = RackEngine::new(rack, &config.app).unwrap();
    engine.set_source(Some(LoopPlayer::sine(440.0, SAMPLE_RATE, 480).unwrap()));

    let output_scope = engine.output_scope();
    let reader = thread::spawn(move || {
        let mut frame = vec![0.0; 512];
        let mut seen = 0;
        for _ in 0..1_000 {
            let n = output_scope.copy_snapshot(&mut frame);
            assert!(frame[..n].iter().all(|s| s.abs() <= 1.0));
            seen = seen.max(n);
        }
        seen
    });

    let mut buffer = vec![0.0; engine.block_len()];
    for _ in 0..50 {
        engine.process_interleaved(&mut buffer);
    }
    reader.join().unwrap();

    assert_eq!(engine.frames_processed(), 50 * config.app.block_size as u64);
    assert_eq!(engine.output_scope().len(), config.app.scope_capacity);
}

// ============================================================================
// CONTROL SURFACE TESTS
// ============================================================================

#[tokio::test]
async fn test_preset_reload_reaches_audio_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut rack = gain_clamp_rack();
    let surface = ControlSurface::new(
        Arc::clone(rack.store()),
        PresetManager::new(dir.path().to_path_buf()),
    );

    for (name, value) in [
        ("gainToggle", ParameterValue::Bool(true)),
        ("gain", ParameterValue::Float(0.5)),
    ] {
        let result = surface
            .execute(ControlCommand::SetParameter {
                name: name.to_string(),
                value,
            })
            .await;
        assert!(!result.is_error());
    }

    let saved = surface
        .execute(ControlCommand::SavePreset {
            name: "half".to_string(),
        })
        .await;
    assert!(!saved.is_error());

    rack.store().reset_to_defaults();
    let mut block = vec![0.8];
    rack.process_block(&mut block);
    assert_eq!(block, vec![0.8]);

    let loaded = surface
        .execute(ControlCommand::LoadPreset {
            name: "half".to_string(),
        })
        .await;
    assert!(matches!(loaded, CommandResult::PresetLoaded { applied: 4, .. }));

    let mut block = vec![0.8];
    rack.process_block(&mut block);
    assert_eq!(block, vec![0.4]);
}

#[tokio::test]
async fn test_config_file_drives_stock_rack() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    tokio::fs::write(
        &path,
        r#"
[app]
sample_rate = 44100
channels = 1

[parameters]
tremoloToggle = true
tremoloDepth = 1.0
tremoloShape = "square"
tremoloSpeed = 50.0
"#,
    )
    .await
    .unwrap();

    let config = RackConfig::load_from_file(&path).await.unwrap();
    let rack = stock_rack(config.app.sample_rate).unwrap();
    assert_eq!(config.apply_parameters(rack.store()), 4);

    let store = rack.store();
    assert_eq!(store.get("tremoloShape").unwrap(), ParameterValue::Choice(2));
    assert_eq!(store.get("tremoloSpeed").unwrap(), ParameterValue::Float(20.0));

    let mut engine = RackEngine::new(rack, &config.app).unwrap();
    let mut buffer = vec![1.0; 64];
    engine.process_interleaved(&mut buffer);

    // Full-depth square tremolo mutes its first half-cycle
    assert!(buffer.iter().all(|&s| s == 0.0));
    assert_eq!(engine.input_scope().snapshot(), vec![1.0; 64]);
}

#[tokio::test]
async fn test_config_manager_factory_default_builds_bypassed_rack() {
    let dir = tempfile::TempDir::new().unwrap();
    let manager = ConfigManager::new(dir.path().to_path_buf());

    let config = manager.load().await;
    assert!(manager.exists());
    assert_eq!(
        config.app.preset_dir_in(manager.config_dir()),
        dir.path().join("presets")
    );

    let mut rack = stock_rack(config.app.sample_rate).unwrap();
    assert_eq!(config.apply_parameters(rack.store()), rack.store().len());

    let input = generate_sine_wave(440.0, 1024);
    let mut block = input.clone();
    rack.process_block(&mut block);
    assert_eq!(bits(&block), bits(&input));
}

#[tokio::test]
async fn test_preset_file_change_reaches_audio_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut rack = gain_clamp_rack();
    let surface = Arc::new(ControlSurface::new(
        Arc::clone(rack.store()),
        PresetManager::new(dir.path().to_path_buf()),
    ));

    let watcher = ConfigWatcher::new(dir.path().to_path_buf()).await.unwrap();
    let follower = {
        let surface = Arc::clone(&surface);
        let changes = watcher.subscribe();
        tokio::spawn(async move { surface.follow_presets(changes).await })
    };

    // Another process edits the preset directory
    tokio::fs::write(
        dir.path().join("double.toml"),
        "[parameters]\nclampCeiling = 4.0\ngain = 2.0\ngainToggle = true\n",
    )
    .await
    .unwrap();

    let store = Arc::clone(rack.store());
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.get("gainToggle").unwrap() != ParameterValue::Bool(true) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("preset was not reloaded");

    let mut block = vec![0.5, 1.5];
    rack.process_block(&mut block);
    assert_eq!(block, vec![1.0, 3.0]);

    drop(watcher);
    let reloads = tokio::time::timeout(Duration::from_secs(5), follower)
        .await
        .expect("follower did not stop")
        .unwrap();
    assert!(reloads >= 1);
}
