//! Example walking through configuration, presets and the control surface
//!
//! Run with: cargo run --package fxrack-core --example preset_demo

use std::sync::Arc;

use fxrack_core::domain::config::{PresetManager, RackConfig};
use fxrack_core::domain::control::{CommandExecutor, CommandResult, ControlCommand, ControlSurface};
use fxrack_core::domain::parameter::ParameterValue;
use fxrack_core::domain::stock::stock_rack;

fn peak(block: &[f32]) -> f32 {
    block.iter().fold(0.0, |acc, s| acc.max(s.abs()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("fxrack_core=debug,info")
        .init();

    println!("=== fxrack Preset Demo ===\n");

    let workdir = tempfile::TempDir::new()?;

    // 1. Factory defaults round-trip through TOML
    println!("1. Writing factory default configuration...");
    let config_path = workdir.path().join("config.toml");
    RackConfig::factory_default().save_to_file(&config_path).await?;
    let config = RackConfig::load_from_file(&config_path).await?;
    println!(
        "   ✓ {} parameters at {} Hz",
        config.parameters.len(),
        config.app.sample_rate
    );

    // 2. Build the stock rack and apply the configuration
    println!("\n2. Building stock rack...");
    let mut rack = stock_rack(config.app.sample_rate)?;
    let applied = config.apply_parameters(rack.store());
    println!("   ✓ {} effects, {} values applied", rack.chain().len(), applied);

    // 3. Drive the store through a control surface
    println!("\n3. Control commands:");
    let surface = ControlSurface::new(
        Arc::clone(rack.store()),
        PresetManager::new(workdir.path().join("presets")),
    );

    let commands = vec![
        ControlCommand::SetParameter {
            name: "tremoloToggle".to_string(),
            value: ParameterValue::Bool(true),
        },
        ControlCommand::SetParameter {
            name: "tremoloDepth".to_string(),
            value: ParameterValue::Float(1.5),
        },
        ControlCommand::SavePreset {
            name: "deep-tremolo".to_string(),
        },
        ControlCommand::SetParameter {
            name: "warpDrive".to_string(),
            value: ParameterValue::Float(1.0),
        },
    ];

    for cmd in commands {
        println!("   {:?}", surface.execute(cmd).await);
    }

    // 4. The audio side sees the change at its next block
    println!("\n4. Processing one block...");
    let mut block = vec![0.5; 512];
    rack.process_block(&mut block);
    println!("   ✓ Output peak {:.3}", peak(&block));

    // 5. Back to defaults, then reload the preset
    println!("\n5. Reloading preset...");
    rack.store().reset_to_defaults();
    if let CommandResult::PresetLoaded { name, applied } = surface
        .execute(ControlCommand::LoadPreset {
            name: "deep-tremolo".to_string(),
        })
        .await
    {
        println!("   ✓ '{}' restored {} values", name, applied);
    }
    println!(
        "   tremoloDepth = {:?}",
        rack.store().get("tremoloDepth")?
    );

    println!("\n=== Demo Complete ===");
    Ok(())
}
