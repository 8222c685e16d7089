use std::path::PathBuf;

use clap::{Parser, Subcommand};
use midir::MidiInput;
use showdeck_core::{merge_params, ConfigManager, OVERLAY_BASE_URL};

/// MIDI control surface for live mixer automation and stream overlays.
#[derive(Parser, Debug)]
#[command(name = "showdeck")]
#[command(about = "Showdeck mixer control surface")]
struct Args {
    /// Path to the config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available MIDI input devices
    Devices,
    /// Show the effective configuration
    Config,
    /// Merge an overlay parameter into an existing parameter string
    Merge {
        /// Current overlay parameter string (may be empty)
        #[arg(long, default_value = "")]
        existing: String,
        /// New parameter fragment, e.g. "bg=rain&fg=none"
        parameter: String,
    },
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Devices => list_devices(),
        Command::Config => show_config(args.config),
        Command::Merge { existing, parameter } => {
            let merged = merge_params(&existing, &parameter);
            println!("{}", merged);
            println!("{}{}", OVERLAY_BASE_URL, merged);
            Ok(())
        }
    }
}

fn list_devices() -> Result<(), anyhow::Error> {
    let midi_in = MidiInput::new("showdeck")?;
    let ports = midi_in.ports();
    if ports.is_empty() {
        println!("No MIDI input devices found");
        return Ok(());
    }

    println!("Available MIDI input devices:");
    for port in &ports {
        match midi_in.port_name(port) {
            Ok(name) => println!("  {}", name),
            Err(e) => log::warn!("Failed to read port name: {}", e),
        }
    }
    Ok(())
}

fn show_config(path: Option<PathBuf>) -> Result<(), anyhow::Error> {
    let mut manager = ConfigManager::new(path);
    let settings = manager.load()?;

    println!("Config file: {}", manager.config_path().display());
    println!("Mixer: {}:{}", settings.mixer.host, settings.mixer.port);
    println!("Music source: {}", settings.mixer.music_source_name);
    if settings.midi.device.is_empty() {
        println!("MIDI device: (none configured)");
    } else {
        println!("MIDI device: {}", settings.midi.device);
    }
    println!("Bindings: {}", settings.binding_table().len());
    Ok(())
}
