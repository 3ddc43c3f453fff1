// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use drumtrack::midi::mmc::{self, SysexFrame};
use drumtrack::midi::MessageType;
use drumtrack::notify::{Notification, Notifier, DEFAULT_NOTIFICATION_CAPACITY};
use drumtrack::{audio, config, engine, midi};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=MIDI drum trigger engine

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/drumtrack
ExecStart=/usr/local/bin/drumtrack start "$DRUMTRACK_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=drumtrack.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI drum trigger engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the engine with the given config file.
    Start {
        /// The path to the engine config.
        config_path: String,
    },
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Lists the available audio output devices.
    AudioDevices {},
    /// Classifies a raw MIDI event given as hex bytes, e.g. "90 24 7f".
    Decode {
        /// The bytes of the event.
        bytes: Vec<String>,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => {
            let config = config::load(&PathBuf::from(&config_path))?;
            info!(
                config = config_path,
                session = engine::describe_session(config.session()),
                "Starting engine"
            );

            let (notifier, notifications) = Notifier::bounded(DEFAULT_NOTIFICATION_CAPACITY);
            let engine = engine::Engine::start(config, notifier)?;

            // The engine runs until the process is terminated.
            for notification in notifications.iter() {
                match notification {
                    Notification::NoteRecorded { instrument, length } => {
                        info!(instrument, length, "Note length recorded");
                    }
                    notification => debug!(%notification, "Notification"),
                }
            }
            engine.stop();
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No MIDI input devices found.");
                return Ok(());
            }

            println!("MIDI input devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::AudioDevices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No audio output devices found.");
                return Ok(());
            }

            println!("Audio output devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Decode { bytes } => {
            let raw = parse_hex(&bytes)?;
            let message = midi::classify(&raw);
            println!("{}", message);

            if message.kind() == MessageType::SysEx {
                match mmc::interpret(message.sysex_data()) {
                    SysexFrame::Command { device_id, command } => {
                        println!("MMC command {:?} (device {})", command, device_id)
                    }
                    SysexFrame::UnknownCommand { device_id, code } => {
                        println!("Unknown MMC command {} (device {})", code, device_id)
                    }
                    SysexFrame::Dump => println!("SysEx: {}", mmc::hex_dump(&raw)),
                }
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE);
        }
    };

    Ok(())
}

/// Parses hex bytes. Each argument may hold several bytes separated by spaces.
fn parse_hex(args: &[String]) -> Result<Vec<u8>, Box<dyn Error>> {
    args.iter()
        .flat_map(|arg| arg.split_whitespace())
        .map(|byte| {
            let byte = byte.trim_start_matches("0x");
            u8::from_str_radix(byte, 16)
                .map_err(|e| -> Box<dyn Error> { format!("invalid byte {}: {}", byte, e).into() })
        })
        .collect()
}
