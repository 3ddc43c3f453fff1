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
use std::path::Path;

use ::config::{Config, File, FileFormat};

mod audio;
mod engine;
mod error;
mod midi;

pub use self::audio::{Audio, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE};
pub use self::engine::Engine;
pub use self::error::ConfigError;
pub use self::midi::Midi;

/// Loads and validates the engine configuration from a file. The format
/// follows the file extension.
pub fn load(path: &Path) -> Result<Engine, ConfigError> {
    let engine: Engine = Config::builder()
        .add_source(File::from(path))
        .build()?
        .try_deserialize()?;
    engine.validate()?;
    Ok(engine)
}

/// Parses and validates the engine configuration from a YAML string.
pub fn parse(yaml: &str) -> Result<Engine, ConfigError> {
    let engine: Engine = Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    engine.validate()?;
    Ok(engine)
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;
    use crate::{
        actions::{Action, ActionKey},
        midi::mmc::MmcEvent,
        resolver::SelectionMode,
        synth::RetriggerPolicy,
    };

    #[test]
    fn test_minimal() {
        let engine = parse(
            r#"
            midi:
              device: mock-drums
            "#,
        )
        .expect("parse");

        assert_eq!(engine.midi().device(), "mock-drums");
        assert_eq!(engine.audio().device(), "default");
        assert_eq!(engine.audio().sample_rate(), DEFAULT_SAMPLE_RATE);
        assert_eq!(engine.audio().buffer_size(), DEFAULT_BUFFER_SIZE);
        assert!(engine.session().is_none());

        let settings = engine.dispatch_settings().expect("settings");
        assert_eq!(settings.filter.channel(), None);
        assert_eq!(settings.selection_mode, SelectionMode::Offset);
        assert!(!settings.note_off_ignore);
        assert_eq!(engine.retrigger(), RetriggerPolicy::Steal);
        assert_eq!(engine.midi_map(), crate::actions::MidiMap::default());
    }

    #[test]
    fn test_full() {
        let engine = parse(
            r#"
            midi:
              device: mock-drums
              channel: 10
            audio:
              device: mock-out
              sample_rate: 48000
              buffer_size: 256
              channels: 4
            selection_mode: fixed_mapping
            retrigger: stack
            discard_note_after_action: true
            note_off_ignore: true
            record_events: true
            actions:
              - key:
                  type: control_change
                  controller: 7
                action: master_volume
              - key:
                  type: program_change
                action: select_instrument
              - key:
                  type: mmc
                  event: MMC_PLAY
                action: play_pause_toggle
            session:
              name: Studio kit
              instruments:
                - name: Kick
                  midi_note: 36
                - name: Hi-hat closed
                  hihat_group: 0
                  cc_range: [0, 40]
                - name: Hi-hat open
                  hihat_group: 0
                  cc_range: [41, 127]
            "#,
        )
        .expect("parse");

        let settings = engine.dispatch_settings().expect("settings");
        assert_eq!(settings.filter.channel(), Some(9));
        assert_eq!(settings.selection_mode, SelectionMode::FixedMapping);
        assert!(settings.discard_note_after_action);
        assert!(settings.note_off_ignore);
        assert!(settings.record_events);
        assert_eq!(engine.retrigger(), RetriggerPolicy::Stack);

        assert_eq!(engine.audio().sample_rate(), 48000);
        assert_eq!(engine.audio().buffer_size(), 256);
        assert_eq!(engine.audio().channels(), 4);

        let map = engine.midi_map();
        assert_eq!(
            map.get(&ActionKey::ControlChange { controller: 7 }),
            Some(Action::MasterVolume)
        );
        assert_eq!(
            map.get(&ActionKey::ProgramChange),
            Some(Action::SelectInstrument)
        );
        assert_eq!(
            map.get(&ActionKey::Mmc {
                event: MmcEvent::Play
            }),
            Some(Action::PlayPauseToggle)
        );
        assert_eq!(
            map.get(&ActionKey::Mmc {
                event: MmcEvent::Stop
            }),
            Some(Action::Stop)
        );

        let session = engine.session().expect("session");
        assert_eq!(session.name(), "Studio kit");
        let instruments = session.instruments();
        assert_eq!(instruments.len(), 3);
        assert_eq!(instruments.find_midi_note(36), Some(0));
        let closed = instruments.get(1).expect("closed hi-hat");
        assert_eq!(closed.hihat_group(), Some(0));
        assert_eq!(closed.cc_range_high(), 40);
        let kick = instruments.get(0).expect("kick");
        assert_eq!(kick.hihat_group(), None);
        assert_eq!(kick.cc_range_low(), 0);
        assert_eq!(kick.cc_range_high(), 127);
    }

    #[test]
    fn test_invalid_channel() {
        let result = parse(
            r#"
            midi:
              device: mock-drums
              channel: 17
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidChannel(17))));
    }

    #[test]
    fn test_invalid_buffer_size() {
        let result = parse(
            r#"
            midi:
              device: mock-drums
            audio:
              device: mock-out
              buffer_size: 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidBufferSize)));
    }

    #[test]
    fn test_unknown_action() {
        let result = parse(
            r#"
            midi:
              device: mock-drums
            actions:
              - key:
                  type: program_change
                action: launch_rocket
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_load_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("drumtrack.yaml");
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "midi:\n  device: mock-drums\n  channel: 1")?;
        drop(file);

        let engine = load(&path)?;
        assert_eq!(engine.dispatch_settings()?.filter.channel(), Some(0));

        assert!(matches!(
            load(&dir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
        Ok(())
    }
}
