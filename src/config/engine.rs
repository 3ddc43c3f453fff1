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
use serde::Deserialize;

use super::{Audio, ConfigError, Midi};
use crate::{
    actions::{ActionBinding, MidiMap},
    dispatch::DispatchSettings,
    instruments::Session,
    resolver::SelectionMode,
    synth::RetriggerPolicy,
};

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Engine {
    /// The MIDI input.
    midi: Midi,

    /// The audio output. Defaults to the default output device.
    #[serde(default)]
    audio: Audio,

    /// How notes map to instruments.
    #[serde(default)]
    selection_mode: SelectionMode,

    /// What a note on does to a voice already playing the same instrument.
    #[serde(default)]
    retrigger: RetriggerPolicy,

    /// Skip note resolution when a bound note action handled the note.
    #[serde(default)]
    discard_note_after_action: bool,

    /// Ignore note offs. Cymbal chokes still apply.
    #[serde(default)]
    note_off_ignore: bool,

    /// Report note lengths to the sequencer.
    #[serde(default)]
    record_events: bool,

    /// Action bindings applied on top of the default MMC bindings.
    #[serde(default)]
    actions: Vec<ActionBinding>,

    /// The session to load at startup.
    session: Option<Session>,
}

impl Engine {
    pub fn new(midi: Midi, audio: Audio) -> Engine {
        Engine {
            midi,
            audio,
            selection_mode: SelectionMode::default(),
            retrigger: RetriggerPolicy::default(),
            discard_note_after_action: false,
            note_off_ignore: false,
            record_events: false,
            actions: Vec::new(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: Session) -> Engine {
        self.session = Some(session);
        self
    }

    pub fn midi(&self) -> &Midi {
        &self.midi
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn retrigger(&self) -> RetriggerPolicy {
        self.retrigger
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the action map: the default bindings with the configured ones applied.
    pub fn midi_map(&self) -> MidiMap {
        MidiMap::with_bindings(&self.actions)
    }

    /// Returns the dispatch settings.
    pub fn dispatch_settings(&self) -> Result<DispatchSettings, ConfigError> {
        Ok(DispatchSettings {
            filter: self.midi.channel_filter()?,
            selection_mode: self.selection_mode,
            discard_note_after_action: self.discard_note_after_action,
            note_off_ignore: self.note_off_ignore,
            record_events: self.record_events,
        })
    }

    /// Checks values that can't be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.midi.channel_filter()?;
        if self.audio.buffer_size() == 0 {
            return Err(ConfigError::InvalidBufferSize);
        }
        if self.audio.sample_rate() == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        Ok(())
    }
}
