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
use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc,
    },
};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{midi::mmc::MmcEvent, transport::Sequencer};

/// The MIDI input an action can be bound to.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKey {
    ControlChange { controller: u8 },
    Note { note: u8 },
    ProgramChange,
    Mmc { event: MmcEvent },
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKey::ControlChange { controller } => write!(f, "CC {}", controller),
            ActionKey::Note { note } => write!(f, "NOTE {}", note),
            ActionKey::ProgramChange => write!(f, "PROGRAM_CHANGE"),
            ActionKey::Mmc { event } => write!(f, "{}", event),
        }
    }
}

/// An action that can be bound to MIDI input.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Play,
    Stop,
    Pause,
    PlayPauseToggle,
    Rewind,
    FastForward,
    RecordReady,
    RecordStrobe,
    RecordExit,
    /// Selects the instrument whose index is the incoming value.
    SelectInstrument,
    /// Sets the output level to the incoming value over 127.
    MasterVolume,
}

/// A single binding as written in the configuration.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionBinding {
    pub key: ActionKey,
    pub action: Action,
}

/// The lookup table from MIDI input to actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiMap {
    bindings: HashMap<ActionKey, Action>,
}

impl MidiMap {
    /// A map with no bindings at all.
    pub fn empty() -> MidiMap {
        MidiMap {
            bindings: HashMap::new(),
        }
    }

    /// Binds a key, replacing any existing binding. Returns the replaced action.
    pub fn bind(&mut self, key: ActionKey, action: Action) -> Option<Action> {
        self.bindings.insert(key, action)
    }

    /// Removes a binding.
    pub fn unbind(&mut self, key: &ActionKey) -> Option<Action> {
        self.bindings.remove(key)
    }

    pub fn get(&self, key: &ActionKey) -> Option<Action> {
        self.bindings.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Creates the default map with the given bindings applied on top.
    pub fn with_bindings(bindings: &[ActionBinding]) -> MidiMap {
        let mut map = MidiMap::default();
        for binding in bindings {
            map.bind(binding.key, binding.action);
        }
        map
    }
}

impl Default for MidiMap {
    /// Every MMC event is bound to its transport action.
    fn default() -> Self {
        let mut map = MidiMap::empty();
        for event in MmcEvent::ALL {
            let action = match event {
                MmcEvent::Stop => Action::Stop,
                MmcEvent::Play => Action::Play,
                MmcEvent::FastForward => Action::FastForward,
                MmcEvent::Rewind => Action::Rewind,
                MmcEvent::RecordStrobe => Action::RecordStrobe,
                MmcEvent::RecordExit => Action::RecordExit,
                MmcEvent::RecordReady => Action::RecordReady,
                MmcEvent::Pause => Action::Pause,
            };
            map.bind(ActionKey::Mmc { event }, action);
        }
        map
    }
}

/// The output level, shared with the audio callback.
#[derive(Debug)]
pub struct MasterVolume {
    /// The level as f32 bits.
    bits: AtomicU32,
}

impl MasterVolume {
    pub fn new(level: f32) -> MasterVolume {
        MasterVolume {
            bits: AtomicU32::new(level.clamp(0.0, 1.0).to_bits()),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: f32) {
        self.bits
            .store(level.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

impl Default for MasterVolume {
    fn default() -> Self {
        MasterVolume::new(1.0)
    }
}

/// Executes bound actions.
pub struct ActionManager {
    map: MidiMap,
    sequencer: Arc<dyn Sequencer>,
    selected_instrument: AtomicUsize,
    master_volume: Arc<MasterVolume>,
}

impl ActionManager {
    pub fn new(map: MidiMap, sequencer: Arc<dyn Sequencer>) -> ActionManager {
        ActionManager {
            map,
            sequencer,
            selected_instrument: AtomicUsize::new(0),
            master_volume: Arc::new(MasterVolume::default()),
        }
    }

    pub fn map(&self) -> &MidiMap {
        &self.map
    }

    pub fn sequencer(&self) -> &Arc<dyn Sequencer> {
        &self.sequencer
    }

    pub fn selected_instrument(&self) -> usize {
        self.selected_instrument.load(Ordering::Acquire)
    }

    pub fn select_instrument(&self, instrument: usize) {
        self.selected_instrument.store(instrument, Ordering::Release);
    }

    pub fn master_volume(&self) -> Arc<MasterVolume> {
        self.master_volume.clone()
    }

    /// Looks up the key and executes the bound action. Returns false if nothing
    /// is bound or the action was not handled.
    pub fn handle_key(&self, key: ActionKey, value: u8) -> bool {
        match self.map.get(&key) {
            Some(action) => {
                debug!(%key, ?action, value, "Bound action");
                self.handle(action, value)
            }
            None => false,
        }
    }

    /// Executes an action with the given value. Returns whether it was handled.
    pub fn handle(&self, action: Action, value: u8) -> bool {
        let sequencer = &self.sequencer;
        match action {
            Action::Play => sequencer.play(),
            Action::Stop => sequencer.stop(),
            Action::Pause => {
                if sequencer.is_playing() {
                    sequencer.stop();
                }
            }
            Action::PlayPauseToggle => {
                if sequencer.is_playing() {
                    sequencer.stop();
                } else {
                    sequencer.play();
                }
            }
            Action::Rewind => {
                let column = sequencer.column();
                sequencer.locate_to_column(column.saturating_sub(1));
            }
            Action::FastForward => {
                let column = sequencer.column();
                sequencer.locate_to_column(column.saturating_add(1));
            }
            Action::RecordReady => {
                if sequencer.is_playing() {
                    return false;
                }
                sequencer.set_recording(!sequencer.is_recording());
            }
            Action::RecordStrobe => {
                if !sequencer.is_recording() {
                    sequencer.set_recording(true);
                }
                if !sequencer.is_playing() {
                    sequencer.play();
                }
            }
            Action::RecordExit => {
                if sequencer.is_recording() {
                    sequencer.set_recording(false);
                }
            }
            Action::SelectInstrument => {
                info!(instrument = value, "Instrument selected");
                self.select_instrument(usize::from(value));
            }
            Action::MasterVolume => {
                self.master_volume.set(f32::from(value) / 127.0);
            }
        }
        true
    }
}
