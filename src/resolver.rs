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

//! Resolution of MIDI notes to instrument indices.

use serde::Deserialize;
use tracing::debug;

use crate::instruments::InstrumentList;

/// The note mapped to instrument 0 in offset mode.
pub const NOTE_OFFSET: u8 = 36;

/// The controller that reports hi-hat pedal position.
pub const HIHAT_OPENNESS_CC: u8 = 4;

/// Default pedal position: fully open.
pub const DEFAULT_HIHAT_OPENNESS: u8 = 127;

/// How notes are mapped to instruments.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Every note plays the currently selected instrument.
    SelectedInstrument,
    /// Notes are looked up in the instruments' explicit note bindings.
    FixedMapping,
    /// Note 36 plays instrument 0, note 37 instrument 1 and so on.
    #[default]
    Offset,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("note {0} is below the lowest mapped pad")]
    BelowLowestPad(u8),
    #[error("can't find corresponding instrument for note {0}")]
    NoInstrument(u8),
    #[error("selected instrument {0} does not exist")]
    NoSelection(usize),
}

impl ResolveError {
    /// Notes below the pad range are expected traffic and are not worth a warning.
    pub fn is_silent(&self) -> bool {
        matches!(self, ResolveError::BelowLowestPad(_))
    }
}

/// Controller values that influence note resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerState {
    hihat_openness: u8,
}

impl Default for ControllerState {
    fn default() -> Self {
        ControllerState {
            hihat_openness: DEFAULT_HIHAT_OPENNESS,
        }
    }
}

/// Maps notes to instruments. Owns the controller state, which lives as long as
/// the dispatcher and is never shared with the render thread.
#[derive(Debug, Default)]
pub struct Resolver {
    controllers: ControllerState,
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver::default()
    }

    pub fn hihat_openness(&self) -> u8 {
        self.controllers.hihat_openness
    }

    /// Tracks controllers that affect resolution. Returns true if the
    /// controller was consumed.
    pub fn track_control_change(&mut self, controller: u8, value: u8) -> bool {
        if controller != HIHAT_OPENNESS_CC {
            return false;
        }
        self.controllers.hihat_openness = value;
        debug!(openness = value, "Hi-hat openness changed");
        true
    }

    /// Resolves a note on, applying the hi-hat group override.
    pub fn resolve_note_on(
        &self,
        note: u8,
        mode: SelectionMode,
        instruments: &InstrumentList,
        selected: usize,
    ) -> Result<usize, ResolveError> {
        let index = resolve(note, mode, instruments, selected)?;
        Ok(self.hihat_override(index, instruments))
    }

    /// Resolves a note off. Pedal position is not consulted.
    pub fn resolve_note_off(
        &self,
        note: u8,
        mode: SelectionMode,
        instruments: &InstrumentList,
        selected: usize,
    ) -> Result<usize, ResolveError> {
        resolve(note, mode, instruments, selected)
    }

    /// If the instrument is part of a hi-hat group and the pedal position is
    /// outside its range, picks the first instrument of the same group that
    /// accepts the position. Keeps the original when none does.
    fn hihat_override(&self, index: usize, instruments: &InstrumentList) -> usize {
        let openness = self.controllers.hihat_openness;
        let Some(instrument) = instruments.get(index) else {
            return index;
        };
        let Some(group) = instrument.hihat_group() else {
            return index;
        };
        if instrument.accepts_cc(openness) {
            return index;
        }

        match instruments.iter().position(|candidate| {
            candidate.hihat_group() == Some(group) && candidate.accepts_cc(openness)
        }) {
            Some(replacement) => {
                debug!(
                    from = index,
                    to = replacement,
                    openness,
                    "Hi-hat instrument reassigned"
                );
                replacement
            }
            None => index,
        }
    }
}

fn resolve(
    note: u8,
    mode: SelectionMode,
    instruments: &InstrumentList,
    selected: usize,
) -> Result<usize, ResolveError> {
    match mode {
        SelectionMode::SelectedInstrument => {
            if selected < instruments.len() {
                Ok(selected)
            } else {
                Err(ResolveError::NoSelection(selected))
            }
        }
        SelectionMode::FixedMapping => instruments
            .find_midi_note(note)
            .ok_or(ResolveError::NoInstrument(note)),
        SelectionMode::Offset => {
            let Some(index) = note.checked_sub(NOTE_OFFSET) else {
                return Err(ResolveError::BelowLowestPad(note));
            };
            let index = usize::from(index);
            if index >= instruments.len() {
                return Err(ResolveError::NoInstrument(note));
            }
            Ok(index)
        }
    }
}
