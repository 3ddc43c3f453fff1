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

//! Instruments and the session (song) that owns them.
//!
//! Instruments are only ever looked up by the MIDI pipeline; the list is built
//! from configuration and replaced wholesale when a new session is loaded.

use std::fmt;

use serde::Deserialize;

/// Lowest value of the hi-hat controller range.
pub const CC_MIN: u8 = 0;

/// Highest value of the hi-hat controller range.
pub const CC_MAX: u8 = 127;

/// A playable instrument.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Instrument {
    /// The display name of the instrument.
    name: String,

    /// Instruments sharing a hi-hat group are selected by pedal position.
    #[serde(default)]
    hihat_group: Option<i32>,

    /// The inclusive controller range [low, high] this instrument answers to
    /// within its hi-hat group.
    #[serde(default = "default_cc_range")]
    cc_range: [u8; 2],

    /// Explicit note binding used by fixed mapping mode.
    #[serde(default)]
    midi_note: Option<u8>,
}

fn default_cc_range() -> [u8; 2] {
    [CC_MIN, CC_MAX]
}

impl Instrument {
    pub fn new(name: &str) -> Instrument {
        Instrument {
            name: name.to_string(),
            hihat_group: None,
            cc_range: default_cc_range(),
            midi_note: None,
        }
    }

    /// Places the instrument in a hi-hat group answering to [low, high].
    pub fn with_hihat(mut self, group: i32, low: u8, high: u8) -> Instrument {
        self.hihat_group = Some(group);
        self.cc_range = [low, high];
        self
    }

    /// Binds the instrument to a MIDI note for fixed mapping mode.
    pub fn with_midi_note(mut self, note: u8) -> Instrument {
        self.midi_note = Some(note);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The hi-hat group, if any. Negative groups are treated as no group.
    pub fn hihat_group(&self) -> Option<i32> {
        self.hihat_group.filter(|group| *group >= 0)
    }

    pub fn cc_range_low(&self) -> u8 {
        self.cc_range[0]
    }

    pub fn cc_range_high(&self) -> u8 {
        self.cc_range[1]
    }

    /// Returns true if the controller value falls within this instrument's range.
    pub fn accepts_cc(&self, value: u8) -> bool {
        value >= self.cc_range_low() && value <= self.cc_range_high()
    }

    pub fn midi_note(&self) -> Option<u8> {
        self.midi_note
    }
}

/// An ordered list of instruments. The position in the list is the instrument index.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct InstrumentList {
    instruments: Vec<Instrument>,
}

impl InstrumentList {
    pub fn new(instruments: Vec<Instrument>) -> InstrumentList {
        InstrumentList { instruments }
    }

    pub fn get(&self, index: usize) -> Option<&Instrument> {
        self.instruments.get(index)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    /// Returns the index of the first instrument bound to the given note.
    pub fn find_midi_note(&self, note: u8) -> Option<usize> {
        self.instruments
            .iter()
            .position(|instrument| instrument.midi_note() == Some(note))
    }
}

/// A loaded song with its drumkit.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    /// The name of the session.
    name: String,

    /// The instruments of the loaded kit.
    instruments: InstrumentList,
}

impl Session {
    pub fn new(name: &str, instruments: InstrumentList) -> Session {
        Session {
            name: name.to_string(),
            instruments,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instruments(&self) -> &InstrumentList {
        &self.instruments
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Instruments={})", self.name, self.instruments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_midi_note_first_match() {
        let list = InstrumentList::new(vec![
            Instrument::new("kick").with_midi_note(36),
            Instrument::new("snare").with_midi_note(38),
            Instrument::new("snare 2").with_midi_note(38),
        ]);
        assert_eq!(list.find_midi_note(38), Some(1));
        assert_eq!(list.find_midi_note(36), Some(0));
        assert_eq!(list.find_midi_note(40), None);
    }

    #[test]
    fn test_hihat_range() {
        let closed = Instrument::new("closed").with_hihat(1, 0, 42);
        assert_eq!(closed.hihat_group(), Some(1));
        assert!(closed.accepts_cc(0));
        assert!(closed.accepts_cc(42));
        assert!(!closed.accepts_cc(43));

        let plain = Instrument::new("kick");
        assert_eq!(plain.hihat_group(), None);
        assert!(plain.accepts_cc(127));
    }

    #[test]
    fn test_negative_group_is_no_group() {
        let instrument = Instrument::new("tom").with_hihat(-1, 0, 10);
        assert_eq!(instrument.hihat_group(), None);
    }
}
