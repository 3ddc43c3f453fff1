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

//! Voices and their insertion-ordered bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// One sounding instance of an instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct Voice {
    /// Unique ID for this voice.
    id: u64,
    /// The instrument index this voice plays.
    instrument: usize,
    /// The MIDI note that triggered this voice, used by keyboard note offs.
    note: Option<u8>,
    /// Velocity scaled to 0.0-1.0.
    velocity: f32,
    /// The synth frame at which this voice started.
    start_frame: u64,
    /// Inactive voices stay in the list but contribute nothing to the mix.
    active: bool,
}

impl Voice {
    /// Creates a new active voice.
    pub fn new(instrument: usize, note: Option<u8>, velocity: f32, start_frame: u64) -> Self {
        Self {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst),
            instrument,
            note,
            velocity: velocity.clamp(0.0, 1.0),
            start_frame,
            active: true,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn instrument(&self) -> usize {
        self.instrument
    }

    pub fn note(&self) -> Option<u8> {
        self.note
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// Active voices in the order they were started.
#[derive(Debug, Default)]
pub struct VoiceList {
    voices: Vec<Voice>,
}

impl VoiceList {
    /// Creates a list with room for `capacity` voices before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            voices: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    /// Removes the oldest voice playing the given instrument. Order of the
    /// remaining voices is preserved.
    pub fn remove_first_instrument(&mut self, instrument: usize) -> Option<Voice> {
        let index = self
            .voices
            .iter()
            .position(|voice| voice.instrument == instrument)?;
        Some(self.voices.remove(index))
    }

    /// Removes the oldest voice triggered by the given note.
    pub fn remove_first_note(&mut self, note: u8) -> Option<Voice> {
        let index = self
            .voices
            .iter()
            .position(|voice| voice.note == Some(note))?;
        Some(self.voices.remove(index))
    }

    /// Removes every voice of the given instrument triggered by the given
    /// note. Returns how many were removed.
    pub fn remove_retriggered(&mut self, instrument: usize, note: Option<u8>) -> usize {
        let before = self.voices.len();
        self.voices
            .retain(|voice| voice.instrument != instrument || voice.note != note);
        before - self.voices.len()
    }

    pub fn is_instrument_playing(&self, instrument: usize) -> bool {
        self.voices
            .iter()
            .any(|voice| voice.active && voice.instrument == instrument)
    }

    pub fn count_for(&self, instrument: usize) -> usize {
        self.voices
            .iter()
            .filter(|voice| voice.instrument == instrument)
            .count()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Clears all voices, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.voices.len();
        self.voices.clear();
        count
    }
}
