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
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

/// How many recorded notes are kept before the oldest is dropped.
pub const RECORDED_NOTE_CAPACITY: usize = 256;

/// The playback and recording collaborator that MIDI transport commands drive.
pub trait Sequencer: Send + Sync {
    /// Returns true if the sequencer is playing.
    fn is_playing(&self) -> bool;

    /// Starts playback from the current position.
    fn play(&self);

    /// Stops playback, keeping the current position.
    fn stop(&self);

    /// Moves the play position to the start of the given column.
    fn locate_to_column(&self, column: u32);

    /// The current column.
    fn column(&self) -> u32;

    /// The monotonic tick clock.
    fn tick(&self) -> u64;

    fn set_recording(&self, recording: bool);

    fn is_recording(&self) -> bool;

    /// Records a note of the given length that started at `note_on_tick`.
    fn record_note_length(&self, instrument: usize, length: f32, note_on_tick: u64);
}

/// A recorded note length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedNote {
    pub instrument: usize,
    pub length: f32,
    pub note_on_tick: u64,
}

/// The built in sequencer. The tick clock advances with the frames rendered
/// while playing and is reset whenever the position is moved.
#[derive(Debug, Default)]
pub struct Transport {
    playing: AtomicBool,
    recording: AtomicBool,
    column: AtomicU32,
    tick: AtomicU64,
    /// The most recent note lengths, oldest first, until taken.
    recorded: Mutex<VecDeque<RecordedNote>>,
}

impl Transport {
    pub fn new() -> Transport {
        Transport::default()
    }

    /// Takes the recorded notes, leaving none behind.
    pub fn take_recorded_notes(&self) -> Vec<RecordedNote> {
        self.recorded.lock().drain(..).collect()
    }

    /// Advances the tick clock. Called from the render callback.
    pub fn advance(&self, frames: u64) {
        if self.playing.load(Ordering::Relaxed) {
            self.tick.fetch_add(frames, Ordering::Relaxed);
        }
    }

    /// Notes recorded and not yet taken.
    pub fn recorded_notes(&self) -> Vec<RecordedNote> {
        self.recorded.lock().iter().copied().collect()
    }
}

impl Sequencer for Transport {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    fn play(&self) {
        if !self.playing.swap(true, Ordering::AcqRel) {
            info!(column = self.column(), "Transport playing");
        }
    }

    fn stop(&self) {
        if self.playing.swap(false, Ordering::AcqRel) {
            info!(column = self.column(), "Transport stopped");
        }
    }

    fn locate_to_column(&self, column: u32) {
        self.column.store(column, Ordering::Release);
        self.tick.store(0, Ordering::Release);
        info!(column, "Transport located");
    }

    fn column(&self) -> u32 {
        self.column.load(Ordering::Acquire)
    }

    fn tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Release);
        info!(recording, "Transport record mode");
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    fn record_note_length(&self, instrument: usize, length: f32, note_on_tick: u64) {
        let mut recorded = self.recorded.lock();
        if recorded.len() == RECORDED_NOTE_CAPACITY {
            if let Some(dropped) = recorded.pop_front() {
                debug!(instrument = dropped.instrument, "Recorded note dropped");
            }
        }
        recorded.push_back(RecordedNote {
            instrument,
            length,
            note_on_tick,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_play_stop() {
        let transport = Transport::new();
        assert!(!transport.is_playing());
        transport.play();
        transport.play();
        assert!(transport.is_playing());
        transport.stop();
        assert!(!transport.is_playing());
    }

    #[test]
    fn test_ticks_advance_only_while_playing() {
        let transport = Transport::new();
        transport.advance(128);
        assert_eq!(transport.tick(), 0);

        transport.play();
        transport.advance(128);
        transport.advance(64);
        assert_eq!(transport.tick(), 192);

        transport.stop();
        transport.advance(64);
        assert_eq!(transport.tick(), 192);
    }

    #[test]
    fn test_locate_resets_ticks() {
        let transport = Transport::new();
        transport.play();
        transport.advance(500);
        transport.locate_to_column(3);
        assert_eq!(transport.column(), 3);
        assert_eq!(transport.tick(), 0);
        assert!(transport.is_playing());
    }

    #[test]
    fn test_record_note_length() {
        let transport = Transport::new();
        transport.set_recording(true);
        assert!(transport.is_recording());
        transport.record_note_length(2, 48.0, 10);
        assert_eq!(
            transport.recorded_notes(),
            vec![RecordedNote {
                instrument: 2,
                length: 48.0,
                note_on_tick: 10
            }]
        );
    }

    #[test]
    fn test_recorded_notes_are_bounded() {
        let transport = Transport::new();
        for i in 0..10_000 {
            transport.record_note_length(0, 1.0, i);
        }
        let recorded = transport.recorded_notes();
        assert_eq!(recorded.len(), RECORDED_NOTE_CAPACITY);
        assert_eq!(
            recorded.first().map(|note| note.note_on_tick),
            Some(10_000 - RECORDED_NOTE_CAPACITY as u64)
        );
        assert_eq!(recorded.last().map(|note| note.note_on_tick), Some(9_999));

        assert_eq!(transport.take_recorded_notes().len(), RECORDED_NOTE_CAPACITY);
        assert!(transport.recorded_notes().is_empty());
    }
}
