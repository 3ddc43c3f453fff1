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

//! The voice scheduler and its render loop.
//!
//! The synth owns every sounding voice. MIDI handling adds and removes voices
//! from the event thread while the audio callback renders them, so the synth
//! is shared through [`SharedSynth`], whose render side never waits for the lock.

mod voice;

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::Deserialize;
use tracing::debug;

pub use voice::{Voice, VoiceList};

/// Frequency of the test tone every voice renders.
pub const VOICE_FREQUENCY_HZ: f32 = 220.0;

/// Default number of voices preallocated before the list grows.
pub const DEFAULT_VOICE_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SynthError {
    #[error("note not found for instrument {0}")]
    NoteNotFound(usize),
    #[error("note not found for key {0}")]
    KeyNotFound(u8),
}

/// What a note on does to voices already playing the same instrument.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// Voices of the same instrument started by the same key are removed
    /// first. Every drum pad reaches its instrument through one key, so a
    /// drum instrument never has more than one voice.
    #[default]
    Steal,
    /// Every note on adds a voice.
    Stack,
}

/// A simple polyphonic synth with a single shared phase accumulator.
pub struct Synth {
    /// Active voices in insertion order.
    voices: VoiceList,
    /// Output sample rate.
    sample_rate: u32,
    /// Phase shared by every voice.
    theta: f32,
    /// Phase increment per rendered sample.
    step: f32,
    /// Total frames rendered so far.
    frames_rendered: u64,
    retrigger: RetriggerPolicy,
    /// Left output buffer for `render`.
    out_l: Vec<f32>,
    /// Right output buffer for `render`.
    out_r: Vec<f32>,
}

impl Synth {
    /// Creates a new synth. `max_buffer_size` frames are preallocated for
    /// `render`.
    pub fn new(sample_rate: u32, max_buffer_size: usize, voice_capacity: usize) -> Self {
        Self {
            voices: VoiceList::with_capacity(voice_capacity),
            sample_rate,
            theta: 0.0,
            step: TAU * VOICE_FREQUENCY_HZ / sample_rate.max(1) as f32,
            frames_rendered: 0,
            retrigger: RetriggerPolicy::default(),
            out_l: vec![0.0; max_buffer_size],
            out_r: vec![0.0; max_buffer_size],
        }
    }

    pub fn with_retrigger(mut self, retrigger: RetriggerPolicy) -> Self {
        self.retrigger = retrigger;
        self
    }

    pub fn retrigger(&self) -> RetriggerPolicy {
        self.retrigger
    }

    /// Starts a new voice. Returns the voice ID.
    pub fn note_on(&mut self, instrument: usize, note: Option<u8>, velocity: f32) -> u64 {
        let stolen = match self.retrigger {
            RetriggerPolicy::Steal => self.voices.remove_retriggered(instrument, note),
            RetriggerPolicy::Stack => 0,
        };
        let voice = Voice::new(instrument, note, velocity, self.frames_rendered);
        let id = voice.id();
        debug!(instrument, velocity, id, stolen, "Note on");
        self.voices.push(voice);
        id
    }

    /// Stops the oldest voice playing the given instrument.
    pub fn note_off(&mut self, instrument: usize) -> Result<Voice, SynthError> {
        self.voices
            .remove_first_instrument(instrument)
            .ok_or(SynthError::NoteNotFound(instrument))
    }

    /// Stops the oldest voice triggered by the given key.
    pub fn note_off_key(&mut self, note: u8) -> Result<Voice, SynthError> {
        self.voices
            .remove_first_note(note)
            .ok_or(SynthError::KeyNotFound(note))
    }

    /// Stops all voices. Returns how many were stopped.
    pub fn all_notes_off(&mut self) -> usize {
        self.voices.clear()
    }

    pub fn is_instrument_playing(&self, instrument: usize) -> bool {
        self.voices.is_instrument_playing(instrument)
    }

    pub fn voices(&self) -> &VoiceList {
        &self.voices
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voices_for(&self, instrument: usize) -> usize {
        self.voices.count_for(instrument)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Renders into the given buffers. The frame count is the shorter of the
    /// two lengths. Does not allocate.
    pub fn render_into(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);
        left.fill(0.0);
        right.fill(0.0);

        for voice in self.voices.iter().filter(|voice| voice.is_active()) {
            let amplitude = voice.velocity();
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                let value = self.theta.sin() * amplitude;
                *l += value;
                *r += value;

                self.theta += self.step;
                if self.theta >= TAU {
                    self.theta -= TAU;
                }
            }
        }

        self.frames_rendered += frames as u64;
    }

    /// Renders `frames` frames into the internal buffers and returns them. The
    /// buffers grow when a request is larger than any before it, so the audio
    /// callback uses `render_into` instead.
    pub fn render(&mut self, frames: usize) -> (&[f32], &[f32]) {
        if frames > self.out_l.len() {
            debug!(
                frames,
                previous = self.out_l.len(),
                "Growing render buffers"
            );
            self.out_l.resize(frames, 0.0);
            self.out_r.resize(frames, 0.0);
        }
        let mut left = std::mem::take(&mut self.out_l);
        let mut right = std::mem::take(&mut self.out_r);
        self.render_into(&mut left[..frames], &mut right[..frames]);
        self.out_l = left;
        self.out_r = right;
        (&self.out_l[..frames], &self.out_r[..frames])
    }
}

impl std::fmt::Debug for Synth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synth")
            .field("active_voices", &self.voices.len())
            .field("sample_rate", &self.sample_rate)
            .field("frames_rendered", &self.frames_rendered)
            .field("retrigger", &self.retrigger)
            .finish()
    }
}

/// A synth shared between the MIDI event thread and the audio callback.
#[derive(Clone)]
pub struct SharedSynth {
    synth: Arc<Mutex<Synth>>,
    /// Render ticks replaced with silence because the event thread held the lock.
    skipped_ticks: Arc<AtomicU64>,
}

impl SharedSynth {
    pub fn new(synth: Synth) -> Self {
        Self {
            synth: Arc::new(Mutex::new(synth)),
            skipped_ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Locks the synth for note handling. Must not be called from the render callback.
    pub fn lock(&self) -> MutexGuard<'_, Synth> {
        self.synth.lock()
    }

    /// Renders one tick from the audio callback. If the lock is held the
    /// buffers are filled with silence and the tick is skipped. Returns true
    /// if the voices were rendered.
    pub fn render_into(&self, left: &mut [f32], right: &mut [f32]) -> bool {
        match self.synth.try_lock() {
            Some(mut synth) => {
                synth.render_into(left, right);
                true
            }
            None => {
                left.fill(0.0);
                right.fill(0.0);
                self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::Relaxed)
    }
}
