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

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_VOICE_CAPACITY: usize = crate::synth::DEFAULT_VOICE_CAPACITY;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Audio {
    /// The audio device. "default" uses the default output device.
    device: String,

    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// The most frames rendered in one pass (default: 1024).
    buffer_size: Option<usize>,

    /// The cpal stream buffer size in frames. Unset uses the backend default.
    stream_buffer_size: Option<u32>,

    /// Output channels (default: 2). Channels beyond the second are silent.
    channels: Option<u16>,

    /// Voices preallocated by the synth (default: 64).
    voice_capacity: Option<usize>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            buffer_size: None,
            stream_buffer_size: None,
            channels: None,
            voice_capacity: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    pub fn stream_buffer_size(&self) -> Option<u32> {
        self.stream_buffer_size
    }

    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn voice_capacity(&self) -> usize {
        self.voice_capacity.unwrap_or(DEFAULT_VOICE_CAPACITY)
    }
}

impl Default for Audio {
    fn default() -> Self {
        Audio::new("default")
    }
}
