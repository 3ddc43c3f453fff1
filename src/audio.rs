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
use std::{error::Error, fmt, sync::Arc};

use crate::{actions::MasterVolume, config, synth::SharedSynth, transport::Transport};

pub mod cpal;
pub mod mock;
mod thread_priority;

pub use self::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};

/// An audio output that pulls rendered frames from the synth.
pub trait Device: fmt::Display + Send + Sync {
    /// Starts the output stream, which renders through the given renderer
    /// until stopped.
    fn start(&self, renderer: Renderer) -> Result<(), Box<dyn Error>>;

    /// Stops the output stream. Does nothing if it is not running.
    fn stop(&self);

    /// The sample rate the device runs at.
    fn sample_rate(&self) -> u32;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device for the given configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, config.sample_rate())));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

/// Pulls frames from the synth and writes them to interleaved device buffers.
/// All buffers are allocated up front; rendering never allocates.
pub struct Renderer {
    synth: SharedSynth,
    transport: Arc<Transport>,
    volume: Arc<MasterVolume>,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Renderer {
    pub fn new(
        synth: SharedSynth,
        transport: Arc<Transport>,
        volume: Arc<MasterVolume>,
        max_buffer_size: usize,
    ) -> Renderer {
        let max_buffer_size = max_buffer_size.max(1);
        Renderer {
            synth,
            transport,
            volume,
            left: vec![0.0; max_buffer_size],
            right: vec![0.0; max_buffer_size],
        }
    }

    /// Fills an interleaved buffer. Left goes to the first channel, right to the
    /// second and any further channels are silent. Requests larger than the
    /// buffer size are rendered in several passes.
    pub fn render_interleaved(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let volume = self.volume.get();
        let block = self.left.len();

        for chunk in output.chunks_mut(block * channels) {
            let frames = chunk.len() / channels;
            let (left, right) = (&mut self.left[..frames], &mut self.right[..frames]);
            self.synth.render_into(left, right);
            self.transport.advance(frames as u64);

            chunk.fill(0.0);
            for (frame, (l, r)) in chunk
                .chunks_exact_mut(channels)
                .zip(left.iter().zip(right.iter()))
            {
                frame[0] = l * volume;
                if channels > 1 {
                    frame[1] = r * volume;
                }
            }
        }
    }
}
