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
use std::{error::Error, fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use crate::{
    audio::{
        configure_audio_thread_priority, rt_audio_enabled, callback_thread_priority,
        Device as AudioDevice, Renderer,
    },
    config,
};

/// A running output stream. The stream itself lives on its own thread.
struct Output {
    stop: Sender<()>,
    thread: thread::JoinHandle<()>,
}

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Output channel count.
    channels: u16,
    sample_rate: u32,
    /// The stream buffer size in frames. None lets the backend decide.
    stream_buffer_size: Option<u32>,
    /// Interleaved samples rendered per pass for integer formats.
    max_buffer_size: usize,
    output: Mutex<Option<Output>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// f32 callback: render straight into the cpal buffer.
fn create_f32_callback(
    mut renderer: Renderer,
    channels: usize,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
        renderer.render_interleaved(data, channels);
    }
}

/// Integer callback: render into a preallocated scratch buffer and convert.
fn create_converting_callback<T: cpal::Sample + cpal::FromSample<f32> + Send + 'static>(
    mut renderer: Renderer,
    channels: usize,
    max_buffer_size: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    let mut scratch = vec![0.0f32; max_buffer_size.max(1) * channels];
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
        for chunk in data.chunks_mut(scratch.len()) {
            let temp = &mut scratch[..chunk.len()];
            renderer.render_interleaved(temp, channels);
            for (dst, &src) in chunk.iter_mut().zip(temp.iter()) {
                *dst = T::from_sample(src);
            }
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices with at least one output channel.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        channels: max_channels.min(2),
                        sample_rate: config::DEFAULT_SAMPLE_RATE,
                        stream_buffer_size: None,
                        max_buffer_size: config::DEFAULT_BUFFER_SIZE,
                        output: Mutex::new(None),
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. The name "default" picks the default output
    /// of the default host.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let mut device = if name == "default" {
            let host = cpal::default_host();
            let Some(device) = host.default_output_device() else {
                return Err("no default output device".into());
            };
            let max_channels = device
                .supported_output_configs()?
                .map(|output_config| output_config.channels())
                .max()
                .unwrap_or(0);
            Device {
                name: device.name()?,
                max_channels,
                host_id: host.id(),
                device,
                channels: 2,
                sample_rate: config::DEFAULT_SAMPLE_RATE,
                stream_buffer_size: None,
                max_buffer_size: config::DEFAULT_BUFFER_SIZE,
                output: Mutex::new(None),
            }
        } else {
            match Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
            {
                Some(device) => device,
                None => return Err(format!("no device found with name {}", name).into()),
            }
        };

        if device.max_channels < 1 {
            return Err(format!("device {} has no output channels", name).into());
        }
        device.channels = config.channels().min(device.max_channels).max(1);
        device.sample_rate = config.sample_rate();
        device.stream_buffer_size = config.stream_buffer_size();
        device.max_buffer_size = config.buffer_size();
        Ok(device)
    }
}

impl AudioDevice for Device {
    fn start(&self, renderer: Renderer) -> Result<(), Box<dyn Error>> {
        let mut output = self.output.lock();
        if output.is_some() {
            return Err(format!("output stream already running on {}", self.name).into());
        }

        let sample_format = self.device.default_output_config()?.sample_format();
        let stream_config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: match self.stream_buffer_size {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };
        let channels = usize::from(self.channels);
        let max_buffer_size = self.max_buffer_size;
        let device = self.device.clone();
        let name = self.name.clone();

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        // cpal streams are not Send on every host, so the stream is built and
        // dropped on the thread that owns it.
        let thread = thread::spawn(move || {
            let span = span!(Level::INFO, "audio output", device = name);
            let _enter = span.enter();

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => device.build_output_stream(
                    &stream_config,
                    create_f32_callback(renderer, channels),
                    |err| error!("CPAL output stream error: {}", err),
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_output_stream(
                    &stream_config,
                    create_converting_callback::<i16>(renderer, channels, max_buffer_size),
                    |err| error!("CPAL output stream error: {}", err),
                    None,
                ),
                cpal::SampleFormat::I32 => device.build_output_stream(
                    &stream_config,
                    create_converting_callback::<i32>(renderer, channels, max_buffer_size),
                    |err| error!("CPAL output stream error: {}", err),
                    None,
                ),
                other => {
                    let _ = ready_tx.send(Err(format!("unsupported sample format {:?}", other)));
                    return;
                }
            };

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to create CPAL stream: {}", e)));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start CPAL stream: {}", e)));
                return;
            }
            info!("CPAL output stream started");
            let _ = ready_tx.send(Ok(()));

            // Hold the stream until asked to stop.
            let _ = stop_rx.recv();
            drop(stream);
            info!("CPAL output stream stopped");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                *output = Some(Output {
                    stop: stop_tx,
                    thread,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e.into())
            }
            Err(_) => {
                let _ = thread.join();
                Err("audio output thread exited unexpectedly".into())
            }
        }
    }

    fn stop(&self) {
        let Some(output) = self.output.lock().take() else {
            return;
        };
        let _ = output.stop.send(());
        if output.thread.join().is_err() {
            error!(device = self.name, "Audio output thread panicked");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<std::sync::Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
