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
use std::{error::Error, sync::Arc, thread};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use crate::{
    actions::ActionManager,
    audio::{self, Renderer},
    config,
    dispatch::Dispatcher,
    instruments::Session,
    midi,
    notify::Notifier,
    synth::{SharedSynth, Synth},
    transport::Transport,
};

/// Capacity of the channel between the MIDI input callback and the dispatch thread.
const MIDI_EVENT_CAPACITY: usize = 256;

/// A running engine: MIDI input feeding the dispatcher on one thread, and the
/// audio output rendering the synth on another.
pub struct Engine {
    midi_device: Arc<dyn midi::Device>,
    audio_device: Arc<dyn audio::Device>,
    transport: Arc<Transport>,
    actions: Arc<ActionManager>,
    synth: SharedSynth,
    dispatch_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Engine {
    /// Opens the configured devices and starts processing.
    pub fn start(config: config::Engine, notifier: Notifier) -> Result<Engine, Box<dyn Error>> {
        let midi_device = midi::get_device(config.midi().device())?;
        let audio_device = audio::get_device(config.audio())?;
        Engine::start_with_devices(config, notifier, midi_device, audio_device)
    }

    /// Starts processing with the given devices.
    pub fn start_with_devices(
        config: config::Engine,
        notifier: Notifier,
        midi_device: Arc<dyn midi::Device>,
        audio_device: Arc<dyn audio::Device>,
    ) -> Result<Engine, Box<dyn Error>> {
        let settings = config.dispatch_settings()?;
        let audio_config = config.audio();

        let transport = Arc::new(Transport::new());
        let actions = Arc::new(ActionManager::new(config.midi_map(), transport.clone()));
        let synth = SharedSynth::new(Synth::new(
            audio_device.sample_rate(),
            audio_config.buffer_size(),
            audio_config.voice_capacity(),
        )
        .with_retrigger(config.retrigger()));

        let mut dispatcher = Dispatcher::new(settings, synth.clone(), actions.clone(), notifier);
        if config.session().is_none() {
            warn!("No session configured, notes will be dropped until one is loaded");
        }
        dispatcher.set_session(config.session().cloned().map(Arc::new));

        audio_device.start(Renderer::new(
            synth.clone(),
            transport.clone(),
            actions.master_volume(),
            audio_config.buffer_size(),
        ))?;

        let (events_tx, events_rx) = crossbeam_channel::bounded::<Vec<u8>>(MIDI_EVENT_CAPACITY);
        let device_name = midi_device.name();
        let dispatch_thread = thread::spawn(move || dispatch_events(dispatcher, events_rx, device_name));

        if let Err(e) = midi_device.watch_events(events_tx) {
            audio_device.stop();
            if dispatch_thread.join().is_err() {
                error!("Dispatch thread panicked");
            }
            return Err(e);
        }

        info!(
            midi_device = midi_device.name(),
            audio_device = audio_device.to_string(),
            "Engine started"
        );

        Ok(Engine {
            midi_device,
            audio_device,
            transport,
            actions,
            synth,
            dispatch_thread: Mutex::new(Some(dispatch_thread)),
        })
    }

    /// Stops watching MIDI, waits for the dispatch thread to drain and stops audio.
    pub fn stop(&self) {
        self.midi_device.stop_watch_events();
        if let Some(dispatch_thread) = self.dispatch_thread.lock().take() {
            if dispatch_thread.join().is_err() {
                error!("Dispatch thread panicked");
            }
        }
        self.audio_device.stop();
        self.synth.lock().all_notes_off();
        info!(
            skipped_ticks = self.synth.skipped_ticks(),
            "Engine stopped"
        );
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn actions(&self) -> &Arc<ActionManager> {
        &self.actions
    }

    pub fn synth(&self) -> &SharedSynth {
        &self.synth
    }
}

/// Handles raw events until every sender is dropped.
fn dispatch_events(mut dispatcher: Dispatcher, events: Receiver<Vec<u8>>, device_name: String) {
    let span = span!(Level::INFO, "MIDI dispatch", device = device_name);
    let _enter = span.enter();

    info!("MIDI dispatch started.");
    for raw_event in events.iter() {
        if let Err(e) = dispatcher.dispatch(&raw_event) {
            debug!(err = %e, "Event dropped");
        }
    }
    info!("MIDI watcher closed.");
}

/// Returns a session summary for diagnostics.
pub fn describe_session(session: Option<&Session>) -> String {
    match session {
        Some(session) => session.to_string(),
        None => "none".to_string(),
    }
}
