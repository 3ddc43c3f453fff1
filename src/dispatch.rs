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

//! The entry point for incoming MIDI. Each raw event is classified, filtered
//! and routed to note handling, controller tracking, bound actions or the
//! transport.

use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::{
    actions::{ActionKey, ActionManager},
    instruments::Session,
    midi::{
        classify,
        mmc::{self, SysexFrame, TransportCommand},
        ChannelFilter, Message, MessageType,
    },
    notify::{Notification, Notifier},
    resolver::{ResolveError, Resolver, SelectionMode},
    synth::SharedSynth,
};

/// Timing clock, sent 24 times per quarter note by clocked gear.
const TIMING_CLOCK: u8 = 0xF8;
/// Active sensing keep-alive.
const ACTIVE_SENSING: u8 = 0xFE;

/// The ratio between two adjacent semitones.
const SEMITONE_RATIO: f64 = 1.0594630943593;

/// Converts a pitch in semitones to a frequency ratio.
pub fn pitch_to_frequency(pitch: f64) -> f64 {
    SEMITONE_RATIO.powf(pitch)
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no session loaded")]
    NoSession,
    #[error("unknown MIDI message with status {0:#04x}")]
    Malformed(u8),
}

/// Behaviour switches for MIDI handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSettings {
    pub filter: ChannelFilter,
    pub selection_mode: SelectionMode,
    /// Skip note resolution when a note is bound to an action that handled it.
    pub discard_note_after_action: bool,
    /// Ignore note offs. Cymbal chokes still apply.
    pub note_off_ignore: bool,
    /// Report note lengths to the sequencer.
    pub record_events: bool,
}

/// The single note timing slot. It is shared by all notes, so overlapping
/// notes measure from the most recent note on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoteTiming {
    pub note_on_tick: u64,
    pub note_off_tick: u64,
}

impl NoteTiming {
    pub fn length(&self) -> u64 {
        self.note_off_tick.saturating_sub(self.note_on_tick)
    }
}

/// What handling a message did.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The message was not on the configured channel.
    Filtered,
    /// A voice was started.
    NoteOn { instrument: usize, voice: u64 },
    /// A note off was resolved. `released` is false if the instrument was not playing.
    NoteOff { instrument: usize, released: bool },
    /// The note off was ignored by configuration.
    Ignored,
    /// The note was consumed by a bound action.
    ActionOnly,
    /// The note did not map to an instrument.
    Rejected(ResolveError),
    /// A controller change. `handled` is true if a bound action ran.
    Controller { controller: u8, handled: bool },
    ProgramChange { handled: bool },
    /// A recognized MMC command.
    Mmc {
        command: TransportCommand,
        handled: bool,
    },
    /// An MMC frame with an unknown command code.
    UnknownMmc(u8),
    /// A SysEx frame that is not MMC.
    Dump,
    /// Start, continue or stop.
    Realtime(MessageType),
    /// A recognized message type with no handling.
    Unsupported(MessageType),
}

/// Routes MIDI messages. Runs on a single event thread.
pub struct Dispatcher {
    settings: DispatchSettings,
    session: Option<Arc<Session>>,
    resolver: Resolver,
    timing: NoteTiming,
    synth: SharedSynth,
    actions: Arc<ActionManager>,
    notifier: Notifier,
    last_event: Option<(String, i32)>,
}

impl Dispatcher {
    pub fn new(
        settings: DispatchSettings,
        synth: SharedSynth,
        actions: Arc<ActionManager>,
        notifier: Notifier,
    ) -> Dispatcher {
        Dispatcher {
            settings,
            session: None,
            resolver: Resolver::new(),
            timing: NoteTiming::default(),
            synth,
            actions,
            notifier,
            last_event: None,
        }
    }

    /// Loads or unloads the session.
    pub fn set_session(&mut self, session: Option<Arc<Session>>) {
        match &session {
            Some(session) => info!(session = session.name(), "Session loaded"),
            None => info!("Session unloaded"),
        }
        self.session = session;
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn set_filter(&mut self, filter: ChannelFilter) {
        self.settings.filter = filter;
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn timing(&self) -> NoteTiming {
        self.timing
    }

    /// The label and parameter of the last handled event.
    pub fn last_event(&self) -> Option<(&str, i32)> {
        self.last_event
            .as_ref()
            .map(|(label, parameter)| (label.as_str(), *parameter))
    }

    /// Classifies and handles a raw MIDI event.
    pub fn dispatch(&mut self, raw: &[u8]) -> Result<Outcome, DispatchError> {
        self.notifier.publish(Notification::MidiActivity);
        let message = classify(raw);
        self.handle(&message)
    }

    /// Handles a classified message.
    pub fn handle(&mut self, message: &Message) -> Result<Outcome, DispatchError> {
        if !self.settings.filter.is_admissible(message) {
            return Ok(Outcome::Filtered);
        }

        if message.kind() == MessageType::Unknown
            && matches!(message.status(), TIMING_CLOCK | ACTIVE_SENSING)
        {
            trace!(status = message.status(), "MIDI clock message ignored");
            return Ok(Outcome::Ignored);
        }

        let Some(session) = self.session.clone() else {
            error!(%message, "No session loaded, skipping message");
            return Err(DispatchError::NoSession);
        };

        let outcome = match message.kind() {
            MessageType::NoteOn if message.data2() == 0 => {
                self.note_off(&session, message.data1(), false)
            }
            MessageType::NoteOn => self.note_on(&session, message.data1(), message.data2()),
            MessageType::NoteOff => self.note_off(&session, message.data1(), false),
            MessageType::PolyKeyPressure => {
                if message.data2() == 127 {
                    self.note_off(&session, message.data1(), true)
                } else {
                    Outcome::Ignored
                }
            }
            MessageType::ControlChange => self.control_change(message.data1(), message.data2()),
            MessageType::ProgramChange => {
                let handled = self
                    .actions
                    .handle_key(ActionKey::ProgramChange, message.data1());
                self.set_last_event("PROGRAM_CHANGE", 0);
                Outcome::ProgramChange { handled }
            }
            MessageType::SysEx => self.sysex(message.sysex_data()),
            MessageType::Start => {
                let sequencer = self.actions.sequencer();
                if !sequencer.is_playing() {
                    sequencer.locate_to_column(0);
                    sequencer.play();
                }
                Outcome::Realtime(MessageType::Start)
            }
            MessageType::Continue => {
                let sequencer = self.actions.sequencer();
                if !sequencer.is_playing() {
                    sequencer.play();
                }
                Outcome::Realtime(MessageType::Continue)
            }
            MessageType::Stop => {
                let sequencer = self.actions.sequencer();
                if sequencer.is_playing() {
                    sequencer.stop();
                }
                Outcome::Realtime(MessageType::Stop)
            }
            kind @ (MessageType::ChannelPressure
            | MessageType::PitchWheel
            | MessageType::SongPos
            | MessageType::QuarterFrame) => {
                info!(%kind, "MIDI message not handled yet");
                self.notifier.publish(Notification::Unhandled(kind));
                Outcome::Unsupported(kind)
            }
            MessageType::Unknown => {
                error!(status = message.status(), "Unknown MIDI message type");
                return Err(DispatchError::Malformed(message.status()));
            }
        };

        Ok(outcome)
    }

    fn note_on(&mut self, session: &Session, note: u8, velocity: u8) -> Outcome {
        self.set_last_event("NOTE", i32::from(note));

        let handled = self.actions.handle_key(ActionKey::Note { note }, velocity);
        if handled && self.settings.discard_note_after_action {
            debug!(note, "Note consumed by action");
            return Outcome::ActionOnly;
        }

        let instrument = match self.resolver.resolve_note_on(
            note,
            self.settings.selection_mode,
            session.instruments(),
            self.actions.selected_instrument(),
        ) {
            Ok(instrument) => instrument,
            Err(e) => return self.rejected(note, e),
        };

        let velocity = f32::from(velocity) / 127.0;
        let voice = self
            .synth
            .lock()
            .note_on(instrument, Some(note), velocity);
        self.timing.note_on_tick = self.actions.sequencer().tick();

        Outcome::NoteOn { instrument, voice }
    }

    fn note_off(&mut self, session: &Session, note: u8, choke: bool) -> Outcome {
        if !choke && self.settings.note_off_ignore {
            return Outcome::Ignored;
        }

        let sequencer = self.actions.sequencer().clone();
        self.timing.note_off_tick = sequencer.tick();
        let length = self.timing.length();

        let mode = self.settings.selection_mode;
        let instrument = match self.resolver.resolve_note_off(
            note,
            mode,
            session.instruments(),
            self.actions.selected_instrument(),
        ) {
            Ok(instrument) => instrument,
            Err(e) => return self.rejected(note, e),
        };

        let step = if mode == SelectionMode::SelectedInstrument {
            pitch_to_frequency(f64::from(note))
        } else {
            1.0
        };

        {
            let mut synth = self.synth.lock();
            if !synth.is_instrument_playing(instrument) {
                return Outcome::NoteOff {
                    instrument,
                    released: false,
                };
            }
            let released = if mode == SelectionMode::SelectedInstrument {
                synth.note_off_key(note)
            } else {
                synth.note_off(instrument)
            };
            if let Err(e) = released {
                warn!(err = %e, note, instrument, "Note off failed");
            }
        }

        if self.settings.record_events {
            let length = (length as f64 * step) as f32;
            sequencer.record_note_length(instrument, length, self.timing.note_on_tick);
            self.notifier
                .publish(Notification::NoteRecorded { instrument, length });
        }

        Outcome::NoteOff {
            instrument,
            released: true,
        }
    }

    fn control_change(&mut self, controller: u8, value: u8) -> Outcome {
        let handled = self
            .actions
            .handle_key(ActionKey::ControlChange { controller }, value);
        self.resolver.track_control_change(controller, value);
        self.set_last_event("CC", i32::from(controller));
        Outcome::Controller {
            controller,
            handled,
        }
    }

    fn sysex(&mut self, frame: &[u8]) -> Outcome {
        match mmc::interpret(frame) {
            SysexFrame::Command { device_id, command } => {
                self.notifier.publish(Notification::Transport(command));
                let Some(event) = command.event() else {
                    if let TransportCommand::Goto(locate) = command {
                        error!(device_id, %locate, "MMC goto not implemented");
                    }
                    return Outcome::Mmc {
                        command,
                        handled: false,
                    };
                };
                info!(device_id, %event, "MMC command");
                let handled = self.actions.handle_key(ActionKey::Mmc { event }, 0);
                self.set_last_event(event.name(), 0);
                Outcome::Mmc { command, handled }
            }
            SysexFrame::UnknownCommand { device_id, code } => {
                warn!(device_id, code, "Unknown MMC command");
                Outcome::UnknownMmc(code)
            }
            SysexFrame::Dump => {
                warn!(dump = mmc::hex_dump(frame), "Unhandled SysEx message");
                Outcome::Dump
            }
        }
    }

    fn rejected(&self, note: u8, e: ResolveError) -> Outcome {
        if e.is_silent() {
            debug!(note, "Note below the lowest pad dropped");
        } else {
            warn!(err = %e, note, "Can't resolve note");
            self.notifier.publish(Notification::NoteRejected(note));
        }
        Outcome::Rejected(e)
    }

    fn set_last_event(&mut self, label: &str, parameter: i32) {
        self.last_event = Some((label.to_string(), parameter));
        self.notifier.publish(Notification::LastEvent {
            label: label.to_string(),
            parameter,
        });
    }
}

#[cfg(test)]
mod test {
    use crossbeam_channel::Receiver;

    use super::*;
    use crate::{
        actions::{Action, MidiMap},
        instruments::{Instrument, InstrumentList},
        synth::{RetriggerPolicy, Synth},
        transport::{RecordedNote, Sequencer, Transport},
    };

    struct Harness {
        dispatcher: Dispatcher,
        synth: SharedSynth,
        transport: Arc<Transport>,
        actions: Arc<ActionManager>,
        notifications: Receiver<Notification>,
    }

    impl Harness {
        fn new(settings: DispatchSettings, map: MidiMap) -> Harness {
            let transport = Arc::new(Transport::new());
            let actions = Arc::new(ActionManager::new(map, transport.clone()));
            let synth = SharedSynth::new(Synth::new(44100, 256, 16));
            let (notifier, notifications) = Notifier::bounded(1024);
            let mut dispatcher =
                Dispatcher::new(settings, synth.clone(), actions.clone(), notifier);
            dispatcher.set_session(Some(Arc::new(session())));
            Harness {
                dispatcher,
                synth,
                transport,
                actions,
                notifications,
            }
        }

        fn with_settings(settings: DispatchSettings) -> Harness {
            Harness::new(settings, MidiMap::default())
        }

        fn voices(&self) -> usize {
            self.synth.lock().active_voice_count()
        }

        fn drain(&self) -> Vec<Notification> {
            self.notifications.try_iter().collect()
        }
    }

    /// Kick, snare, then a three-way hi-hat group and a crash with a note binding.
    fn session() -> Session {
        Session::new(
            "test",
            InstrumentList::new(vec![
                Instrument::new("kick").with_midi_note(60),
                Instrument::new("snare"),
                Instrument::new("hihat closed").with_hihat(1, 0, 30),
                Instrument::new("hihat half").with_hihat(1, 31, 90),
                Instrument::new("hihat open").with_hihat(1, 91, 127),
                Instrument::new("crash").with_midi_note(49),
            ]),
        )
    }

    #[test]
    fn test_note_on_offset_mode() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        let outcome = h.dispatcher.dispatch(&[0x90, 37, 100]);
        assert!(matches!(outcome, Ok(Outcome::NoteOn { instrument: 1, .. })));
        assert_eq!(h.voices(), 1);
        assert_eq!(h.dispatcher.last_event(), Some(("NOTE", 37)));
    }

    #[test]
    fn test_note_below_lowest_pad_dropped() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        assert_eq!(
            h.dispatcher.dispatch(&[0x90, 35, 100]),
            Ok(Outcome::Rejected(ResolveError::BelowLowestPad(35)))
        );
        assert_eq!(h.voices(), 0);
        assert!(!h.drain().contains(&Notification::NoteRejected(35)));
    }

    #[test]
    fn test_note_past_last_instrument_rejected() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        assert_eq!(
            h.dispatcher.dispatch(&[0x90, 42, 100]),
            Ok(Outcome::Rejected(ResolveError::NoInstrument(42)))
        );
        assert_eq!(h.voices(), 0);
        assert!(h.drain().contains(&Notification::NoteRejected(42)));
    }

    #[test]
    fn test_filtered_message_has_no_effect() {
        let mut h = Harness::with_settings(DispatchSettings {
            filter: ChannelFilter::only(9),
            ..Default::default()
        });
        assert_eq!(
            h.dispatcher.dispatch(&[0x90, 36, 100]),
            Ok(Outcome::Filtered)
        );
        assert_eq!(h.voices(), 0);
        assert_eq!(h.dispatcher.last_event(), None);

        assert!(matches!(
            h.dispatcher.dispatch(&[0x99, 36, 100]),
            Ok(Outcome::NoteOn { instrument: 0, .. })
        ));
    }

    #[test]
    fn test_system_messages_pass_the_filter() {
        let mut h = Harness::with_settings(DispatchSettings {
            filter: ChannelFilter::only(9),
            ..Default::default()
        });
        assert_eq!(
            h.dispatcher.dispatch(&[0xFA]),
            Ok(Outcome::Realtime(MessageType::Start))
        );
        assert!(h.transport.is_playing());
    }

    #[test]
    fn test_no_session() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        h.dispatcher.set_session(None);
        assert_eq!(
            h.dispatcher.dispatch(&[0x90, 36, 100]),
            Err(DispatchError::NoSession)
        );
        assert_eq!(h.voices(), 0);

        h.dispatcher.set_session(Some(Arc::new(session())));
        assert!(h.dispatcher.dispatch(&[0x90, 36, 100]).is_ok());
    }

    #[test]
    fn test_zero_velocity_note_on_is_note_off() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        h.dispatcher.dispatch(&[0x90, 36, 100]).expect("note on");
        assert_eq!(
            h.dispatcher.dispatch(&[0x90, 36, 0]),
            Ok(Outcome::NoteOff {
                instrument: 0,
                released: true
            })
        );
        assert_eq!(h.voices(), 0);
    }

    #[test]
    fn test_note_off_without_voice() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        assert_eq!(
            h.dispatcher.dispatch(&[0x80, 36, 0]),
            Ok(Outcome::NoteOff {
                instrument: 0,
                released: false
            })
        );
    }

    #[test]
    fn test_retrigger_keeps_one_voice_per_instrument() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        h.dispatcher.dispatch(&[0x90, 37, 20]).expect("first");
        h.dispatcher.dispatch(&[0x90, 37, 120]).expect("second");
        h.dispatcher.dispatch(&[0x90, 36, 90]).expect("kick");
        assert_eq!(h.synth.lock().voices_for(1), 1);
        assert_eq!(h.voices(), 2);

        h.dispatcher.dispatch(&[0x80, 37, 0]).expect("note off");
        assert!(!h.synth.lock().is_instrument_playing(1));
        assert_eq!(
            h.dispatcher.dispatch(&[0x80, 37, 0]),
            Ok(Outcome::NoteOff {
                instrument: 1,
                released: false
            })
        );
    }

    #[test]
    fn test_note_off_releases_oldest_voice() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        *h.synth.lock() = Synth::new(44100, 256, 16).with_retrigger(RetriggerPolicy::Stack);
        h.dispatcher.dispatch(&[0x90, 37, 20]).expect("first");
        h.dispatcher.dispatch(&[0x90, 37, 120]).expect("second");
        assert_eq!(h.voices(), 2);

        h.dispatcher.dispatch(&[0x80, 37, 0]).expect("note off");
        let remaining: Vec<f32> = h
            .synth
            .lock()
            .voices()
            .iter()
            .map(|voice| voice.velocity())
            .collect();
        assert_eq!(remaining, vec![120.0 / 127.0]);
    }

    #[test]
    fn test_note_off_ignore_keeps_chokes() {
        let mut h = Harness::with_settings(DispatchSettings {
            note_off_ignore: true,
            ..Default::default()
        });
        h.dispatcher.dispatch(&[0x90, 41, 100]).expect("note on");
        assert_eq!(h.dispatcher.dispatch(&[0x80, 41, 0]), Ok(Outcome::Ignored));
        assert_eq!(h.dispatcher.dispatch(&[0x90, 41, 0]), Ok(Outcome::Ignored));
        assert_eq!(h.voices(), 1);

        assert_eq!(
            h.dispatcher.dispatch(&[0xA0, 41, 127]),
            Ok(Outcome::NoteOff {
                instrument: 5,
                released: true
            })
        );
        assert_eq!(h.voices(), 0);
    }

    #[test]
    fn test_poly_pressure_below_choke() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        h.dispatcher.dispatch(&[0x90, 41, 100]).expect("note on");
        assert_eq!(h.dispatcher.dispatch(&[0xA0, 41, 126]), Ok(Outcome::Ignored));
        assert_eq!(h.voices(), 1);
    }

    #[test]
    fn test_hihat_openness_reassigns_instrument() {
        let mut h = Harness::with_settings(DispatchSettings::default());

        // Open hi-hat pad while the pedal is closed.
        h.dispatcher.dispatch(&[0xB0, 4, 10]).expect("cc");
        assert_eq!(h.dispatcher.resolver().hihat_openness(), 10);
        assert!(matches!(
            h.dispatcher.dispatch(&[0x90, 40, 100]),
            Ok(Outcome::NoteOn { instrument: 2, .. })
        ));

        h.dispatcher.dispatch(&[0xB0, 4, 60]).expect("cc");
        assert!(matches!(
            h.dispatcher.dispatch(&[0x90, 40, 100]),
            Ok(Outcome::NoteOn { instrument: 3, .. })
        ));

        // Non hi-hat instruments are unaffected.
        assert!(matches!(
            h.dispatcher.dispatch(&[0x90, 37, 100]),
            Ok(Outcome::NoteOn { instrument: 1, .. })
        ));
    }

    #[test]
    fn test_control_change_last_event() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        assert_eq!(
            h.dispatcher.dispatch(&[0xB2, 7, 64]),
            Ok(Outcome::Controller {
                controller: 7,
                handled: false
            })
        );
        assert_eq!(h.dispatcher.last_event(), Some(("CC", 7)));
        assert!(h.drain().contains(&Notification::LastEvent {
            label: "CC".to_string(),
            parameter: 7
        }));
    }

    #[test]
    fn test_control_change_action() {
        let mut map = MidiMap::default();
        map.bind(ActionKey::ControlChange { controller: 7 }, Action::MasterVolume);
        let mut h = Harness::new(DispatchSettings::default(), map);
        assert_eq!(
            h.dispatcher.dispatch(&[0xB0, 7, 0]),
            Ok(Outcome::Controller {
                controller: 7,
                handled: true
            })
        );
        assert_eq!(h.actions.master_volume().get(), 0.0);
    }

    #[test]
    fn test_program_change_action_value() {
        let mut map = MidiMap::default();
        map.bind(ActionKey::ProgramChange, Action::SelectInstrument);
        let mut h = Harness::new(DispatchSettings::default(), map);
        assert_eq!(
            h.dispatcher.dispatch(&[0xC0, 3]),
            Ok(Outcome::ProgramChange { handled: true })
        );
        assert_eq!(h.actions.selected_instrument(), 3);
        assert_eq!(h.dispatcher.last_event(), Some(("PROGRAM_CHANGE", 0)));
    }

    #[test]
    fn test_note_action_with_discard() {
        let mut map = MidiMap::default();
        map.bind(ActionKey::Note { note: 36 }, Action::PlayPauseToggle);
        let mut h = Harness::new(
            DispatchSettings {
                discard_note_after_action: true,
                ..Default::default()
            },
            map,
        );
        assert_eq!(
            h.dispatcher.dispatch(&[0x90, 36, 100]),
            Ok(Outcome::ActionOnly)
        );
        assert!(h.transport.is_playing());
        assert_eq!(h.voices(), 0);
    }

    #[test]
    fn test_note_action_without_discard() {
        let mut map = MidiMap::default();
        map.bind(ActionKey::Note { note: 36 }, Action::PlayPauseToggle);
        let mut h = Harness::new(DispatchSettings::default(), map);
        assert!(matches!(
            h.dispatcher.dispatch(&[0x90, 36, 100]),
            Ok(Outcome::NoteOn { instrument: 0, .. })
        ));
        assert!(h.transport.is_playing());
        assert_eq!(h.voices(), 1);
    }

    #[test]
    fn test_fixed_mapping() {
        let mut h = Harness::with_settings(DispatchSettings {
            selection_mode: SelectionMode::FixedMapping,
            ..Default::default()
        });
        assert!(matches!(
            h.dispatcher.dispatch(&[0x90, 49, 100]),
            Ok(Outcome::NoteOn { instrument: 5, .. })
        ));
        assert_eq!(
            h.dispatcher.dispatch(&[0x90, 36, 100]),
            Ok(Outcome::Rejected(ResolveError::NoInstrument(36)))
        );
    }

    #[test]
    fn test_selected_instrument_mode() {
        let mut h = Harness::with_settings(DispatchSettings {
            selection_mode: SelectionMode::SelectedInstrument,
            ..Default::default()
        });
        h.actions.select_instrument(1);
        assert!(matches!(
            h.dispatcher.dispatch(&[0x90, 60, 100]),
            Ok(Outcome::NoteOn { instrument: 1, .. })
        ));
        assert!(matches!(
            h.dispatcher.dispatch(&[0x90, 64, 100]),
            Ok(Outcome::NoteOn { instrument: 1, .. })
        ));

        h.dispatcher.dispatch(&[0x80, 64, 0]).expect("note off");
        let notes: Vec<Option<u8>> = h
            .synth
            .lock()
            .voices()
            .iter()
            .map(|voice| voice.note())
            .collect();
        assert_eq!(notes, vec![Some(60)]);

        h.actions.select_instrument(42);
        assert_eq!(
            h.dispatcher.dispatch(&[0x90, 60, 100]),
            Ok(Outcome::Rejected(ResolveError::NoSelection(42)))
        );
    }

    #[test]
    fn test_note_length_recorded() {
        let mut h = Harness::with_settings(DispatchSettings {
            record_events: true,
            ..Default::default()
        });
        h.transport.play();
        h.transport.advance(100);
        h.dispatcher.dispatch(&[0x90, 36, 100]).expect("note on");
        assert_eq!(h.dispatcher.timing().note_on_tick, 100);
        h.transport.advance(48);
        h.dispatcher.dispatch(&[0x80, 36, 0]).expect("note off");

        assert_eq!(h.dispatcher.timing().length(), 48);
        assert_eq!(
            h.transport.recorded_notes(),
            vec![RecordedNote {
                instrument: 0,
                length: 48.0,
                note_on_tick: 100
            }]
        );

        assert!(h.drain().contains(&Notification::NoteRecorded {
            instrument: 0,
            length: 48.0
        }));

        // Nothing playing, nothing recorded.
        h.dispatcher.dispatch(&[0x80, 36, 0]).expect("note off");
        assert_eq!(h.transport.recorded_notes().len(), 1);
        assert!(!h
            .drain()
            .iter()
            .any(|n| matches!(n, Notification::NoteRecorded { .. })));
    }

    #[test]
    fn test_recorded_lengths_stay_bounded() {
        let mut h = Harness::with_settings(DispatchSettings {
            record_events: true,
            ..Default::default()
        });
        h.transport.play();
        for _ in 0..10_000 {
            h.dispatcher.dispatch(&[0x90, 36, 100]).expect("note on");
            h.transport.advance(4);
            h.dispatcher.dispatch(&[0x80, 36, 0]).expect("note off");
        }
        assert_eq!(
            h.transport.recorded_notes().len(),
            crate::transport::RECORDED_NOTE_CAPACITY
        );
    }

    #[test]
    fn test_note_length_scaled_in_selected_mode() {
        let mut h = Harness::with_settings(DispatchSettings {
            record_events: true,
            selection_mode: SelectionMode::SelectedInstrument,
            ..Default::default()
        });
        h.transport.play();
        h.dispatcher.dispatch(&[0x90, 12, 100]).expect("note on");
        h.transport.advance(10);
        h.dispatcher.dispatch(&[0x80, 12, 0]).expect("note off");

        let recorded = h.transport.recorded_notes();
        assert_eq!(recorded.len(), 1);
        assert!((recorded[0].length - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_realtime_transport() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        h.transport.locate_to_column(4);

        h.dispatcher.dispatch(&[0xFB]).expect("continue");
        assert!(h.transport.is_playing());
        assert_eq!(h.transport.column(), 4);

        h.dispatcher.dispatch(&[0xFA]).expect("start while playing");
        assert_eq!(h.transport.column(), 4);

        h.dispatcher.dispatch(&[0xFC]).expect("stop");
        assert!(!h.transport.is_playing());
        h.dispatcher.dispatch(&[0xFC]).expect("stop again");
        assert!(!h.transport.is_playing());

        h.dispatcher.dispatch(&[0xFA]).expect("start");
        assert!(h.transport.is_playing());
        assert_eq!(h.transport.column(), 0);
    }

    #[test]
    fn test_mmc_routed_through_actions() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        assert_eq!(
            h.dispatcher.dispatch(&[0xF0, 0x7F, 0x01, 0x06, 0x02, 0xF7]),
            Ok(Outcome::Mmc {
                command: TransportCommand::Play,
                handled: true
            })
        );
        assert!(h.transport.is_playing());
        assert_eq!(h.dispatcher.last_event(), Some(("MMC_PLAY", 0)));

        // Deferred play uses the play binding.
        h.transport.stop();
        h.dispatcher
            .dispatch(&[0xF0, 0x7F, 0x7F, 0x06, 0x03, 0xF7])
            .expect("deferred play");
        assert!(h.transport.is_playing());

        h.dispatcher
            .dispatch(&[0xF0, 0x7F, 0x01, 0x06, 0x01, 0xF7])
            .expect("stop");
        assert!(!h.transport.is_playing());
        assert!(h
            .drain()
            .contains(&Notification::Transport(TransportCommand::Stop)));
    }

    #[test]
    fn test_mmc_unbound() {
        let mut h = Harness::new(DispatchSettings::default(), MidiMap::empty());
        assert_eq!(
            h.dispatcher.dispatch(&[0xF0, 0x7F, 0x01, 0x06, 0x02, 0xF7]),
            Ok(Outcome::Mmc {
                command: TransportCommand::Play,
                handled: false
            })
        );
        assert!(!h.transport.is_playing());
    }

    #[test]
    fn test_sysex_other_frames() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        assert_eq!(
            h.dispatcher.dispatch(&[0xF0, 0x7F, 0x01, 0x06, 0x63, 0xF7]),
            Ok(Outcome::UnknownMmc(0x63))
        );
        assert_eq!(
            h.dispatcher.dispatch(&[0xF0, 0x43, 0x10, 0x4C, 0xF7]),
            Ok(Outcome::Dump)
        );
        let goto = [
            0xF0, 0x7F, 0x01, 0x06, 0x44, 0x06, 0x01, 1, 2, 3, 4, 5, 0xF7,
        ];
        assert!(matches!(
            h.dispatcher.dispatch(&goto),
            Ok(Outcome::Mmc {
                command: TransportCommand::Goto(_),
                handled: false
            })
        ));
        assert!(!h.transport.is_playing());
    }

    #[test]
    fn test_unsupported_and_unknown() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        assert_eq!(
            h.dispatcher.dispatch(&[0xE0, 0, 64]),
            Ok(Outcome::Unsupported(MessageType::PitchWheel))
        );
        assert_eq!(
            h.dispatcher.dispatch(&[0xD0, 10]),
            Ok(Outcome::Unsupported(MessageType::ChannelPressure))
        );
        assert!(h
            .drain()
            .contains(&Notification::Unhandled(MessageType::PitchWheel)));
        assert!(matches!(
            h.dispatcher.dispatch(&[0xF4]),
            Err(DispatchError::Malformed(0xF4))
        ));
        assert!(matches!(
            h.dispatcher.dispatch(&[]),
            Err(DispatchError::Malformed(_))
        ));
    }

    #[test]
    fn test_clock_and_active_sensing_ignored() {
        let mut h = Harness::with_settings(DispatchSettings::default());
        assert_eq!(h.dispatcher.dispatch(&[0xF8]), Ok(Outcome::Ignored));
        assert_eq!(h.dispatcher.dispatch(&[0xFE]), Ok(Outcome::Ignored));
        assert!(!h.transport.is_playing());
        assert_eq!(h.dispatcher.last_event(), None);
        assert!(!h
            .drain()
            .iter()
            .any(|n| matches!(n, Notification::Unhandled(_))));

        h.dispatcher.set_session(None);
        assert_eq!(h.dispatcher.dispatch(&[0xF8]), Ok(Outcome::Ignored));
    }

    #[test]
    fn test_midi_activity_published() {
        let mut h = Harness::with_settings(DispatchSettings {
            filter: ChannelFilter::only(9),
            ..Default::default()
        });
        h.dispatcher.dispatch(&[0x90, 36, 100]).expect("filtered");
        assert_eq!(h.drain(), vec![Notification::MidiActivity]);
    }

    #[test]
    fn test_pitch_to_frequency() {
        assert_eq!(pitch_to_frequency(0.0), 1.0);
        assert!((pitch_to_frequency(12.0) - 2.0).abs() < 1e-6);
    }
}
