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
use std::fmt;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::debug;

use crate::midi::{mmc::TransportCommand, MessageType};

/// The default capacity of the notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

/// Activity and diagnostic signals published while handling MIDI.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A MIDI event arrived, admissible or not.
    MidiActivity,
    /// The last handled MIDI event, labelled `NOTE`, `CC`, `PROGRAM_CHANGE` or an MMC name.
    LastEvent { label: String, parameter: i32 },
    /// A message type that is recognized but not handled.
    Unhandled(MessageType),
    /// A transport command arrived over MIDI.
    Transport(TransportCommand),
    /// A note could not be resolved to an instrument.
    NoteRejected(u8),
    /// A note length was recorded for an instrument.
    NoteRecorded { instrument: usize, length: f32 },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::MidiActivity => write!(f, "MIDI activity"),
            Notification::LastEvent { label, parameter } => write!(f, "{} ({})", label, parameter),
            Notification::Unhandled(kind) => write!(f, "unhandled {}", kind),
            Notification::Transport(command) => write!(f, "transport {:?}", command),
            Notification::NoteRejected(note) => write!(f, "note {} rejected", note),
            Notification::NoteRecorded { instrument, length } => {
                write!(f, "instrument {} held for {} ticks", instrument, length)
            }
        }
    }
}

/// Publishes notifications without ever blocking the caller.
#[derive(Clone)]
pub struct Notifier {
    sender: Option<Sender<Notification>>,
}

impl Notifier {
    /// Creates a notifier and the receiving end of its channel.
    pub fn bounded(capacity: usize) -> (Notifier, Receiver<Notification>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (
            Notifier {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A notifier that drops everything.
    pub fn disabled() -> Notifier {
        Notifier { sender: None }
    }

    /// Publishes a notification. A full or closed channel drops it.
    pub fn publish(&self, notification: Notification) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(notification)) => {
                debug!(%notification, "Notification channel full, dropping");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
