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

//! Classification of raw MIDI bytes into typed messages.

use std::fmt;

use midly::live::{LiveEvent, SystemCommon, SystemRealtime};
use midly::MidiMessage;
use tracing::debug;

/// Status byte that opens a System Exclusive frame.
pub const SYSEX_START: u8 = 0xF0;

/// Status byte that closes a System Exclusive frame.
pub const SYSEX_END: u8 = 0xF7;

/// The kind of a classified MIDI message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
    PolyKeyPressure,
    ChannelPressure,
    PitchWheel,
    SysEx,
    Start,
    Continue,
    Stop,
    SongPos,
    QuarterFrame,
    Unknown,
}

impl MessageType {
    /// Returns true for message kinds that are defined without a channel and
    /// therefore bypass channel filtering.
    pub fn is_channel_independent(&self) -> bool {
        matches!(
            self,
            MessageType::SysEx
                | MessageType::Start
                | MessageType::Continue
                | MessageType::Stop
                | MessageType::SongPos
                | MessageType::QuarterFrame
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::NoteOn => "NOTE_ON",
            MessageType::NoteOff => "NOTE_OFF",
            MessageType::ControlChange => "CONTROL_CHANGE",
            MessageType::ProgramChange => "PROGRAM_CHANGE",
            MessageType::PolyKeyPressure => "POLYPHONIC_KEY_PRESSURE",
            MessageType::ChannelPressure => "CHANNEL_PRESSURE",
            MessageType::PitchWheel => "PITCH_WHEEL",
            MessageType::SysEx => "SYSEX",
            MessageType::Start => "START",
            MessageType::Continue => "CONTINUE",
            MessageType::Stop => "STOP",
            MessageType::SongPos => "SONG_POS",
            MessageType::QuarterFrame => "QUARTER_FRAME",
            MessageType::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A single classified MIDI message. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// The channel (0-15) for channel voice messages, None for system messages.
    channel: Option<u8>,
    /// The kind of message.
    kind: MessageType,
    /// The status byte the message was classified from (0 for empty input).
    status: u8,
    /// First data byte, 0 if absent.
    data1: u8,
    /// Second data byte, 0 if absent.
    data2: u8,
    /// The complete SysEx frame including F0/F7. Empty for all other kinds.
    sysex: Vec<u8>,
}

impl Message {
    /// Creates a channel voice message.
    pub fn channel_voice(kind: MessageType, channel: u8, data1: u8, data2: u8) -> Message {
        Message {
            channel: Some(channel & 0x0F),
            kind,
            status: 0,
            data1,
            data2,
            sysex: Vec::new(),
        }
    }

    /// Creates a channel-less system message.
    pub fn system(kind: MessageType, data1: u8, data2: u8) -> Message {
        Message {
            channel: None,
            kind,
            status: 0,
            data1,
            data2,
            sysex: Vec::new(),
        }
    }

    /// Creates a SysEx message holding the full frame.
    pub fn sysex(frame: Vec<u8>) -> Message {
        Message {
            channel: None,
            kind: MessageType::SysEx,
            status: SYSEX_START,
            data1: 0,
            data2: 0,
            sysex: frame,
        }
    }

    fn unknown(raw: &[u8]) -> Message {
        Message {
            channel: None,
            kind: MessageType::Unknown,
            status: raw.first().copied().unwrap_or(0),
            data1: data_byte(raw, 1),
            data2: data_byte(raw, 2),
            sysex: Vec::new(),
        }
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn data1(&self) -> u8 {
        self.data1
    }

    pub fn data2(&self) -> u8 {
        self.data2
    }

    pub fn sysex_data(&self) -> &[u8] {
        &self.sysex
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(channel) => write!(
                f,
                "{} ch={} d1={} d2={}",
                self.kind, channel, self.data1, self.data2
            ),
            None if self.kind == MessageType::SysEx => {
                write!(f, "{} ({} bytes)", self.kind, self.sysex.len())
            }
            None => write!(f, "{} d1={} d2={}", self.kind, self.data1, self.data2),
        }
    }
}

/// Classifies a raw MIDI event. Never fails: anything that cannot be understood
/// becomes an `Unknown` message.
pub fn classify(raw: &[u8]) -> Message {
    match raw.first() {
        None => return Message::unknown(raw),
        // SysEx is kept byte-for-byte; MMC decoding depends on exact positions.
        Some(&SYSEX_START) => return Message::sysex(raw.to_vec()),
        Some(_) => {}
    }

    let event = match LiveEvent::parse(raw) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = ?e, "Unable to parse MIDI event");
            return Message::unknown(raw);
        }
    };

    let (channel, kind) = match event {
        LiveEvent::Midi { channel, message } => {
            let kind = match message {
                MidiMessage::NoteOn { .. } => MessageType::NoteOn,
                MidiMessage::NoteOff { .. } => MessageType::NoteOff,
                MidiMessage::Aftertouch { .. } => MessageType::PolyKeyPressure,
                MidiMessage::Controller { .. } => MessageType::ControlChange,
                MidiMessage::ProgramChange { .. } => MessageType::ProgramChange,
                MidiMessage::ChannelAftertouch { .. } => MessageType::ChannelPressure,
                MidiMessage::PitchBend { .. } => MessageType::PitchWheel,
            };
            (Some(u8::from(channel)), kind)
        }
        LiveEvent::Common(common) => {
            let kind = match common {
                SystemCommon::SongPosition(_) => MessageType::SongPos,
                SystemCommon::MidiTimeCodeQuarterFrame(..) => MessageType::QuarterFrame,
                SystemCommon::SysEx(_) => MessageType::SysEx,
                _ => MessageType::Unknown,
            };
            (None, kind)
        }
        LiveEvent::Realtime(realtime) => {
            let kind = match realtime {
                SystemRealtime::Start => MessageType::Start,
                SystemRealtime::Continue => MessageType::Continue,
                SystemRealtime::Stop => MessageType::Stop,
                _ => MessageType::Unknown,
            };
            (None, kind)
        }
    };

    Message {
        channel,
        kind,
        status: raw[0],
        data1: data_byte(raw, 1),
        data2: data_byte(raw, 2),
        sysex: Vec::new(),
    }
}

fn data_byte(raw: &[u8], index: usize) -> u8 {
    raw.get(index).copied().unwrap_or(0)
}
