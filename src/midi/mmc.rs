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

//! MIDI Machine Control decoding.
//!
//! General MMC command frame:
//!
//! ```text
//! 0    1    2    3    4    5
//! F0   7F   id   06   cmd  F7
//! ```
//!
//! Goto (locate) frame:
//!
//! ```text
//! 0    1    2    3    4    5    6    7    8    9    10   11   12
//! F0   7F   id   06   44   06   01   hr   mn   sc   fr   ff   F7
//! ```

use std::fmt;

use serde::Deserialize;

use super::message::SYSEX_START;

const MMC_REALTIME_ID: u8 = 0x7F;
const MMC_COMMAND_SUB_ID: u8 = 0x06;
const MMC_COMMAND_FRAME_LEN: usize = 6;
const MMC_GOTO_FRAME_LEN: usize = 13;

/// A locate target carried by an MMC Goto frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Locate {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub subframes: u8,
}

impl fmt::Display for Locate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.hours, self.minutes, self.seconds, self.frames, self.subframes
        )
    }
}

/// Tape-style transport commands carried by MMC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportCommand {
    Stop,
    Play,
    DeferredPlay,
    FastForward,
    Rewind,
    RecordStrobe,
    RecordExit,
    RecordReady,
    Pause,
    Goto(Locate),
}

impl TransportCommand {
    /// Maps a single-byte MMC command code to a command.
    pub fn from_code(code: u8) -> Option<TransportCommand> {
        let command = match code {
            1 => TransportCommand::Stop,
            2 => TransportCommand::Play,
            3 => TransportCommand::DeferredPlay,
            4 => TransportCommand::FastForward,
            5 => TransportCommand::Rewind,
            6 => TransportCommand::RecordStrobe,
            7 => TransportCommand::RecordExit,
            8 => TransportCommand::RecordReady,
            9 => TransportCommand::Pause,
            _ => return None,
        };
        Some(command)
    }

    /// The action-map event this command is routed through. Deferred play shares
    /// the play binding. Goto has no binding.
    pub fn event(&self) -> Option<MmcEvent> {
        let event = match self {
            TransportCommand::Stop => MmcEvent::Stop,
            TransportCommand::Play | TransportCommand::DeferredPlay => MmcEvent::Play,
            TransportCommand::FastForward => MmcEvent::FastForward,
            TransportCommand::Rewind => MmcEvent::Rewind,
            TransportCommand::RecordStrobe => MmcEvent::RecordStrobe,
            TransportCommand::RecordExit => MmcEvent::RecordExit,
            TransportCommand::RecordReady => MmcEvent::RecordReady,
            TransportCommand::Pause => MmcEvent::Pause,
            TransportCommand::Goto(_) => return None,
        };
        Some(event)
    }
}

/// Named MMC events that can be bound to actions.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MmcEvent {
    #[serde(rename = "MMC_STOP")]
    Stop,
    #[serde(rename = "MMC_PLAY")]
    Play,
    #[serde(rename = "MMC_FAST_FORWARD")]
    FastForward,
    #[serde(rename = "MMC_REWIND")]
    Rewind,
    #[serde(rename = "MMC_RECORD_STROBE")]
    RecordStrobe,
    #[serde(rename = "MMC_RECORD_EXIT")]
    RecordExit,
    #[serde(rename = "MMC_RECORD_READY")]
    RecordReady,
    #[serde(rename = "MMC_PAUSE")]
    Pause,
}

impl MmcEvent {
    pub const ALL: [MmcEvent; 8] = [
        MmcEvent::Stop,
        MmcEvent::Play,
        MmcEvent::FastForward,
        MmcEvent::Rewind,
        MmcEvent::RecordStrobe,
        MmcEvent::RecordExit,
        MmcEvent::RecordReady,
        MmcEvent::Pause,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MmcEvent::Stop => "MMC_STOP",
            MmcEvent::Play => "MMC_PLAY",
            MmcEvent::FastForward => "MMC_FAST_FORWARD",
            MmcEvent::Rewind => "MMC_REWIND",
            MmcEvent::RecordStrobe => "MMC_RECORD_STROBE",
            MmcEvent::RecordExit => "MMC_RECORD_EXIT",
            MmcEvent::RecordReady => "MMC_RECORD_READY",
            MmcEvent::Pause => "MMC_PAUSE",
        }
    }
}

impl fmt::Display for MmcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The interpretation of a SysEx frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SysexFrame {
    /// A recognized MMC command.
    Command { device_id: u8, command: TransportCommand },
    /// An MMC command frame with a command code outside 1-9.
    UnknownCommand { device_id: u8, code: u8 },
    /// Any other SysEx payload.
    Dump,
}

/// Interprets a full SysEx frame (including F0/F7).
pub fn interpret(frame: &[u8]) -> SysexFrame {
    if !is_mmc_header(frame) {
        return SysexFrame::Dump;
    }
    let device_id = frame[2];

    match frame.len() {
        MMC_COMMAND_FRAME_LEN => match TransportCommand::from_code(frame[4]) {
            Some(command) => SysexFrame::Command { device_id, command },
            None => SysexFrame::UnknownCommand {
                device_id,
                code: frame[4],
            },
        },
        MMC_GOTO_FRAME_LEN => SysexFrame::Command {
            device_id,
            command: TransportCommand::Goto(Locate {
                hours: frame[7],
                minutes: frame[8],
                seconds: frame[9],
                frames: frame[10],
                subframes: frame[11],
            }),
        },
        _ => SysexFrame::Dump,
    }
}

fn is_mmc_header(frame: &[u8]) -> bool {
    frame.len() >= MMC_COMMAND_FRAME_LEN
        && frame[0] == SYSEX_START
        && frame[1] == MMC_REALTIME_ID
        && frame[3] == MMC_COMMAND_SUB_ID
}

/// Formats bytes as space separated hex for diagnostics.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<String>>()
        .join(" ")
}
