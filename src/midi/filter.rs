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
use super::message::Message;

/// Restricts which channel voice messages reach the dispatcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    /// The accepted channel (0-15). None accepts every channel.
    channel: Option<u8>,
}

impl ChannelFilter {
    /// A filter that accepts everything.
    pub fn all() -> ChannelFilter {
        ChannelFilter { channel: None }
    }

    /// A filter that accepts only the given channel (0-15).
    pub fn only(channel: u8) -> ChannelFilter {
        ChannelFilter {
            channel: Some(channel & 0x0F),
        }
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    /// Returns true if the message should be processed. System messages are
    /// channel independent and always pass.
    pub fn is_admissible(&self, msg: &Message) -> bool {
        match self.channel {
            None => true,
            Some(_) if msg.kind().is_channel_independent() => true,
            Some(channel) => msg.channel() == Some(channel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::message::{classify, MessageType};

    #[test]
    fn test_unset_filter_accepts_everything() {
        let filter = ChannelFilter::all();
        assert!(filter.is_admissible(&classify(&[0x90, 36, 100])));
        assert!(filter.is_admissible(&classify(&[0x9F, 36, 100])));
        assert!(filter.is_admissible(&classify(&[0xFA])));
    }

    #[test]
    fn test_filter_matches_channel() {
        let filter = ChannelFilter::only(9);
        assert!(filter.is_admissible(&classify(&[0x99, 36, 100])));
        assert!(!filter.is_admissible(&classify(&[0x90, 36, 100])));
        assert!(!filter.is_admissible(&classify(&[0xB0, 4, 10])));
    }

    #[test]
    fn test_system_messages_bypass_filter() {
        for channel in 0..16 {
            let filter = ChannelFilter::only(channel);
            for kind in [
                MessageType::Start,
                MessageType::Continue,
                MessageType::Stop,
                MessageType::SongPos,
                MessageType::QuarterFrame,
            ] {
                assert!(filter.is_admissible(&Message::system(kind, 0, 0)));
            }
            assert!(filter.is_admissible(&Message::sysex(vec![0xF0, 0x7F, 0x01, 0x06, 0x02, 0xF7])));
        }
    }

    #[test]
    fn test_unknown_is_filtered() {
        let filter = ChannelFilter::only(0);
        assert!(!filter.is_admissible(&Message::system(MessageType::Unknown, 0, 0)));
    }
}
