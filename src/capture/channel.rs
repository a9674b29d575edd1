//! Output channels and stream observers
//!
//! A stream delivers media samples per [`ChannelKind`]. Consumers attach a
//! [`StreamOutput`] per channel and may attach one [`StreamDelegate`] per
//! stream for out-of-band events.

use crate::capture::sample::MediaSample;
use crate::error::StreamFailure;
use std::sync::Arc;

/// Process-unique stream identity
pub type StreamId = u64;

/// Kind of media a stream output receives
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Screen frames
    Video = 0,
    /// System audio
    Audio = 1,
    /// Microphone audio
    Microphone = 2,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Video, ChannelKind::Audio, ChannelKind::Microphone];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ChannelKind::Video),
            1 => Some(ChannelKind::Audio),
            2 => Some(ChannelKind::Microphone),
            _ => None,
        }
    }

    pub fn is_audio(self) -> bool {
        !matches!(self, ChannelKind::Video)
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Video => write!(f, "screen"),
            ChannelKind::Audio => write!(f, "audio"),
            ChannelKind::Microphone => write!(f, "microphone"),
        }
    }
}

/// Receives samples for one (stream, channel) pair
pub trait StreamOutput: Send + Sync {
    fn did_output_sample(&self, stream: StreamId, sample: Arc<MediaSample>, kind: ChannelKind);
}

impl<F> StreamOutput for F
where
    F: Fn(StreamId, Arc<MediaSample>, ChannelKind) + Send + Sync,
{
    fn did_output_sample(&self, stream: StreamId, sample: Arc<MediaSample>, kind: ChannelKind) {
        self(stream, sample, kind)
    }
}

/// Out-of-band stream events
pub trait StreamDelegate: Send + Sync {
    /// The stream stopped without being asked to
    ///
    /// Reported once; the stream is not restarted.
    fn did_stop_with_error(&self, stream: StreamId, failure: &StreamFailure);

    fn did_become_active(&self, _stream: StreamId) {}

    fn did_become_inactive(&self, _stream: StreamId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_codes() {
        for kind in ChannelKind::ALL {
            assert_eq!(ChannelKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ChannelKind::Video.code(), 0);
        assert_eq!(ChannelKind::Microphone.code(), 2);
        assert_eq!(ChannelKind::from_code(-1), None);
    }

    #[test]
    fn test_channel_display() {
        assert_eq!(ChannelKind::Video.to_string(), "screen");
        assert!(ChannelKind::Microphone.is_audio());
        assert!(!ChannelKind::Video.is_audio());
    }
}
