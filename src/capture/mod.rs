//! Capture model and session machinery
//!
//! Content objects and filters describe what to capture, a
//! [`StreamConfiguration`] describes how, and a [`CaptureStream`] drives a
//! platform stream through its session states. The platform itself sits
//! behind [`CaptureBackend`].

pub mod backend;
pub mod channel;
pub mod configuration;
pub mod content;
pub mod filter;
pub mod recording;
pub mod sample;
pub mod screenshot;
pub mod stream;
pub mod synthetic;

pub use backend::{CaptureBackend, PlatformStream, StreamEvents};
pub use channel::{ChannelKind, StreamDelegate, StreamId, StreamOutput};
pub use configuration::{FrameInterval, PixelFormat, StreamConfiguration};
pub use content::{Application, Display, Rect, Window};
pub use filter::{ContentFilter, ContentInfo, FilterStyle, StreamType};
pub use recording::{RecordingConfiguration, RecordingDelegate, RecordingOutput};
pub use sample::{Image, MediaSample, SampleTime, SynchronizationClock};
pub use stream::{CaptureStream, SessionState, StreamFactory};
pub use synthetic::SyntheticBackend;
