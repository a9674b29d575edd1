//! Platform capture backend interface
//!
//! The bridge drives capture through these traits; each platform (and the
//! synthetic backend used in tests) implements them.

use crate::capability::PlatformRevision;
use crate::capture::channel::ChannelKind;
use crate::capture::configuration::StreamConfiguration;
use crate::capture::filter::ContentFilter;
use crate::capture::recording::RecordingOutput;
use crate::capture::sample::{MediaSample, SynchronizationClock};
use crate::error::{BridgeResult, StreamFailure};
use async_trait::async_trait;
use std::sync::Arc;

/// Events a platform stream reports back to the bridge
///
/// Called from backend threads; implementations must not block.
pub trait StreamEvents: Send + Sync {
    fn sample(&self, sample: MediaSample);

    /// The stream stopped on its own
    fn stopped_with_error(&self, failure: StreamFailure);

    fn activity_changed(&self, active: bool);
}

/// Creates platform streams
pub trait CaptureBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Revision of the platform this backend runs on
    fn platform_revision(&self) -> PlatformRevision;

    /// Create a stream; it stays idle until started
    fn create_stream(
        &self,
        filter: ContentFilter,
        configuration: StreamConfiguration,
        events: Arc<dyn StreamEvents>,
    ) -> BridgeResult<Box<dyn PlatformStream>>;
}

/// One platform capture stream
#[async_trait]
pub trait PlatformStream: Send + Sync {
    /// Start producing samples for `kind`
    fn enable_output(&self, kind: ChannelKind) -> BridgeResult<()>;

    fn disable_output(&self, kind: ChannelKind) -> BridgeResult<()>;

    async fn start(&self) -> BridgeResult<()>;

    async fn stop(&self) -> BridgeResult<()>;

    async fn update_content_filter(&self, filter: ContentFilter) -> BridgeResult<()>;

    async fn update_configuration(&self, configuration: StreamConfiguration) -> BridgeResult<()>;

    async fn add_recording_output(&self, output: Arc<RecordingOutput>) -> BridgeResult<()>;

    async fn remove_recording_output(&self, output: Arc<RecordingOutput>) -> BridgeResult<()>;

    /// Clock sample timestamps are measured against, once started
    fn synchronization_clock(&self) -> Option<Arc<SynchronizationClock>>;
}
