//! Capture session state machine
//!
//! A [`CaptureStream`] walks `Configured -> Started -> Stopped`, may be
//! restarted from `Stopped`, and accepts filter and configuration updates
//! only while `Started`. Outputs can be attached or detached in any state.
//!
//! Async transitions mark the session with a transitional state
//! (`Starting`, `Updating`, `Stopping`) before awaiting the platform, so a
//! second operation racing the first is rejected instead of interleaved.
//! No lock is held across an await.

use crate::capability::{CapabilitySet, Feature};
use crate::capture::backend::{CaptureBackend, PlatformStream, StreamEvents};
use crate::capture::channel::{ChannelKind, StreamDelegate, StreamId, StreamOutput};
use crate::capture::configuration::StreamConfiguration;
use crate::capture::filter::ContentFilter;
use crate::capture::recording::RecordingOutput;
use crate::capture::sample::{MediaSample, SynchronizationClock};
use crate::dispatch::DispatchQueue;
use crate::error::{BridgeError, BridgeResult, StreamFailure};
use crate::registry::{OutputHandlerRegistry, RegisteredOutput};
use parking_lot::Mutex as ParkingMutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle state of a capture session
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Configured = 0,
    Starting = 1,
    Started = 2,
    Updating = 3,
    Stopping = 4,
    Stopped = 5,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Configured => write!(f, "configured"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Started => write!(f, "started"),
            SessionState::Updating => write!(f, "updating"),
            SessionState::Stopping => write!(f, "stopping"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Routes platform events to registered outputs and the delegate
struct StreamEventRouter {
    stream: StreamId,
    registry: Arc<OutputHandlerRegistry>,
    default_queue: Arc<DispatchQueue>,
    capabilities: CapabilitySet,
    state: Arc<ParkingMutex<SessionState>>,
    delegate: Option<Arc<dyn StreamDelegate>>,
}

impl StreamEventRouter {
    fn notify(&self, event: impl FnOnce(&dyn StreamDelegate) + Send + 'static) {
        let Some(delegate) = self.delegate.clone() else {
            return;
        };
        if !self.default_queue.dispatch(move || event(delegate.as_ref())) {
            tracing::warn!("Dropped delegate event for stream {}: queue closed", self.stream);
        }
    }
}

impl StreamEvents for StreamEventRouter {
    fn sample(&self, sample: MediaSample) {
        let kind = sample.kind;
        match self.registry.get(self.stream, kind) {
            Some(output) => {
                if !output.deliver(self.stream, Arc::new(sample), kind) {
                    tracing::trace!("Queue closed, dropped {} sample of stream {}", kind, self.stream);
                }
            }
            None => tracing::trace!("No {} output on stream {}", kind, self.stream),
        }
    }

    fn stopped_with_error(&self, failure: StreamFailure) {
        *self.state.lock() = SessionState::Stopped;
        tracing::error!("Stream {} stopped unexpectedly: {}", self.stream, failure);
        let stream = self.stream;
        self.notify(move |delegate| delegate.did_stop_with_error(stream, &failure));
    }

    fn activity_changed(&self, active: bool) {
        if !self.capabilities.supports(Feature::StreamActivityEvents) {
            return;
        }
        let stream = self.stream;
        self.notify(move |delegate| {
            if active {
                delegate.did_become_active(stream)
            } else {
                delegate.did_become_inactive(stream)
            }
        });
    }
}

/// Creates capture streams wired to the shared registry
pub struct StreamFactory {
    backend: Arc<dyn CaptureBackend>,
    registry: Arc<OutputHandlerRegistry>,
    default_queue: Arc<DispatchQueue>,
    capabilities: CapabilitySet,
    next_id: AtomicU64,
}

impl StreamFactory {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        registry: Arc<OutputHandlerRegistry>,
        default_queue: Arc<DispatchQueue>,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            backend,
            registry,
            default_queue,
            capabilities,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn registry(&self) -> &Arc<OutputHandlerRegistry> {
        &self.registry
    }

    pub fn default_queue(&self) -> &Arc<DispatchQueue> {
        &self.default_queue
    }

    pub fn create(
        &self,
        filter: &ContentFilter,
        configuration: &StreamConfiguration,
        delegate: Option<Arc<dyn StreamDelegate>>,
    ) -> BridgeResult<CaptureStream> {
        configuration.validate(&self.capabilities)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(ParkingMutex::new(SessionState::Configured));
        let router = Arc::new(StreamEventRouter {
            stream: id,
            registry: Arc::clone(&self.registry),
            default_queue: Arc::clone(&self.default_queue),
            capabilities: self.capabilities,
            state: Arc::clone(&state),
            delegate,
        });

        let inner = self
            .backend
            .create_stream(filter.clone(), configuration.clone(), router)?;
        tracing::info!(
            "Created stream {} on {} backend ({}x{})",
            id,
            self.backend.name(),
            configuration.width(),
            configuration.height()
        );

        Ok(CaptureStream {
            id,
            inner: Arc::from(inner),
            state,
            registry: Arc::clone(&self.registry),
            default_queue: Arc::clone(&self.default_queue),
            capabilities: self.capabilities,
        })
    }
}

/// One capture session
pub struct CaptureStream {
    id: StreamId,
    inner: Arc<dyn PlatformStream>,
    state: Arc<ParkingMutex<SessionState>>,
    registry: Arc<OutputHandlerRegistry>,
    default_queue: Arc<DispatchQueue>,
    capabilities: CapabilitySet,
}

impl CaptureStream {
    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Attach a handler for a channel, delivering on `queue` or the default
    ///
    /// Returns the channel the handler was registered under, which differs
    /// from `kind` when microphone capture aliases to audio. A handler
    /// already registered for that channel is replaced.
    pub fn add_output(
        &self,
        kind: ChannelKind,
        handler: Arc<dyn StreamOutput>,
        queue: Option<Arc<DispatchQueue>>,
    ) -> BridgeResult<ChannelKind> {
        let resolved = self.capabilities.resolve_channel(kind);
        if resolved.is_audio() {
            self.capabilities.require(Feature::AudioCapture)?;
        }
        self.inner.enable_output(resolved)?;

        let queue = queue.unwrap_or_else(|| Arc::clone(&self.default_queue));
        tracing::info!("Stream {}: attached {} output on '{}'", self.id, resolved, queue.label());
        let superseded = self
            .registry
            .store(self.id, resolved, RegisteredOutput::new(handler, queue));
        drop(superseded);
        Ok(resolved)
    }

    pub fn remove_output(&self, kind: ChannelKind) -> BridgeResult<()> {
        let resolved = self.capabilities.resolve_channel(kind);
        if !self.registry.contains(self.id, resolved) {
            return Err(BridgeError::Stream(format!(
                "stream {} has no {} output attached",
                self.id, resolved
            )));
        }
        // The handler stays registered if the platform keeps the output
        self.inner.disable_output(resolved)?;
        drop(self.registry.remove(self.id, resolved));
        tracing::info!("Stream {}: detached {} output", self.id, resolved);
        Ok(())
    }

    pub async fn start(&self) -> BridgeResult<()> {
        let previous = self.begin(
            "start capture",
            &[SessionState::Configured, SessionState::Stopped],
            SessionState::Starting,
        )?;
        let result = self.inner.start().await;
        self.settle(SessionState::Starting, &result, SessionState::Started, previous);
        if result.is_ok() {
            tracing::info!("Stream {} started", self.id);
        }
        result
    }

    pub async fn stop(&self) -> BridgeResult<()> {
        self.begin("stop capture", &[SessionState::Started], SessionState::Stopping)?;
        let result = self.inner.stop().await;
        self.settle(SessionState::Stopping, &result, SessionState::Stopped, SessionState::Started);
        if result.is_ok() {
            tracing::info!("Stream {} stopped", self.id);
        }
        result
    }

    pub async fn update_content_filter(&self, filter: ContentFilter) -> BridgeResult<()> {
        self.begin("update content filter", &[SessionState::Started], SessionState::Updating)?;
        let result = self.inner.update_content_filter(filter).await;
        self.settle(SessionState::Updating, &result, SessionState::Started, SessionState::Started);
        result
    }

    /// Synchronous gate for [`CaptureStream::update_configuration`]
    pub fn check_configuration_update(&self, configuration: &StreamConfiguration) -> BridgeResult<()> {
        self.capabilities.require(Feature::ConfigurationUpdate)?;
        configuration.validate(&self.capabilities)
    }

    pub async fn update_configuration(&self, configuration: StreamConfiguration) -> BridgeResult<()> {
        self.check_configuration_update(&configuration)?;
        self.begin("update configuration", &[SessionState::Started], SessionState::Updating)?;
        let result = self.inner.update_configuration(configuration).await;
        self.settle(SessionState::Updating, &result, SessionState::Started, SessionState::Started);
        result
    }

    /// Synchronous gate for recording output changes
    pub fn check_recording_output(&self) -> BridgeResult<()> {
        self.capabilities.require(Feature::RecordingOutput)
    }

    pub async fn add_recording_output(&self, output: Arc<RecordingOutput>) -> BridgeResult<()> {
        self.check_recording_output()?;
        self.inner.add_recording_output(output).await
    }

    pub async fn remove_recording_output(&self, output: Arc<RecordingOutput>) -> BridgeResult<()> {
        self.check_recording_output()?;
        self.inner.remove_recording_output(output).await
    }

    pub fn synchronization_clock(&self) -> Option<Arc<SynchronizationClock>> {
        self.capabilities
            .read_or(Feature::SynchronizationClock, None, || self.inner.synchronization_clock())
    }

    fn begin(
        &self,
        operation: &str,
        allowed: &[SessionState],
        transitional: SessionState,
    ) -> BridgeResult<SessionState> {
        let mut state = self.state.lock();
        if !allowed.contains(&*state) {
            return Err(BridgeError::Stream(format!(
                "cannot {} on stream {} while it is {}",
                operation, self.id, *state
            )));
        }
        let previous = *state;
        *state = transitional;
        Ok(previous)
    }

    /// Leave a transitional state, unless an unexpected stop already moved
    /// the session on
    fn settle(
        &self,
        transitional: SessionState,
        result: &BridgeResult<()>,
        on_success: SessionState,
        on_failure: SessionState,
    ) {
        let mut state = self.state.lock();
        if *state == transitional {
            *state = if result.is_ok() { on_success } else { on_failure };
        }
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        let evicted = self.registry.evict_stream(self.id);
        tracing::debug!("Stream {} destroyed, evicted {} outputs", self.id, evicted);
    }
}

impl fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureStream")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
