//! The bridge object
//!
//! Owns everything the C surface needs: the async runtime, the handle
//! table, the output registry and the stream factory. Async operations take
//! a completion closure instead of returning a future.

use crate::capability::{CapabilitySet, Feature};
use crate::capture::backend::CaptureBackend;
use crate::capture::channel::StreamDelegate;
use crate::capture::configuration::StreamConfiguration;
use crate::capture::content::Rect;
use crate::capture::filter::ContentFilter;
use crate::capture::recording::RecordingOutput;
use crate::capture::sample::{Image, MediaSample};
use crate::capture::screenshot;
use crate::capture::stream::{CaptureStream, StreamFactory};
use crate::completion::AsyncAdapter;
use crate::config::BridgeConfig;
use crate::dispatch::{DispatchQueue, QualityOfService};
use crate::error::{BridgeError, BridgeResult};
use crate::handle::HandleTable;
use crate::registry::OutputHandlerRegistry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

pub struct Bridge {
    runtime: Option<Runtime>,
    adapter: AsyncAdapter,
    handles: Arc<HandleTable>,
    registry: Arc<OutputHandlerRegistry>,
    streams: Arc<StreamFactory>,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(config: BridgeConfig, backend: Arc<dyn CaptureBackend>) -> BridgeResult<Self> {
        config
            .validate()
            .map_err(|e| BridgeError::Configuration(e.to_string()))?;

        let revision = config
            .platform_revision()
            .map_err(|e| BridgeError::Configuration(e.to_string()))?
            .unwrap_or_else(|| backend.platform_revision());
        let capabilities = CapabilitySet::resolve(revision);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("capture-bridge-worker")
            .enable_all()
            .build()
            .map_err(|e| BridgeError::Configuration(format!("failed to start runtime: {}", e)))?;

        let default_queue = DispatchQueue::new(config.default_queue_label.clone(), QualityOfService::Default)
            .map_err(|e| BridgeError::Configuration(format!("failed to create default queue: {}", e)))?;

        let registry = Arc::new(OutputHandlerRegistry::new());
        let streams = Arc::new(StreamFactory::new(
            Arc::clone(&backend),
            Arc::clone(&registry),
            Arc::new(default_queue),
            capabilities,
        ));

        tracing::info!(
            "Capture bridge v{} ready: {} backend, platform revision {}",
            env!("CARGO_PKG_VERSION"),
            backend.name(),
            revision
        );

        Ok(Self {
            adapter: AsyncAdapter::new(runtime.handle().clone()),
            runtime: Some(runtime),
            handles: Arc::new(HandleTable::new()),
            registry,
            streams,
            config,
        })
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        self.streams.capabilities()
    }

    pub fn handles(&self) -> &Arc<HandleTable> {
        &self.handles
    }

    pub fn registry(&self) -> &Arc<OutputHandlerRegistry> {
        &self.registry
    }

    /// Run a future to completion on the bridge runtime
    ///
    /// Must not be called from a bridge callback.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.adapter.runtime().block_on(future)
    }

    pub fn create_stream(
        &self,
        filter: &ContentFilter,
        configuration: &StreamConfiguration,
        delegate: Option<Arc<dyn StreamDelegate>>,
    ) -> BridgeResult<Arc<CaptureStream>> {
        self.streams
            .create(filter, configuration, delegate)
            .map(Arc::new)
    }

    pub fn start_capture(
        &self,
        stream: Arc<CaptureStream>,
        on_complete: impl FnOnce(BridgeResult<()>) + Send + 'static,
    ) {
        self.adapter
            .launch("start capture", async move { stream.start().await }, on_complete);
    }

    pub fn stop_capture(
        &self,
        stream: Arc<CaptureStream>,
        on_complete: impl FnOnce(BridgeResult<()>) + Send + 'static,
    ) {
        self.adapter
            .launch("stop capture", async move { stream.stop().await }, on_complete);
    }

    pub fn update_content_filter(
        &self,
        stream: Arc<CaptureStream>,
        filter: ContentFilter,
        on_complete: impl FnOnce(BridgeResult<()>) + Send + 'static,
    ) {
        self.adapter.launch(
            "update content filter",
            async move { stream.update_content_filter(filter).await },
            on_complete,
        );
    }

    /// Fails synchronously, without launching, when the platform cannot
    /// update a running stream's configuration
    pub fn update_configuration(
        &self,
        stream: Arc<CaptureStream>,
        configuration: StreamConfiguration,
        on_complete: impl FnOnce(BridgeResult<()>) + Send + 'static,
    ) {
        if let Err(e) = stream.check_configuration_update(&configuration) {
            on_complete(Err(e));
            return;
        }
        self.adapter.launch(
            "update configuration",
            async move { stream.update_configuration(configuration).await },
            on_complete,
        );
    }

    pub fn add_recording_output(
        &self,
        stream: Arc<CaptureStream>,
        output: Arc<RecordingOutput>,
        on_complete: impl FnOnce(BridgeResult<()>) + Send + 'static,
    ) {
        if let Err(e) = stream.check_recording_output() {
            on_complete(Err(e));
            return;
        }
        self.adapter.launch(
            "add recording output",
            async move { stream.add_recording_output(output).await },
            on_complete,
        );
    }

    pub fn remove_recording_output(
        &self,
        stream: Arc<CaptureStream>,
        output: Arc<RecordingOutput>,
        on_complete: impl FnOnce(BridgeResult<()>) + Send + 'static,
    ) {
        if let Err(e) = stream.check_recording_output() {
            on_complete(Err(e));
            return;
        }
        self.adapter.launch(
            "remove recording output",
            async move { stream.remove_recording_output(output).await },
            on_complete,
        );
    }

    pub fn capture_image(
        &self,
        filter: ContentFilter,
        configuration: StreamConfiguration,
        on_complete: impl FnOnce(BridgeResult<Image>) + Send + 'static,
    ) {
        let streams = Arc::clone(&self.streams);
        self.adapter.launch(
            "capture image",
            async move { screenshot::capture_image(&streams, &filter, &configuration).await },
            on_complete,
        );
    }

    /// Fails synchronously, without launching, where region capture is
    /// unavailable
    pub fn capture_image_in_rect(
        &self,
        filter: ContentFilter,
        rect: Rect,
        on_complete: impl FnOnce(BridgeResult<Image>) + Send + 'static,
    ) {
        if let Err(e) = self.capabilities().require(Feature::RegionScreenshot) {
            on_complete(Err(e));
            return;
        }
        let streams = Arc::clone(&self.streams);
        self.adapter.launch(
            "capture image in rect",
            async move { screenshot::capture_image_in_rect(&streams, &filter, rect).await },
            on_complete,
        );
    }

    pub fn capture_sample(
        &self,
        filter: ContentFilter,
        configuration: StreamConfiguration,
        on_complete: impl FnOnce(BridgeResult<Arc<MediaSample>>) + Send + 'static,
    ) {
        let streams = Arc::clone(&self.streams);
        self.adapter.launch(
            "capture sample",
            async move { screenshot::capture_sample(&streams, &filter, &configuration).await },
            on_complete,
        );
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let dropped = self.handles.clear();
        self.registry.clear();

        if let Some(runtime) = self.runtime.take() {
            if tokio::runtime::Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(Duration::from_millis(self.config.shutdown_timeout_ms));
            }
        }
        tracing::info!("Capture bridge shut down ({} handles released)", dropped);
    }
}
