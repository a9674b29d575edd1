//! Single-frame capture
//!
//! Creates a throwaway stream, waits for its first video sample, and tears
//! the stream down again. The stream is stopped before the result is
//! returned, whether a frame arrived or not.

use crate::capability::Feature;
use crate::capture::channel::{ChannelKind, StreamDelegate, StreamId, StreamOutput};
use crate::capture::configuration::StreamConfiguration;
use crate::capture::content::Rect;
use crate::capture::filter::ContentFilter;
use crate::capture::sample::{Image, MediaSample};
use crate::capture::stream::{SessionState, StreamFactory};
use crate::completion::PendingCompletion;
use crate::error::{BridgeError, BridgeResult, StreamFailure};
use std::sync::Arc;

/// Progress of one single-frame capture; never moves backwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CapturePhase {
    Idle,
    StreamCreated,
    OutputAttached,
    Capturing,
    FrameResolved,
    Stopped,
}

/// Resolves the pending slot with the first video sample
struct FirstFrame<T, F> {
    completion: Arc<PendingCompletion<T>>,
    convert: F,
}

impl<T, F> StreamOutput for FirstFrame<T, F>
where
    T: Send + 'static,
    F: Fn(Arc<MediaSample>) -> BridgeResult<T> + Send + Sync,
{
    fn did_output_sample(&self, _stream: StreamId, sample: Arc<MediaSample>, kind: ChannelKind) {
        if kind != ChannelKind::Video || self.completion.is_resolved() {
            return;
        }
        self.completion.resolve((self.convert)(sample));
    }
}

/// Fails the pending slot if the stream dies before a frame arrives
struct AbortOnFailure<T> {
    completion: Arc<PendingCompletion<T>>,
}

impl<T: Send + 'static> StreamDelegate for AbortOnFailure<T> {
    fn did_stop_with_error(&self, _stream: StreamId, failure: &StreamFailure) {
        self.completion.resolve(Err(BridgeError::Stream(format!(
            "stream stopped before a frame arrived: {}",
            failure.message
        ))));
    }
}

struct Progress {
    phase: CapturePhase,
}

impl Progress {
    fn advance(&mut self, next: CapturePhase) {
        debug_assert!(next > self.phase);
        tracing::trace!("Single-frame capture: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

/// Capture one frame and convert it to an RGBA image
pub async fn capture_image(
    factory: &StreamFactory,
    filter: &ContentFilter,
    configuration: &StreamConfiguration,
) -> BridgeResult<Image> {
    capture_first(factory, filter, configuration, |sample| sample.to_image()).await
}

/// Capture one RGBA image of `rect`
///
/// `rect` is in points, in the same space as the filter's content frame,
/// and must lie inside it. The image is sized at the display's pixel scale.
pub async fn capture_image_in_rect(
    factory: &StreamFactory,
    filter: &ContentFilter,
    rect: Rect,
) -> BridgeResult<Image> {
    factory.capabilities().require(Feature::RegionScreenshot)?;
    let configuration = region_configuration(filter, rect)?;
    capture_image(factory, filter, &configuration).await
}

/// Stream configuration that crops the filter's content to `rect`
pub(crate) fn region_configuration(filter: &ContentFilter, rect: Rect) -> BridgeResult<StreamConfiguration> {
    let frame = filter.frame();
    if !rect.is_well_formed() || rect.is_empty() || !frame.contains(&rect) {
        return Err(BridgeError::Configuration(format!(
            "capture rect {:?} must be non-empty and inside the content frame {:?}",
            rect, frame
        )));
    }
    let scale = filter
        .source_display()
        .map(|display| display.point_pixel_scale as f64)
        .unwrap_or(1.0);
    Ok(StreamConfiguration::new()
        .with_size((rect.width * scale).round() as u32, (rect.height * scale).round() as u32)
        .with_source_rect(rect.offset(-frame.x, -frame.y)))
}

/// Capture one raw video sample
pub async fn capture_sample(
    factory: &StreamFactory,
    filter: &ContentFilter,
    configuration: &StreamConfiguration,
) -> BridgeResult<Arc<MediaSample>> {
    capture_first(factory, filter, configuration, Ok).await
}

async fn capture_first<T, F>(
    factory: &StreamFactory,
    filter: &ContentFilter,
    configuration: &StreamConfiguration,
    convert: F,
) -> BridgeResult<T>
where
    T: Send + 'static,
    F: Fn(Arc<MediaSample>) -> BridgeResult<T> + Send + Sync + 'static,
{
    let mut progress = Progress {
        phase: CapturePhase::Idle,
    };
    let (completion, frame) = PendingCompletion::channel();
    let completion = Arc::new(completion);

    let delegate: Arc<dyn StreamDelegate> = Arc::new(AbortOnFailure {
        completion: Arc::clone(&completion),
    });
    let stream = factory.create(filter, configuration, Some(delegate))?;
    progress.advance(CapturePhase::StreamCreated);

    let handler: Arc<dyn StreamOutput> = Arc::new(FirstFrame {
        completion: Arc::clone(&completion),
        convert,
    });
    stream.add_output(ChannelKind::Video, handler, None)?;
    progress.advance(CapturePhase::OutputAttached);

    stream.start().await?;
    progress.advance(CapturePhase::Capturing);

    let outcome = frame.await.unwrap_or_else(|_| {
        Err(BridgeError::Screenshot(
            "capture ended without producing a frame".into(),
        ))
    });
    progress.advance(CapturePhase::FrameResolved);

    if let Err(e) = stream.remove_output(ChannelKind::Video) {
        tracing::debug!("Single-frame output already gone: {}", e);
    }
    if stream.state() == SessionState::Started {
        if let Err(e) = stream.stop().await {
            tracing::warn!("Failed to stop single-frame stream {}: {}", stream.id(), e);
        }
    }
    progress.advance(CapturePhase::Stopped);

    match &outcome {
        Ok(_) => tracing::debug!("Single-frame capture on stream {} succeeded", stream.id()),
        Err(e) => tracing::warn!("Single-frame capture on stream {} failed: {}", stream.id(), e),
    }
    outcome
}
