//! Synthetic capture backend
//!
//! Produces a moving BGRA test pattern and a sine tone at the configured
//! cadence, without touching any platform API. It backs the C surface on
//! hosts without a native backend and drives the test suite.

use crate::capability::PlatformRevision;
use crate::capture::backend::{CaptureBackend, PlatformStream, StreamEvents};
use crate::capture::channel::ChannelKind;
use crate::capture::configuration::{PixelFormat, StreamConfiguration};
use crate::capture::filter::ContentFilter;
use crate::capture::recording::RecordingOutput;
use crate::capture::sample::{AudioBuffer, MediaSample, SynchronizationClock, VideoFrame};
use crate::error::{BridgeError, BridgeResult, StreamFailure};
use async_trait::async_trait;
use parking_lot::Mutex as ParkingMutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const TONE_HZ: f32 = 440.0;
const ROW_ALIGNMENT: usize = 64;
const MIN_TICK: Duration = Duration::from_millis(1);

/// Backend that fabricates frames and audio
pub struct SyntheticBackend {
    revision: PlatformRevision,
    fail_next_start: Arc<AtomicBool>,
    fail_next_disable: Arc<AtomicBool>,
    streams: ParkingMutex<Vec<Weak<Shared>>>,
}

impl SyntheticBackend {
    pub fn new(revision: PlatformRevision) -> Self {
        Self {
            revision,
            fail_next_start: Arc::new(AtomicBool::new(false)),
            fail_next_disable: Arc::new(AtomicBool::new(false)),
            streams: ParkingMutex::new(Vec::new()),
        }
    }

    /// Make the next `start` on any stream of this backend fail
    pub fn fail_next_start(&self) {
        self.fail_next_start.store(true, Ordering::SeqCst);
    }

    /// Make the next output detach on any stream of this backend fail
    pub fn fail_next_disable(&self) {
        self.fail_next_disable.store(true, Ordering::SeqCst);
    }

    /// Views of every stream still alive
    pub fn streams(&self) -> Vec<SyntheticStreamView> {
        let mut streams = self.streams.lock();
        streams.retain(|weak| weak.strong_count() > 0);
        streams
            .iter()
            .filter_map(Weak::upgrade)
            .map(SyntheticStreamView)
            .collect()
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(PlatformRevision::LATEST)
    }
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn platform_revision(&self) -> PlatformRevision {
        self.revision
    }

    fn create_stream(
        &self,
        filter: ContentFilter,
        configuration: StreamConfiguration,
        events: Arc<dyn StreamEvents>,
    ) -> BridgeResult<Box<dyn PlatformStream>> {
        let shared = Arc::new(Shared {
            filter: ParkingMutex::new(filter),
            configuration: ParkingMutex::new(configuration),
            events,
            enabled: ParkingMutex::new(HashSet::new()),
            running: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            filter_updates: AtomicUsize::new(0),
            configuration_updates: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            recordings: ParkingMutex::new(Vec::new()),
            clock: ParkingMutex::new(None),
            task: ParkingMutex::new(None),
            fail_next_start: Arc::clone(&self.fail_next_start),
            fail_next_disable: Arc::clone(&self.fail_next_disable),
        });
        self.streams.lock().push(Arc::downgrade(&shared));
        Ok(Box::new(SyntheticStream { shared }))
    }
}

struct Shared {
    filter: ParkingMutex<ContentFilter>,
    configuration: ParkingMutex<StreamConfiguration>,
    events: Arc<dyn StreamEvents>,
    enabled: ParkingMutex<HashSet<ChannelKind>>,
    running: AtomicBool,
    ticks: AtomicU64,
    filter_updates: AtomicUsize,
    configuration_updates: AtomicUsize,
    stop_calls: AtomicUsize,
    recordings: ParkingMutex<Vec<Arc<RecordingOutput>>>,
    clock: ParkingMutex<Option<Arc<SynchronizationClock>>>,
    task: ParkingMutex<Option<JoinHandle<()>>>,
    fail_next_start: Arc<AtomicBool>,
    fail_next_disable: Arc<AtomicBool>,
}

fn frame_period(configuration: &StreamConfiguration) -> Duration {
    configuration
        .minimum_frame_interval()
        .as_duration()
        .unwrap_or(MIN_TICK)
        .max(MIN_TICK)
}

/// Emit one tick per `period`, the first one a full period after launch
fn spawn_emitter(shared: &Arc<Shared>, clock: Arc<SynchronizationClock>, period: Duration) -> JoinHandle<()> {
    let weak = Arc::downgrade(shared);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            if !shared.running.load(Ordering::SeqCst) {
                break;
            }
            shared.emit(&clock);
        }
    })
}

impl Shared {
    /// Stop emitting and hand back the emission task, if any
    fn halt(&self) -> Option<JoinHandle<()>> {
        self.running.store(false, Ordering::SeqCst);
        let task = self.task.lock().take();
        if let Some(task) = &task {
            task.abort();
        }
        *self.clock.lock() = None;
        task
    }

    /// Swap the emission task for one running at `period`
    fn reschedule(self: &Arc<Self>, period: Duration) {
        let Some(clock) = self.clock.lock().clone() else {
            return;
        };
        let mut task = self.task.lock();
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if let Some(previous) = task.take() {
            previous.abort();
        }
        *task = Some(spawn_emitter(self, clock, period));
        tracing::debug!("Synthetic stream rescheduled ({:?} per frame)", period);
    }

    fn finish_recordings(&self) {
        let recordings: Vec<_> = self.recordings.lock().drain(..).collect();
        for recording in recordings {
            recording.notify_finished();
        }
    }

    fn fail_recordings(&self, failure: &StreamFailure) {
        let recordings: Vec<_> = self.recordings.lock().drain(..).collect();
        for recording in recordings {
            recording.notify_failed(failure);
        }
    }

    fn emit(&self, clock: &SynchronizationClock) {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        let configuration = self.configuration.lock().clone();
        let enabled = self.enabled.lock().clone();
        let now = clock.now();

        if enabled.contains(&ChannelKind::Video) {
            self.events
                .sample(MediaSample::video(now, test_pattern(&configuration, tick)));
        }
        let interval = frame_period(&configuration);
        let recordings = self.recordings.lock().clone();
        if !recordings.is_empty() {
            let bytes = frame_len(&configuration);
            for recording in recordings {
                recording.append(interval, bytes);
            }
        }
        if configuration.captures_audio() && enabled.contains(&ChannelKind::Audio) {
            let buffer = tone(&configuration, interval, tick);
            self.events.sample(MediaSample::audio(ChannelKind::Audio, now, buffer));
        }
        if configuration.captures_microphone() && enabled.contains(&ChannelKind::Microphone) {
            let buffer = tone(&configuration, interval, tick);
            self.events
                .sample(MediaSample::audio(ChannelKind::Microphone, now, buffer));
        }
    }
}

/// A synthetic platform stream
pub struct SyntheticStream {
    shared: Arc<Shared>,
}

#[async_trait]
impl PlatformStream for SyntheticStream {
    fn enable_output(&self, kind: ChannelKind) -> BridgeResult<()> {
        self.shared.enabled.lock().insert(kind);
        Ok(())
    }

    fn disable_output(&self, kind: ChannelKind) -> BridgeResult<()> {
        if self.shared.fail_next_disable.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::Stream(format!("failed to detach {} output", kind)));
        }
        self.shared.enabled.lock().remove(&kind);
        Ok(())
    }

    async fn start(&self) -> BridgeResult<()> {
        if self.shared.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::Stream(
                "failed to start stream: the display is unavailable".into(),
            ));
        }
        let period = frame_period(&self.shared.configuration.lock());
        {
            let mut task = self.shared.task.lock();
            if self.shared.running.load(Ordering::SeqCst) {
                return Err(BridgeError::Stream("stream is already running".into()));
            }
            let clock = Arc::new(SynchronizationClock::new());
            *self.shared.clock.lock() = Some(Arc::clone(&clock));
            *task = Some(spawn_emitter(&self.shared, clock, period));
            self.shared.running.store(true, Ordering::SeqCst);
        }

        tracing::debug!("Synthetic stream started ({:?} per frame)", period);
        self.shared.events.activity_changed(true);
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.shared.stop_calls.fetch_add(1, Ordering::SeqCst);
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(BridgeError::Stream("stream is not running".into()));
        }
        if let Some(task) = self.shared.halt() {
            // Cancellation is the expected outcome
            let _ = task.await;
        }
        self.shared.finish_recordings();
        tracing::debug!("Synthetic stream stopped after {} ticks", self.shared.ticks.load(Ordering::SeqCst));
        self.shared.events.activity_changed(false);
        Ok(())
    }

    async fn update_content_filter(&self, filter: ContentFilter) -> BridgeResult<()> {
        *self.shared.filter.lock() = filter;
        self.shared.filter_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_configuration(&self, configuration: StreamConfiguration) -> BridgeResult<()> {
        let period = frame_period(&configuration);
        let previous = std::mem::replace(&mut *self.shared.configuration.lock(), configuration);
        self.shared.configuration_updates.fetch_add(1, Ordering::SeqCst);
        if frame_period(&previous) != period {
            self.shared.reschedule(period);
        }
        Ok(())
    }

    async fn add_recording_output(&self, output: Arc<RecordingOutput>) -> BridgeResult<()> {
        let mut recordings = self.shared.recordings.lock();
        if recordings.iter().any(|r| Arc::ptr_eq(r, &output)) {
            return Err(BridgeError::Stream("recording output is already attached".into()));
        }
        recordings.push(Arc::clone(&output));
        drop(recordings);
        output.notify_started();
        Ok(())
    }

    async fn remove_recording_output(&self, output: Arc<RecordingOutput>) -> BridgeResult<()> {
        let removed = {
            let mut recordings = self.shared.recordings.lock();
            let before = recordings.len();
            recordings.retain(|r| !Arc::ptr_eq(r, &output));
            recordings.len() != before
        };
        if !removed {
            return Err(BridgeError::Stream("recording output is not attached".into()));
        }
        output.notify_finished();
        Ok(())
    }

    fn synchronization_clock(&self) -> Option<Arc<SynchronizationClock>> {
        self.shared.clock.lock().clone()
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.shared.halt();
        self.shared.finish_recordings();
    }
}

/// Test-side view of a synthetic stream
#[derive(Clone)]
pub struct SyntheticStreamView(Arc<Shared>);

impl SyntheticStreamView {
    pub fn is_running(&self) -> bool {
        self.0.running.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> u64 {
        self.0.ticks.load(Ordering::SeqCst)
    }

    pub fn filter_updates(&self) -> usize {
        self.0.filter_updates.load(Ordering::SeqCst)
    }

    pub fn configuration_updates(&self) -> usize {
        self.0.configuration_updates.load(Ordering::SeqCst)
    }

    /// Number of `stop` requests the platform received
    pub fn stop_calls(&self) -> usize {
        self.0.stop_calls.load(Ordering::SeqCst)
    }

    pub fn configuration(&self) -> StreamConfiguration {
        self.0.configuration.lock().clone()
    }

    pub fn filter(&self) -> ContentFilter {
        self.0.filter.lock().clone()
    }

    pub fn enabled_outputs(&self) -> Vec<ChannelKind> {
        let enabled = self.0.enabled.lock();
        ChannelKind::ALL
            .into_iter()
            .filter(|kind| enabled.contains(kind))
            .collect()
    }

    pub fn recording_count(&self) -> usize {
        self.0.recordings.lock().len()
    }

    /// Simulate the platform tearing the stream down
    pub fn fail(&self, failure: StreamFailure) {
        self.0.halt();
        self.0.fail_recordings(&failure);
        self.0.events.stopped_with_error(failure);
    }
}

fn row_stride(configuration: &StreamConfiguration) -> usize {
    let bpp = configuration.pixel_format().bytes_per_pixel() as usize;
    (configuration.width() as usize * bpp).div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT
}

/// Size of one encoded frame as the recorder sees it
fn frame_len(configuration: &StreamConfiguration) -> usize {
    row_stride(configuration) * configuration.height() as usize
}

fn test_pattern(configuration: &StreamConfiguration, tick: u64) -> VideoFrame {
    let width = configuration.width() as usize;
    let height = configuration.height() as usize;
    let format = configuration.pixel_format();
    let bpp = format.bytes_per_pixel() as usize;
    let bytes_per_row = row_stride(configuration);

    let mut row = vec![0u8; bytes_per_row];
    match format {
        PixelFormat::Bgra => {
            // Vertical bar sweeping left to right
            let bar = (tick as usize * 8) % width.max(1);
            for (x, px) in row[..width * 4].chunks_exact_mut(4).enumerate() {
                let lit = x >= bar && x < bar + 16;
                let shade = (x * 255 / width.max(1)) as u8;
                px.copy_from_slice(&[shade, if lit { 255 } else { 32 }, tick as u8, 255]);
            }
        }
        _ => row[..width * bpp].fill(128),
    }

    let mut data = Vec::with_capacity(bytes_per_row * height);
    for _ in 0..height {
        data.extend_from_slice(&row);
    }

    VideoFrame {
        width: width as u32,
        height: height as u32,
        bytes_per_row: bytes_per_row as u32,
        pixel_format: format,
        data,
    }
}

fn tone(configuration: &StreamConfiguration, interval: Duration, tick: u64) -> AudioBuffer {
    let sample_rate = configuration.sample_rate();
    let channels = configuration.channel_count() as usize;
    let frames = ((sample_rate as f64 * interval.as_secs_f64()).round() as usize).max(1);
    let start = tick as usize * frames;

    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = (start + i) as f32 / sample_rate as f32;
        let value = (t * TONE_HZ * std::f32::consts::TAU).sin() * 0.25;
        samples.extend(std::iter::repeat(value).take(channels));
    }

    AudioBuffer {
        sample_rate,
        channel_count: channels as u32,
        samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::configuration::FrameInterval;
    use crate::capture::content::{Display, Rect};
    use std::sync::mpsc;

    struct Collect {
        samples: ParkingMutex<mpsc::Sender<ChannelKind>>,
        activity: ParkingMutex<Vec<bool>>,
        failures: ParkingMutex<Vec<StreamFailure>>,
    }

    impl StreamEvents for Collect {
        fn sample(&self, sample: MediaSample) {
            let _ = self.samples.lock().send(sample.kind);
        }

        fn stopped_with_error(&self, failure: StreamFailure) {
            self.failures.lock().push(failure);
        }

        fn activity_changed(&self, active: bool) {
            self.activity.lock().push(active);
        }
    }

    fn collector() -> (Arc<Collect>, mpsc::Receiver<ChannelKind>) {
        let (tx, rx) = mpsc::channel();
        let events = Arc::new(Collect {
            samples: ParkingMutex::new(tx),
            activity: ParkingMutex::new(Vec::new()),
            failures: ParkingMutex::new(Vec::new()),
        });
        (events, rx)
    }

    fn filter() -> ContentFilter {
        ContentFilter::display(Display::new(1, Rect::new(0.0, 0.0, 64.0, 32.0), 1.0))
    }

    fn small_config() -> StreamConfiguration {
        StreamConfiguration::new()
            .with_size(32, 16)
            .with_minimum_frame_interval(FrameInterval::new(1, 200))
            .with_captures_audio(true)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_emits_enabled_channels_only() {
        let backend = SyntheticBackend::default();
        let (events, rx) = collector();
        let stream = backend
            .create_stream(filter(), small_config(), events.clone())
            .unwrap();
        stream.enable_output(ChannelKind::Video).unwrap();
        stream.start().await.unwrap();

        let first = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(2)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, ChannelKind::Video);

        stream.stop().await.unwrap();
        assert!(!backend.streams()[0].is_running());
        assert_eq!(*events.activity.lock(), vec![true, false]);
        assert!(stream.synchronization_clock().is_none());
    }

    #[tokio::test]
    async fn test_fail_next_start() {
        let backend = SyntheticBackend::default();
        let (events, _rx) = collector();
        let stream = backend.create_stream(filter(), small_config(), events).unwrap();
        backend.fail_next_start();
        assert!(stream.start().await.is_err());
        stream.start().await.unwrap();
        assert!(stream.synchronization_clock().is_some());
        assert!(stream.start().await.is_err());
        stream.stop().await.unwrap();
        assert!(stream.stop().await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure_reports_and_halts() {
        let backend = SyntheticBackend::default();
        let (events, _rx) = collector();
        let stream = backend
            .create_stream(filter(), small_config(), events.clone())
            .unwrap();
        stream.start().await.unwrap();

        let view = backend.streams().remove(0);
        view.fail(StreamFailure::new(Some(-3805), "display disconnected"));
        assert!(!view.is_running());
        assert_eq!(events.failures.lock()[0].code(), -3805);

        drop(view);
        drop(stream);
        assert!(backend.streams().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_fails_recordings() {
        use crate::capture::recording::{RecordingConfiguration, RecordingDelegate};

        struct Outcome(ParkingMutex<Vec<String>>);
        impl RecordingDelegate for Arc<Outcome> {
            fn recording_did_fail(&self, failure: &StreamFailure) {
                self.0.lock().push(format!("failed {} {}", failure.code(), failure.message));
            }

            fn recording_did_finish(&self) {
                self.0.lock().push("finished".into());
            }
        }

        let backend = SyntheticBackend::default();
        let (events, _rx) = collector();
        let stream = backend.create_stream(filter(), small_config(), events).unwrap();
        stream.start().await.unwrap();

        let outcome = Arc::new(Outcome(ParkingMutex::new(Vec::new())));
        let recording = Arc::new(RecordingOutput::with_delegate(
            RecordingConfiguration::new("/tmp/failing.mov"),
            Box::new(Arc::clone(&outcome)),
        ));
        stream.add_recording_output(Arc::clone(&recording)).await.unwrap();

        backend.streams()[0].fail(StreamFailure::new(Some(-3821), "disk full"));
        assert_eq!(*outcome.0.lock(), vec!["failed -3821 disk full".to_string()]);
        assert!(!recording.is_recording());
        assert_eq!(backend.streams()[0].recording_count(), 0);

        // Dropping the stream afterwards must not report a finish
        drop(stream);
        assert_eq!(outcome.0.lock().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interval_change_takes_effect_while_running() {
        let backend = SyntheticBackend::default();
        let (events, _rx) = collector();
        let slow = small_config().with_minimum_frame_interval(FrameInterval::new(1, 2));
        let stream = backend.create_stream(filter(), slow.clone(), events).unwrap();
        stream.start().await.unwrap();
        let view = backend.streams().remove(0);
        assert_eq!(view.ticks(), 0);

        stream
            .update_configuration(slow.with_minimum_frame_interval(FrameInterval::new(1, 500)))
            .await
            .unwrap();

        // At the old cadence the first tick would still be 500ms away
        tokio::time::timeout(Duration::from_millis(400), async {
            while view.ticks() < 5 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("new frame interval was not applied");
        stream.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_recording_progress_follows_frames() {
        use crate::capture::recording::RecordingConfiguration;

        let backend = SyntheticBackend::default();
        let (events, _rx) = collector();
        let config = small_config();
        let stream = backend.create_stream(filter(), config.clone(), events).unwrap();
        let recording = Arc::new(RecordingOutput::new(RecordingConfiguration::new("/tmp/progress.mp4")));
        stream.add_recording_output(Arc::clone(&recording)).await.unwrap();
        stream.start().await.unwrap();

        let view = backend.streams().remove(0);
        tokio::time::timeout(Duration::from_secs(2), async {
            while view.ticks() < 3 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
        stream.stop().await.unwrap();

        let ticks = view.ticks();
        assert_eq!(recording.recorded_file_size(), ticks * frame_len(&config) as u64);
        let expected = ticks as f64 / 200.0;
        assert!((recording.recorded_duration().seconds() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_pattern_rows_are_aligned() {
        let frame = test_pattern(&StreamConfiguration::new().with_size(10, 3), 0);
        assert_eq!(frame.bytes_per_row, 64);
        assert_eq!(frame.data.len(), 64 * 3);
        let image = MediaSample::video(Default::default(), frame).to_image().unwrap();
        assert_eq!(image.data.len(), 10 * 3 * 4);
    }

    #[test]
    fn test_tone_length_matches_interval() {
        let config = StreamConfiguration::new().with_audio_format(48_000, 2);
        let buffer = tone(&config, Duration::from_millis(10), 3);
        assert_eq!(buffer.frame_count(), 480);
        assert_eq!(buffer.samples.len(), 960);
    }
}
