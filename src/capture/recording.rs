//! Recording outputs
//!
//! A recording output can be attached to a running stream on platform
//! revisions that support it. The bridge only tracks the attachment and
//! reports lifecycle events to the delegate; writing the file is the
//! platform's job. The output also keeps a running total of the media
//! duration and bytes handed to the writer.

use crate::capture::sample::SampleTime;
use crate::error::StreamFailure;
use parking_lot::Mutex as ParkingMutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    #[default]
    H264,
    Hevc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Mp4,
    Mov,
}

/// Where and how a recording output writes
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingConfiguration {
    pub output_path: PathBuf,
    pub video_codec: VideoCodec,
    pub file_type: FileType,
}

impl RecordingConfiguration {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            video_codec: VideoCodec::default(),
            file_type: FileType::default(),
        }
    }
}

/// Recording lifecycle observer
pub trait RecordingDelegate: Send + Sync {
    fn recording_did_start(&self) {}

    fn recording_did_fail(&self, _failure: &StreamFailure) {}

    fn recording_did_finish(&self) {}
}

/// A file recording sink attached to a stream
pub struct RecordingOutput {
    configuration: RecordingConfiguration,
    delegate: ParkingMutex<Option<Box<dyn RecordingDelegate>>>,
    recording: AtomicBool,
    progress: ParkingMutex<Progress>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    duration: Duration,
    bytes: u64,
}

impl RecordingOutput {
    pub fn new(configuration: RecordingConfiguration) -> Self {
        Self {
            configuration,
            delegate: ParkingMutex::new(None),
            recording: AtomicBool::new(false),
            progress: ParkingMutex::new(Progress::default()),
        }
    }

    pub fn with_delegate(configuration: RecordingConfiguration, delegate: Box<dyn RecordingDelegate>) -> Self {
        Self {
            delegate: ParkingMutex::new(Some(delegate)),
            ..Self::new(configuration)
        }
    }

    pub fn configuration(&self) -> &RecordingConfiguration {
        &self.configuration
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// Media time written so far
    pub fn recorded_duration(&self) -> SampleTime {
        SampleTime::from_duration(self.progress.lock().duration)
    }

    /// Bytes written so far
    pub fn recorded_file_size(&self) -> u64 {
        self.progress.lock().bytes
    }

    /// Account for one frame handed to the writer; ignored while idle
    pub(crate) fn append(&self, duration: Duration, bytes: usize) {
        if !self.is_recording() {
            return;
        }
        let mut progress = self.progress.lock();
        progress.duration += duration;
        progress.bytes = progress.bytes.saturating_add(bytes as u64);
    }

    pub(crate) fn notify_started(&self) {
        if self.recording.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("Recording to {}", self.configuration.output_path.display());
        if let Some(delegate) = self.delegate.lock().as_ref() {
            delegate.recording_did_start();
        }
    }

    pub(crate) fn notify_failed(&self, failure: &StreamFailure) {
        self.recording.store(false, Ordering::Release);
        tracing::warn!("Recording failed: {}", failure);
        if let Some(delegate) = self.delegate.lock().as_ref() {
            delegate.recording_did_fail(failure);
        }
    }

    pub(crate) fn notify_finished(&self) {
        if !self.recording.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::info!(
            "Recording finished: {} ({:.2}s, {} bytes)",
            self.configuration.output_path.display(),
            self.recorded_duration().seconds(),
            self.recorded_file_size()
        );
        if let Some(delegate) = self.delegate.lock().as_ref() {
            delegate.recording_did_finish();
        }
    }
}

impl std::fmt::Debug for RecordingOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingOutput")
            .field("configuration", &self.configuration)
            .field("recording", &self.is_recording())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Default)]
    struct Counts {
        started: AtomicUsize,
        failed: AtomicUsize,
        finished: AtomicUsize,
    }

    struct Counting(Arc<Counts>);

    impl RecordingDelegate for Counting {
        fn recording_did_start(&self) {
            self.0.started.fetch_add(1, Ordering::SeqCst);
        }

        fn recording_did_fail(&self, _failure: &StreamFailure) {
            self.0.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn recording_did_finish(&self) {
            self.0.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_start_and_finish_fire_once() {
        let counts = Arc::new(Counts::default());
        let output = RecordingOutput::with_delegate(
            RecordingConfiguration::new("/tmp/out.mp4"),
            Box::new(Counting(Arc::clone(&counts))),
        );

        output.notify_started();
        output.notify_started();
        assert!(output.is_recording());
        output.notify_finished();
        output.notify_finished();
        assert!(!output.is_recording());

        assert_eq!(counts.started.load(Ordering::SeqCst), 1);
        assert_eq!(counts.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_progress_accumulates_only_while_recording() {
        let output = RecordingOutput::new(RecordingConfiguration::new("/tmp/progress.mp4"));
        output.append(Duration::from_millis(10), 100);
        assert_eq!(output.recorded_file_size(), 0);
        assert_eq!(output.recorded_duration(), SampleTime::from_duration(Duration::ZERO));

        output.notify_started();
        output.append(Duration::from_millis(10), 100);
        output.append(Duration::from_millis(20), 50);
        assert_eq!(output.recorded_file_size(), 150);
        assert!((output.recorded_duration().seconds() - 0.03).abs() < 1e-9);

        output.notify_finished();
        output.append(Duration::from_millis(10), 100);
        assert_eq!(output.recorded_file_size(), 150);
    }

    #[test]
    fn test_failure_stops_recording() {
        let counts = Arc::new(Counts::default());
        let output = RecordingOutput::with_delegate(
            RecordingConfiguration::new("/tmp/out.mov"),
            Box::new(Counting(Arc::clone(&counts))),
        );
        output.notify_started();
        output.notify_failed(&StreamFailure::new(Some(-3821), "disk full"));
        assert!(!output.is_recording());
        assert_eq!(counts.failed.load(Ordering::SeqCst), 1);
        output.notify_finished();
        assert_eq!(counts.finished.load(Ordering::SeqCst), 0);
    }
}
