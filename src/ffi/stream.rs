//! Stream configuration, streams, queues and recording outputs

use super::{
    from_c_str, issue, lookup, or_default, require_bridge, result_forwarder, to_c_string, ForeignContext,
    ResultCallback,
};
use crate::capture::channel::{ChannelKind, StreamDelegate, StreamId, StreamOutput};
use crate::capture::configuration::{FrameInterval, PixelFormat, StreamConfiguration};
use crate::capture::content::Rect;
use crate::capture::filter::ContentFilter;
use crate::capture::recording::{FileType, RecordingConfiguration, RecordingDelegate, RecordingOutput, VideoCodec};
use crate::capture::sample::{MediaSample, SampleTime, SynchronizationClock};
use crate::capture::stream::CaptureStream;
use crate::dispatch::{DispatchQueue, QualityOfService};
use crate::error::{BridgeError, BridgeResult, StreamFailure};
use crate::handle::HandleTable;
use std::ffi::{c_char, c_void};
use std::sync::{Arc, Weak};

/// Flat view of a [`StreamConfiguration`]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StreamConfigurationDesc {
    pub width: u32,
    pub height: u32,
    /// FourCC, e.g. `'BGRA'`
    pub pixel_format: u32,
    pub minimum_frame_interval: FrameInterval,
    pub queue_depth: u32,
    pub shows_cursor: bool,
    pub captures_audio: bool,
    pub captures_microphone: bool,
    pub sample_rate: u32,
    pub channel_count: u32,
    pub excludes_current_process_audio: bool,
    /// Zero rect for the whole content
    pub source_rect: Rect,
    /// Zero rect for the whole output
    pub destination_rect: Rect,
    pub scales_to_fit: bool,
    pub shows_mouse_clicks: bool,
    pub ignores_shadows: bool,
}

impl From<&StreamConfiguration> for StreamConfigurationDesc {
    fn from(config: &StreamConfiguration) -> Self {
        Self {
            width: config.width(),
            height: config.height(),
            pixel_format: config.pixel_format().fourcc(),
            minimum_frame_interval: config.minimum_frame_interval(),
            queue_depth: config.queue_depth(),
            shows_cursor: config.shows_cursor(),
            captures_audio: config.captures_audio(),
            captures_microphone: config.captures_microphone(),
            sample_rate: config.sample_rate(),
            channel_count: config.channel_count(),
            excludes_current_process_audio: config.excludes_current_process_audio(),
            source_rect: config.source_rect(),
            destination_rect: config.destination_rect(),
            scales_to_fit: config.scales_to_fit(),
            shows_mouse_clicks: config.shows_mouse_clicks(),
            ignores_shadows: config.ignores_shadows(),
        }
    }
}

impl TryFrom<&StreamConfigurationDesc> for StreamConfiguration {
    type Error = BridgeError;

    fn try_from(desc: &StreamConfigurationDesc) -> BridgeResult<Self> {
        let format = PixelFormat::from_fourcc(desc.pixel_format).ok_or_else(|| {
            BridgeError::Configuration(format!("unknown pixel format {:#010x}", desc.pixel_format))
        })?;
        Ok(StreamConfiguration::new()
            .with_size(desc.width, desc.height)
            .with_pixel_format(format)
            .with_minimum_frame_interval(desc.minimum_frame_interval)
            .with_queue_depth(desc.queue_depth)
            .with_shows_cursor(desc.shows_cursor)
            .with_captures_audio(desc.captures_audio)
            .with_captures_microphone(desc.captures_microphone)
            .with_audio_format(desc.sample_rate, desc.channel_count)
            .with_excludes_current_process_audio(desc.excludes_current_process_audio)
            .with_source_rect(desc.source_rect)
            .with_destination_rect(desc.destination_rect)
            .with_scales_to_fit(desc.scales_to_fit)
            .with_shows_mouse_clicks(desc.shows_mouse_clicks)
            .with_ignores_shadows(desc.ignores_shadows))
    }
}

/// # Safety
/// `out` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn cb_stream_configuration_get_defaults(out: *mut StreamConfigurationDesc) -> bool {
    if out.is_null() {
        return false;
    }
    *out = StreamConfigurationDesc::from(&StreamConfiguration::default());
    true
}

/// # Safety
/// `desc` must be null or point to a valid descriptor.
#[no_mangle]
pub unsafe extern "C" fn cb_stream_configuration_create(desc: *const StreamConfigurationDesc) -> u64 {
    let Some(desc) = desc.as_ref() else {
        return 0;
    };
    match StreamConfiguration::try_from(desc) {
        Ok(config) => issue(Arc::new(config)),
        Err(e) => {
            tracing::error!("Invalid stream configuration: {}", e);
            0
        }
    }
}

/// # Safety
/// `out` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn cb_stream_configuration_describe(
    configuration: u64,
    out: *mut StreamConfigurationDesc,
) -> bool {
    if out.is_null() {
        return false;
    }
    match lookup::<StreamConfiguration>(configuration) {
        Ok(config) => {
            *out = StreamConfigurationDesc::from(config.as_ref());
            true
        }
        Err(e) => {
            tracing::warn!("Describe configuration failed: {}", e);
            false
        }
    }
}

/// `(stream, code, message)`, for a stream that stopped on its own
pub type ErrorCallback = extern "C" fn(stream: u64, code: i32, message: *const c_char);

/// `(stream, active)`
pub type ActivityCallback = extern "C" fn(stream: u64, active: bool);

/// `(stream, sample, channel)`; the caller owns `sample`
pub type SampleCallback = extern "C" fn(stream: u64, sample: u64, channel: i32);

struct ForeignDelegate {
    on_error: Option<ErrorCallback>,
    on_activity: Option<ActivityCallback>,
}

impl StreamDelegate for ForeignDelegate {
    fn did_stop_with_error(&self, stream: StreamId, failure: &StreamFailure) {
        if let Some(callback) = self.on_error {
            let message = to_c_string(&failure.message);
            callback(stream, failure.code(), message.as_ptr());
        }
    }

    fn did_become_active(&self, stream: StreamId) {
        if let Some(callback) = self.on_activity {
            callback(stream, true);
        }
    }

    fn did_become_inactive(&self, stream: StreamId) {
        if let Some(callback) = self.on_activity {
            callback(stream, false);
        }
    }
}

/// Hands each sample to C as a fresh handle
struct ForeignOutput {
    callback: SampleCallback,
    handles: Weak<HandleTable>,
}

impl StreamOutput for ForeignOutput {
    fn did_output_sample(&self, stream: StreamId, sample: Arc<MediaSample>, kind: ChannelKind) {
        let Some(handles) = self.handles.upgrade() else {
            return;
        };
        match handles.insert(sample) {
            Ok(handle) => (self.callback)(stream, handle.into_raw(), kind.code()),
            Err(e) => tracing::error!("Dropped {} sample of stream {}: {}", kind, stream, e),
        }
    }
}

fn create_stream(
    filter: u64,
    configuration: u64,
    on_error: Option<ErrorCallback>,
    on_activity: Option<ActivityCallback>,
) -> u64 {
    let result = require_bridge().and_then(|bridge| {
        let filter = lookup::<ContentFilter>(filter)?;
        let configuration = lookup::<StreamConfiguration>(configuration)?;
        let delegate: Option<Arc<dyn StreamDelegate>> = if on_error.is_some() || on_activity.is_some() {
            Some(Arc::new(ForeignDelegate {
                on_error,
                on_activity,
            }))
        } else {
            None
        };
        bridge.create_stream(&filter, &configuration, delegate)
    });
    match result {
        Ok(stream) => issue(stream),
        Err(e) => {
            tracing::error!("Stream creation failed: {}", e);
            0
        }
    }
}

/// Create a stream; 0 on failure
#[no_mangle]
pub extern "C" fn cb_stream_create(filter: u64, configuration: u64, on_error: Option<ErrorCallback>) -> u64 {
    create_stream(filter, configuration, on_error, None)
}

#[no_mangle]
pub extern "C" fn cb_stream_create_with_delegate(
    filter: u64,
    configuration: u64,
    on_error: Option<ErrorCallback>,
    on_activity: Option<ActivityCallback>,
) -> u64 {
    create_stream(filter, configuration, on_error, on_activity)
}

/// Identity passed to sample, error and activity callbacks; 0 if invalid
#[no_mangle]
pub extern "C" fn cb_stream_get_id(stream: u64) -> u64 {
    or_default("stream id", lookup::<CaptureStream>(stream).map(|s| s.id()), 0)
}

/// Session state code, or -1 for an invalid handle
#[no_mangle]
pub extern "C" fn cb_stream_get_state(stream: u64) -> i32 {
    or_default("stream state", lookup::<CaptureStream>(stream).map(|s| s.state() as i32), -1)
}

fn add_output(stream: u64, channel: i32, callback: Option<SampleCallback>, queue: u64) -> bool {
    let result = require_bridge().and_then(|bridge| {
        let stream = lookup::<CaptureStream>(stream)?;
        let kind = ChannelKind::from_code(channel)
            .ok_or_else(|| BridgeError::Configuration(format!("unknown channel kind {}", channel)))?;
        let callback = callback.ok_or_else(|| BridgeError::Configuration("sample callback is null".into()))?;
        let queue = if queue == 0 {
            None
        } else {
            Some(lookup::<DispatchQueue>(queue)?)
        };
        let output: Arc<dyn StreamOutput> = Arc::new(ForeignOutput {
            callback,
            handles: Arc::downgrade(bridge.handles()),
        });
        stream.add_output(kind, output, queue)
    });
    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::error!("Adding output failed: {}", e);
            false
        }
    }
}

/// Attach a sample callback for a channel, delivered on the default queue
#[no_mangle]
pub extern "C" fn cb_stream_add_output(stream: u64, channel: i32, callback: Option<SampleCallback>) -> bool {
    add_output(stream, channel, callback, 0)
}

#[no_mangle]
pub extern "C" fn cb_stream_add_output_with_queue(
    stream: u64,
    channel: i32,
    callback: Option<SampleCallback>,
    queue: u64,
) -> bool {
    add_output(stream, channel, callback, queue)
}

#[no_mangle]
pub extern "C" fn cb_stream_remove_output(stream: u64, channel: i32) -> bool {
    let result = lookup::<CaptureStream>(stream).and_then(|stream| {
        let kind = ChannelKind::from_code(channel)
            .ok_or_else(|| BridgeError::Configuration(format!("unknown channel kind {}", channel)))?;
        stream.remove_output(kind)
    });
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Removing output failed: {}", e);
            false
        }
    }
}

/// Resolve the bridge and a stream for an async entry point
///
/// On failure the callback has already been invoked.
fn async_target(
    stream: u64,
    callback: Option<ResultCallback>,
    context: ForeignContext,
) -> Option<(Arc<crate::bridge::Bridge>, Arc<CaptureStream>)> {
    let target = require_bridge().and_then(|bridge| {
        let stream = lookup::<CaptureStream>(stream)?;
        Ok((bridge, stream))
    });
    match target {
        Ok(target) => Some(target),
        Err(e) => {
            result_forwarder(callback, context)(Err(e));
            None
        }
    }
}

#[no_mangle]
pub extern "C" fn cb_stream_start_capture(stream: u64, context: *mut c_void, callback: Option<ResultCallback>) {
    let context = ForeignContext::new(context);
    if let Some((bridge, stream)) = async_target(stream, callback, context) {
        bridge.start_capture(stream, result_forwarder(callback, context));
    }
}

#[no_mangle]
pub extern "C" fn cb_stream_stop_capture(stream: u64, context: *mut c_void, callback: Option<ResultCallback>) {
    let context = ForeignContext::new(context);
    if let Some((bridge, stream)) = async_target(stream, callback, context) {
        bridge.stop_capture(stream, result_forwarder(callback, context));
    }
}

#[no_mangle]
pub extern "C" fn cb_stream_update_content_filter(
    stream: u64,
    filter: u64,
    context: *mut c_void,
    callback: Option<ResultCallback>,
) {
    let context = ForeignContext::new(context);
    let Some((bridge, stream)) = async_target(stream, callback, context) else {
        return;
    };
    match lookup::<ContentFilter>(filter) {
        Ok(filter) => bridge.update_content_filter(
            stream,
            ContentFilter::clone(&filter),
            result_forwarder(callback, context),
        ),
        Err(e) => result_forwarder(callback, context)(Err(e)),
    }
}

/// Fails before returning on platforms without live configuration updates
#[no_mangle]
pub extern "C" fn cb_stream_update_configuration(
    stream: u64,
    configuration: u64,
    context: *mut c_void,
    callback: Option<ResultCallback>,
) {
    let context = ForeignContext::new(context);
    let Some((bridge, stream)) = async_target(stream, callback, context) else {
        return;
    };
    match lookup::<StreamConfiguration>(configuration) {
        Ok(config) => bridge.update_configuration(
            stream,
            StreamConfiguration::clone(&config),
            result_forwarder(callback, context),
        ),
        Err(e) => result_forwarder(callback, context)(Err(e)),
    }
}

#[no_mangle]
pub extern "C" fn cb_stream_add_recording_output(
    stream: u64,
    recording: u64,
    context: *mut c_void,
    callback: Option<ResultCallback>,
) {
    let context = ForeignContext::new(context);
    let Some((bridge, stream)) = async_target(stream, callback, context) else {
        return;
    };
    match lookup::<RecordingOutput>(recording) {
        Ok(output) => bridge.add_recording_output(stream, output, result_forwarder(callback, context)),
        Err(e) => result_forwarder(callback, context)(Err(e)),
    }
}

#[no_mangle]
pub extern "C" fn cb_stream_remove_recording_output(
    stream: u64,
    recording: u64,
    context: *mut c_void,
    callback: Option<ResultCallback>,
) {
    let context = ForeignContext::new(context);
    let Some((bridge, stream)) = async_target(stream, callback, context) else {
        return;
    };
    match lookup::<RecordingOutput>(recording) {
        Ok(output) => bridge.remove_recording_output(stream, output, result_forwarder(callback, context)),
        Err(e) => result_forwarder(callback, context)(Err(e)),
    }
}

/// Clock handle owned by the caller; 0 before start or on older platforms
#[no_mangle]
pub extern "C" fn cb_stream_get_synchronization_clock(stream: u64) -> u64 {
    match lookup::<CaptureStream>(stream).map(|s| s.synchronization_clock()) {
        Ok(Some(clock)) => issue(clock),
        Ok(None) => 0,
        Err(e) => {
            tracing::warn!("Synchronization clock lookup failed: {}", e);
            0
        }
    }
}

/// # Safety
/// `out` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn cb_clock_get_time(clock: u64, out: *mut SampleTime) -> bool {
    if out.is_null() {
        return false;
    }
    match lookup::<SynchronizationClock>(clock) {
        Ok(clock) => {
            *out = clock.now();
            true
        }
        Err(e) => {
            tracing::warn!("Clock read failed: {}", e);
            false
        }
    }
}

/// Create a serial delivery queue; `qos` is 0 (background) to 4
///
/// # Safety
/// `label` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn cb_dispatch_queue_create(label: *const c_char, qos: i32) -> u64 {
    let label = from_c_str(label).unwrap_or_else(|| "capture-bridge.queue".to_string());
    let qos = QualityOfService::from_code(qos).unwrap_or_default();
    match DispatchQueue::new(label, qos) {
        Ok(queue) => issue(Arc::new(queue)),
        Err(e) => {
            tracing::error!("Failed to create dispatch queue: {}", e);
            0
        }
    }
}

/// Quality-of-service code of a queue, or -1 for an invalid handle
#[no_mangle]
pub extern "C" fn cb_dispatch_queue_get_qos(queue: u64) -> i32 {
    or_default("queue qos", lookup::<DispatchQueue>(queue).map(|q| q.qos() as i32), -1)
}

pub type RecordingEventCallback = extern "C" fn(context: *mut c_void);

pub type RecordingFailureCallback = extern "C" fn(context: *mut c_void, code: i32, message: *const c_char);

struct ForeignRecordingDelegate {
    context: ForeignContext,
    on_started: Option<RecordingEventCallback>,
    on_failed: Option<RecordingFailureCallback>,
    on_finished: Option<RecordingEventCallback>,
}

impl RecordingDelegate for ForeignRecordingDelegate {
    fn recording_did_start(&self) {
        if let Some(callback) = self.on_started {
            callback(self.context.as_ptr());
        }
    }

    fn recording_did_fail(&self, failure: &StreamFailure) {
        if let Some(callback) = self.on_failed {
            let message = to_c_string(&failure.message);
            callback(self.context.as_ptr(), failure.code(), message.as_ptr());
        }
    }

    fn recording_did_finish(&self) {
        if let Some(callback) = self.on_finished {
            callback(self.context.as_ptr());
        }
    }
}

/// Create a recording output; `codec` 0 = H.264, 1 = HEVC; `file_type`
/// 0 = MP4, 1 = QuickTime
///
/// # Safety
/// `output_path` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn cb_recording_output_create(
    output_path: *const c_char,
    codec: i32,
    file_type: i32,
    context: *mut c_void,
    on_started: Option<RecordingEventCallback>,
    on_failed: Option<RecordingFailureCallback>,
    on_finished: Option<RecordingEventCallback>,
) -> u64 {
    let Some(path) = from_c_str(output_path) else {
        tracing::error!("Recording output needs a path");
        return 0;
    };
    let mut configuration = RecordingConfiguration::new(path);
    configuration.video_codec = if codec == 1 { VideoCodec::Hevc } else { VideoCodec::H264 };
    configuration.file_type = if file_type == 1 { FileType::Mov } else { FileType::Mp4 };

    let delegate = ForeignRecordingDelegate {
        context: ForeignContext::new(context),
        on_started,
        on_failed,
        on_finished,
    };
    issue(Arc::new(RecordingOutput::with_delegate(configuration, Box::new(delegate))))
}

/// Media time recorded so far
///
/// # Safety
/// `out` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn cb_recording_output_get_recorded_duration(recording: u64, out: *mut SampleTime) -> bool {
    if out.is_null() {
        return false;
    }
    match lookup::<RecordingOutput>(recording) {
        Ok(recording) => {
            *out = recording.recorded_duration();
            true
        }
        Err(e) => {
            tracing::warn!("Recorded duration lookup failed: {}", e);
            false
        }
    }
}

/// Bytes recorded so far, or -1 for an invalid handle
#[no_mangle]
pub extern "C" fn cb_recording_output_get_recorded_file_size(recording: u64) -> i64 {
    let size = lookup::<RecordingOutput>(recording)
        .map(|recording| i64::try_from(recording.recorded_file_size()).unwrap_or(i64::MAX));
    or_default("recorded file size", size, -1)
}
