use super::content::*;
use super::media::*;
use super::stream::*;
use super::*;
use crate::capability::PlatformRevision;
use crate::capture::configuration::{FrameInterval, PixelFormat};
use crate::capture::content::Rect;
use crate::capture::sample::SampleTime;
use crate::capture::stream::SessionState;
use crate::capture::synthetic::SyntheticBackend;
use crate::error::StreamFailure;
use crate::testing::{recv_within, TIMEOUT};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// The C surface has one global bridge; tests take turns
static SERIAL: Mutex<()> = parking_lot::const_mutex(());

static SAMPLES: Mutex<Vec<(u64, i32, u32)>> = parking_lot::const_mutex(Vec::new());
static ERRORS: Mutex<Vec<(u64, i32, String)>> = parking_lot::const_mutex(Vec::new());
static ACTIVITY: Mutex<Vec<(u64, bool)>> = parking_lot::const_mutex(Vec::new());

type Outcome = (bool, Option<String>);

struct Collector<T> {
    tx: Mutex<mpsc::Sender<T>>,
}

impl<T: 'static> Collector<T> {
    /// Leaked so a callback still inside `send` when the test returns never
    /// touches a freed context
    fn new() -> (&'static Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel();
        (Box::leak(Box::new(Self { tx: Mutex::new(tx) })), rx)
    }

    fn context(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    unsafe fn send(context: *mut c_void, value: T) {
        let collector = &*(context as *const Self);
        let _ = collector.tx.lock().send(value);
    }
}

extern "C" fn on_result(context: *mut c_void, success: bool, message: *const c_char) {
    unsafe { Collector::<Outcome>::send(context, (success, from_c_str(message))) }
}

extern "C" fn on_handle(handle: u64, error: *const c_char, user_data: *mut c_void) {
    unsafe { Collector::<(u64, Option<String>)>::send(user_data, (handle, from_c_str(error))) }
}

extern "C" fn on_sample(stream: u64, sample: u64, channel: i32) {
    let width = cb_media_sample_get_width(sample);
    cb_media_sample_release(sample);
    SAMPLES.lock().push((stream, channel, width));
}

extern "C" fn on_error(stream: u64, code: i32, message: *const c_char) {
    let message = unsafe { from_c_str(message) }.unwrap_or_default();
    ERRORS.lock().push((stream, code, message));
}

extern "C" fn on_activity(stream: u64, active: bool) {
    ACTIVITY.lock().push((stream, active));
}

extern "C" fn on_recording_started(context: *mut c_void) {
    unsafe { Collector::<String>::send(context, "started".into()) }
}

extern "C" fn on_recording_failed(context: *mut c_void, code: i32, message: *const c_char) {
    let message = unsafe { from_c_str(message) }.unwrap_or_default();
    unsafe { Collector::<String>::send(context, format!("failed {} {}", code, message)) }
}

extern "C" fn on_recording_finished(context: *mut c_void) {
    unsafe { Collector::<String>::send(context, "finished".into()) }
}

/// Holds the serial lock and tears the bridge down on exit
struct Session {
    _guard: parking_lot::MutexGuard<'static, ()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        cb_bridge_shutdown();
    }
}

fn session(config_json: &str) -> Session {
    let guard = SERIAL.lock();
    cb_bridge_shutdown();
    SAMPLES.lock().clear();
    ERRORS.lock().clear();
    ACTIVITY.lock().clear();
    let json = CString::new(config_json).unwrap();
    assert!(unsafe { cb_bridge_initialize(json.as_ptr()) });
    Session { _guard: guard }
}

/// Like [`session`], but over a backend the test keeps a hold of
fn session_with(backend: Arc<SyntheticBackend>) -> Session {
    let guard = SERIAL.lock();
    cb_bridge_shutdown();
    ERRORS.lock().clear();
    let bridge = Bridge::new(BridgeConfig::default(), backend).unwrap();
    assert!(install(bridge));
    Session { _guard: guard }
}

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !done() {
        assert!(Instant::now() < deadline, "condition not met within {:?}", TIMEOUT);
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn display_filter() -> (u64, u64) {
    let display = cb_display_create(1, Rect::new(0.0, 0.0, 64.0, 48.0), 2.0);
    let filter = cb_content_filter_create_with_display(display);
    assert_ne!(display, 0);
    assert_ne!(filter, 0);
    (display, filter)
}

fn small_configuration() -> u64 {
    let mut desc = std::mem::MaybeUninit::<StreamConfigurationDesc>::uninit();
    assert!(unsafe { cb_stream_configuration_get_defaults(desc.as_mut_ptr()) });
    let mut desc = unsafe { desc.assume_init() };
    desc.width = 16;
    desc.height = 8;
    desc.minimum_frame_interval = FrameInterval::new(1, 200);
    let config = unsafe { cb_stream_configuration_create(&desc) };
    assert_ne!(config, 0);
    config
}

#[test]
fn test_initialize_twice_and_shutdown_releases_everything() {
    let _session = session("{}");
    let json = CString::new("{}").unwrap();
    assert!(!unsafe { cb_bridge_initialize(json.as_ptr()) });

    let (display, _filter) = display_filter();
    assert_eq!(cb_bridge_live_handles(), 2);

    cb_bridge_shutdown();
    assert_eq!(cb_bridge_live_handles(), 0);
    // Releasing after shutdown is a logged no-op
    cb_display_release(display);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let _guard = SERIAL.lock();
    cb_bridge_shutdown();
    let json = CString::new(r#"{"workerThreads": 0}"#).unwrap();
    assert!(!unsafe { cb_bridge_initialize(json.as_ptr()) });
    let json = CString::new(r#"{"unknownKey": true}"#).unwrap();
    assert!(!unsafe { cb_bridge_initialize(json.as_ptr()) });
    assert!(current().is_none());
}

#[test]
fn test_retained_handles_are_independent() {
    let _session = session("{}");
    let display = cb_display_create(7, Rect::ZERO, 1.0);
    let retained = cb_display_retain(display);
    assert_ne!(retained, 0);
    assert_ne!(retained, display);

    cb_display_release(display);
    assert_eq!(cb_display_get_id(display), 0);
    assert_eq!(cb_display_get_id(retained), 7);

    cb_display_release(retained);
    // Double release is rejected, not a crash
    cb_display_release(retained);
    assert_eq!(cb_bridge_live_handles(), 0);
}

#[test]
fn test_handles_are_kind_checked() {
    let _session = session("{}");
    let display = cb_display_create(3, Rect::ZERO, 1.0);

    assert_eq!(cb_window_get_id(display), 0);
    cb_window_release(display);
    assert_eq!(cb_bridge_live_handles(), 1);
    assert_eq!(cb_window_retain(display), 0);

    cb_display_release(display);
    assert_eq!(cb_display_retain(0), 0);
    assert_eq!(cb_display_get_id(u64::MAX), 0);
}

#[test]
fn test_revision_gates_filter_accessors() {
    let _session = session(r#"{"platformRevision": "13.0"}"#);
    let mut major = 0u16;
    let mut minor = 0u16;
    assert!(unsafe { cb_bridge_platform_revision(&mut major, &mut minor) });
    assert_eq!((major, minor), (13, 0));
    assert!(cb_bridge_supports_feature(Feature::AudioCapture as i32));
    assert!(!cb_bridge_supports_feature(Feature::FilterIntrospection as i32));
    assert!(!cb_bridge_supports_feature(999));

    let (_, filter) = display_filter();
    assert_eq!(cb_content_filter_get_style(filter), 0);
    assert_eq!(cb_content_filter_get_stream_type(filter), -1);
    assert_eq!(cb_content_filter_get_point_pixel_scale(filter), 1.0);
    assert!(!cb_content_filter_set_include_menu_bar(filter, true));
    assert!(!cb_content_filter_get_include_menu_bar(filter));
    assert_eq!(cb_content_filter_get_included_displays_count(filter), 0);
}

#[test]
fn test_filter_introspection_on_latest_revision() {
    let _session = session("{}");
    let (_, filter) = display_filter();
    assert_eq!(cb_content_filter_get_style(filter), 2);
    assert_eq!(cb_content_filter_get_stream_type(filter), 1);
    assert_eq!(cb_content_filter_get_point_pixel_scale(filter), 2.0);
    assert_eq!(cb_content_filter_get_content_rect(filter), Rect::new(0.0, 0.0, 64.0, 48.0));
    assert!(cb_content_filter_set_include_menu_bar(filter, true));
    assert!(cb_content_filter_get_include_menu_bar(filter));

    assert_eq!(cb_content_filter_get_included_displays_count(filter), 1);
    let included = cb_content_filter_get_included_display_at(filter, 0);
    assert_eq!(cb_display_get_id(included), 1);
    cb_display_release(included);
    assert_eq!(cb_content_filter_get_included_display_at(filter, 1), 0);
}

#[test]
fn test_window_filter_reports_owner() {
    let _session = session("{}");
    let bundle = CString::new("com.example.editor").unwrap();
    let name = CString::new("Editor").unwrap();
    let app = unsafe { cb_application_create(4242, bundle.as_ptr(), name.as_ptr()) };
    let title = CString::new("untitled").unwrap();
    let window = unsafe { cb_window_create(9, Rect::new(10.0, 10.0, 200.0, 100.0), title.as_ptr(), app, true) };
    assert_ne!(window, 0);

    let filter = cb_content_filter_create_with_desktop_independent_window(window);
    assert_eq!(cb_content_filter_get_style(filter), 1);
    assert_eq!(cb_content_filter_get_included_windows_count(filter), 1);
    assert_eq!(cb_content_filter_get_included_applications_count(filter), 1);
    let owner = cb_content_filter_get_included_application_at(filter, 0);
    assert_eq!(cb_application_get_process_id(owner), 4242);

    // A bad handle in the list fails the whole constructor
    let (display, _) = display_filter();
    let windows = [window, display];
    let rejected = unsafe {
        cb_content_filter_create_with_display_including_windows(display, windows.as_ptr(), windows.len())
    };
    assert_eq!(rejected, 0);
}

#[test]
fn test_configuration_descriptor() {
    let _session = session("{}");
    let config = small_configuration();
    let mut desc = std::mem::MaybeUninit::<StreamConfigurationDesc>::uninit();
    assert!(unsafe { cb_stream_configuration_describe(config, desc.as_mut_ptr()) });
    let desc = unsafe { desc.assume_init() };
    assert_eq!((desc.width, desc.height), (16, 8));
    assert_eq!(desc.pixel_format, PixelFormat::Bgra.fourcc());

    let mut bad = desc;
    bad.pixel_format = 0x1234_5678;
    assert_eq!(unsafe { cb_stream_configuration_create(&bad) }, 0);
    assert!(!unsafe { cb_stream_configuration_describe(config, std::ptr::null_mut()) });
}

#[test]
fn test_stream_lifecycle_through_callbacks() {
    let _session = session("{}");
    let (_, filter) = display_filter();
    let config = small_configuration();
    let stream = cb_stream_create_with_delegate(filter, config, Some(on_error), Some(on_activity));
    assert_ne!(stream, 0);
    let id = cb_stream_get_id(stream);
    assert_eq!(cb_stream_get_state(stream), SessionState::Configured as i32);

    assert!(cb_stream_add_output(stream, 0, Some(on_sample)));
    assert!(!cb_stream_add_output(stream, 9, Some(on_sample)));
    assert!(!cb_stream_add_output(stream, 0, None));

    let (collector, rx) = Collector::<Outcome>::new();
    cb_stream_start_capture(stream, collector.context(), Some(on_result));
    assert_eq!(recv_within(&rx), (true, None));
    assert_eq!(cb_stream_get_state(stream), SessionState::Started as i32);

    wait_until(|| !SAMPLES.lock().is_empty());
    let (sample_stream, channel, width) = SAMPLES.lock()[0];
    assert_eq!((sample_stream, channel, width), (id, 0, 16));

    cb_stream_stop_capture(stream, collector.context(), Some(on_result));
    assert_eq!(recv_within(&rx), (true, None));
    assert_eq!(cb_stream_get_state(stream), SessionState::Stopped as i32);
    wait_until(|| ACTIVITY.lock().len() >= 2);
    assert_eq!(*ACTIVITY.lock(), vec![(id, true), (id, false)]);

    assert!(cb_stream_remove_output(stream, 0));
    assert!(!cb_stream_remove_output(stream, 0));
    assert!(ERRORS.lock().is_empty());

    cb_stream_release(stream);
    assert_eq!(cb_stream_get_state(stream), -1);
}

#[test]
fn test_stop_before_start_reports_failure() {
    let _session = session("{}");
    let (_, filter) = display_filter();
    let stream = cb_stream_create(filter, small_configuration(), None);

    let (collector, rx) = Collector::<Outcome>::new();
    cb_stream_stop_capture(stream, collector.context(), Some(on_result));
    let (success, message) = recv_within(&rx);
    assert!(!success);
    assert!(message.unwrap().contains("configured"));
    // Exactly once
    std::thread::sleep(Duration::from_millis(20));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_invalid_stream_reports_before_returning() {
    let _session = session("{}");
    let (collector, rx) = Collector::<Outcome>::new();
    cb_stream_start_capture(0xdead_beef, collector.context(), Some(on_result));
    let (success, message) = rx.try_recv().unwrap();
    assert!(!success);
    let message = message.unwrap();
    assert!(message.starts_with("Configuration error:"), "{}", message);
    assert!(!message.contains("Handle error"));

    // No callback is not a crash
    cb_stream_start_capture(0xdead_beef, std::ptr::null_mut(), None);
}

#[test]
fn test_configuration_update_is_gated() {
    let _session = session(r#"{"platformRevision": "12.3"}"#);
    let (_, filter) = display_filter();
    let config = small_configuration();
    let stream = cb_stream_create(filter, config, None);

    let (collector, rx) = Collector::<Outcome>::new();
    cb_stream_update_configuration(stream, config, collector.context(), Some(on_result));
    let (success, message) = rx.try_recv().unwrap();
    assert!(!success);
    assert!(message.unwrap().contains("13.0"));

    assert_eq!(cb_stream_get_synchronization_clock(stream), 0);
    // Audio outputs need 13.0 as well
    assert!(!cb_stream_add_output(stream, 1, Some(on_sample)));
}

#[test]
fn test_recording_output_round_trip() {
    let _session = session("{}");
    let (_, filter) = display_filter();
    let stream = cb_stream_create(filter, small_configuration(), None);
    let path = CString::new("/tmp/capture-bridge-test.mp4").unwrap();
    let recording =
        unsafe { cb_recording_output_create(path.as_ptr(), 1, 0, std::ptr::null_mut(), None, None, None) };
    assert_ne!(recording, 0);

    let (collector, rx) = Collector::<Outcome>::new();
    cb_stream_start_capture(stream, collector.context(), Some(on_result));
    assert!(recv_within(&rx).0);
    cb_stream_add_recording_output(stream, recording, collector.context(), Some(on_result));
    assert!(recv_within(&rx).0);

    let clock = cb_stream_get_synchronization_clock(stream);
    assert_ne!(clock, 0);
    let mut now = SampleTime::default();
    assert!(unsafe { cb_clock_get_time(clock, &mut now) });
    assert!(now.timescale > 0);

    cb_stream_remove_recording_output(stream, recording, collector.context(), Some(on_result));
    assert!(recv_within(&rx).0);
    cb_stream_stop_capture(stream, collector.context(), Some(on_result));
    assert!(recv_within(&rx).0);
}

#[test]
fn test_delegate_hears_platform_failure() {
    let backend = Arc::new(SyntheticBackend::new(PlatformRevision::LATEST));
    let _session = session_with(Arc::clone(&backend));

    let (_, filter) = display_filter();
    let stream = cb_stream_create(filter, small_configuration(), Some(on_error));
    let (collector, rx) = Collector::<Outcome>::new();
    cb_stream_start_capture(stream, collector.context(), Some(on_result));
    assert!(recv_within(&rx).0);

    backend.streams()[0].fail(StreamFailure::new(Some(-3815), "display disconnected"));
    wait_until(|| !ERRORS.lock().is_empty());
    let (id, code, message) = ERRORS.lock()[0].clone();
    assert_eq!(id, cb_stream_get_id(stream));
    assert_eq!(code, -3815);
    assert_eq!(message, "display disconnected");
    assert_eq!(cb_stream_get_state(stream), SessionState::Stopped as i32);
}

#[test]
fn test_capture_image_hands_over_an_image() {
    let _session = session("{}");
    let (_, filter) = display_filter();
    let config = small_configuration();
    let before = cb_bridge_live_handles();

    let (collector, rx) = Collector::<(u64, Option<String>)>::new();
    cb_stream_capture_image(filter, config, Some(on_handle), collector.context());
    let (image, error) = recv_within(&rx);
    assert_eq!(error, None);
    assert_eq!((cb_image_get_width(image), cb_image_get_height(image)), (16, 8));
    assert_eq!(cb_image_get_data_size(image), 16 * 8 * 4);

    let mut pixels = vec![0u8; 16 * 8 * 4];
    let copied = unsafe { cb_image_copy_rgba(image, pixels.as_mut_ptr(), pixels.len()) };
    assert_eq!(copied, pixels.len());
    assert!(pixels.chunks_exact(4).all(|px| px[3] == 255));

    cb_image_release(image);
    assert_eq!(cb_bridge_live_handles(), before);
}

#[test]
fn test_capture_sample_and_bad_input() {
    let _session = session("{}");
    let (_, filter) = display_filter();
    let config = small_configuration();

    let (collector, rx) = Collector::<(u64, Option<String>)>::new();
    cb_stream_capture_sample(filter, config, Some(on_handle), collector.context());
    let (sample, error) = recv_within(&rx);
    assert_eq!(error, None);
    assert_eq!(cb_media_sample_get_kind(sample), 0);
    assert_eq!(cb_media_sample_get_pixel_format(sample), PixelFormat::Bgra.fourcc());
    assert!(cb_media_sample_get_bytes_per_row(sample) >= 16 * 4);
    assert_eq!(cb_media_sample_get_frame_count(sample), 0);
    let size = cb_media_sample_get_data_size(sample);
    let mut buffer = vec![0u8; size];
    assert_eq!(unsafe { cb_media_sample_copy_data(sample, buffer.as_mut_ptr(), size) }, size);
    cb_media_sample_release(sample);

    // Invalid filter: reported before returning
    cb_stream_capture_image(config, config, Some(on_handle), collector.context());
    let (image, error) = rx.try_recv().unwrap();
    assert_eq!(image, 0);
    assert!(error.unwrap().starts_with("Configuration error:"));
}

#[test]
fn test_recording_failure_reaches_foreign_delegate() {
    let backend = Arc::new(SyntheticBackend::default());
    let _session = session_with(Arc::clone(&backend));
    let (_, filter) = display_filter();
    let stream = cb_stream_create(filter, small_configuration(), None);

    let (events, event_rx) = Collector::<String>::new();
    let path = CString::new("/tmp/capture-bridge-failing.mov").unwrap();
    let recording = unsafe {
        cb_recording_output_create(
            path.as_ptr(),
            0,
            1,
            events.context(),
            Some(on_recording_started),
            Some(on_recording_failed),
            Some(on_recording_finished),
        )
    };
    assert_eq!(cb_recording_output_get_recorded_file_size(recording), 0);

    let (collector, rx) = Collector::<Outcome>::new();
    cb_stream_add_recording_output(stream, recording, collector.context(), Some(on_result));
    assert!(recv_within(&rx).0);
    assert_eq!(recv_within(&event_rx), "started");
    cb_stream_start_capture(stream, collector.context(), Some(on_result));
    assert!(recv_within(&rx).0);

    wait_until(|| cb_recording_output_get_recorded_file_size(recording) > 0);
    let mut recorded = SampleTime::default();
    assert!(unsafe { cb_recording_output_get_recorded_duration(recording, &mut recorded) });
    assert!(recorded.value > 0 && recorded.timescale > 0);

    backend.streams()[0].fail(StreamFailure::new(Some(-3815), "display disconnected"));
    assert_eq!(recv_within(&event_rx), "failed -3815 display disconnected");

    // Tearing the stream down afterwards reports nothing further
    cb_stream_release(stream);
    std::thread::sleep(Duration::from_millis(20));
    assert!(event_rx.try_recv().is_err());
    assert_eq!(cb_recording_output_get_recorded_file_size(0), -1);
}

#[test]
fn test_content_info_follows_introspection_gate() {
    let old = session(r#"{"platformRevision": "13.0"}"#);
    let (_, filter) = display_filter();
    assert_eq!(cb_content_info_create_for_filter(filter), 0);
    drop(old);

    let _session = session("{}");
    let (_, filter) = display_filter();
    let info = cb_content_info_create_for_filter(filter);
    assert_ne!(info, 0);
    assert_eq!(cb_content_info_get_style(info), 2);
    assert_eq!(cb_content_info_get_point_pixel_scale(info), 2.0);
    assert_eq!(cb_content_info_get_content_rect(info), Rect::new(0.0, 0.0, 64.0, 48.0));

    let retained = cb_content_info_retain(info);
    cb_content_info_release(info);
    assert_eq!(cb_content_info_get_style(info), 0);
    assert_eq!(cb_content_info_get_style(retained), 2);
    cb_content_info_release(retained);
    assert_eq!(cb_content_info_get_content_rect(retained), Rect::ZERO);
}

#[test]
fn test_capture_image_in_rect_and_pixels() {
    let _session = session("{}");
    let (_, filter) = display_filter();

    let (collector, rx) = Collector::<(u64, Option<String>)>::new();
    cb_stream_capture_image_in_rect(filter, Rect::new(8.0, 4.0, 10.0, 5.0), Some(on_handle), collector.context());
    let (image, error) = recv_within(&rx);
    assert_eq!(error, None);
    assert_eq!((cb_image_get_width(image), cb_image_get_height(image)), (20, 10));

    let mut pixel = [0u8; 4];
    assert!(unsafe { cb_image_get_pixel(image, 19, 9, pixel.as_mut_ptr()) });
    assert_eq!(pixel[3], 255);
    assert!(!unsafe { cb_image_get_pixel(image, 20, 0, pixel.as_mut_ptr()) });
    assert!(!unsafe { cb_image_get_pixel(image, 0, 0, std::ptr::null_mut()) });
    cb_image_release(image);

    // Outside the display: reported before returning
    cb_stream_capture_image_in_rect(filter, Rect::new(60.0, 0.0, 10.0, 10.0), Some(on_handle), collector.context());
    let (image, error) = rx.try_recv().unwrap();
    assert_eq!(image, 0);
    assert!(error.unwrap().starts_with("Configuration error:"));
}

#[test]
fn test_capture_image_in_rect_is_gated() {
    let _session = session(r#"{"platformRevision": "15.0"}"#);
    assert!(!cb_bridge_supports_feature(Feature::RegionScreenshot as i32));
    let (_, filter) = display_filter();
    let (collector, rx) = Collector::<(u64, Option<String>)>::new();
    cb_stream_capture_image_in_rect(filter, Rect::new(0.0, 0.0, 4.0, 4.0), Some(on_handle), collector.context());
    let (image, error) = rx.try_recv().unwrap();
    assert_eq!(image, 0);
    assert!(error.unwrap().contains("15.2"));
}

#[test]
fn test_dispatch_queue_reports_qos() {
    let _session = session("{}");
    let label = CString::new("capture-bridge.test").unwrap();
    let queue = unsafe { cb_dispatch_queue_create(label.as_ptr(), 3) };
    assert_eq!(cb_dispatch_queue_get_qos(queue), 3);
    let fallback = unsafe { cb_dispatch_queue_create(std::ptr::null(), 42) };
    assert_eq!(cb_dispatch_queue_get_qos(fallback), 2);
    cb_dispatch_queue_release(queue);
    assert_eq!(cb_dispatch_queue_get_qos(queue), -1);
}

#[test]
fn test_geometry_and_gated_flags_reach_validation() {
    let _session = session(r#"{"platformRevision": "14.0"}"#);
    let (_, filter) = display_filter();
    let mut desc = std::mem::MaybeUninit::<StreamConfigurationDesc>::uninit();
    assert!(unsafe { cb_stream_configuration_get_defaults(desc.as_mut_ptr()) });
    let defaults = unsafe { desc.assume_init() };
    assert!(defaults.scales_to_fit);
    assert_eq!(defaults.source_rect, Rect::ZERO);

    let mut cropped = defaults;
    cropped.width = 32;
    cropped.height = 16;
    cropped.source_rect = Rect::new(4.0, 4.0, 32.0, 16.0);
    cropped.destination_rect = Rect::new(0.0, 0.0, 32.0, 16.0);
    cropped.ignores_shadows = true;
    let config = unsafe { cb_stream_configuration_create(&cropped) };
    let mut described = std::mem::MaybeUninit::<StreamConfigurationDesc>::uninit();
    assert!(unsafe { cb_stream_configuration_describe(config, described.as_mut_ptr()) });
    let described = unsafe { described.assume_init() };
    assert_eq!(described.source_rect, cropped.source_rect);
    assert!(described.ignores_shadows);
    let stream = cb_stream_create(filter, config, None);
    assert_ne!(stream, 0);

    let mut clicks = cropped;
    clicks.shows_mouse_clicks = true;
    let config = unsafe { cb_stream_configuration_create(&clicks) };
    assert_eq!(cb_stream_create(filter, config, None), 0);

    let mut huge = defaults;
    huge.width = u32::MAX;
    huge.height = u32::MAX;
    let config = unsafe { cb_stream_configuration_create(&huge) };
    assert_eq!(cb_stream_create(filter, config, None), 0);
}
