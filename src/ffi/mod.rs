//! C surface
//!
//! Flat `extern "C"` functions over one process-wide [`Bridge`]. Objects
//! cross the boundary as `u64` handles; `0` means "no object" and is what
//! every constructor returns on failure. Each constructor hands one
//! reference to the caller, to be given back with the matching
//! `cb_*_release`.
//!
//! Async operations report through a callback, exactly once. When an
//! argument is invalid the callback runs before the call returns;
//! otherwise it runs later on a bridge worker thread.

pub mod content;
pub mod media;
pub mod stream;

use crate::bridge::Bridge;
use crate::capability::Feature;
use crate::capture::synthetic::SyntheticBackend;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, Managed, ObjectKind};
use crate::logging::init_logging;
use parking_lot::RwLock;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::Arc;

static BRIDGE: RwLock<Option<Arc<Bridge>>> = parking_lot::const_rwlock(None);

/// Install a bridge for the C surface; false if one is already installed
pub fn install(bridge: Bridge) -> bool {
    let mut slot = BRIDGE.write();
    if slot.is_some() {
        return false;
    }
    *slot = Some(Arc::new(bridge));
    true
}

/// The installed bridge
pub fn current() -> Option<Arc<Bridge>> {
    BRIDGE.read().clone()
}

fn require_bridge() -> BridgeResult<Arc<Bridge>> {
    current().ok_or_else(|| BridgeError::Configuration("bridge is not initialized".into()))
}

/// Opaque caller context carried to a callback on another thread
///
/// The bridge never dereferences it.
#[derive(Debug, Clone, Copy)]
pub struct ForeignContext(*mut c_void);

unsafe impl Send for ForeignContext {}
unsafe impl Sync for ForeignContext {}

impl ForeignContext {
    pub fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }
}

/// `(context, success, message)`; `message` is null on success
pub type ResultCallback = extern "C" fn(context: *mut c_void, success: bool, message: *const c_char);

/// Completion closure forwarding to a C result callback
pub(crate) fn result_forwarder(
    callback: Option<ResultCallback>,
    context: ForeignContext,
) -> impl FnOnce(BridgeResult<()>) + Send + 'static {
    move |result| {
        let Some(callback) = callback else {
            if let Err(e) = result {
                tracing::warn!("Operation failed with no callback to report to: {}", e);
            }
            return;
        };
        match result {
            Ok(()) => callback(context.as_ptr(), true, std::ptr::null()),
            Err(e) => {
                let message = foreign_message(&e);
                callback(context.as_ptr(), false, message.as_ptr());
            }
        }
    }
}

/// Failure text as reported to C
///
/// A bad handle is a bad argument to the caller, so it reads as a
/// configuration error.
pub(crate) fn foreign_message(error: &BridgeError) -> CString {
    match error {
        BridgeError::Handle(e) => to_c_string(&BridgeError::Configuration(e.to_string()).to_string()),
        other => to_c_string(&other.to_string()),
    }
}

/// Message as a C string, with interior NULs replaced
pub(crate) fn to_c_string(message: &str) -> CString {
    CString::new(message.replace('\0', " ")).unwrap_or_default()
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn from_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// # Safety
/// `ptr` must be null or point to `count` readable `u64`s.
pub(crate) unsafe fn handle_slice<'a>(ptr: *const u64, count: usize) -> &'a [u64] {
    if ptr.is_null() || count == 0 {
        return &[];
    }
    std::slice::from_raw_parts(ptr, count)
}

/// Resolve a handle of a specific kind against the installed bridge
pub(crate) fn lookup<T: Managed>(raw: u64) -> BridgeResult<Arc<T>> {
    let bridge = require_bridge()?;
    let object = bridge.handles().get::<T>(Handle::from_raw(raw))?;
    Ok(object)
}

/// Resolve every handle in a list, failing on the first bad one
pub(crate) fn lookup_all<T: Managed + Clone>(raws: &[u64]) -> BridgeResult<Vec<T>> {
    raws.iter()
        .map(|raw| lookup::<T>(*raw).map(|object| T::clone(&object)))
        .collect()
}

/// Give the caller a handle to `object`; 0 on failure
pub(crate) fn issue<T: Managed>(object: Arc<T>) -> u64 {
    issue_result(require_bridge().and_then(|bridge| Ok(bridge.handles().insert(object)?)))
}

pub(crate) fn issue_result(result: BridgeResult<Handle>) -> u64 {
    match result {
        Ok(handle) => handle.into_raw(),
        Err(e) => {
            tracing::error!("Could not create handle: {}", e);
            0
        }
    }
}

/// Log a failure and fall back to `default`
pub(crate) fn or_default<T>(operation: &str, result: BridgeResult<T>, default: T) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!("{} failed: {}", operation, e);
        default
    })
}

fn retain(raw: u64, kind: ObjectKind) -> u64 {
    issue_result(require_bridge().and_then(|bridge| {
        Ok(bridge.handles().retain(Handle::from_raw(raw), kind)?)
    }))
}

fn release(raw: u64, kind: ObjectKind) {
    let result = require_bridge().and_then(|bridge| {
        Ok(bridge.handles().release(Handle::from_raw(raw), kind)?)
    });
    if let Err(e) = result {
        tracing::warn!("Release of {} handle {:#x} rejected: {}", kind, raw, e);
    }
}

macro_rules! handle_lifecycle {
    ($($kind:ident => $retain:ident, $release:ident;)*) => {
        $(
            /// Issue an independent handle to the same object
            #[no_mangle]
            pub extern "C" fn $retain(handle: u64) -> u64 {
                retain(handle, ObjectKind::$kind)
            }

            /// Give back one handle
            #[no_mangle]
            pub extern "C" fn $release(handle: u64) {
                release(handle, ObjectKind::$kind)
            }
        )*
    };
}

handle_lifecycle! {
    Display => cb_display_retain, cb_display_release;
    Window => cb_window_retain, cb_window_release;
    Application => cb_application_retain, cb_application_release;
    ContentFilter => cb_content_filter_retain, cb_content_filter_release;
    ContentInfo => cb_content_info_retain, cb_content_info_release;
    Configuration => cb_stream_configuration_retain, cb_stream_configuration_release;
    Stream => cb_stream_retain, cb_stream_release;
    MediaSample => cb_media_sample_retain, cb_media_sample_release;
    Image => cb_image_retain, cb_image_release;
    Clock => cb_clock_retain, cb_clock_release;
    Queue => cb_dispatch_queue_retain, cb_dispatch_queue_release;
    RecordingOutput => cb_recording_output_retain, cb_recording_output_release;
}

/// Start the bridge
///
/// `config_json` may be null, in which case configuration is read from
/// `CAPTURE_BRIDGE_CONFIG` if set. Returns false on invalid configuration
/// or when the bridge is already running.
///
/// # Safety
/// `config_json` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn cb_bridge_initialize(config_json: *const c_char) -> bool {
    let config = match from_c_str(config_json) {
        Some(json) => BridgeConfig::from_json(&json),
        None => BridgeConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            init_logging(None);
            tracing::error!("Rejected bridge configuration: {}", e);
            return false;
        }
    };
    init_logging(config.log_filter.as_deref());

    if current().is_some() {
        tracing::warn!("Bridge already initialized");
        return false;
    }

    let backend = Arc::new(SyntheticBackend::default());
    match Bridge::new(config, backend) {
        Ok(bridge) => install(bridge),
        Err(e) => {
            tracing::error!("Failed to initialize bridge: {}", e);
            false
        }
    }
}

/// Tear the bridge down, releasing every outstanding handle
#[no_mangle]
pub extern "C" fn cb_bridge_shutdown() {
    let bridge = BRIDGE.write().take();
    if bridge.is_none() {
        tracing::debug!("Shutdown requested with no bridge running");
    }
    drop(bridge);
}

/// # Safety
/// `major` and `minor` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn cb_bridge_platform_revision(major: *mut u16, minor: *mut u16) -> bool {
    let Some(bridge) = current() else {
        return false;
    };
    let revision = bridge.capabilities().revision();
    if !major.is_null() {
        *major = revision.major;
    }
    if !minor.is_null() {
        *minor = revision.minor;
    }
    true
}

#[no_mangle]
pub extern "C" fn cb_bridge_supports_feature(feature: i32) -> bool {
    match (current(), Feature::from_code(feature)) {
        (Some(bridge), Some(feature)) => bridge.capabilities().supports(feature),
        _ => false,
    }
}

/// Number of handles the caller still owns
#[no_mangle]
pub extern "C" fn cb_bridge_live_handles() -> usize {
    current().map(|bridge| bridge.handles().len()).unwrap_or(0)
}

#[cfg(test)]
mod tests;
