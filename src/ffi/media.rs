//! Media samples, images and single-frame capture

use super::{foreign_message, lookup, or_default, require_bridge, ForeignContext};
use crate::capture::configuration::StreamConfiguration;
use crate::capture::content::Rect;
use crate::capture::filter::ContentFilter;
use crate::capture::sample::{Image, MediaSample, SampleTime};
use crate::error::{BridgeError, BridgeResult};
use std::ffi::{c_char, c_void};
use std::sync::Arc;

#[no_mangle]
pub extern "C" fn cb_media_sample_get_kind(sample: u64) -> i32 {
    or_default("sample kind", lookup::<MediaSample>(sample).map(|s| s.kind.code()), -1)
}

/// # Safety
/// `out` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn cb_media_sample_get_presentation_time(sample: u64, out: *mut SampleTime) -> bool {
    if out.is_null() {
        return false;
    }
    match lookup::<MediaSample>(sample) {
        Ok(sample) => {
            *out = sample.presentation_time;
            true
        }
        Err(e) => {
            tracing::warn!("Presentation time lookup failed: {}", e);
            false
        }
    }
}

fn video<T>(operation: &str, sample: u64, default: T, read: impl FnOnce(&MediaSample) -> Option<T>) -> T {
    let result = lookup::<MediaSample>(sample).and_then(|sample| {
        read(sample.as_ref()).ok_or_else(|| {
            BridgeError::Configuration(format!("{} sample has no such field", sample.kind))
        })
    });
    or_default(operation, result, default)
}

/// Video width in pixels; 0 for audio samples
#[no_mangle]
pub extern "C" fn cb_media_sample_get_width(sample: u64) -> u32 {
    video("sample width", sample, 0, |s| s.video_frame().map(|f| f.width))
}

#[no_mangle]
pub extern "C" fn cb_media_sample_get_height(sample: u64) -> u32 {
    video("sample height", sample, 0, |s| s.video_frame().map(|f| f.height))
}

#[no_mangle]
pub extern "C" fn cb_media_sample_get_bytes_per_row(sample: u64) -> u32 {
    video("sample stride", sample, 0, |s| s.video_frame().map(|f| f.bytes_per_row))
}

/// FourCC of the pixel format; 0 for audio samples
#[no_mangle]
pub extern "C" fn cb_media_sample_get_pixel_format(sample: u64) -> u32 {
    video("sample pixel format", sample, 0, |s| {
        s.video_frame().map(|f| f.pixel_format.fourcc())
    })
}

/// Audio frames (samples per channel); 0 for video samples
#[no_mangle]
pub extern "C" fn cb_media_sample_get_frame_count(sample: u64) -> usize {
    video("sample frame count", sample, 0, |s| s.audio_buffer().map(|b| b.frame_count()))
}

#[no_mangle]
pub extern "C" fn cb_media_sample_get_channel_count(sample: u64) -> u32 {
    video("sample channel count", sample, 0, |s| s.audio_buffer().map(|b| b.channel_count))
}

#[no_mangle]
pub extern "C" fn cb_media_sample_get_sample_rate(sample: u64) -> u32 {
    video("sample rate", sample, 0, |s| s.audio_buffer().map(|b| b.sample_rate))
}

#[no_mangle]
pub extern "C" fn cb_media_sample_get_data_size(sample: u64) -> usize {
    or_default("sample size", lookup::<MediaSample>(sample).map(|s| s.byte_len()), 0)
}

/// Copy raw payload bytes; returns the number written
///
/// # Safety
/// `buffer` must be null or valid for `capacity` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn cb_media_sample_copy_data(sample: u64, buffer: *mut u8, capacity: usize) -> usize {
    if buffer.is_null() || capacity == 0 {
        return 0;
    }
    let out = std::slice::from_raw_parts_mut(buffer, capacity);
    or_default("sample copy", lookup::<MediaSample>(sample).map(|s| s.copy_bytes(out)), 0)
}

#[no_mangle]
pub extern "C" fn cb_image_get_width(image: u64) -> u32 {
    or_default("image width", lookup::<Image>(image).map(|i| i.width), 0)
}

#[no_mangle]
pub extern "C" fn cb_image_get_height(image: u64) -> u32 {
    or_default("image height", lookup::<Image>(image).map(|i| i.height), 0)
}

#[no_mangle]
pub extern "C" fn cb_image_get_data_size(image: u64) -> usize {
    or_default("image size", lookup::<Image>(image).map(|i| i.data.len()), 0)
}

/// Read one RGBA pixel into `out[0..4]`; false when out of bounds
///
/// # Safety
/// `out` must be null or valid for 4 bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn cb_image_get_pixel(image: u64, x: u32, y: u32, out: *mut u8) -> bool {
    if out.is_null() {
        return false;
    }
    match lookup::<Image>(image).map(|image| image.pixel(x, y)) {
        Ok(Some(rgba)) => {
            std::ptr::copy_nonoverlapping(rgba.as_ptr(), out, rgba.len());
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!("Pixel read failed: {}", e);
            false
        }
    }
}

/// Copy RGBA pixels; returns the number of bytes written
///
/// # Safety
/// `buffer` must be null or valid for `capacity` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn cb_image_copy_rgba(image: u64, buffer: *mut u8, capacity: usize) -> usize {
    if buffer.is_null() || capacity == 0 {
        return 0;
    }
    let out = std::slice::from_raw_parts_mut(buffer, capacity);
    let copied = lookup::<Image>(image).map(|image| {
        let n = image.data.len().min(out.len());
        out[..n].copy_from_slice(&image.data[..n]);
        n
    });
    or_default("image copy", copied, 0)
}

/// `(image, error, user_data)`; exactly one of `image` and `error` is set
pub type ImageCallback = extern "C" fn(image: u64, error: *const c_char, user_data: *mut c_void);

/// `(sample, error, user_data)`; exactly one of `sample` and `error` is set
pub type SampleResultCallback = extern "C" fn(sample: u64, error: *const c_char, user_data: *mut c_void);

/// Deliver a handle-or-error result to C
fn deliver<T>(
    result: BridgeResult<Arc<T>>,
    callback: extern "C" fn(u64, *const c_char, *mut c_void),
    user_data: ForeignContext,
) where
    T: crate::handle::Managed,
{
    let issued = result.and_then(|object| {
        let bridge = require_bridge()?;
        Ok(bridge.handles().insert(object)?)
    });
    match issued {
        Ok(handle) => callback(handle.into_raw(), std::ptr::null(), user_data.as_ptr()),
        Err(e) => {
            let message = foreign_message(&e);
            callback(0, message.as_ptr(), user_data.as_ptr());
        }
    }
}

fn capture_inputs(filter: u64, configuration: u64) -> BridgeResult<(ContentFilter, StreamConfiguration)> {
    let filter = lookup::<ContentFilter>(filter)?;
    let configuration = lookup::<StreamConfiguration>(configuration)?;
    Ok((ContentFilter::clone(&filter), StreamConfiguration::clone(&configuration)))
}

/// Capture one frame as an RGBA image
///
/// The callback fires exactly once, with an image handle the caller owns
/// or with an error message. Invalid arguments are reported before this
/// returns.
#[no_mangle]
pub extern "C" fn cb_stream_capture_image(
    filter: u64,
    configuration: u64,
    callback: Option<ImageCallback>,
    user_data: *mut c_void,
) {
    let user_data = ForeignContext::new(user_data);
    let Some(callback) = callback else {
        tracing::warn!("Image capture requested without a callback");
        return;
    };
    let inputs = require_bridge().and_then(|bridge| Ok((bridge, capture_inputs(filter, configuration)?)));
    match inputs {
        Ok((bridge, (filter, configuration))) => {
            bridge.capture_image(filter, configuration, move |result| {
                deliver(result.map(Arc::new), callback, user_data)
            });
        }
        Err(e) => deliver::<Image>(Err(e), callback, user_data),
    }
}

/// Capture one RGBA image of a region of the filter's content
///
/// `rect` is in points, in the content's own coordinate space. Same
/// callback contract as [`cb_stream_capture_image`]; platforms without
/// region capture report a configuration error before this returns.
#[no_mangle]
pub extern "C" fn cb_stream_capture_image_in_rect(
    filter: u64,
    rect: Rect,
    callback: Option<ImageCallback>,
    user_data: *mut c_void,
) {
    let user_data = ForeignContext::new(user_data);
    let Some(callback) = callback else {
        tracing::warn!("Region capture requested without a callback");
        return;
    };
    let inputs = require_bridge().and_then(|bridge| Ok((bridge, lookup::<ContentFilter>(filter)?)));
    match inputs {
        Ok((bridge, filter)) => {
            bridge.capture_image_in_rect(ContentFilter::clone(&filter), rect, move |result| {
                deliver(result.map(Arc::new), callback, user_data)
            });
        }
        Err(e) => deliver::<Image>(Err(e), callback, user_data),
    }
}

/// Capture one raw video sample
///
/// Same contract as [`cb_stream_capture_image`], but the handle is a media
/// sample in the configured pixel format.
#[no_mangle]
pub extern "C" fn cb_stream_capture_sample(
    filter: u64,
    configuration: u64,
    callback: Option<SampleResultCallback>,
    user_data: *mut c_void,
) {
    let user_data = ForeignContext::new(user_data);
    let Some(callback) = callback else {
        tracing::warn!("Sample capture requested without a callback");
        return;
    };
    let inputs = require_bridge().and_then(|bridge| Ok((bridge, capture_inputs(filter, configuration)?)));
    match inputs {
        Ok((bridge, (filter, configuration))) => {
            bridge.capture_sample(filter, configuration, move |result| {
                deliver(result, callback, user_data)
            });
        }
        Err(e) => deliver::<MediaSample>(Err(e), callback, user_data),
    }
}
