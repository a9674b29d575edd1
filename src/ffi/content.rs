//! Content objects and content filters

use super::{from_c_str, handle_slice, issue, lookup, lookup_all, or_default, require_bridge};
use crate::capability::CapabilitySet;
use crate::capture::content::{Application, Display, Rect, Window};
use crate::capture::filter::{ContentFilter, ContentInfo, FilterStyle, StreamType};
use crate::error::BridgeResult;
use std::ffi::c_char;
use std::sync::Arc;

#[no_mangle]
pub extern "C" fn cb_display_create(id: u32, frame: Rect, point_pixel_scale: f32) -> u64 {
    issue(Arc::new(Display::new(id, frame, point_pixel_scale)))
}

#[no_mangle]
pub extern "C" fn cb_display_get_id(display: u64) -> u32 {
    or_default("display id", lookup::<Display>(display).map(|d| d.id), 0)
}

#[no_mangle]
pub extern "C" fn cb_display_get_frame(display: u64) -> Rect {
    or_default("display frame", lookup::<Display>(display).map(|d| d.frame), Rect::ZERO)
}

/// Create a window; `owner` is an application handle or 0
///
/// # Safety
/// `title` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn cb_window_create(
    id: u32,
    frame: Rect,
    title: *const c_char,
    owner: u64,
    on_screen: bool,
) -> u64 {
    let owner = if owner == 0 {
        None
    } else {
        match lookup::<Application>(owner) {
            Ok(app) => Some(Application::clone(&app)),
            Err(e) => {
                tracing::error!("Window owner rejected: {}", e);
                return 0;
            }
        }
    };
    let window = Window {
        id,
        frame,
        title: from_c_str(title),
        owning_application: owner,
        on_screen,
    };
    issue(Arc::new(window))
}

#[no_mangle]
pub extern "C" fn cb_window_get_id(window: u64) -> u32 {
    or_default("window id", lookup::<Window>(window).map(|w| w.id), 0)
}

#[no_mangle]
pub extern "C" fn cb_window_get_frame(window: u64) -> Rect {
    or_default("window frame", lookup::<Window>(window).map(|w| w.frame), Rect::ZERO)
}

/// # Safety
/// `bundle_identifier` and `name` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn cb_application_create(
    process_id: i32,
    bundle_identifier: *const c_char,
    name: *const c_char,
) -> u64 {
    let app = Application::new(
        process_id,
        from_c_str(bundle_identifier).unwrap_or_default(),
        from_c_str(name).unwrap_or_default(),
    );
    issue(Arc::new(app))
}

#[no_mangle]
pub extern "C" fn cb_application_get_process_id(application: u64) -> i32 {
    or_default(
        "application process id",
        lookup::<Application>(application).map(|a| a.process_id),
        -1,
    )
}

fn issue_filter(operation: &str, filter: BridgeResult<ContentFilter>) -> u64 {
    match filter {
        Ok(filter) => issue(Arc::new(filter)),
        Err(e) => {
            tracing::error!("{} failed: {}", operation, e);
            0
        }
    }
}

fn display(handle: u64) -> BridgeResult<Display> {
    lookup::<Display>(handle).map(|d| Display::clone(&d))
}

#[no_mangle]
pub extern "C" fn cb_content_filter_create_with_desktop_independent_window(window: u64) -> u64 {
    issue_filter(
        "window filter",
        lookup::<Window>(window).map(|w| ContentFilter::desktop_independent_window(Window::clone(&w))),
    )
}

#[no_mangle]
pub extern "C" fn cb_content_filter_create_with_display(display_handle: u64) -> u64 {
    issue_filter("display filter", display(display_handle).map(ContentFilter::display))
}

/// # Safety
/// `windows` must be null or point to `window_count` handles.
#[no_mangle]
pub unsafe extern "C" fn cb_content_filter_create_with_display_excluding_windows(
    display_handle: u64,
    windows: *const u64,
    window_count: usize,
) -> u64 {
    let windows = handle_slice(windows, window_count);
    issue_filter(
        "display-excluding-windows filter",
        display(display_handle).and_then(|d| {
            Ok(ContentFilter::display_excluding_windows(d, lookup_all(windows)?))
        }),
    )
}

/// # Safety
/// `windows` must be null or point to `window_count` handles.
#[no_mangle]
pub unsafe extern "C" fn cb_content_filter_create_with_display_including_windows(
    display_handle: u64,
    windows: *const u64,
    window_count: usize,
) -> u64 {
    let windows = handle_slice(windows, window_count);
    issue_filter(
        "display-including-windows filter",
        display(display_handle).and_then(|d| {
            Ok(ContentFilter::display_including_windows(d, lookup_all(windows)?))
        }),
    )
}

/// # Safety
/// Each array must be null or point to its count of handles.
#[no_mangle]
pub unsafe extern "C" fn cb_content_filter_create_with_display_including_applications_excepting_windows(
    display_handle: u64,
    applications: *const u64,
    application_count: usize,
    excepting: *const u64,
    excepting_count: usize,
) -> u64 {
    let applications = handle_slice(applications, application_count);
    let excepting = handle_slice(excepting, excepting_count);
    issue_filter(
        "display-including-applications filter",
        display(display_handle).and_then(|d| {
            Ok(ContentFilter::display_including_applications(
                d,
                lookup_all(applications)?,
                lookup_all(excepting)?,
            ))
        }),
    )
}

/// # Safety
/// Each array must be null or point to its count of handles.
#[no_mangle]
pub unsafe extern "C" fn cb_content_filter_create_with_display_excluding_applications_excepting_windows(
    display_handle: u64,
    applications: *const u64,
    application_count: usize,
    excepting: *const u64,
    excepting_count: usize,
) -> u64 {
    let applications = handle_slice(applications, application_count);
    let excepting = handle_slice(excepting, excepting_count);
    issue_filter(
        "display-excluding-applications filter",
        display(display_handle).and_then(|d| {
            Ok(ContentFilter::display_excluding_applications(
                d,
                lookup_all(applications)?,
                lookup_all(excepting)?,
            ))
        }),
    )
}

/// Run a gated accessor against a filter handle
fn inspect<T>(
    operation: &str,
    filter: u64,
    default: T,
    read: impl FnOnce(&ContentFilter, &CapabilitySet) -> T,
) -> T {
    let result = require_bridge().and_then(|bridge| {
        let filter = lookup::<ContentFilter>(filter)?;
        Ok(read(filter.as_ref(), bridge.capabilities()))
    });
    or_default(operation, result, default)
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_content_rect(filter: u64) -> Rect {
    inspect("filter content rect", filter, Rect::ZERO, |f, caps| f.content_rect(caps))
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_style(filter: u64) -> i32 {
    inspect("filter style", filter, FilterStyle::None as i32, |f, caps| f.style(caps) as i32)
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_stream_type(filter: u64) -> i32 {
    inspect("filter stream type", filter, StreamType::Unknown as i32, |f, caps| {
        f.stream_type(caps) as i32
    })
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_point_pixel_scale(filter: u64) -> f32 {
    inspect("filter point pixel scale", filter, 1.0, |f, caps| f.point_pixel_scale(caps))
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_include_menu_bar(filter: u64) -> bool {
    inspect("filter menu bar flag", filter, false, |f, caps| f.include_menu_bar(caps))
}

/// False when the platform cannot include the menu bar
#[no_mangle]
pub extern "C" fn cb_content_filter_set_include_menu_bar(filter: u64, include: bool) -> bool {
    let result = require_bridge().and_then(|bridge| {
        lookup::<ContentFilter>(filter)?.set_include_menu_bar(bridge.capabilities(), include)
    });
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Setting menu bar inclusion failed: {}", e);
            false
        }
    }
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_included_displays_count(filter: u64) -> usize {
    inspect("included displays", filter, 0, |f, caps| f.included_displays(caps).len())
}

/// New display handle owned by the caller, or 0 when out of range
#[no_mangle]
pub extern "C" fn cb_content_filter_get_included_display_at(filter: u64, index: usize) -> u64 {
    inspect("included display", filter, None, |f, caps| {
        f.included_displays(caps).into_iter().nth(index)
    })
    .map(|d| issue(Arc::new(d)))
    .unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_included_windows_count(filter: u64) -> usize {
    inspect("included windows", filter, 0, |f, caps| f.included_windows(caps).len())
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_included_window_at(filter: u64, index: usize) -> u64 {
    inspect("included window", filter, None, |f, caps| {
        f.included_windows(caps).into_iter().nth(index)
    })
    .map(|w| issue(Arc::new(w)))
    .unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_included_applications_count(filter: u64) -> usize {
    inspect("included applications", filter, 0, |f, caps| {
        f.included_applications(caps).len()
    })
}

#[no_mangle]
pub extern "C" fn cb_content_filter_get_included_application_at(filter: u64, index: usize) -> u64 {
    inspect("included application", filter, None, |f, caps| {
        f.included_applications(caps).into_iter().nth(index)
    })
    .map(|a| issue(Arc::new(a)))
    .unwrap_or(0)
}

/// Snapshot of the filter's shared content, owned by the caller; 0 where
/// filter introspection is unavailable
#[no_mangle]
pub extern "C" fn cb_content_info_create_for_filter(filter: u64) -> u64 {
    inspect("content info", filter, None, |f, caps| f.content_info(caps))
        .map(|info| issue(Arc::new(info)))
        .unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn cb_content_info_get_style(info: u64) -> i32 {
    or_default(
        "content info style",
        lookup::<ContentInfo>(info).map(|i| i.style as i32),
        FilterStyle::None as i32,
    )
}

#[no_mangle]
pub extern "C" fn cb_content_info_get_point_pixel_scale(info: u64) -> f32 {
    or_default(
        "content info scale",
        lookup::<ContentInfo>(info).map(|i| i.point_pixel_scale),
        1.0,
    )
}

#[no_mangle]
pub extern "C" fn cb_content_info_get_content_rect(info: u64) -> Rect {
    or_default("content info rect", lookup::<ContentInfo>(info).map(|i| i.content_rect), Rect::ZERO)
}
