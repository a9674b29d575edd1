//! Content filters
//!
//! A [`ContentFilter`] names what a stream captures: one window, or a
//! display narrowed by window or application lists. Introspection is only
//! available on newer platform revisions; below them the accessors return
//! their defaults rather than failing.

use crate::capability::{CapabilitySet, Feature};
use crate::capture::content::{Application, Display, Rect, Window};
use crate::error::BridgeResult;
use std::sync::atomic::{AtomicBool, Ordering};

/// Kind of content a filter shares
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStyle {
    None = 0,
    Window = 1,
    Display = 2,
    Application = 3,
}

/// Snapshot of what a filter shares, taken on demand
#[derive(Debug, Clone, PartialEq)]
pub struct ContentInfo {
    pub style: FilterStyle,
    /// Pixels per point of the shared content
    pub point_pixel_scale: f32,
    /// Shared area in points
    pub content_rect: Rect,
}

/// Coarse filter classification used by older stream APIs
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Window = 0,
    Display = 1,
    Unknown = -1,
}

#[derive(Debug, Clone, PartialEq)]
enum DisplayRule {
    Everything,
    ExcludingWindows(Vec<Window>),
    IncludingWindows(Vec<Window>),
    IncludingApplications {
        applications: Vec<Application>,
        excepting: Vec<Window>,
    },
    ExcludingApplications {
        applications: Vec<Application>,
        excepting: Vec<Window>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum FilterContent {
    Window(Window),
    Display { display: Display, rule: DisplayRule },
}

/// What a capture stream includes
#[derive(Debug)]
pub struct ContentFilter {
    content: FilterContent,
    include_menu_bar: AtomicBool,
}

impl ContentFilter {
    fn new(content: FilterContent) -> Self {
        Self {
            content,
            include_menu_bar: AtomicBool::new(false),
        }
    }

    /// Capture a single window regardless of the display it is on
    pub fn desktop_independent_window(window: Window) -> Self {
        Self::new(FilterContent::Window(window))
    }

    /// Capture an entire display
    pub fn display(display: Display) -> Self {
        Self::new(FilterContent::Display {
            display,
            rule: DisplayRule::Everything,
        })
    }

    /// Capture a display minus some windows
    ///
    /// An empty list is the same filter as [`ContentFilter::display`].
    pub fn display_excluding_windows(display: Display, windows: Vec<Window>) -> Self {
        if windows.is_empty() {
            return Self::display(display);
        }
        Self::new(FilterContent::Display {
            display,
            rule: DisplayRule::ExcludingWindows(windows),
        })
    }

    /// Capture only the listed windows of a display
    pub fn display_including_windows(display: Display, windows: Vec<Window>) -> Self {
        Self::new(FilterContent::Display {
            display,
            rule: DisplayRule::IncludingWindows(windows),
        })
    }

    /// Capture the windows of the listed applications, minus `excepting`
    pub fn display_including_applications(
        display: Display,
        applications: Vec<Application>,
        excepting: Vec<Window>,
    ) -> Self {
        Self::new(FilterContent::Display {
            display,
            rule: DisplayRule::IncludingApplications {
                applications,
                excepting,
            },
        })
    }

    /// Capture a display minus the listed applications, keeping `excepting`
    pub fn display_excluding_applications(
        display: Display,
        applications: Vec<Application>,
        excepting: Vec<Window>,
    ) -> Self {
        if applications.is_empty() && excepting.is_empty() {
            return Self::display(display);
        }
        Self::new(FilterContent::Display {
            display,
            rule: DisplayRule::ExcludingApplications {
                applications,
                excepting,
            },
        })
    }

    /// Source display, if this is a display filter
    pub fn source_display(&self) -> Option<&Display> {
        match &self.content {
            FilterContent::Display { display, .. } => Some(display),
            FilterContent::Window(_) => None,
        }
    }

    /// Frame of the captured content, ignoring capability gates
    pub(crate) fn frame(&self) -> Rect {
        match &self.content {
            FilterContent::Window(window) => window.frame,
            FilterContent::Display { display, .. } => display.frame,
        }
    }

    pub fn content_rect(&self, caps: &CapabilitySet) -> Rect {
        caps.read_or(Feature::FilterIntrospection, Rect::ZERO, || self.frame())
    }

    pub fn style(&self, caps: &CapabilitySet) -> FilterStyle {
        caps.read_or(Feature::FilterIntrospection, FilterStyle::None, || {
            match &self.content {
                FilterContent::Window(_) => FilterStyle::Window,
                FilterContent::Display { rule, .. } => match rule {
                    DisplayRule::IncludingApplications { .. }
                    | DisplayRule::ExcludingApplications { .. } => FilterStyle::Application,
                    _ => FilterStyle::Display,
                },
            }
        })
    }

    pub fn stream_type(&self, caps: &CapabilitySet) -> StreamType {
        caps.read_or(Feature::FilterIntrospection, StreamType::Unknown, || {
            match &self.content {
                FilterContent::Window(_) => StreamType::Window,
                FilterContent::Display { .. } => StreamType::Display,
            }
        })
    }

    pub fn point_pixel_scale(&self, caps: &CapabilitySet) -> f32 {
        caps.read_or(Feature::FilterIntrospection, 1.0, || {
            self.source_display()
                .map(|display| display.point_pixel_scale)
                .unwrap_or(1.0)
        })
    }

    /// Describe the shared content; `None` where introspection is missing
    pub fn content_info(&self, caps: &CapabilitySet) -> Option<ContentInfo> {
        caps.supports(Feature::FilterIntrospection).then(|| ContentInfo {
            style: self.style(caps),
            point_pixel_scale: self.point_pixel_scale(caps),
            content_rect: self.content_rect(caps),
        })
    }

    pub fn include_menu_bar(&self, caps: &CapabilitySet) -> bool {
        caps.read_or(Feature::MenuBarInclusion, false, || {
            self.include_menu_bar.load(Ordering::Acquire)
        })
    }

    pub fn set_include_menu_bar(&self, caps: &CapabilitySet, include: bool) -> BridgeResult<()> {
        caps.require(Feature::MenuBarInclusion)?;
        self.include_menu_bar.store(include, Ordering::Release);
        Ok(())
    }

    pub fn included_displays(&self, caps: &CapabilitySet) -> Vec<Display> {
        caps.read_or(Feature::IncludedContent, Vec::new(), || {
            self.source_display().cloned().into_iter().collect()
        })
    }

    pub fn included_windows(&self, caps: &CapabilitySet) -> Vec<Window> {
        caps.read_or(Feature::IncludedContent, Vec::new(), || match &self.content {
            FilterContent::Window(window) => vec![window.clone()],
            FilterContent::Display {
                rule: DisplayRule::IncludingWindows(windows),
                ..
            } => windows.clone(),
            FilterContent::Display { .. } => Vec::new(),
        })
    }

    pub fn included_applications(&self, caps: &CapabilitySet) -> Vec<Application> {
        caps.read_or(Feature::IncludedContent, Vec::new(), || match &self.content {
            FilterContent::Window(window) => window.owning_application.clone().into_iter().collect(),
            FilterContent::Display {
                rule: DisplayRule::IncludingApplications { applications, .. },
                ..
            } => applications.clone(),
            FilterContent::Display { .. } => Vec::new(),
        })
    }
}

impl Clone for ContentFilter {
    fn clone(&self) -> Self {
        Self {
            content: self.content.clone(),
            include_menu_bar: AtomicBool::new(self.include_menu_bar.load(Ordering::Acquire)),
        }
    }
}

impl PartialEq for ContentFilter {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
            && self.include_menu_bar.load(Ordering::Acquire)
                == other.include_menu_bar.load(Ordering::Acquire)
    }
}
