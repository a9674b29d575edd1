//! Stream configuration

use crate::capability::{CapabilitySet, Feature};
use crate::capture::content::Rect;
use crate::error::{BridgeError, BridgeResult};
use std::time::Duration;

pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
pub const DEFAULT_QUEUE_DEPTH: u32 = 8;
pub const MAX_QUEUE_DEPTH: u32 = 8;
/// Largest accepted output edge, in pixels
pub const MAX_DIMENSION: u32 = 16_384;
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CHANNEL_COUNT: u32 = 2;

/// Pixel layout of delivered video frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit BGRA, packed
    #[default]
    Bgra,
    /// 10-bit packed RGB
    L10r,
    /// Bi-planar 4:2:0, video range
    YCbCr420v,
    /// Bi-planar 4:2:0, full range
    YCbCr420f,
}

impl PixelFormat {
    pub fn fourcc(self) -> u32 {
        u32::from_be_bytes(match self {
            PixelFormat::Bgra => *b"BGRA",
            PixelFormat::L10r => *b"l10r",
            PixelFormat::YCbCr420v => *b"420v",
            PixelFormat::YCbCr420f => *b"420f",
        })
    }

    pub fn from_fourcc(code: u32) -> Option<Self> {
        match &code.to_be_bytes() {
            b"BGRA" => Some(PixelFormat::Bgra),
            b"l10r" => Some(PixelFormat::L10r),
            b"420v" => Some(PixelFormat::YCbCr420v),
            b"420f" => Some(PixelFormat::YCbCr420f),
            _ => None,
        }
    }

    /// Bytes per pixel of the first plane
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Bgra | PixelFormat::L10r => 4,
            PixelFormat::YCbCr420v | PixelFormat::YCbCr420f => 1,
        }
    }
}

/// A rational duration, `value / timescale` seconds
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInterval {
    pub value: i64,
    pub timescale: i32,
}

impl FrameInterval {
    pub const fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        if self.value <= 0 || self.timescale <= 0 {
            return None;
        }
        Some(Duration::from_secs_f64(self.value as f64 / self.timescale as f64))
    }
}

impl Default for FrameInterval {
    fn default() -> Self {
        Self::new(1, 60)
    }
}

/// Output properties of a capture stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfiguration {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    minimum_frame_interval: FrameInterval,
    queue_depth: u32,
    shows_cursor: bool,
    captures_audio: bool,
    captures_microphone: bool,
    sample_rate: u32,
    channel_count: u32,
    excludes_current_process_audio: bool,
    /// Region of the content to capture; empty means all of it
    source_rect: Rect,
    /// Where the content lands in the output; empty means the whole frame
    destination_rect: Rect,
    scales_to_fit: bool,
    shows_mouse_clicks: bool,
    ignores_shadows: bool,
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            pixel_format: PixelFormat::default(),
            minimum_frame_interval: FrameInterval::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            shows_cursor: true,
            captures_audio: false,
            captures_microphone: false,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_count: DEFAULT_CHANNEL_COUNT,
            excludes_current_process_audio: false,
            source_rect: Rect::ZERO,
            destination_rect: Rect::ZERO,
            scales_to_fit: true,
            shows_mouse_clicks: false,
            ignores_shadows: false,
        }
    }
}

impl StreamConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    pub fn with_minimum_frame_interval(mut self, interval: FrameInterval) -> Self {
        self.minimum_frame_interval = interval;
        self
    }

    pub fn with_queue_depth(mut self, depth: u32) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_shows_cursor(mut self, shows: bool) -> Self {
        self.shows_cursor = shows;
        self
    }

    pub fn with_captures_audio(mut self, captures: bool) -> Self {
        self.captures_audio = captures;
        self
    }

    pub fn with_captures_microphone(mut self, captures: bool) -> Self {
        self.captures_microphone = captures;
        self
    }

    pub fn with_audio_format(mut self, sample_rate: u32, channel_count: u32) -> Self {
        self.sample_rate = sample_rate;
        self.channel_count = channel_count;
        self
    }

    pub fn with_excludes_current_process_audio(mut self, excludes: bool) -> Self {
        self.excludes_current_process_audio = excludes;
        self
    }

    pub fn with_source_rect(mut self, rect: Rect) -> Self {
        self.source_rect = rect;
        self
    }

    pub fn with_destination_rect(mut self, rect: Rect) -> Self {
        self.destination_rect = rect;
        self
    }

    pub fn with_scales_to_fit(mut self, scales: bool) -> Self {
        self.scales_to_fit = scales;
        self
    }

    pub fn with_shows_mouse_clicks(mut self, shows: bool) -> Self {
        self.shows_mouse_clicks = shows;
        self
    }

    pub fn with_ignores_shadows(mut self, ignores: bool) -> Self {
        self.ignores_shadows = ignores;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn minimum_frame_interval(&self) -> FrameInterval {
        self.minimum_frame_interval
    }

    pub fn queue_depth(&self) -> u32 {
        self.queue_depth
    }

    pub fn shows_cursor(&self) -> bool {
        self.shows_cursor
    }

    pub fn captures_audio(&self) -> bool {
        self.captures_audio
    }

    pub fn captures_microphone(&self) -> bool {
        self.captures_microphone
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    pub fn excludes_current_process_audio(&self) -> bool {
        self.excludes_current_process_audio
    }

    pub fn source_rect(&self) -> Rect {
        self.source_rect
    }

    pub fn destination_rect(&self) -> Rect {
        self.destination_rect
    }

    pub fn scales_to_fit(&self) -> bool {
        self.scales_to_fit
    }

    pub fn shows_mouse_clicks(&self) -> bool {
        self.shows_mouse_clicks
    }

    pub fn ignores_shadows(&self) -> bool {
        self.ignores_shadows
    }

    /// Check the configuration against the running platform
    pub fn validate(&self, caps: &CapabilitySet) -> BridgeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BridgeError::Configuration(format!(
                "output size must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(BridgeError::Configuration(format!(
                "output size must be at most {}x{} (got {}x{})",
                MAX_DIMENSION, MAX_DIMENSION, self.width, self.height
            )));
        }
        for (name, rect) in [("source", &self.source_rect), ("destination", &self.destination_rect)] {
            if !rect.is_well_formed() {
                return Err(BridgeError::Configuration(format!(
                    "{} rect must be finite with a non-negative size (got {:?})",
                    name, rect
                )));
            }
        }
        let output = Rect::new(0.0, 0.0, self.width as f64, self.height as f64);
        if !self.destination_rect.is_empty() && !output.contains(&self.destination_rect) {
            return Err(BridgeError::Configuration(format!(
                "destination rect {:?} exceeds the {}x{} output",
                self.destination_rect, self.width, self.height
            )));
        }
        if !(1..=MAX_QUEUE_DEPTH).contains(&self.queue_depth) {
            return Err(BridgeError::Configuration(format!(
                "queue depth must be between 1 and {} (got {})",
                MAX_QUEUE_DEPTH, self.queue_depth
            )));
        }
        if self.minimum_frame_interval.as_duration().is_none() {
            return Err(BridgeError::Configuration(format!(
                "minimum frame interval must be positive (got {}/{})",
                self.minimum_frame_interval.value, self.minimum_frame_interval.timescale
            )));
        }
        if self.captures_audio || self.captures_microphone {
            caps.require(Feature::AudioCapture)?;
            if self.sample_rate == 0 || self.channel_count == 0 {
                return Err(BridgeError::Configuration(
                    "audio sample rate and channel count must be non-zero".into(),
                ));
            }
        }
        if self.captures_microphone {
            caps.require(Feature::MicrophoneCapture)?;
        }
        if self.shows_mouse_clicks {
            caps.require(Feature::MouseClickHighlight)?;
        }
        if self.ignores_shadows {
            caps.require(Feature::ShadowSuppression)?;
        }
        Ok(())
    }
}
