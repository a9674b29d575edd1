//! Shareable content value objects

/// Rectangle in points
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite())
    }

    /// Finite, with no negative extent
    pub fn is_well_formed(&self) -> bool {
        self.is_finite() && self.width >= 0.0 && self.height >= 0.0
    }
}

/// A physical or virtual display
#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    pub id: u32,
    pub frame: Rect,
    /// Pixels per point
    pub point_pixel_scale: f32,
}

impl Display {
    pub fn new(id: u32, frame: Rect, point_pixel_scale: f32) -> Self {
        Self {
            id,
            frame,
            point_pixel_scale: if point_pixel_scale > 0.0 { point_pixel_scale } else { 1.0 },
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.width.max(0.0) as u32
    }

    pub fn height(&self) -> u32 {
        self.frame.height.max(0.0) as u32
    }
}

/// A running application that owns windows
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub process_id: i32,
    pub bundle_identifier: String,
    pub name: String,
}

impl Application {
    pub fn new(process_id: i32, bundle_identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            process_id,
            bundle_identifier: bundle_identifier.into(),
            name: name.into(),
        }
    }
}

/// An on-screen or off-screen window
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub id: u32,
    pub frame: Rect,
    pub title: Option<String>,
    pub owning_application: Option<Application>,
    pub on_screen: bool,
}

impl Window {
    pub fn new(id: u32, frame: Rect) -> Self {
        Self {
            id,
            frame,
            title: None,
            owning_application: None,
            on_screen: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_owner(mut self, application: Application) -> Self {
        self.owning_application = Some(application);
        self
    }
}
