//! Platform capability flags
//!
//! The running platform revision is resolved once into a [`CapabilitySet`].
//! Components branch on that value instead of re-querying the platform.
//!
//! Gated accessors fall back to a documented default when a feature is
//! missing; gated mutators fail with a configuration error.

use crate::capture::channel::ChannelKind;
use crate::error::{BridgeError, BridgeResult};
use std::fmt;
use std::str::FromStr;

/// A `major.minor` platform revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformRevision {
    pub major: u16,
    pub minor: u16,
}

impl PlatformRevision {
    /// Oldest revision the capture framework exists on
    pub const BASELINE: Self = Self::new(12, 3);
    /// Newest revision the bridge knows about
    pub const LATEST: Self = Self::new(26, 0);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl Default for PlatformRevision {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for PlatformRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PlatformRevision {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BridgeError::Configuration(format!("invalid platform revision '{}'", s));
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => p.parse::<u16>().map_err(|_| invalid())?,
            None => 0,
        };
        // Patch component is accepted and ignored
        if let Some(patch) = parts.next() {
            patch.parse::<u16>().map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(major, minor))
    }
}

/// Revision-gated features
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    AudioCapture = 0,
    SynchronizationClock = 1,
    ConfigurationUpdate = 2,
    FilterIntrospection = 3,
    MenuBarInclusion = 4,
    MicrophoneCapture = 5,
    RecordingOutput = 6,
    IncludedContent = 7,
    StreamActivityEvents = 8,
    ShadowSuppression = 9,
    MouseClickHighlight = 10,
    RegionScreenshot = 11,
}

impl Feature {
    pub const ALL: [Feature; 12] = [
        Feature::AudioCapture,
        Feature::SynchronizationClock,
        Feature::ConfigurationUpdate,
        Feature::FilterIntrospection,
        Feature::MenuBarInclusion,
        Feature::MicrophoneCapture,
        Feature::RecordingOutput,
        Feature::IncludedContent,
        Feature::StreamActivityEvents,
        Feature::ShadowSuppression,
        Feature::MouseClickHighlight,
        Feature::RegionScreenshot,
    ];

    pub fn minimum_revision(self) -> PlatformRevision {
        match self {
            Feature::AudioCapture
            | Feature::SynchronizationClock
            | Feature::ConfigurationUpdate => PlatformRevision::new(13, 0),
            Feature::FilterIntrospection | Feature::ShadowSuppression => {
                PlatformRevision::new(14, 0)
            }
            Feature::MenuBarInclusion => PlatformRevision::new(14, 2),
            Feature::MicrophoneCapture
            | Feature::RecordingOutput
            | Feature::MouseClickHighlight => PlatformRevision::new(15, 0),
            Feature::IncludedContent
            | Feature::StreamActivityEvents
            | Feature::RegionScreenshot => {
                PlatformRevision::new(15, 2)
            }
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::AudioCapture => "audio capture",
            Feature::SynchronizationClock => "synchronization clock",
            Feature::ConfigurationUpdate => "configuration update",
            Feature::FilterIntrospection => "content filter introspection",
            Feature::MenuBarInclusion => "menu bar inclusion",
            Feature::MicrophoneCapture => "microphone capture",
            Feature::RecordingOutput => "recording output",
            Feature::IncludedContent => "included content introspection",
            Feature::StreamActivityEvents => "stream activity events",
            Feature::ShadowSuppression => "shadow suppression",
            Feature::MouseClickHighlight => "mouse click highlighting",
            Feature::RegionScreenshot => "region screenshot",
        };
        f.write_str(name)
    }
}

/// Features available on the running platform, resolved once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    revision: PlatformRevision,
    flags: u32,
}

impl CapabilitySet {
    pub fn resolve(revision: PlatformRevision) -> Self {
        let flags = Feature::ALL
            .into_iter()
            .filter(|f| revision >= f.minimum_revision())
            .fold(0, |acc, f| acc | f.bit());
        tracing::debug!("Resolved capabilities for revision {}: {:#014b}", revision, flags);
        Self { revision, flags }
    }

    pub fn revision(&self) -> PlatformRevision {
        self.revision
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.flags & feature.bit() != 0
    }

    /// Gate for mutating operations
    pub fn require(&self, feature: Feature) -> BridgeResult<()> {
        if self.supports(feature) {
            Ok(())
        } else {
            Err(BridgeError::unsupported(feature, self.revision))
        }
    }

    /// Gate for pure accessors: `default` when the feature is missing
    pub fn read_or<T>(&self, feature: Feature, default: T, read: impl FnOnce() -> T) -> T {
        if self.supports(feature) {
            read()
        } else {
            default
        }
    }

    /// Microphone aliases to audio where microphone capture is missing
    pub fn resolve_channel(&self, kind: ChannelKind) -> ChannelKind {
        match kind {
            ChannelKind::Microphone if !self.supports(Feature::MicrophoneCapture) => {
                ChannelKind::Audio
            }
            other => other,
        }
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::resolve(PlatformRevision::LATEST)
    }
}
