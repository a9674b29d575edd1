//! Capture Bridge - screen capture for C callers.
//!
//! Exposes a screen-capture session model through a flat C interface:
//! reference-counted handles, per-channel output callbacks, completion
//! callbacks for async operations and single-frame capture. Features that
//! depend on the platform revision are gated through [`CapabilitySet`].

pub mod bridge;
pub mod capability;
pub mod capture;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod logging;
pub mod registry;

#[cfg(test)]
mod testing;

pub use bridge::Bridge;
pub use capability::{CapabilitySet, Feature, PlatformRevision};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use handle::{Handle, HandleTable};
