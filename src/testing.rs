//! Shared test helpers

use std::sync::mpsc::Receiver;
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for the next message, failing the test instead of hanging
pub fn recv_within<T>(rx: &Receiver<T>) -> T {
    rx.recv_timeout(TIMEOUT)
        .unwrap_or_else(|e| panic!("nothing received within {:?}: {}", TIMEOUT, e))
}
