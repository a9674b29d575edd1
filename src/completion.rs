//! Async-to-callback adapter
//!
//! Bridge operations are async internally, while callers only understand
//! completion callbacks. [`AsyncAdapter::launch`] runs a future as its own
//! task and hands its outcome to a one-shot consumer, exactly once, whether
//! the future succeeds, fails, panics, or is torn down with the runtime.

use crate::error::{BridgeError, BridgeResult};
use parking_lot::Mutex as ParkingMutex;
use std::future::Future;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type Consumer<T> = Box<dyn FnOnce(BridgeResult<T>) + Send + 'static>;

/// One-shot result slot
///
/// The first `resolve` hands the result to the consumer; later calls are
/// no-ops. Dropping an unresolved slot resolves it with an error, so the
/// consumer always runs.
pub struct PendingCompletion<T> {
    slot: ParkingMutex<Option<Consumer<T>>>,
}

impl<T: Send + 'static> PendingCompletion<T> {
    pub fn new(consumer: impl FnOnce(BridgeResult<T>) + Send + 'static) -> Self {
        Self {
            slot: ParkingMutex::new(Some(Box::new(consumer))),
        }
    }

    /// Slot whose result is received through a oneshot channel
    pub fn channel() -> (Self, oneshot::Receiver<BridgeResult<T>>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(move |result| {
            let _ = tx.send(result);
        });
        (completion, rx)
    }
}

impl<T> PendingCompletion<T> {
    /// Resolve the slot; false if it was already resolved
    pub fn resolve(&self, result: BridgeResult<T>) -> bool {
        // Consumer runs outside the lock
        let consumer = self.slot.lock().take();
        match consumer {
            Some(consumer) => {
                consumer(result);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl<T> Drop for PendingCompletion<T> {
    fn drop(&mut self) {
        if let Some(consumer) = self.slot.get_mut().take() {
            tracing::warn!("Pending completion dropped unresolved");
            consumer(Err(BridgeError::Stream(
                "operation was abandoned before it completed".into(),
            )));
        }
    }
}

/// Launches bridge operations on the bridge runtime
#[derive(Clone)]
pub struct AsyncAdapter {
    runtime: RuntimeHandle,
}

impl AsyncAdapter {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    /// Run `future` and pass its outcome to `on_complete`
    ///
    /// Returns immediately; `on_complete` runs on a runtime worker. There is
    /// no cancellation: the returned handle is for observing, not aborting.
    pub fn launch<T, F, C>(&self, operation: &'static str, future: F, on_complete: C) -> JoinHandle<()>
    where
        T: Send + 'static,
        F: Future<Output = BridgeResult<T>> + Send + 'static,
        C: FnOnce(BridgeResult<T>) + Send + 'static,
    {
        let completion = PendingCompletion::new(on_complete);
        tracing::debug!("Launching {}", operation);

        let inner = self.runtime.spawn(future);
        self.runtime.spawn(async move {
            let result = match inner.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    tracing::error!("{} panicked", operation);
                    Err(BridgeError::Stream(format!("{} panicked", operation)))
                }
                Err(_) => Err(BridgeError::Stream(format!("{} was cancelled", operation))),
            };
            match &result {
                Ok(_) => tracing::debug!("{} completed", operation),
                Err(e) => tracing::warn!("{} failed: {}", operation, e),
            }
            completion.resolve(result);
        })
    }
}
