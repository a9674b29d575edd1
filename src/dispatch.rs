//! Serial delivery queues
//!
//! Samples, stream errors and activity events are delivered on a
//! [`DispatchQueue`]: one dedicated thread draining a FIFO of jobs. Capture
//! throughput is never coupled to the caller's own event loop, and jobs on
//! the same queue never run concurrently.

use parking_lot::Mutex as ParkingMutex;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc::{self, UnboundedSender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling class of a queue's worker thread
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityOfService {
    Background = 0,
    Utility = 1,
    #[default]
    Default = 2,
    UserInitiated = 3,
    UserInteractive = 4,
}

impl QualityOfService {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Background),
            1 => Some(Self::Utility),
            2 => Some(Self::Default),
            3 => Some(Self::UserInitiated),
            4 => Some(Self::UserInteractive),
            _ => None,
        }
    }
}

/// A serial queue backed by its own thread
pub struct DispatchQueue {
    label: String,
    qos: QualityOfService,
    sender: ParkingMutex<Option<UnboundedSender<Job>>>,
    worker: ParkingMutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl DispatchQueue {
    pub fn new(label: impl Into<String>, qos: QualityOfService) -> io::Result<Self> {
        let label = label.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let thread_label = label.clone();
        let worker = thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!("Job on queue '{}' panicked", thread_label);
                    }
                }
                tracing::debug!("Queue '{}' drained", thread_label);
            })?;

        tracing::debug!("Created dispatch queue '{}' ({:?})", label, qos);
        Ok(Self {
            label,
            qos,
            sender: ParkingMutex::new(Some(sender)),
            worker_id: worker.thread().id(),
            worker: ParkingMutex::new(Some(worker)),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn qos(&self) -> QualityOfService {
        self.qos
    }

    /// Enqueue a job; false once the queue is closed
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Whether the calling thread is this queue's worker
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Stop accepting jobs and wait for queued ones to finish
    ///
    /// Called from the queue's own worker, this only stops intake.
    pub fn close(&self) {
        self.sender.lock().take();
        if self.is_current() {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::warn!("Queue '{}' worker exited abnormally", self.label);
            }
        }
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("label", &self.label)
            .field("qos", &self.qos)
            .finish()
    }
}
