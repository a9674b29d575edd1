//! Output handler registry
//!
//! Maps `(stream, channel)` to the handler that receives that channel's
//! samples and the queue it is called on. One lock covers the whole table;
//! attach and detach are rare and the table is small.
//!
//! The registry holds its own strong reference to each handler, so a
//! handler stays alive for as long as it is registered, independently of
//! whoever attached it.

use crate::capture::channel::{ChannelKind, StreamId, StreamOutput};
use crate::capture::sample::MediaSample;
use crate::dispatch::DispatchQueue;
use parking_lot::Mutex as ParkingMutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A handler and the queue its callbacks run on
#[derive(Clone)]
pub struct RegisteredOutput {
    handler: Arc<dyn StreamOutput>,
    queue: Arc<DispatchQueue>,
}

impl RegisteredOutput {
    pub fn new(handler: Arc<dyn StreamOutput>, queue: Arc<DispatchQueue>) -> Self {
        Self { handler, queue }
    }

    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    pub fn is_handler(&self, other: &Arc<dyn StreamOutput>) -> bool {
        Arc::ptr_eq(&self.handler, other)
    }

    /// Hand a sample to the handler on its queue
    pub fn deliver(&self, stream: StreamId, sample: Arc<MediaSample>, kind: ChannelKind) -> bool {
        let handler = Arc::clone(&self.handler);
        self.queue
            .dispatch(move || handler.did_output_sample(stream, sample, kind))
    }
}

impl std::fmt::Debug for RegisteredOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredOutput")
            .field("queue", &self.queue.label())
            .finish()
    }
}

type Key = (StreamId, ChannelKind);

#[derive(Default)]
pub struct OutputHandlerRegistry {
    entries: ParkingMutex<HashMap<Key, RegisteredOutput>>,
}

impl OutputHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a key, returning the one it replaced
    ///
    /// The replaced handler is only dropped from the table; it is not
    /// detached from anything else.
    pub fn store(&self, stream: StreamId, kind: ChannelKind, output: RegisteredOutput) -> Option<RegisteredOutput> {
        let previous = self.entries.lock().insert((stream, kind), output);
        if previous.is_some() {
            tracing::debug!("Replaced {} handler for stream {}", kind, stream);
        }
        previous
    }

    pub fn get(&self, stream: StreamId, kind: ChannelKind) -> Option<RegisteredOutput> {
        self.entries.lock().get(&(stream, kind)).cloned()
    }

    pub fn contains(&self, stream: StreamId, kind: ChannelKind) -> bool {
        self.entries.lock().contains_key(&(stream, kind))
    }

    pub fn remove(&self, stream: StreamId, kind: ChannelKind) -> Option<RegisteredOutput> {
        self.entries.lock().remove(&(stream, kind))
    }

    /// Remove every entry belonging to a stream
    pub fn evict_stream(&self, stream: StreamId) -> usize {
        let evicted: Vec<RegisteredOutput> = {
            let mut entries = self.entries.lock();
            ChannelKind::ALL
                .into_iter()
                .filter_map(|kind| entries.remove(&(stream, kind)))
                .collect()
        };
        if !evicted.is_empty() {
            tracing::debug!("Evicted {} handlers of stream {}", evicted.len(), stream);
        }
        evicted.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let drained: Vec<RegisteredOutput> = self.entries.lock().drain().map(|(_, v)| v).collect();
        drop(drained);
    }
}
