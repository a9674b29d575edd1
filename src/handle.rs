//! Handle table and retain/release gateway
//!
//! Managed objects are reference counted with [`Arc`]. A caller on the far
//! side of the C boundary never sees an `Arc`; it sees a [`Handle`], which
//! names one slot in the table. Each slot owns exactly one strong reference,
//! so `retain` and `release` map onto inserting and removing slots.
//!
//! Handles carry a generation so a released handle can never reach the
//! object that later reuses its slot, and every slot is tagged with its
//! [`ObjectKind`] so a handle of one kind is rejected by operations on
//! another.

use crate::capture::configuration::StreamConfiguration;
use crate::capture::content::{Application, Display, Window};
use crate::capture::filter::{ContentFilter, ContentInfo};
use crate::capture::recording::RecordingOutput;
use crate::capture::sample::{Image, MediaSample, SynchronizationClock};
use crate::capture::stream::CaptureStream;
use crate::dispatch::DispatchQueue;
use parking_lot::Mutex as ParkingMutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Opaque identity of one managed object reference
///
/// Low 32 bits hold `slot index + 1`, high 32 bits the slot generation.
/// Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub const NULL: Handle = Handle(0);

    pub fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    fn compose(index: u32, generation: u32) -> Self {
        Handle(((generation as u64) << 32) | (index as u64 + 1))
    }

    fn index(self) -> Option<usize> {
        let low = (self.0 & 0xFFFF_FFFF) as usize;
        low.checked_sub(1)
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Handle misuse detected by the table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("null handle")]
    Null,

    #[error("handle {0:#x} is not live")]
    Stale(u64),

    #[error("handle {handle:#x} refers to a {actual}, expected a {expected}")]
    WrongKind {
        handle: u64,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("handle table is full")]
    Exhausted,
}

macro_rules! managed_objects {
    ($($variant:ident => $ty:ty, $label:literal;)*) => {
        /// Kind tag stored alongside every slot
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ObjectKind {
            $($variant,)*
        }

        impl fmt::Display for ObjectKind {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(ObjectKind::$variant => f.write_str($label),)*
                }
            }
        }

        /// One strong reference to a managed object of any kind
        #[derive(Clone)]
        pub enum ManagedObject {
            $($variant(Arc<$ty>),)*
        }

        impl ManagedObject {
            pub fn kind(&self) -> ObjectKind {
                match self {
                    $(ManagedObject::$variant(_) => ObjectKind::$variant,)*
                }
            }
        }

        $(
            impl Managed for $ty {
                const KIND: ObjectKind = ObjectKind::$variant;

                fn wrap(this: Arc<Self>) -> ManagedObject {
                    ManagedObject::$variant(this)
                }

                fn unwrap(object: &ManagedObject) -> Option<Arc<Self>> {
                    match object {
                        ManagedObject::$variant(inner) => Some(Arc::clone(inner)),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Types that can live behind a handle
pub trait Managed: Send + Sync + Sized + 'static {
    const KIND: ObjectKind;

    fn wrap(this: Arc<Self>) -> ManagedObject;

    fn unwrap(object: &ManagedObject) -> Option<Arc<Self>>;
}

managed_objects! {
    Display => Display, "display";
    Window => Window, "window";
    Application => Application, "application";
    ContentFilter => ContentFilter, "content filter";
    ContentInfo => ContentInfo, "content info";
    Configuration => StreamConfiguration, "stream configuration";
    Stream => CaptureStream, "stream";
    MediaSample => MediaSample, "media sample";
    Image => Image, "image";
    Clock => SynchronizationClock, "synchronization clock";
    Queue => DispatchQueue, "dispatch queue";
    RecordingOutput => RecordingOutput, "recording output";
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManagedObject({})", self.kind())
    }
}

struct Slot {
    generation: u32,
    object: Option<ManagedObject>,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Arena {
    fn lookup(&self, handle: Handle) -> Result<&ManagedObject, HandleError> {
        if handle.is_null() {
            return Err(HandleError::Null);
        }
        handle
            .index()
            .and_then(|index| self.slots.get(index))
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.object.as_ref())
            .ok_or(HandleError::Stale(handle.into_raw()))
    }

    fn insert(&mut self, object: ManagedObject) -> Result<Handle, HandleError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len())
                    .ok()
                    .filter(|index| *index < u32::MAX)
                    .ok_or(HandleError::Exhausted)?;
                self.slots.push(Slot {
                    generation: 1,
                    object: None,
                });
                index
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.object = Some(object);
        self.live += 1;
        Ok(Handle::compose(index, slot.generation))
    }
}

/// Table of live handles, one strong reference per handle
#[derive(Default)]
pub struct HandleTable {
    arena: ParkingMutex<Arena>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand a freshly created object to the caller with one reference
    pub fn insert<T: Managed>(&self, object: Arc<T>) -> Result<Handle, HandleError> {
        let kind = T::KIND;
        let result = self.arena.lock().insert(T::wrap(object));
        match &result {
            Ok(handle) => tracing::trace!("Issued {} handle {}", kind, handle),
            Err(e) => tracing::error!("Failed to issue {} handle: {}", kind, e),
        }
        result
    }

    /// Borrow the object behind a handle as a new strong reference
    pub fn get<T: Managed>(&self, handle: Handle) -> Result<Arc<T>, HandleError> {
        let arena = self.arena.lock();
        let object = arena.lookup(handle)?;
        T::unwrap(object).ok_or(HandleError::WrongKind {
            handle: handle.into_raw(),
            expected: T::KIND,
            actual: object.kind(),
        })
    }

    /// Issue an independent handle to the same object
    ///
    /// Releasing either handle leaves the other valid.
    pub fn retain(&self, handle: Handle, kind: ObjectKind) -> Result<Handle, HandleError> {
        let mut arena = self.arena.lock();
        let object = arena.lookup(handle)?;
        check_kind(handle, kind, object.kind())?;
        let object = object.clone();
        arena.insert(object)
    }

    /// Drop the reference owned by `handle`
    ///
    /// The object itself is destroyed once no handle or internal owner
    /// still references it. That destruction runs after the table lock is
    /// released, so destructors are free to touch the table.
    pub fn release(&self, handle: Handle, kind: ObjectKind) -> Result<(), HandleError> {
        let released = {
            let mut guard = self.arena.lock();
            let arena = &mut *guard;
            let actual = arena.lookup(handle)?.kind();
            check_kind(handle, kind, actual)?;

            let index = handle.index().ok_or(HandleError::Null)?;
            let slot = &mut arena.slots[index];
            let object = slot.object.take();
            slot.generation = slot.generation.wrapping_add(1);
            // A slot whose generation wrapped is retired rather than reused
            let reusable = slot.generation != 0;
            arena.live -= 1;
            if reusable {
                arena.free.push(index as u32);
            }
            object
        };
        tracing::trace!("Released {} handle {}", kind, handle);
        drop(released);
        Ok(())
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.arena.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every live handle; used at bridge teardown
    pub fn clear(&self) -> usize {
        let objects: Vec<ManagedObject> = {
            let mut guard = self.arena.lock();
            let arena = &mut *guard;
            let mut taken = Vec::with_capacity(arena.live);
            arena.free.clear();
            for (index, slot) in arena.slots.iter_mut().enumerate().rev() {
                if let Some(object) = slot.object.take() {
                    slot.generation = slot.generation.wrapping_add(1);
                    taken.push(object);
                }
                if slot.generation != 0 {
                    arena.free.push(index as u32);
                }
            }
            arena.live = 0;
            taken
        };
        let count = objects.len();
        if count > 0 {
            tracing::debug!("Dropped {} outstanding handles", count);
        }
        drop(objects);
        count
    }
}

fn check_kind(handle: Handle, expected: ObjectKind, actual: ObjectKind) -> Result<(), HandleError> {
    if expected == actual {
        Ok(())
    } else {
        Err(HandleError::WrongKind {
            handle: handle.into_raw(),
            expected,
            actual,
        })
    }
}
