use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    Res,
    error::SourceError,
    mirror::MirrorResolver,
    types::{StreamRef, TrackDescriptor},
};

/// Observable phase of a handle's resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

impl ResolutionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ResolutionState::Resolving,
            2 => ResolutionState::Resolved,
            3 => ResolutionState::Failed,
            _ => ResolutionState::Unresolved,
        }
    }
}

#[derive(Debug)]
enum Resolution {
    Unresolved,
    Resolved(StreamRef),
    Failed(SourceError),
}

impl Resolution {
    fn state(&self) -> ResolutionState {
        match self {
            Resolution::Unresolved => ResolutionState::Unresolved,
            Resolution::Resolved(_) => ResolutionState::Resolved,
            Resolution::Failed(_) => ResolutionState::Failed,
        }
    }
}

/// Clears the in-flight flag when an attempt ends or is cancelled.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct Slot {
    resolution: Resolution,
    /// Mirror stream persisted by an earlier session, checked before use.
    hint: Option<StreamRef>,
}

/// A track descriptor plus the stream it resolved to.
///
/// Resolution runs lazily on the first [`resolve`](Self::resolve) and is
/// single-flight: concurrent callers queue on the handle and reuse the
/// outcome of the attempt that was running when they arrived. A success is
/// cached for the lifetime of the handle; a failure is only shared with
/// those waiters, and the next call tries again.
#[derive(Debug)]
pub struct ResolvedTrackHandle {
    descriptor: TrackDescriptor,
    slot: Mutex<Slot>,
    /// Settled state of `slot`, readable without the lock.
    settled: AtomicU8,
    in_flight: AtomicBool,
    failures: AtomicU64,
    lookups: AtomicU64,
}

impl ResolvedTrackHandle {
    /// Directly playable descriptors start out resolved to their own stream.
    pub fn new(descriptor: TrackDescriptor) -> Self {
        let resolution = match descriptor.stream_ref() {
            Some(stream) => Resolution::Resolved(stream),
            None => Resolution::Unresolved,
        };
        Self {
            descriptor,
            settled: AtomicU8::new(resolution.state() as u8),
            slot: Mutex::new(Slot {
                resolution,
                hint: None,
            }),
            in_flight: AtomicBool::new(false),
            failures: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
        }
    }

    /// Unresolved handle carrying a mirror hint to revalidate first.
    pub fn with_hint(descriptor: TrackDescriptor, hint: Option<StreamRef>) -> Self {
        let handle = Self::new(descriptor);
        if handle.descriptor.is_playable {
            return handle;
        }
        Self {
            slot: Mutex::new(Slot {
                resolution: Resolution::Unresolved,
                hint,
            }),
            settled: AtomicU8::new(ResolutionState::Unresolved as u8),
            ..handle
        }
    }

    pub fn descriptor(&self) -> &TrackDescriptor {
        &self.descriptor
    }

    /// Number of mirror resolutions this handle has run.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    /// `Resolving` only while a revalidation or mirror lookup is running.
    pub fn state(&self) -> ResolutionState {
        if self.in_flight.load(Ordering::SeqCst) {
            return ResolutionState::Resolving;
        }
        ResolutionState::from_u8(self.settled.load(Ordering::SeqCst))
    }

    fn settle(&self, slot: &mut Slot, resolution: Resolution) {
        self.settled.store(resolution.state() as u8, Ordering::SeqCst);
        slot.resolution = resolution;
    }

    /// The cached stream, if resolution already succeeded.
    pub async fn resolved(&self) -> Option<StreamRef> {
        match &self.slot.lock().await.resolution {
            Resolution::Resolved(stream) => Some(stream.clone()),
            _ => None,
        }
    }

    pub async fn hint(&self) -> Option<StreamRef> {
        self.slot.lock().await.hint.clone()
    }

    /// Returns the playable stream for this track, resolving it on first use.
    ///
    /// A persisted hint is revalidated before any search; a failed
    /// revalidation falls back to full resolution. Cancelling the call
    /// leaves the handle as it was.
    pub async fn resolve(&self, resolver: &MirrorResolver) -> Res<StreamRef> {
        let failures_seen = self.failures.load(Ordering::SeqCst);
        let mut slot = self.slot.lock().await;

        match &slot.resolution {
            Resolution::Resolved(stream) => return Ok(stream.clone()),
            Resolution::Failed(err) if self.failures.load(Ordering::SeqCst) != failures_seen => {
                debug!(track = %self.descriptor, "reusing concurrent resolution failure");
                return Err(err.clone());
            }
            _ => {}
        }

        let _in_flight = InFlight::start(&self.in_flight);
        if let Some(hint) = slot.hint.clone() {
            let revalidated = resolver.revalidate(&hint, &self.descriptor).await;
            slot.hint = None;
            if let Some(stream) = revalidated {
                self.settle(&mut slot, Resolution::Resolved(stream.clone()));
                return Ok(stream);
            }
        }

        self.lookups.fetch_add(1, Ordering::SeqCst);
        match resolver.resolve(&self.descriptor).await {
            Ok(stream) => {
                self.settle(&mut slot, Resolution::Resolved(stream.clone()));
                Ok(stream)
            }
            Err(err) => {
                self.settle(&mut slot, Resolution::Failed(err.clone()));
                self.failures.fetch_add(1, Ordering::SeqCst);
                Err(err)
            }
        }
    }
}
