use serde::{Deserialize, Serialize};

use super::ResolvedTrackHandle;
use crate::{
    Res,
    catalog::CatalogDispatcher,
    error::SourceError,
    types::{StreamRef, TrackDescriptor},
};

/// What gets persisted alongside a track reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodePolicy {
    /// Keep the last resolved mirror stream as a hint for the next session.
    pub persist_mirror_hint: bool,
}

/// Persisted form of a track handle: the owning source tag followed by the
/// descriptor, plus an optional mirror hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackReference {
    pub source: String,
    pub descriptor: TrackDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<StreamRef>,
}

impl TrackReference {
    /// Captures a handle under `policy`. Playable descriptors carry their own
    /// native id, so a hint is only ever stored for mirror-dependent ones.
    pub async fn capture(handle: &ResolvedTrackHandle, policy: EncodePolicy) -> Self {
        let descriptor = handle.descriptor().clone();
        let hint = if policy.persist_mirror_hint && !descriptor.is_playable {
            handle.resolved().await
        } else {
            None
        };
        Self {
            source: descriptor.source.clone(),
            descriptor,
            hint,
        }
    }

    pub fn encode(&self) -> Res<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(encoded: &str) -> Res<Self> {
        let reference: Self = serde_json::from_str(encoded)?;
        if reference.source != reference.descriptor.source {
            return Err(SourceError::parse(format!(
                "reference tagged {} holds a {} descriptor",
                reference.source, reference.descriptor.source
            )));
        }
        Ok(reference)
    }

    /// Rebuilds the handle. Mirror-dependent tracks come back unresolved,
    /// with the hint (if any) queued for revalidation.
    ///
    /// # Errors
    ///
    /// [`SourceError::UnknownSource`] when the owning source isn't registered.
    pub fn restore(self, dispatcher: &CatalogDispatcher) -> Res<ResolvedTrackHandle> {
        if dispatcher.client(&self.source).is_none() {
            return Err(SourceError::UnknownSource(self.source));
        }
        Ok(ResolvedTrackHandle::with_hint(self.descriptor, self.hint))
    }
}
