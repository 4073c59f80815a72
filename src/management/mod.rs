mod handle;
mod lease;
mod reference;
mod store;

pub use handle::{ResolutionState, ResolvedTrackHandle};
pub use lease::CredentialLease;
pub use reference::{EncodePolicy, TrackReference};
pub use store::TrackReferenceStore;
