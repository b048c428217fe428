//! Entries: the records peers synchronise.
//!
//! An entry names a payload (by digest and length) at a position in the
//! namespace × subspace × path × time grid. The engine never stores
//! entries; it moves them between the peer and the data layer.

use crate::{
    path::Path,
    schemes::{NamespaceId, PayloadDigest, SubspaceId, SyncSchemes},
};

/// A single record in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<S: SyncSchemes> {
    /// Namespace the entry belongs to.
    pub namespace: NamespaceId<S>,
    /// Subspace within the namespace.
    pub subspace: SubspaceId<S>,
    /// Path within the subspace.
    pub path: Path,
    /// Creation timestamp, microseconds since the Unix epoch.
    pub timestamp: u64,
    /// Payload length in bytes.
    pub payload_length: u64,
    /// Digest of the payload.
    pub payload_digest: PayloadDigest<S>,
}

impl<S: SyncSchemes> Default for Entry<S> {
    /// The codec baseline entry: all identifiers default, empty path,
    /// timestamp and length zero. Relative entry encodings at session
    /// start resolve against this value.
    fn default() -> Self {
        Self {
            namespace: NamespaceId::<S>::default(),
            subspace: SubspaceId::<S>::default(),
            path: Path::empty(),
            timestamp: 0,
            payload_length: 0,
            payload_digest: PayloadDigest::<S>::default(),
        }
    }
}
