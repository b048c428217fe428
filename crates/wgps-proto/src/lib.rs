//! Wire layer of the WGPS sync protocol.
//!
//! This crate owns everything that touches bytes: the data model (paths,
//! entries, areas, 3-D ranges), compact-width integers, the incremental
//! [`GrowingBytes`](growing_bytes::GrowingBytes) buffer, the parameter
//! scheme traits, the message taxonomy, and the bit-packed
//! encoders/decoders with their rolling reconciliation context. It is
//! engine-free by design: handle stores, credit accounting, and the PAI
//! state machine live in `wgps-core`.
//!
//! # Invariants
//!
//! - For every message `m` and shared privy `p`,
//!   `decode(encode(m, p), p) == m`.
//! - The decoder consumes exactly the bytes the encoder produced; message
//!   boundaries never drift.

pub mod channels;
pub mod codec;
pub mod compact_width;
pub mod entry;
pub mod error;
pub mod fragment;
pub mod grouping;
pub mod growing_bytes;
pub mod messages;
pub mod path;
pub mod reconcile;
pub mod schemes;

pub use channels::{HandleType, LogicalChannel};
pub use codec::{CodecContext, DecodedMessage, EncodedMessage, decode_message, encode_message};
pub use entry::Entry;
pub use error::{DecodeError, EncodeError};
pub use fragment::{Fragment, FragmentKit, FragmentSet};
pub use grouping::{Area, AreaOfInterest, AreaSubspace, Range, Range3d, RangeEnd};
pub use growing_bytes::{GrowingBytes, StreamEnded};
pub use messages::Message;
pub use path::{Component, Path};
pub use reconcile::ReconciliationPrivy;
pub use schemes::{CapabilityPrivy, SyncSchemes};
