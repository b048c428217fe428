//! The message codec: bit-packed encoders and a resumable decoder.
//!
//! Encoding is synchronous and produces an immutable blob plus the logical
//! channel it must be sent on. Decoding is an async task over a
//! [`GrowingBytes`](crate::growing_bytes::GrowingBytes): it suspends until
//! enough bytes arrive, dispatches on the first-byte tag table, invokes the
//! parameter sub-decoders of the scheme bundle, and prunes exactly the
//! bytes it consumed.
//!
//! Both directions thread a [`ReconciliationPrivy`] through every call;
//! the privy supplies the reference values for relative encodings and
//! resolves the `0x50` tag ambiguity between announcements and entries.
//!
//! [`ReconciliationPrivy`]: crate::reconcile::ReconciliationPrivy

mod decode;
mod encode;
pub mod relative;

pub use decode::{DecodedMessage, decode_message};
pub use encode::{EncodedMessage, encode_message};

use crate::schemes::{CapabilityPrivy, NamespaceId, SyncSchemes};

/// First-byte tags of the wire format.
///
/// Low bits of many tags carry a compact width or flag bits; the constants
/// here are the family base values. Dispatch masks off the variable bits
/// and fails closed on anything left over.
pub(crate) mod tags {
    /// `CommitmentReveal` (exact byte).
    pub const COMMITMENT_REVEAL: u8 = 0x00;
    /// `PaiBindFragment` base; bit 1 is the secondary flag.
    pub const PAI_BIND_FRAGMENT: u8 = 0x04;
    /// `PaiReplyFragment` base; low 2 bits are the handle width.
    pub const PAI_REPLY_FRAGMENT: u8 = 0x08;
    /// `PaiRequestSubspaceCapability` base; low 2 bits are the handle width.
    pub const PAI_REQUEST_SUBSPACE_CAP: u8 = 0x0c;
    /// `PaiReplySubspaceCapability` base; low 2 bits are the handle width.
    pub const PAI_REPLY_SUBSPACE_CAP: u8 = 0x10;
    /// `SetupBindReadCapability` base; low 2 bits are the handle width.
    pub const SETUP_BIND_READ_CAP: u8 = 0x20;
    /// `SetupBindAreaOfInterest` base; bit 2 is the has-limit flag, low 2
    /// bits are the handle width.
    pub const SETUP_BIND_AOI: u8 = 0x28;
    /// `SetupBindStaticToken` (exact byte).
    pub const SETUP_BIND_STATIC_TOKEN: u8 = 0x30;
    /// `ReconciliationSendFingerprint` base; low 4 bits are flags.
    pub const RECON_SEND_FINGERPRINT: u8 = 0x40;
    /// Shared base of `ReconciliationAnnounceEntries` and
    /// `ReconciliationSendEntry`; the privy disambiguates.
    pub const RECON_ANNOUNCE_OR_ENTRY: u8 = 0x50;
    /// `DataSendEntry` base; low 2 bits are the token handle width.
    pub const DATA_SEND_ENTRY: u8 = 0x60;
    /// `DataSendPayload` base; low 2 bits are the amount width.
    pub const DATA_SEND_PAYLOAD: u8 = 0x64;
    /// `DataSetMetadata` base; bit 0 is the eager flag.
    pub const DATA_SET_METADATA: u8 = 0x68;
    /// `DataBindPayloadRequest` (exact byte).
    pub const DATA_BIND_PAYLOAD_REQUEST: u8 = 0x6a;
    /// `DataReplyPayload` base; low 2 bits are the handle width.
    pub const DATA_REPLY_PAYLOAD: u8 = 0x6c;
    /// `ControlIssueGuarantee` (exact byte; width travels in byte 2).
    pub const CONTROL_ISSUE_GUARANTEE: u8 = 0x80;
    /// `ControlAbsolve` (exact byte).
    pub const CONTROL_ABSOLVE: u8 = 0x82;
    /// `ControlPlead` (exact byte).
    pub const CONTROL_PLEAD: u8 = 0x84;
    /// `ControlLimitSending` (exact byte).
    pub const CONTROL_LIMIT_SENDING: u8 = 0x86;
    /// `ControlLimitReceiving` (exact byte).
    pub const CONTROL_LIMIT_RECEIVING: u8 = 0x87;
    /// `ControlFree` base; low 2 bits are the handle width.
    pub const CONTROL_FREE: u8 = 0x8c;
    /// `ControlAnnounceDropping` base; low 3 bits are the channel.
    pub const CONTROL_ANNOUNCE_DROPPING: u8 = 0x90;
    /// `ControlApologise` base; low 3 bits are the channel.
    pub const CONTROL_APOLOGISE: u8 = 0x98;
}

// Flag bits shared between the encoder and decoder of one message kind.
pub(crate) mod flags {
    /// `PaiBindFragment`: fragment is from the secondary set.
    pub const PAI_BIND_SECONDARY: u8 = 0x02;
    /// `SetupBindAreaOfInterest`: a max-count/max-size budget follows.
    pub const AOI_HAS_LIMIT: u8 = 0x04;
    /// `SendFingerprint`/`AnnounceEntries`: sender handle equals the
    /// privy's previous sender handle.
    pub const RECON_SENDER_PREV: u8 = 0x08;
    /// `SendFingerprint`/`AnnounceEntries`: receiver handle equals the
    /// privy's previous receiver handle.
    pub const RECON_RECEIVER_PREV: u8 = 0x04;
    /// `SendFingerprint`: fingerprint is the neutral element.
    pub const RECON_FP_NEUTRAL: u8 = 0x02;
    /// `SendFingerprint`/`AnnounceEntries`: range is encoded relative to
    /// the privy's previous range rather than the full range.
    pub const RECON_RANGE_PREV: u8 = 0x01;
    /// `AnnounceEntries`: sender wants the receiver's entries in return.
    pub const RECON_WANTS_RESPONSE: u8 = 0x02;
    /// `AnnounceEntries` second byte: entries will arrive sorted.
    pub const RECON_WILL_SORT: u8 = 0x02;
    /// `SendEntry`: static token handle equals the privy's previous one.
    pub const RECON_TOKEN_PREV: u8 = 0x08;
    /// `SendEntry`: entry is encoded relative to the privy's previous
    /// entry rather than absolutely.
    pub const RECON_ENTRY_PREV: u8 = 0x04;
    /// `DataSetMetadata`: payloads should be pushed eagerly.
    pub const DATA_IS_EAGER: u8 = 0x01;
    /// `ControlFree` second byte: the sender is the binder of the handle.
    pub const FREE_MINE: u8 = 0x80;
}

/// Session state the codec consults while encoding or decoding.
///
/// Some messages are encoded against context selected by a handle they
/// reference: capabilities against the privy of an intersection handle,
/// interests against the granted area of a capability handle. The encoder
/// consults the local session's stores; the decoder consults its mirror of
/// the peer's.
pub trait CodecContext<S: SyncSchemes> {
    /// Namespace and outer area of a bound intersection handle.
    fn intersection_privy(&self, handle: u64) -> Option<CapabilityPrivy<S>>;

    /// Granted namespace and area of a bound read-capability handle.
    fn capability_privy(&self, handle: u64) -> Option<CapabilityPrivy<S>>;

    /// Namespace of an area-of-interest pairing, resolved from whichever
    /// of the two handles the implementation can see.
    fn aoi_namespace(&self, sender_handle: u64, receiver_handle: u64)
    -> Option<NamespaceId<S>>;
}
