//! The WGPS message taxonomy.
//!
//! Messages are plain data; the codec module owns their wire layout. Every
//! back-reference flag of the wire format ("same handle as before", "entry
//! relative to the previous entry") is resolved during decoding, so these
//! types only ever carry final values; downstream code never sees a flag.
//!
//! # Invariants
//!
//! - Each message maps to exactly one logical channel (or none, for the
//!   control plane); [`Message::channel`] is exhaustive, so adding a
//!   variant without routing it is a compile error.
//! - Round-trip: encoding a message against a privy and decoding the bytes
//!   against an identical privy yields an equal message.

use bytes::Bytes;

use crate::{
    channels::{HandleType, LogicalChannel},
    entry::Entry,
    grouping::{AreaOfInterest, Range3d},
    schemes::{
        DynamicToken, Fingerprint, GroupElement, StaticToken, SubspaceCapability,
        SubspaceSignature, SyncSchemes, SyncSignature,
    },
};
use crate::schemes::ReadCapability;

/// Reveal the nonce behind the commitment sent during transport setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentReveal {
    /// The nonce; always exactly `CHALLENGE_LENGTH` bytes.
    pub nonce: Bytes,
}

/// Grant the peer `amount` more bytes of credit on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlIssueGuarantee {
    /// Bytes of credit granted.
    pub amount: u64,
    /// Channel the credit applies to.
    pub channel: LogicalChannel,
}

/// Voluntarily forfeit `amount` bytes of previously granted credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlAbsolve {
    /// Bytes of credit forfeited.
    pub amount: u64,
    /// Channel the forfeit applies to.
    pub channel: LogicalChannel,
}

/// Ask the peer to absolve down to `target` bytes of remaining credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPlead {
    /// Desired remaining credit after the peer absolves.
    pub target: u64,
    /// Channel the plea applies to.
    pub channel: LogicalChannel,
}

/// Promise never to bind more than `bound` further resources (sender side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLimitSending {
    /// Upper bound on future binds by the sender.
    pub bound: u64,
    /// Channel the bound applies to.
    pub channel: LogicalChannel,
}

/// Promise never to accept more than `bound` further resources (receiver
/// side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLimitReceiving {
    /// Upper bound on future accepts by the sender of this message.
    pub bound: u64,
    /// Channel the bound applies to.
    pub channel: LogicalChannel,
}

/// Announce that incoming messages on a channel are being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlAnnounceDropping {
    /// The overflowing channel.
    pub channel: LogicalChannel,
}

/// Announce that dropping has stopped and the channel is live again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlApologise {
    /// The recovered channel.
    pub channel: LogicalChannel,
}

/// Release a bound handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFree {
    /// The handle to release.
    pub handle: u64,
    /// True when the sender of this message is the peer that bound the
    /// handle. Disambiguates the two per-type handle spaces.
    pub mine: bool,
    /// Which handle space the handle belongs to.
    pub handle_type: HandleType,
}

/// Bind a blinded fragment group element to a fresh intersection handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaiBindFragment<S: SyncSchemes> {
    /// Fragment hashed into the group and multiplied by the sender's
    /// scalar.
    pub group: GroupElement<S>,
    /// True when the fragment is from the sender's secondary set.
    pub is_secondary: bool,
}

/// Return the peer's bound fragment multiplied by our scalar too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaiReplyFragment<S: SyncSchemes> {
    /// The intersection handle the peer bound (in the peer's space).
    pub handle: u64,
    /// The doubly blinded group element.
    pub group: GroupElement<S>,
}

/// Ask the peer to prove access to every subspace at a fragment's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaiRequestSubspaceCapability {
    /// Intersection handle of the fragment in question (bound by the
    /// sender of this message).
    pub handle: u64,
}

/// Answer a subspace capability request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaiReplySubspaceCapability<S: SyncSchemes> {
    /// The handle from the request, echoed back.
    pub handle: u64,
    /// The subspace capability itself.
    pub capability: SubspaceCapability<S>,
    /// Signature over the session challenge by the capability's receiver.
    pub signature: SubspaceSignature<S>,
}

/// Bind a read capability to a capability handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupBindReadCapability<S: SyncSchemes> {
    /// Intersection handle whose fragment context the capability is
    /// encoded against.
    pub handle: u64,
    /// The capability; its granted area authorises later interests.
    pub capability: ReadCapability<S>,
    /// Signature over the session challenge by the capability's receiver.
    pub signature: SyncSignature<S>,
}

/// Bind an area of interest under a previously bound capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupBindAreaOfInterest<S: SyncSchemes> {
    /// Capability handle authorising this interest.
    pub authorisation: u64,
    /// The area of interest; must lie in the capability's granted area.
    pub area_of_interest: AreaOfInterest<S>,
}

/// Bind a static authorisation token for later reference by entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupBindStaticToken<S: SyncSchemes> {
    /// The static token.
    pub static_token: StaticToken<S>,
}

/// Send the fingerprint of the entries in a 3-D range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationSendFingerprint<S: SyncSchemes> {
    /// The fingerprinted range.
    pub range: Range3d<S>,
    /// Fingerprint over all entries the sender holds in the range.
    pub fingerprint: Fingerprint<S>,
    /// Area-of-interest handle bound by the sender.
    pub sender_handle: u64,
    /// Area-of-interest handle bound by the receiver.
    pub receiver_handle: u64,
}

/// Announce that the entries in a range follow, one by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationAnnounceEntries<S: SyncSchemes> {
    /// The range whose entries follow.
    pub range: Range3d<S>,
    /// How many `ReconciliationSendEntry` messages follow.
    pub count: u64,
    /// True if the sender wants the receiver's entries for the range in
    /// return.
    pub wants_response: bool,
    /// True if the entries will arrive sorted (path, then timestamp).
    pub will_sort: bool,
    /// Area-of-interest handle bound by the sender.
    pub sender_handle: u64,
    /// Area-of-interest handle bound by the receiver.
    pub receiver_handle: u64,
}

/// One entry under the latest announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationSendEntry<S: SyncSchemes> {
    /// The entry itself.
    pub entry: Entry<S>,
    /// Handle of the static half of the entry's authorisation token.
    pub static_token_handle: u64,
    /// Dynamic half of the entry's authorisation token.
    pub dynamic_token: DynamicToken<S>,
}

/// Eagerly push an entry outside of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSendEntry<S: SyncSchemes> {
    /// The entry itself.
    pub entry: Entry<S>,
    /// Handle of the static half of the entry's authorisation token.
    pub static_token_handle: u64,
    /// Dynamic half of the entry's authorisation token.
    pub dynamic_token: DynamicToken<S>,
    /// Payload offset transmission will start from.
    pub offset: u64,
}

/// A chunk of the payload of the most recently sent entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSendPayload {
    /// Chunk length in bytes.
    pub amount: u64,
    /// The chunk itself; exactly `amount` bytes.
    pub bytes: Bytes,
}

/// Declare eagerness: whether payloads should be pushed unprompted for an
/// area-of-interest pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSetMetadata {
    /// Push payloads without waiting for requests.
    pub is_eager: bool,
    /// Area-of-interest handle bound by the sender.
    pub sender_handle: u64,
    /// Area-of-interest handle bound by the receiver.
    pub receiver_handle: u64,
}

/// Bind a payload request to a fresh payload-request handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBindPayloadRequest<S: SyncSchemes> {
    /// Entry whose payload is requested.
    pub entry: Entry<S>,
    /// Capability handle authorising the request.
    pub capability_handle: u64,
    /// Offset to start transmission from.
    pub offset: u64,
}

/// Start answering a payload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataReplyPayload {
    /// The payload-request handle being answered (bound by the receiver
    /// of this message).
    pub handle: u64,
}

/// Any WGPS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<S: SyncSchemes> {
    /// Commitment nonce reveal.
    CommitmentReveal(CommitmentReveal),
    /// Grant credit.
    ControlIssueGuarantee(ControlIssueGuarantee),
    /// Forfeit credit.
    ControlAbsolve(ControlAbsolve),
    /// Request a credit reduction.
    ControlPlead(ControlPlead),
    /// Bound future binds by the sender.
    ControlLimitSending(ControlLimitSending),
    /// Bound future accepts by the sender.
    ControlLimitReceiving(ControlLimitReceiving),
    /// Channel overflow began.
    ControlAnnounceDropping(ControlAnnounceDropping),
    /// Channel overflow ended.
    ControlApologise(ControlApologise),
    /// Release a handle.
    ControlFree(ControlFree),
    /// Bind a blinded fragment.
    PaiBindFragment(PaiBindFragment<S>),
    /// Blind the peer's fragment in return.
    PaiReplyFragment(PaiReplyFragment<S>),
    /// Request a subspace capability.
    PaiRequestSubspaceCapability(PaiRequestSubspaceCapability),
    /// Provide a subspace capability.
    PaiReplySubspaceCapability(PaiReplySubspaceCapability<S>),
    /// Bind a read capability.
    SetupBindReadCapability(SetupBindReadCapability<S>),
    /// Bind an area of interest.
    SetupBindAreaOfInterest(SetupBindAreaOfInterest<S>),
    /// Bind a static token.
    SetupBindStaticToken(SetupBindStaticToken<S>),
    /// Fingerprint a range.
    ReconciliationSendFingerprint(ReconciliationSendFingerprint<S>),
    /// Announce a range's entries.
    ReconciliationAnnounceEntries(ReconciliationAnnounceEntries<S>),
    /// One announced entry.
    ReconciliationSendEntry(ReconciliationSendEntry<S>),
    /// Eagerly push an entry.
    DataSendEntry(DataSendEntry<S>),
    /// Push a payload chunk.
    DataSendPayload(DataSendPayload),
    /// Set payload eagerness.
    DataSetMetadata(DataSetMetadata),
    /// Request a payload.
    DataBindPayloadRequest(DataBindPayloadRequest<S>),
    /// Answer a payload request.
    DataReplyPayload(DataReplyPayload),
}

impl<S: SyncSchemes> Message<S> {
    /// The logical channel this message consumes credit on, or `None` for
    /// the channel-less control plane.
    #[must_use]
    pub fn channel(&self) -> Option<LogicalChannel> {
        match self {
            Self::CommitmentReveal(_)
            | Self::ControlIssueGuarantee(_)
            | Self::ControlAbsolve(_)
            | Self::ControlPlead(_)
            | Self::ControlLimitSending(_)
            | Self::ControlLimitReceiving(_)
            | Self::ControlAnnounceDropping(_)
            | Self::ControlApologise(_)
            | Self::ControlFree(_) => None,
            Self::PaiBindFragment(_)
            | Self::PaiReplyFragment(_)
            | Self::PaiRequestSubspaceCapability(_)
            | Self::PaiReplySubspaceCapability(_) => Some(LogicalChannel::Intersection),
            Self::SetupBindReadCapability(_) => Some(LogicalChannel::Capability),
            Self::SetupBindAreaOfInterest(_) => Some(LogicalChannel::AreaOfInterest),
            Self::SetupBindStaticToken(_) => Some(LogicalChannel::StaticToken),
            Self::ReconciliationSendFingerprint(_)
            | Self::ReconciliationAnnounceEntries(_)
            | Self::ReconciliationSendEntry(_) => Some(LogicalChannel::Reconciliation),
            Self::DataSendEntry(_)
            | Self::DataSendPayload(_)
            | Self::DataSetMetadata(_)
            | Self::DataReplyPayload(_) => Some(LogicalChannel::Data),
            Self::DataBindPayloadRequest(_) => Some(LogicalChannel::PayloadRequest),
        }
    }

    /// Short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CommitmentReveal(_) => "CommitmentReveal",
            Self::ControlIssueGuarantee(_) => "ControlIssueGuarantee",
            Self::ControlAbsolve(_) => "ControlAbsolve",
            Self::ControlPlead(_) => "ControlPlead",
            Self::ControlLimitSending(_) => "ControlLimitSending",
            Self::ControlLimitReceiving(_) => "ControlLimitReceiving",
            Self::ControlAnnounceDropping(_) => "ControlAnnounceDropping",
            Self::ControlApologise(_) => "ControlApologise",
            Self::ControlFree(_) => "ControlFree",
            Self::PaiBindFragment(_) => "PaiBindFragment",
            Self::PaiReplyFragment(_) => "PaiReplyFragment",
            Self::PaiRequestSubspaceCapability(_) => "PaiRequestSubspaceCapability",
            Self::PaiReplySubspaceCapability(_) => "PaiReplySubspaceCapability",
            Self::SetupBindReadCapability(_) => "SetupBindReadCapability",
            Self::SetupBindAreaOfInterest(_) => "SetupBindAreaOfInterest",
            Self::SetupBindStaticToken(_) => "SetupBindStaticToken",
            Self::ReconciliationSendFingerprint(_) => "ReconciliationSendFingerprint",
            Self::ReconciliationAnnounceEntries(_) => "ReconciliationAnnounceEntries",
            Self::ReconciliationSendEntry(_) => "ReconciliationSendEntry",
            Self::DataSendEntry(_) => "DataSendEntry",
            Self::DataSendPayload(_) => "DataSendPayload",
            Self::DataSetMetadata(_) => "DataSetMetadata",
            Self::DataBindPayloadRequest(_) => "DataBindPayloadRequest",
            Self::DataReplyPayload(_) => "DataReplyPayload",
        }
    }
}
