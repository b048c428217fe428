//! Error types for the engine.
//!
//! Every fatal failure kind (decode errors, protocol-validation errors,
//! credit violations, invariant errors) funnels into a single
//! session-shutdown path; a closed transport is the
//! one benign terminal state and is not an error at all.

use thiserror::Error;

use wgps_proto::{DecodeError, EncodeError, LogicalChannel};

/// Protocol-validation failures in the PAI state machine.
///
/// All variants are fatal: they indicate either a misbehaving peer
/// ([`PaiError::UnknownHandle`], [`PaiError::NotRequested`],
/// [`PaiError::WrongNamespace`]) or a bug in this implementation
/// ([`PaiError::MissingFragmentInfo`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaiError {
    /// The peer referenced an intersection handle that was never bound.
    #[error("peer referenced unknown {space} intersection handle {handle}")]
    UnknownHandle {
        /// The unbound handle value
        handle: u64,
        /// Which store was consulted ("ours" or "theirs")
        space: &'static str,
    },

    /// A subspace capability arrived for a handle we never requested one
    /// for.
    #[error("unsolicited subspace capability for handle {handle}")]
    NotRequested {
        /// The handle the reply referenced
        handle: u64,
    },

    /// A subspace capability proved the wrong namespace.
    #[error("subspace capability for handle {handle} covers a different namespace")]
    WrongNamespace {
        /// The handle the reply referenced
        handle: u64,
    },

    /// A bound handle has no fragment info. This cannot happen if binding
    /// and info recording stay atomic; it is reported as a bug, not a
    /// peer failure.
    #[error("invariant violated: no fragment info for local handle {handle}")]
    MissingFragmentInfo {
        /// The orphaned handle
        handle: u64,
    },
}

/// Credit accounting violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreditError {
    /// The peer sent more bytes on a channel than it was guaranteed.
    #[error("peer overran its credit on {channel:?} by {overrun} bytes")]
    Overrun {
        /// The violated channel
        channel: LogicalChannel,
        /// How many bytes beyond the guarantee arrived
        overrun: u64,
    },

    /// Granted credit would overflow the accumulator.
    #[error("credit overflow on {channel:?}")]
    Overflow {
        /// The overflowing channel
        channel: LogicalChannel,
    },
}

/// Terminal result of a session.
///
/// Every non-benign failure anywhere in the engine propagates here; the
/// session closes the transport and drains its queues, then reports one of
/// these. A peer closing the transport cleanly is a successful outcome and
/// never produces a `SessionError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The peer's byte stream was malformed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The PAI state machine rejected a peer message.
    #[error("private area intersection error: {0}")]
    Pai(#[from] PaiError),

    /// Credit accounting was violated.
    #[error("credit violation: {0}")]
    Credit(#[from] CreditError),

    /// The peer revealed its commitment nonce twice.
    #[error("peer sent a second commitment reveal")]
    DuplicateCommitmentReveal,

    /// The peer's commitment nonce had the wrong length.
    #[error("commitment nonce was {actual} bytes, expected {expected}")]
    CommitmentLength {
        /// Bytes received
        actual: usize,
        /// `CHALLENGE_LENGTH` of the scheme bundle
        expected: usize,
    },

    /// The peer bound a capability that failed validation.
    #[error("peer bound an invalid capability")]
    InvalidCapability,

    /// The peer bound an area of interest outside its granted area.
    #[error("area of interest escapes the granted area of capability handle {handle}")]
    AreaNotGranted {
        /// The authorising capability handle
        handle: u64,
    },

    /// The peer referenced a handle that was never bound.
    #[error("peer referenced unknown {what} handle {handle}")]
    UnknownHandle {
        /// The unbound handle value
        handle: u64,
        /// Which handle space was consulted
        what: &'static str,
    },

    /// A local caller referenced state it never bound while encoding.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// An internal invariant failed. Always a bug in this implementation.
    #[error("invariant violated: {0}")]
    Invariant(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_with_context() {
        let error = SessionError::from(PaiError::UnknownHandle { handle: 9, space: "ours" });
        assert!(error.to_string().contains("handle 9"));

        let error = SessionError::from(CreditError::Overrun {
            channel: LogicalChannel::Intersection,
            overrun: 12,
        });
        assert!(error.to_string().contains("12 bytes"));
    }
}
