//! Error types for the wire layer.
//!
//! Decoding is the only fallible direction that peers can influence: every
//! variant here describes malformed or impossible bytes received from the
//! network. Encoding failures ([`EncodeError`]) can only be produced by a
//! local caller referencing state it never bound, which is a bug in the
//! session layer rather than a peer-triggered condition.

use thiserror::Error;

use crate::growing_bytes::StreamEnded;

/// Errors produced while decoding messages from the peer's byte stream.
///
/// All variants are fatal for the session: the WGPS wire format has no
/// resynchronisation points, so after any decode failure the remaining
/// stream is unintelligible.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte stream ended in the middle of a message.
    #[error("byte stream ended in the middle of a message")]
    UnexpectedEnd,

    /// First byte does not match any known message tag.
    #[error("unknown message tag {0:#04x}")]
    InvalidTag(u8),

    /// Channel bits do not name one of the seven logical channels.
    ///
    /// Dispatch fails closed here: there is no fallback channel.
    #[error("invalid logical channel {0:#04x}")]
    InvalidChannel(u8),

    /// Handle-type bits in a `ControlFree` do not name a handle space.
    #[error("invalid handle type {0:#04x}")]
    InvalidHandleType(u8),

    /// A flag combination the encoder can never produce.
    #[error("impossible flag combination in tag {0:#04x}")]
    InvalidFlags(u8),

    /// Path component count exceeds the scheme limit.
    #[error("path has {count} components, limit is {max}")]
    PathTooLong {
        /// Component count claimed by the encoding
        count: u64,
        /// Maximum component count permitted by the path scheme
        max: usize,
    },

    /// Single path component exceeds the scheme limit.
    #[error("path component is {length} bytes, limit is {max}")]
    ComponentTooLong {
        /// Component length claimed by the encoding
        length: u64,
        /// Maximum component length permitted by the path scheme
        max: usize,
    },

    /// Relative path encoding claims a longer common prefix than the
    /// reference path has components.
    #[error("relative path claims prefix of {prefix} components, reference has {reference}")]
    InvalidPathPrefix {
        /// Prefix length claimed by the encoding
        prefix: u64,
        /// Component count of the reference path
        reference: usize,
    },

    /// A message referenced a handle the peer never bound.
    ///
    /// This is a protocol-validation failure surfaced at decode time: the
    /// referenced handle selects the privy that relative sub-decoders need,
    /// so an unknown handle makes the rest of the message undecodable.
    #[error("message references unknown {what} handle {handle}")]
    UnknownHandle {
        /// The handle value from the wire
        handle: u64,
        /// Which handle space was consulted
        what: &'static str,
    },

    /// A parameter scheme rejected its portion of the encoding.
    #[error("invalid {0} encoding")]
    InvalidParameter(&'static str),
}

impl From<StreamEnded> for DecodeError {
    fn from(StreamEnded: StreamEnded) -> Self {
        Self::UnexpectedEnd
    }
}

/// Errors produced while encoding a message.
///
/// Encoders are infallible on well-formed input; every variant here means
/// the local caller handed them state it never validated, which is a bug
/// in the caller rather than a peer-triggered condition. Nothing is
/// written to the wire when encoding fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The message references a handle with no bound privy.
    #[error("cannot encode against unknown {what} handle {handle}")]
    UnknownHandle {
        /// The unbound handle
        handle: u64,
        /// Which handle space was consulted
        what: &'static str,
    },

    /// An area was encoded against an outer area that does not contain
    /// it. Relative area encodings only transmit the difference to the
    /// outer area, so a wider area has no representation.
    #[error("area is not contained in the outer area it is encoded against")]
    AreaNotInOuter,
}
