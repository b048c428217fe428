//! Logical channels and handle spaces.
//!
//! A session multiplexes seven credit-controlled logical channels over one
//! byte stream, plus a channel-less control plane. Resource handles live in
//! five independent spaces per peer; `ControlFree` names the space it
//! releases from.

use crate::error::DecodeError;

/// One of the seven flow-controlled lanes within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalChannel {
    /// Range fingerprints, entry announcements, reconciliation entries.
    Reconciliation,
    /// Eagerly pushed entries and payloads.
    Data,
    /// PAI fragment binds and replies.
    Intersection,
    /// Read capability binds.
    Capability,
    /// Area-of-interest binds.
    AreaOfInterest,
    /// Payload requests.
    PayloadRequest,
    /// Static token binds.
    StaticToken,
}

impl LogicalChannel {
    /// All channels, in wire-value order.
    pub const ALL: [Self; 7] = [
        Self::Reconciliation,
        Self::Data,
        Self::Intersection,
        Self::Capability,
        Self::AreaOfInterest,
        Self::PayloadRequest,
        Self::StaticToken,
    ];

    /// Three-bit wire value.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Reconciliation => 0,
            Self::Data => 1,
            Self::Intersection => 2,
            Self::Capability => 3,
            Self::AreaOfInterest => 4,
            Self::PayloadRequest => 5,
            Self::StaticToken => 6,
        }
    }

    /// Decode a three-bit wire value. Fails closed on the unused pattern.
    pub const fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(Self::Reconciliation),
            1 => Ok(Self::Data),
            2 => Ok(Self::Intersection),
            3 => Ok(Self::Capability),
            4 => Ok(Self::AreaOfInterest),
            5 => Ok(Self::PayloadRequest),
            6 => Ok(Self::StaticToken),
            other => Err(DecodeError::InvalidChannel(other)),
        }
    }
}

/// One of the five handle spaces a peer allocates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleType {
    /// Blinded PAI fragments.
    Intersection,
    /// Read capabilities.
    Capability,
    /// Areas of interest.
    AreaOfInterest,
    /// Payload requests.
    PayloadRequest,
    /// Static authorisation tokens.
    StaticToken,
}

impl HandleType {
    /// Three-bit wire value.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Intersection => 0,
            Self::Capability => 1,
            Self::AreaOfInterest => 2,
            Self::PayloadRequest => 3,
            Self::StaticToken => 4,
        }
    }

    /// Decode a three-bit wire value. Fails closed on unused patterns.
    pub const fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(Self::Intersection),
            1 => Ok(Self::Capability),
            2 => Ok(Self::AreaOfInterest),
            3 => Ok(Self::PayloadRequest),
            4 => Ok(Self::StaticToken),
            other => Err(DecodeError::InvalidHandleType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_bytes_round_trip() {
        for channel in LogicalChannel::ALL {
            assert_eq!(LogicalChannel::from_byte(channel.to_byte()), Ok(channel));
        }
    }

    #[test]
    fn unused_channel_pattern_fails_closed() {
        assert_eq!(LogicalChannel::from_byte(7), Err(DecodeError::InvalidChannel(7)));
    }

    #[test]
    fn unused_handle_type_fails_closed() {
        assert_eq!(HandleType::from_byte(5), Err(DecodeError::InvalidHandleType(5)));
        assert_eq!(HandleType::from_byte(7), Err(DecodeError::InvalidHandleType(7)));
    }
}
