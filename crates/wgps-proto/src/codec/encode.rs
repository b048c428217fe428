//! Message encoders.
//!
//! Every encoder mirrors the corresponding decoder in `decode.rs` exactly;
//! the two files are maintained as a pair. Encoders prefer back-references
//! whenever the rolling privy already holds an equal value, and when a
//! range or entry can be encoded either absolutely or relatively they pick
//! whichever form is shorter (relative on ties).

use bytes::Bytes;

use crate::{
    channels::LogicalChannel,
    compact_width::{CompactWidth, put_compact, put_tagged},
    error::EncodeError,
    grouping::Range3d,
    messages::Message,
    reconcile::ReconciliationPrivy,
    schemes::{
        AccessControlScheme, AuthorisationTokenScheme, FingerprintScheme, PaiScheme,
        SubspaceCapScheme, SyncSchemes,
    },
};

use super::{
    CodecContext, flags,
    relative::{encode_area_in, encode_entry, encode_entry_relative, encode_range3d},
    tags,
};

/// An encoded message: the wire bytes and the channel they spend credit
/// on (`None` for the control plane).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    /// The complete wire encoding.
    pub bytes: Bytes,
    /// Logical channel, or `None` for control-plane messages.
    pub channel: Option<LogicalChannel>,
}

impl EncodedMessage {
    /// Encoded length in bytes; what credit accounting charges.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// True for a zero-length blob (never produced by the encoder).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode `message` against the sending direction's rolling privy.
///
/// Mutates `privy` for reconciliation-family messages so subsequent
/// encodes may back-reference this one.
///
/// # Errors
///
/// [`EncodeError::UnknownHandle`] when the message references an
/// intersection or capability handle the context cannot resolve, and
/// [`EncodeError::AreaNotInOuter`] when an interest escapes the granted
/// area it is encoded against. Both are session bugs, not peer-triggered
/// conditions, and nothing reaches the wire when they occur.
pub fn encode_message<S: SyncSchemes, C: CodecContext<S>>(
    message: &Message<S>,
    privy: &mut ReconciliationPrivy<S>,
    ctx: &C,
) -> Result<EncodedMessage, EncodeError> {
    let mut out = Vec::new();

    match message {
        Message::CommitmentReveal(m) => {
            debug_assert_eq!(m.nonce.len(), S::CHALLENGE_LENGTH);
            out.push(tags::COMMITMENT_REVEAL);
            out.extend_from_slice(&m.nonce);
        }

        Message::ControlIssueGuarantee(m) => {
            put_credit(&mut out, tags::CONTROL_ISSUE_GUARANTEE, m.amount, m.channel);
        }
        Message::ControlAbsolve(m) => {
            put_credit(&mut out, tags::CONTROL_ABSOLVE, m.amount, m.channel);
        }
        Message::ControlPlead(m) => {
            put_credit(&mut out, tags::CONTROL_PLEAD, m.target, m.channel);
        }
        Message::ControlLimitSending(m) => {
            put_credit(&mut out, tags::CONTROL_LIMIT_SENDING, m.bound, m.channel);
        }
        Message::ControlLimitReceiving(m) => {
            put_credit(&mut out, tags::CONTROL_LIMIT_RECEIVING, m.bound, m.channel);
        }

        Message::ControlAnnounceDropping(m) => {
            out.push(tags::CONTROL_ANNOUNCE_DROPPING | m.channel.to_byte());
        }
        Message::ControlApologise(m) => {
            out.push(tags::CONTROL_APOLOGISE | m.channel.to_byte());
        }

        Message::ControlFree(m) => {
            let width = CompactWidth::fitting(m.handle);
            out.push(tags::CONTROL_FREE | width.tag_bits());
            let mine = if m.mine { flags::FREE_MINE } else { 0 };
            out.push(mine | m.handle_type.to_byte());
            put_compact(&mut out, width, m.handle);
        }

        Message::PaiBindFragment(m) => {
            let secondary = if m.is_secondary { flags::PAI_BIND_SECONDARY } else { 0 };
            out.push(tags::PAI_BIND_FRAGMENT | secondary);
            S::Pai::encode_group_member(&m.group, &mut out);
        }

        Message::PaiReplyFragment(m) => {
            let width = CompactWidth::fitting(m.handle);
            out.push(tags::PAI_REPLY_FRAGMENT | width.tag_bits());
            put_compact(&mut out, width, m.handle);
            S::Pai::encode_group_member(&m.group, &mut out);
        }

        Message::PaiRequestSubspaceCapability(m) => {
            let width = CompactWidth::fitting(m.handle);
            out.push(tags::PAI_REQUEST_SUBSPACE_CAP | width.tag_bits());
            put_compact(&mut out, width, m.handle);
        }

        Message::PaiReplySubspaceCapability(m) => {
            let width = CompactWidth::fitting(m.handle);
            out.push(tags::PAI_REPLY_SUBSPACE_CAP | width.tag_bits());
            put_compact(&mut out, width, m.handle);
            S::SubspaceCap::encode_capability(&m.capability, &mut out);
            S::SubspaceCap::encode_signature(&m.signature, &mut out);
        }

        Message::SetupBindReadCapability(m) => {
            let cap_privy = ctx
                .intersection_privy(m.handle)
                .ok_or(EncodeError::UnknownHandle { handle: m.handle, what: "intersection" })?;
            let width = CompactWidth::fitting(m.handle);
            out.push(tags::SETUP_BIND_READ_CAP | width.tag_bits());
            put_compact(&mut out, width, m.handle);
            S::AccessControl::encode_capability(&m.capability, &cap_privy, &mut out);
            S::AccessControl::encode_signature(&m.signature, &mut out);
        }

        Message::SetupBindAreaOfInterest(m) => {
            let cap_privy = ctx.capability_privy(m.authorisation).ok_or(
                EncodeError::UnknownHandle { handle: m.authorisation, what: "capability" },
            )?;
            let has_limit = m.area_of_interest.has_limit();
            let limit_flag = if has_limit { flags::AOI_HAS_LIMIT } else { 0 };
            let width = CompactWidth::fitting(m.authorisation);
            out.push(tags::SETUP_BIND_AOI | limit_flag | width.tag_bits());
            put_compact(&mut out, width, m.authorisation);
            encode_area_in::<S>(&m.area_of_interest.area, &cap_privy.outer, &mut out)?;
            if has_limit {
                put_tagged(&mut out, m.area_of_interest.max_count);
                put_tagged(&mut out, m.area_of_interest.max_size);
            }
        }

        Message::SetupBindStaticToken(m) => {
            out.push(tags::SETUP_BIND_STATIC_TOKEN);
            S::AuthorisationToken::encode_static(&m.static_token, &mut out);
        }

        Message::ReconciliationSendFingerprint(m) => {
            let sender_prev = m.sender_handle == privy.prev_sender_handle;
            let receiver_prev = m.receiver_handle == privy.prev_receiver_handle;
            let fp_neutral =
                m.fingerprint == <S::Fingerprint as FingerprintScheme<S>>::neutral();
            let (range_prev, range_bytes) = choose_range_encoding::<S>(&m.range, privy);

            let mut tag = tags::RECON_SEND_FINGERPRINT;
            if sender_prev {
                tag |= flags::RECON_SENDER_PREV;
            }
            if receiver_prev {
                tag |= flags::RECON_RECEIVER_PREV;
            }
            if fp_neutral {
                tag |= flags::RECON_FP_NEUTRAL;
            }
            if range_prev {
                tag |= flags::RECON_RANGE_PREV;
            }
            out.push(tag);

            let sender_width = handle_width(sender_prev, m.sender_handle);
            let receiver_width = handle_width(receiver_prev, m.receiver_handle);
            out.push((sender_width.tag_bits() << 6) | (receiver_width.tag_bits() << 4));

            if !sender_prev {
                put_compact(&mut out, sender_width, m.sender_handle);
            }
            if !receiver_prev {
                put_compact(&mut out, receiver_width, m.receiver_handle);
            }
            if !fp_neutral {
                <S::Fingerprint as FingerprintScheme<S>>::encode(&m.fingerprint, &mut out);
            }
            out.extend_from_slice(&range_bytes);

            privy.note_fingerprint(m);
        }

        Message::ReconciliationAnnounceEntries(m) => {
            // Announcing while entries are outstanding would flip the
            // peer's dispatch of this tag family.
            debug_assert!(!privy.expects_send_entry());

            let sender_prev = m.sender_handle == privy.prev_sender_handle;
            let receiver_prev = m.receiver_handle == privy.prev_receiver_handle;
            let (range_prev, range_bytes) = choose_range_encoding::<S>(&m.range, privy);

            let mut tag = tags::RECON_ANNOUNCE_OR_ENTRY;
            if sender_prev {
                tag |= flags::RECON_SENDER_PREV;
            }
            if receiver_prev {
                tag |= flags::RECON_RECEIVER_PREV;
            }
            if range_prev {
                tag |= flags::RECON_RANGE_PREV;
            }
            if m.wants_response {
                tag |= flags::RECON_WANTS_RESPONSE;
            }
            out.push(tag);

            let sender_width = handle_width(sender_prev, m.sender_handle);
            let receiver_width = handle_width(receiver_prev, m.receiver_handle);
            let count_width = CompactWidth::fitting(m.count);
            let will_sort = if m.will_sort { flags::RECON_WILL_SORT } else { 0 };
            out.push(
                (sender_width.tag_bits() << 6)
                    | (receiver_width.tag_bits() << 4)
                    | (count_width.tag_bits() << 2)
                    | will_sort,
            );

            if !sender_prev {
                put_compact(&mut out, sender_width, m.sender_handle);
            }
            if !receiver_prev {
                put_compact(&mut out, receiver_width, m.receiver_handle);
            }
            put_compact(&mut out, count_width, m.count);
            out.extend_from_slice(&range_bytes);

            let namespace = ctx.aoi_namespace(m.sender_handle, m.receiver_handle);
            privy.note_announcement(m, namespace);
        }

        Message::ReconciliationSendEntry(m) => {
            debug_assert!(privy.expects_send_entry());

            let token_prev = m.static_token_handle == privy.prev_static_token_handle;

            let mut relative = Vec::new();
            encode_entry_relative::<S>(&m.entry, &privy.prev_entry, &mut relative);
            let mut absolute = Vec::new();
            encode_entry::<S>(&m.entry, &mut absolute);
            let entry_prev = relative.len() <= absolute.len();
            let entry_bytes = if entry_prev { relative } else { absolute };

            let mut tag = tags::RECON_ANNOUNCE_OR_ENTRY;
            if token_prev {
                tag |= flags::RECON_TOKEN_PREV;
            }
            if entry_prev {
                tag |= flags::RECON_ENTRY_PREV;
            }
            let token_width = handle_width(token_prev, m.static_token_handle);
            if !token_prev {
                tag |= token_width.tag_bits();
            }
            out.push(tag);

            if !token_prev {
                put_compact(&mut out, token_width, m.static_token_handle);
            }
            S::AuthorisationToken::encode_dynamic(&m.dynamic_token, &mut out);
            out.extend_from_slice(&entry_bytes);

            privy.note_entry(m);
        }

        Message::DataSendEntry(m) => {
            let width = CompactWidth::fitting(m.static_token_handle);
            out.push(tags::DATA_SEND_ENTRY | width.tag_bits());
            put_compact(&mut out, width, m.static_token_handle);
            S::AuthorisationToken::encode_dynamic(&m.dynamic_token, &mut out);
            encode_entry::<S>(&m.entry, &mut out);
            put_tagged(&mut out, m.offset);
        }

        Message::DataSendPayload(m) => {
            debug_assert_eq!(m.amount as usize, m.bytes.len());
            let width = CompactWidth::fitting(m.amount);
            out.push(tags::DATA_SEND_PAYLOAD | width.tag_bits());
            put_compact(&mut out, width, m.amount);
            out.extend_from_slice(&m.bytes);
        }

        Message::DataSetMetadata(m) => {
            let eager = if m.is_eager { flags::DATA_IS_EAGER } else { 0 };
            out.push(tags::DATA_SET_METADATA | eager);
            let sender_width = CompactWidth::fitting(m.sender_handle);
            let receiver_width = CompactWidth::fitting(m.receiver_handle);
            out.push((sender_width.tag_bits() << 6) | (receiver_width.tag_bits() << 4));
            put_compact(&mut out, sender_width, m.sender_handle);
            put_compact(&mut out, receiver_width, m.receiver_handle);
        }

        Message::DataBindPayloadRequest(m) => {
            out.push(tags::DATA_BIND_PAYLOAD_REQUEST);
            let width = CompactWidth::fitting(m.capability_handle);
            out.push(width.tag_bits() << 6);
            encode_entry::<S>(&m.entry, &mut out);
            put_compact(&mut out, width, m.capability_handle);
            put_tagged(&mut out, m.offset);
        }

        Message::DataReplyPayload(m) => {
            let width = CompactWidth::fitting(m.handle);
            out.push(tags::DATA_REPLY_PAYLOAD | width.tag_bits());
            put_compact(&mut out, width, m.handle);
        }
    }

    Ok(EncodedMessage { bytes: Bytes::from(out), channel: message.channel() })
}

/// Credit-family layout: exact tag byte, then a byte packing the value
/// width (high two bits) with the channel (low three bits), then the
/// compact value.
fn put_credit(out: &mut Vec<u8>, tag: u8, value: u64, channel: LogicalChannel) {
    let width = CompactWidth::fitting(value);
    out.push(tag);
    out.push((width.tag_bits() << 6) | channel.to_byte());
    put_compact(out, width, value);
}

/// Width bits for a handle field: zero when the back-reference flag makes
/// the field vanish from the wire.
fn handle_width(is_prev: bool, handle: u64) -> CompactWidth {
    if is_prev { CompactWidth::One } else { CompactWidth::fitting(handle) }
}

/// Encode `range` both relative to the privy's previous range and
/// absolutely, returning the shorter form (relative on ties) together with
/// the flag value the decoder needs.
fn choose_range_encoding<S: SyncSchemes>(
    range: &Range3d<S>,
    privy: &ReconciliationPrivy<S>,
) -> (bool, Vec<u8>) {
    let mut relative = Vec::new();
    encode_range3d::<S>(range, &privy.prev_range, &mut relative);
    let mut absolute = Vec::new();
    encode_range3d::<S>(range, &Range3d::full(), &mut absolute);

    if relative.len() <= absolute.len() { (true, relative) } else { (false, absolute) }
}
