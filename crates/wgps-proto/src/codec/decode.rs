//! The resumable message decoder.
//!
//! Mirrors `encode.rs` byte for byte. The decoder suspends on the
//! [`GrowingBytes`] until enough input is buffered, dispatches on the
//! first byte, resolves every back-reference flag against the rolling
//! privy, and consumes exactly the encoded length. Trailing bytes belong
//! to the next message.
//!
//! The one context-dependent dispatch: a first byte in `0x50..=0x5f` is a
//! `ReconciliationSendEntry` while the privy still expects announced
//! entries, and a `ReconciliationAnnounceEntries` otherwise.

use crate::{
    channels::{HandleType, LogicalChannel},
    compact_width::CompactWidth,
    error::DecodeError,
    grouping::{AreaOfInterest, Range3d},
    growing_bytes::{GrowingBytes, StreamEnded},
    messages::{
        CommitmentReveal, ControlAbsolve, ControlAnnounceDropping, ControlApologise,
        ControlFree, ControlIssueGuarantee, ControlLimitReceiving, ControlLimitSending,
        ControlPlead, DataBindPayloadRequest, DataReplyPayload, DataSendEntry, DataSendPayload,
        DataSetMetadata, Message, PaiBindFragment, PaiReplyFragment,
        PaiRequestSubspaceCapability, PaiReplySubspaceCapability,
        ReconciliationAnnounceEntries, ReconciliationSendEntry, ReconciliationSendFingerprint,
        SetupBindAreaOfInterest, SetupBindReadCapability, SetupBindStaticToken,
    },
    reconcile::ReconciliationPrivy,
    schemes::{
        AccessControlScheme, AuthorisationTokenScheme, FingerprintScheme, PaiScheme,
        SubspaceCapScheme, SyncSchemes,
    },
};

use super::{
    CodecContext, flags,
    relative::{decode_area_in, decode_entry, decode_entry_relative, decode_range3d},
    tags,
};

/// One decoded message plus its encoded length for credit accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage<S: SyncSchemes> {
    /// The message.
    pub message: Message<S>,
    /// Wire length in bytes.
    pub length: u64,
}

/// Decode the next message from the stream.
///
/// Returns `Ok(None)` when the stream ends cleanly on a message boundary.
/// A stream ending anywhere inside a message is
/// [`DecodeError::UnexpectedEnd`].
///
/// Mutates `privy` for reconciliation-family messages so subsequent
/// decodes resolve back-references the same way the encoder did.
pub async fn decode_message<S: SyncSchemes, C: CodecContext<S>>(
    bytes: &mut GrowingBytes,
    privy: &mut ReconciliationPrivy<S>,
    ctx: &C,
) -> Result<Option<DecodedMessage<S>>, DecodeError> {
    let first = match bytes.peek_byte().await {
        Ok(byte) => byte,
        Err(StreamEnded) => return Ok(None),
    };
    let before = bytes.consumed();
    bytes.prune(1);

    let message = match first {
        tags::COMMITMENT_REVEAL => {
            let nonce = bytes.take(S::CHALLENGE_LENGTH).await?;
            Message::CommitmentReveal(CommitmentReveal { nonce })
        }

        0x04..=0x07 => {
            if first & 0x01 != 0 {
                return Err(DecodeError::InvalidFlags(first));
            }
            let is_secondary = first & flags::PAI_BIND_SECONDARY != 0;
            let group = S::Pai::decode_group_member(bytes).await?;
            Message::PaiBindFragment(PaiBindFragment { group, is_secondary })
        }

        0x08..=0x0b => {
            let handle = bytes.take_compact(CompactWidth::from_tag_bits(first)).await?;
            let group = S::Pai::decode_group_member(bytes).await?;
            Message::PaiReplyFragment(PaiReplyFragment { handle, group })
        }

        0x0c..=0x0f => {
            let handle = bytes.take_compact(CompactWidth::from_tag_bits(first)).await?;
            Message::PaiRequestSubspaceCapability(PaiRequestSubspaceCapability { handle })
        }

        0x10..=0x13 => {
            let handle = bytes.take_compact(CompactWidth::from_tag_bits(first)).await?;
            let capability = S::SubspaceCap::decode_capability(bytes).await?;
            let signature = S::SubspaceCap::decode_signature(bytes).await?;
            Message::PaiReplySubspaceCapability(PaiReplySubspaceCapability {
                handle,
                capability,
                signature,
            })
        }

        0x20..=0x23 => {
            let handle = bytes.take_compact(CompactWidth::from_tag_bits(first)).await?;
            let cap_privy = ctx
                .intersection_privy(handle)
                .ok_or(DecodeError::UnknownHandle { handle, what: "intersection" })?;
            let capability = S::AccessControl::decode_capability(bytes, &cap_privy).await?;
            let signature = S::AccessControl::decode_signature(bytes).await?;
            Message::SetupBindReadCapability(SetupBindReadCapability {
                handle,
                capability,
                signature,
            })
        }

        0x28..=0x2f => {
            let has_limit = first & flags::AOI_HAS_LIMIT != 0;
            let authorisation = bytes.take_compact(CompactWidth::from_tag_bits(first)).await?;
            let cap_privy = ctx.capability_privy(authorisation).ok_or(
                DecodeError::UnknownHandle { handle: authorisation, what: "capability" },
            )?;
            let area = decode_area_in::<S>(bytes, &cap_privy.outer).await?;
            let (max_count, max_size) = if has_limit {
                (bytes.take_tagged().await?, bytes.take_tagged().await?)
            } else {
                (0, 0)
            };
            Message::SetupBindAreaOfInterest(SetupBindAreaOfInterest {
                authorisation,
                area_of_interest: AreaOfInterest { area, max_count, max_size },
            })
        }

        tags::SETUP_BIND_STATIC_TOKEN => {
            let static_token = S::AuthorisationToken::decode_static(bytes).await?;
            Message::SetupBindStaticToken(SetupBindStaticToken { static_token })
        }

        0x40..=0x4f => decode_send_fingerprint::<S>(bytes, privy, first).await?,

        0x50..=0x5f => {
            if privy.expects_send_entry() {
                decode_send_entry::<S>(bytes, privy, first).await?
            } else {
                decode_announce_entries::<S, C>(bytes, privy, ctx, first).await?
            }
        }

        0x60..=0x63 => {
            let static_token_handle =
                bytes.take_compact(CompactWidth::from_tag_bits(first)).await?;
            let dynamic_token = S::AuthorisationToken::decode_dynamic(bytes).await?;
            let entry = decode_entry::<S>(bytes).await?;
            let offset = bytes.take_tagged().await?;
            Message::DataSendEntry(DataSendEntry {
                entry,
                static_token_handle,
                dynamic_token,
                offset,
            })
        }

        0x64..=0x67 => {
            let amount = bytes.take_compact(CompactWidth::from_tag_bits(first)).await?;
            let payload = bytes.take(amount as usize).await?;
            Message::DataSendPayload(DataSendPayload { amount, bytes: payload })
        }

        0x68..=0x69 => {
            let is_eager = first & flags::DATA_IS_EAGER != 0;
            let widths = bytes.take_byte().await?;
            if widths & 0x0f != 0 {
                return Err(DecodeError::InvalidFlags(widths));
            }
            let sender_handle =
                bytes.take_compact(CompactWidth::from_tag_bits(widths >> 6)).await?;
            let receiver_handle =
                bytes.take_compact(CompactWidth::from_tag_bits(widths >> 4)).await?;
            Message::DataSetMetadata(DataSetMetadata { is_eager, sender_handle, receiver_handle })
        }

        tags::DATA_BIND_PAYLOAD_REQUEST => {
            let widths = bytes.take_byte().await?;
            if widths & 0x3f != 0 {
                return Err(DecodeError::InvalidFlags(widths));
            }
            let entry = decode_entry::<S>(bytes).await?;
            let capability_handle =
                bytes.take_compact(CompactWidth::from_tag_bits(widths >> 6)).await?;
            let offset = bytes.take_tagged().await?;
            Message::DataBindPayloadRequest(DataBindPayloadRequest {
                entry,
                capability_handle,
                offset,
            })
        }

        0x6c..=0x6f => {
            let handle = bytes.take_compact(CompactWidth::from_tag_bits(first)).await?;
            Message::DataReplyPayload(DataReplyPayload { handle })
        }

        tags::CONTROL_ISSUE_GUARANTEE
        | tags::CONTROL_ABSOLVE
        | tags::CONTROL_PLEAD
        | tags::CONTROL_LIMIT_SENDING
        | tags::CONTROL_LIMIT_RECEIVING => {
            let (value, channel) = decode_credit(bytes).await?;
            match first {
                tags::CONTROL_ISSUE_GUARANTEE => {
                    Message::ControlIssueGuarantee(ControlIssueGuarantee {
                        amount: value,
                        channel,
                    })
                }
                tags::CONTROL_ABSOLVE => {
                    Message::ControlAbsolve(ControlAbsolve { amount: value, channel })
                }
                tags::CONTROL_PLEAD => {
                    Message::ControlPlead(ControlPlead { target: value, channel })
                }
                tags::CONTROL_LIMIT_SENDING => {
                    Message::ControlLimitSending(ControlLimitSending { bound: value, channel })
                }
                _ => Message::ControlLimitReceiving(ControlLimitReceiving {
                    bound: value,
                    channel,
                }),
            }
        }

        0x8c..=0x8f => {
            let info = bytes.take_byte().await?;
            if info & 0b0111_1000 != 0 {
                return Err(DecodeError::InvalidFlags(info));
            }
            let mine = info & flags::FREE_MINE != 0;
            let handle_type = HandleType::from_byte(info & 0b111)?;
            let handle = bytes.take_compact(CompactWidth::from_tag_bits(first)).await?;
            Message::ControlFree(ControlFree { handle, mine, handle_type })
        }

        0x90..=0x97 => {
            let channel = LogicalChannel::from_byte(first & 0b111)?;
            Message::ControlAnnounceDropping(ControlAnnounceDropping { channel })
        }

        0x98..=0x9f => {
            let channel = LogicalChannel::from_byte(first & 0b111)?;
            Message::ControlApologise(ControlApologise { channel })
        }

        other => return Err(DecodeError::InvalidTag(other)),
    };

    Ok(Some(DecodedMessage { message, length: bytes.consumed() - before }))
}

/// Credit-family tail: width/channel byte plus the compact value.
async fn decode_credit(
    bytes: &mut GrowingBytes,
) -> Result<(u64, LogicalChannel), DecodeError> {
    let info = bytes.take_byte().await?;
    if info & 0b0011_1000 != 0 {
        return Err(DecodeError::InvalidFlags(info));
    }
    let channel = LogicalChannel::from_byte(info & 0b111)?;
    let value = bytes.take_compact(CompactWidth::from_tag_bits(info >> 6)).await?;
    Ok((value, channel))
}

async fn decode_send_fingerprint<S: SyncSchemes>(
    bytes: &mut GrowingBytes,
    privy: &mut ReconciliationPrivy<S>,
    first: u8,
) -> Result<Message<S>, DecodeError> {
    let sender_prev = first & flags::RECON_SENDER_PREV != 0;
    let receiver_prev = first & flags::RECON_RECEIVER_PREV != 0;
    let fp_neutral = first & flags::RECON_FP_NEUTRAL != 0;
    let range_prev = first & flags::RECON_RANGE_PREV != 0;

    let widths = bytes.take_byte().await?;
    if widths & 0x0f != 0 {
        return Err(DecodeError::InvalidFlags(widths));
    }
    if (sender_prev && widths >> 6 != 0) || (receiver_prev && (widths >> 4) & 0b11 != 0) {
        return Err(DecodeError::InvalidFlags(widths));
    }

    let sender_handle = if sender_prev {
        privy.prev_sender_handle
    } else {
        bytes.take_compact(CompactWidth::from_tag_bits(widths >> 6)).await?
    };
    let receiver_handle = if receiver_prev {
        privy.prev_receiver_handle
    } else {
        bytes.take_compact(CompactWidth::from_tag_bits(widths >> 4)).await?
    };

    let fingerprint = if fp_neutral {
        <S::Fingerprint as FingerprintScheme<S>>::neutral()
    } else {
        <S::Fingerprint as FingerprintScheme<S>>::decode(bytes).await?
    };

    let reference = if range_prev { privy.prev_range.clone() } else { Range3d::full() };
    let range = decode_range3d::<S>(bytes, &reference).await?;

    let message =
        ReconciliationSendFingerprint { range, fingerprint, sender_handle, receiver_handle };
    privy.note_fingerprint(&message);
    Ok(Message::ReconciliationSendFingerprint(message))
}

async fn decode_announce_entries<S: SyncSchemes, C: CodecContext<S>>(
    bytes: &mut GrowingBytes,
    privy: &mut ReconciliationPrivy<S>,
    ctx: &C,
    first: u8,
) -> Result<Message<S>, DecodeError> {
    let sender_prev = first & flags::RECON_SENDER_PREV != 0;
    let receiver_prev = first & flags::RECON_RECEIVER_PREV != 0;
    let range_prev = first & flags::RECON_RANGE_PREV != 0;
    let wants_response = first & flags::RECON_WANTS_RESPONSE != 0;

    let widths = bytes.take_byte().await?;
    if widths & 0x01 != 0 {
        return Err(DecodeError::InvalidFlags(widths));
    }
    if (sender_prev && widths >> 6 != 0) || (receiver_prev && (widths >> 4) & 0b11 != 0) {
        return Err(DecodeError::InvalidFlags(widths));
    }
    let will_sort = widths & flags::RECON_WILL_SORT != 0;

    let sender_handle = if sender_prev {
        privy.prev_sender_handle
    } else {
        bytes.take_compact(CompactWidth::from_tag_bits(widths >> 6)).await?
    };
    let receiver_handle = if receiver_prev {
        privy.prev_receiver_handle
    } else {
        bytes.take_compact(CompactWidth::from_tag_bits(widths >> 4)).await?
    };
    let count = bytes.take_compact(CompactWidth::from_tag_bits(widths >> 2)).await?;

    let reference = if range_prev { privy.prev_range.clone() } else { Range3d::full() };
    let range = decode_range3d::<S>(bytes, &reference).await?;

    let message = ReconciliationAnnounceEntries {
        range,
        count,
        wants_response,
        will_sort,
        sender_handle,
        receiver_handle,
    };
    let namespace = ctx.aoi_namespace(sender_handle, receiver_handle);
    privy.note_announcement(&message, namespace);
    Ok(Message::ReconciliationAnnounceEntries(message))
}

async fn decode_send_entry<S: SyncSchemes>(
    bytes: &mut GrowingBytes,
    privy: &mut ReconciliationPrivy<S>,
    first: u8,
) -> Result<Message<S>, DecodeError> {
    let token_prev = first & flags::RECON_TOKEN_PREV != 0;
    let entry_prev = first & flags::RECON_ENTRY_PREV != 0;

    if token_prev && first & 0b11 != 0 {
        return Err(DecodeError::InvalidFlags(first));
    }

    let static_token_handle = if token_prev {
        privy.prev_static_token_handle
    } else {
        bytes.take_compact(CompactWidth::from_tag_bits(first)).await?
    };

    let dynamic_token = S::AuthorisationToken::decode_dynamic(bytes).await?;

    let entry = if entry_prev {
        let prev = privy.prev_entry.clone();
        decode_entry_relative::<S>(bytes, &prev).await?
    } else {
        decode_entry::<S>(bytes).await?
    };

    let message = ReconciliationSendEntry { entry, static_token_handle, dynamic_token };
    privy.note_entry(&message);
    Ok(Message::ReconciliationSendEntry(message))
}
