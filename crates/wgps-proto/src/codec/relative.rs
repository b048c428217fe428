//! Relative encodings of entries, areas, and 3-D ranges.
//!
//! These are the context-dependent building blocks of the message codec:
//! every form takes a reference value the decoder is guaranteed to hold
//! (the rolling privy, an outer area, or an earlier field of the same
//! message) and encodes only the difference. Each encoder/decoder pair
//! must stay bit-exact; the flag constants below are the single source of
//! truth for their layouts.

use crate::{
    compact_width::put_tagged,
    entry::Entry,
    error::{DecodeError, EncodeError},
    grouping::{Area, AreaSubspace, Range, Range3d, RangeEnd},
    growing_bytes::GrowingBytes,
    path::{decode_path_relative, encode_path_relative},
    schemes::{ParameterScheme, PathScheme, SyncSchemes},
};

// Range3d flags. Reserved bits must be zero on the wire.
const RANGE_SS_START_PREV: u8 = 0x80;
const RANGE_SS_END_OPEN: u8 = 0x40;
const RANGE_SS_END_PREV: u8 = 0x20;
const RANGE_PATH_END_OPEN: u8 = 0x08;
const RANGE_TIME_END_OPEN: u8 = 0x02;
const RANGE_RESERVED: u8 = 0x10 | 0x04 | 0x01;

// Entry flags.
const ENTRY_NAMESPACE_PREV: u8 = 0x80;
const ENTRY_SUBSPACE_PREV: u8 = 0x40;
const ENTRY_TIME_DELTA: u8 = 0x20;
const ENTRY_RESERVED: u8 = 0x1f;

// Area flags.
const AREA_SUBSPACE_INHERIT: u8 = 0x80;
const AREA_TIME_END_OPEN: u8 = 0x40;
const AREA_RESERVED: u8 = 0x3f;

/// Append the encoding of `range` relative to `reference`.
///
/// Layout: one flags byte, then in order the subspace start (unless equal
/// to the reference's), the subspace end (unless open or equal to the
/// reference's closed end), the path start relative to the reference's
/// path start, the path end relative to this range's own path start
/// (unless open), and the tagged time bounds.
pub fn encode_range3d<S: SyncSchemes>(
    range: &Range3d<S>,
    reference: &Range3d<S>,
    out: &mut Vec<u8>,
) {
    let mut flags = 0u8;

    let ss_start_prev = range.subspaces.start == reference.subspaces.start;
    if ss_start_prev {
        flags |= RANGE_SS_START_PREV;
    }

    let ss_end_prev = match (&range.subspaces.end, &reference.subspaces.end) {
        (RangeEnd::Closed(a), RangeEnd::Closed(b)) => a == b,
        _ => false,
    };
    match &range.subspaces.end {
        RangeEnd::Open => flags |= RANGE_SS_END_OPEN,
        RangeEnd::Closed(_) if ss_end_prev => flags |= RANGE_SS_END_PREV,
        RangeEnd::Closed(_) => {}
    }

    if range.paths.end.is_open() {
        flags |= RANGE_PATH_END_OPEN;
    }
    if range.times.end.is_open() {
        flags |= RANGE_TIME_END_OPEN;
    }

    out.push(flags);

    if !ss_start_prev {
        S::Subspace::encode(&range.subspaces.start, out);
    }
    if let RangeEnd::Closed(end) = &range.subspaces.end
        && !ss_end_prev
    {
        S::Subspace::encode(end, out);
    }

    encode_path_relative(&range.paths.start, &reference.paths.start, out);
    if let RangeEnd::Closed(end) = &range.paths.end {
        encode_path_relative(end, &range.paths.start, out);
    }

    put_tagged(out, range.times.start);
    if let RangeEnd::Closed(end) = &range.times.end {
        put_tagged(out, *end);
    }
}

/// Decode a range encoded relative to `reference`.
pub async fn decode_range3d<S: SyncSchemes>(
    bytes: &mut GrowingBytes,
    reference: &Range3d<S>,
) -> Result<Range3d<S>, DecodeError> {
    let flags = bytes.take_byte().await?;

    if flags & RANGE_RESERVED != 0 {
        return Err(DecodeError::InvalidFlags(flags));
    }
    if flags & RANGE_SS_END_OPEN != 0 && flags & RANGE_SS_END_PREV != 0 {
        return Err(DecodeError::InvalidFlags(flags));
    }

    let ss_start = if flags & RANGE_SS_START_PREV != 0 {
        reference.subspaces.start.clone()
    } else {
        S::Subspace::decode(bytes).await?
    };

    let ss_end = if flags & RANGE_SS_END_OPEN != 0 {
        RangeEnd::Open
    } else if flags & RANGE_SS_END_PREV != 0 {
        match &reference.subspaces.end {
            RangeEnd::Closed(end) => RangeEnd::Closed(end.clone()),
            // The encoder only emits this flag against a closed reference.
            RangeEnd::Open => return Err(DecodeError::InvalidFlags(flags)),
        }
    } else {
        RangeEnd::Closed(S::Subspace::decode(bytes).await?)
    };

    let path_start = decode_path_relative(
        bytes,
        &reference.paths.start,
        S::Path::MAX_COMPONENT_COUNT,
        S::Path::MAX_COMPONENT_LENGTH,
    )
    .await?;

    let path_end = if flags & RANGE_PATH_END_OPEN != 0 {
        RangeEnd::Open
    } else {
        RangeEnd::Closed(
            decode_path_relative(
                bytes,
                &path_start,
                S::Path::MAX_COMPONENT_COUNT,
                S::Path::MAX_COMPONENT_LENGTH,
            )
            .await?,
        )
    };

    let time_start = bytes.take_tagged().await?;
    let time_end = if flags & RANGE_TIME_END_OPEN != 0 {
        RangeEnd::Open
    } else {
        RangeEnd::Closed(bytes.take_tagged().await?)
    };

    Ok(Range3d {
        subspaces: Range { start: ss_start, end: ss_end },
        paths: Range { start: path_start, end: path_end },
        times: Range { start: time_start, end: time_end },
    })
}

/// Append the absolute encoding of `entry`.
pub fn encode_entry<S: SyncSchemes>(entry: &Entry<S>, out: &mut Vec<u8>) {
    S::Namespace::encode(&entry.namespace, out);
    S::Subspace::encode(&entry.subspace, out);
    crate::path::encode_path(&entry.path, out);
    put_tagged(out, entry.timestamp);
    put_tagged(out, entry.payload_length);
    S::PayloadDigest::encode(&entry.payload_digest, out);
}

/// Decode an absolutely encoded entry.
pub async fn decode_entry<S: SyncSchemes>(
    bytes: &mut GrowingBytes,
) -> Result<Entry<S>, DecodeError> {
    let namespace = S::Namespace::decode(bytes).await?;
    let subspace = S::Subspace::decode(bytes).await?;
    let path = crate::path::decode_path(
        bytes,
        S::Path::MAX_COMPONENT_COUNT,
        S::Path::MAX_COMPONENT_LENGTH,
    )
    .await?;
    let timestamp = bytes.take_tagged().await?;
    let payload_length = bytes.take_tagged().await?;
    let payload_digest = S::PayloadDigest::decode(bytes).await?;

    Ok(Entry { namespace, subspace, path, timestamp, payload_length, payload_digest })
}

/// Append the encoding of `entry` relative to `prev`.
///
/// Layout: one flags byte, then the namespace and subspace (each omitted
/// when equal to `prev`'s), the path relative to `prev`'s path, the tagged
/// timestamp (as a forward delta from `prev` when possible), the tagged
/// payload length, and the digest.
pub fn encode_entry_relative<S: SyncSchemes>(
    entry: &Entry<S>,
    prev: &Entry<S>,
    out: &mut Vec<u8>,
) {
    let mut flags = 0u8;

    let namespace_prev = entry.namespace == prev.namespace;
    if namespace_prev {
        flags |= ENTRY_NAMESPACE_PREV;
    }
    let subspace_prev = entry.subspace == prev.subspace;
    if subspace_prev {
        flags |= ENTRY_SUBSPACE_PREV;
    }
    let time_delta = entry.timestamp >= prev.timestamp;
    if time_delta {
        flags |= ENTRY_TIME_DELTA;
    }

    out.push(flags);

    if !namespace_prev {
        S::Namespace::encode(&entry.namespace, out);
    }
    if !subspace_prev {
        S::Subspace::encode(&entry.subspace, out);
    }

    encode_path_relative(&entry.path, &prev.path, out);

    if time_delta {
        put_tagged(out, entry.timestamp - prev.timestamp);
    } else {
        put_tagged(out, entry.timestamp);
    }
    put_tagged(out, entry.payload_length);
    S::PayloadDigest::encode(&entry.payload_digest, out);
}

/// Decode an entry encoded relative to `prev`.
pub async fn decode_entry_relative<S: SyncSchemes>(
    bytes: &mut GrowingBytes,
    prev: &Entry<S>,
) -> Result<Entry<S>, DecodeError> {
    let flags = bytes.take_byte().await?;
    if flags & ENTRY_RESERVED != 0 {
        return Err(DecodeError::InvalidFlags(flags));
    }

    let namespace = if flags & ENTRY_NAMESPACE_PREV != 0 {
        prev.namespace.clone()
    } else {
        S::Namespace::decode(bytes).await?
    };
    let subspace = if flags & ENTRY_SUBSPACE_PREV != 0 {
        prev.subspace.clone()
    } else {
        S::Subspace::decode(bytes).await?
    };

    let path = decode_path_relative(
        bytes,
        &prev.path,
        S::Path::MAX_COMPONENT_COUNT,
        S::Path::MAX_COMPONENT_LENGTH,
    )
    .await?;

    let time_value = bytes.take_tagged().await?;
    let timestamp = if flags & ENTRY_TIME_DELTA != 0 {
        prev.timestamp.saturating_add(time_value)
    } else {
        time_value
    };

    let payload_length = bytes.take_tagged().await?;
    let payload_digest = S::PayloadDigest::decode(bytes).await?;

    Ok(Entry { namespace, subspace, path, timestamp, payload_length, payload_digest })
}

/// Append the encoding of `area` contained in `outer`.
///
/// The area's path must extend the outer path and its subspace must be
/// the outer's or a single subspace below an any-subspace outer. Both are
/// checked before anything is written.
///
/// # Errors
///
/// [`EncodeError::AreaNotInOuter`] when either containment condition
/// fails; `out` is untouched in that case.
pub fn encode_area_in<S: SyncSchemes>(
    area: &Area<S>,
    outer: &Area<S>,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    let inherit_subspace = area.subspace == outer.subspace;
    // An any-subspace area inside a single-subspace outer has no relative
    // encoding: only the difference to the outer area travels.
    if !outer.path.is_prefix_of(&area.path)
        || (!inherit_subspace && matches!(area.subspace, AreaSubspace::Any))
    {
        return Err(EncodeError::AreaNotInOuter);
    }

    let mut flags = 0u8;
    if inherit_subspace {
        flags |= AREA_SUBSPACE_INHERIT;
    }
    if area.times.end.is_open() {
        flags |= AREA_TIME_END_OPEN;
    }

    out.push(flags);

    if !inherit_subspace
        && let AreaSubspace::Id(id) = &area.subspace
    {
        S::Subspace::encode(id, out);
    }

    let suffix = &area.path.components()[outer.path.count()..];
    put_tagged(out, suffix.len() as u64);
    for component in suffix {
        put_tagged(out, component.len() as u64);
        out.extend_from_slice(component.as_bytes());
    }

    put_tagged(out, area.times.start);
    if let RangeEnd::Closed(end) = &area.times.end {
        put_tagged(out, *end);
    }

    Ok(())
}

/// Decode an area encoded within `outer`.
pub async fn decode_area_in<S: SyncSchemes>(
    bytes: &mut GrowingBytes,
    outer: &Area<S>,
) -> Result<Area<S>, DecodeError> {
    let flags = bytes.take_byte().await?;
    if flags & AREA_RESERVED != 0 {
        return Err(DecodeError::InvalidFlags(flags));
    }

    let subspace = if flags & AREA_SUBSPACE_INHERIT != 0 {
        outer.subspace.clone()
    } else {
        AreaSubspace::Id(S::Subspace::decode(bytes).await?)
    };

    let suffix_count = bytes.take_tagged().await?;
    let total = outer.path.count() as u64 + suffix_count;
    if total > S::Path::MAX_COMPONENT_COUNT as u64 {
        return Err(DecodeError::PathTooLong { count: total, max: S::Path::MAX_COMPONENT_COUNT });
    }

    let mut components = outer.path.components().to_vec();
    for _ in 0..suffix_count {
        let length = bytes.take_tagged().await?;
        if length > S::Path::MAX_COMPONENT_LENGTH as u64 {
            return Err(DecodeError::ComponentTooLong {
                length,
                max: S::Path::MAX_COMPONENT_LENGTH,
            });
        }
        components.push(crate::path::Component::new(bytes.take(length as usize).await?));
    }

    let time_start = bytes.take_tagged().await?;
    let time_end = if flags & AREA_TIME_END_OPEN != 0 {
        RangeEnd::Open
    } else {
        RangeEnd::Closed(bytes.take_tagged().await?)
    };

    Ok(Area {
        subspace,
        path: crate::path::Path::new(components),
        times: Range { start: time_start, end: time_end },
    })
}
