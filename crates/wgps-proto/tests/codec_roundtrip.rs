//! Codec round-trip properties.
//!
//! Two sides of a session share a rolling privy by construction: the
//! encoder updates its copy as it sends, the decoder its copy as it
//! receives. These tests encode message sequences against one privy,
//! decode them against an identically initialised one, and require the
//! exact messages back with no bytes left over.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use bytes::Bytes;
use proptest::prelude::*;

use wgps_harness::schemes::{
    TestDigest, TestDynamicToken, TestFingerprint, TestGroupElement, TestNamespace,
    TestSchemes, TestSignature, TestStaticToken, TestSubspace, TestSubspaceCapability,
};
use wgps_proto::{
    Area, AreaOfInterest, AreaSubspace, CapabilityPrivy, CodecContext, Entry, GrowingBytes,
    HandleType, LogicalChannel, Message, Path, Range, Range3d, RangeEnd, ReconciliationPrivy,
    decode_message, encode_message,
    messages::{
        CommitmentReveal, ControlAbsolve, ControlAnnounceDropping, ControlApologise,
        ControlFree, ControlIssueGuarantee, ControlLimitReceiving, ControlLimitSending,
        ControlPlead, DataBindPayloadRequest, DataReplyPayload, DataSendEntry, DataSendPayload,
        DataSetMetadata, PaiBindFragment, PaiReplyFragment, PaiRequestSubspaceCapability,
        PaiReplySubspaceCapability, ReconciliationAnnounceEntries, ReconciliationSendEntry,
        ReconciliationSendFingerprint, SetupBindAreaOfInterest, SetupBindReadCapability,
        SetupBindStaticToken,
    },
};

/// Fixed stores standing in for the session: a handful of intersection
/// and capability handles with full-area privies.
struct FixedContext {
    privies: HashMap<u64, CapabilityPrivy<TestSchemes>>,
}

impl FixedContext {
    fn new() -> Self {
        let mut privies = HashMap::new();
        for handle in 0..4u64 {
            privies.insert(handle, CapabilityPrivy {
                namespace: TestNamespace(7),
                outer: Area::full(),
            });
        }
        Self { privies }
    }
}

impl CodecContext<TestSchemes> for FixedContext {
    fn intersection_privy(&self, handle: u64) -> Option<CapabilityPrivy<TestSchemes>> {
        self.privies.get(&handle).cloned()
    }

    fn capability_privy(&self, handle: u64) -> Option<CapabilityPrivy<TestSchemes>> {
        self.privies.get(&handle).cloned()
    }

    fn aoi_namespace(&self, _sender: u64, _receiver: u64) -> Option<TestNamespace> {
        Some(TestNamespace(7))
    }
}

/// Encode a sequence against a fresh privy, then decode it against
/// another fresh privy and require identity and exact consumption.
async fn assert_round_trip(messages: Vec<Message<TestSchemes>>) {
    let ctx = FixedContext::new();
    let mut encode_privy = ReconciliationPrivy::new();
    let mut wire = Vec::new();
    let mut lengths = Vec::new();

    for message in &messages {
        let encoded = encode_message(message, &mut encode_privy, &ctx).unwrap();
        lengths.push(encoded.bytes.len() as u64);
        assert_eq!(encoded.channel, message.channel());
        wire.extend_from_slice(&encoded.bytes);
    }

    let (tx, mut bytes) = GrowingBytes::pair(1);
    tx.try_send(Bytes::from(wire)).unwrap();
    drop(tx);

    let mut decode_privy = ReconciliationPrivy::new();
    for (message, length) in messages.iter().zip(lengths) {
        let decoded = decode_message(&mut bytes, &mut decode_privy, &ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&decoded.message, message);
        assert_eq!(decoded.length, length);
    }

    // No trailing garbage: the stream ends exactly on the boundary.
    let end = decode_message(&mut bytes, &mut decode_privy, &ctx).await.unwrap();
    assert!(end.is_none());
}

fn path(components: &[&[u8]]) -> Path {
    Path::from_slices(components)
}

fn entry(namespace: u64, subspace: u64, p: Path, timestamp: u64) -> Entry<TestSchemes> {
    Entry {
        namespace: TestNamespace(namespace),
        subspace: TestSubspace(subspace),
        path: p,
        timestamp,
        payload_length: 9,
        payload_digest: TestDigest(0xfeed),
    }
}

fn range(ss: (u64, Option<u64>), paths: (Path, Option<Path>), times: (u64, Option<u64>)) -> Range3d<TestSchemes> {
    fn end<T>(value: Option<T>) -> RangeEnd<T> {
        match value {
            Some(value) => RangeEnd::Closed(value),
            None => RangeEnd::Open,
        }
    }
    Range3d {
        subspaces: Range { start: TestSubspace(ss.0), end: end(ss.1.map(TestSubspace)) },
        paths: Range { start: paths.0, end: end(paths.1) },
        times: Range { start: times.0, end: end(times.1) },
    }
}

#[tokio::test]
async fn control_credit_handshake() {
    // Scenario: a one-byte guarantee on the intersection channel followed
    // by a plead back to zero decodes identically on the other side.
    assert_round_trip(vec![
        Message::ControlIssueGuarantee(ControlIssueGuarantee {
            amount: 1,
            channel: LogicalChannel::Intersection,
        }),
        Message::ControlPlead(ControlPlead { target: 0, channel: LogicalChannel::Intersection }),
    ])
    .await;
}

#[tokio::test]
async fn every_message_kind_round_trips() {
    let aoi = AreaOfInterest {
        area: Area {
            subspace: AreaSubspace::Id(TestSubspace(3)),
            path: path(&[b"blog"]),
            times: Range { start: 10, end: RangeEnd::Closed(99) },
        },
        max_count: 5,
        max_size: 1 << 20,
    };

    assert_round_trip(vec![
        Message::CommitmentReveal(CommitmentReveal { nonce: Bytes::from(vec![9u8; 16]) }),
        Message::ControlIssueGuarantee(ControlIssueGuarantee {
            amount: 70_000,
            channel: LogicalChannel::Data,
        }),
        Message::ControlAbsolve(ControlAbsolve {
            amount: 300,
            channel: LogicalChannel::Reconciliation,
        }),
        Message::ControlPlead(ControlPlead {
            target: u64::from(u32::MAX) + 1,
            channel: LogicalChannel::StaticToken,
        }),
        Message::ControlLimitSending(ControlLimitSending {
            bound: 12,
            channel: LogicalChannel::AreaOfInterest,
        }),
        Message::ControlLimitReceiving(ControlLimitReceiving {
            bound: 255,
            channel: LogicalChannel::PayloadRequest,
        }),
        Message::ControlAnnounceDropping(ControlAnnounceDropping {
            channel: LogicalChannel::Capability,
        }),
        Message::ControlApologise(ControlApologise { channel: LogicalChannel::Capability }),
        Message::ControlFree(ControlFree {
            handle: 77,
            mine: true,
            handle_type: HandleType::StaticToken,
        }),
        Message::ControlFree(ControlFree {
            handle: 1 << 40,
            mine: false,
            handle_type: HandleType::Intersection,
        }),
        Message::PaiBindFragment(PaiBindFragment {
            group: TestGroupElement(0xdead_beef),
            is_secondary: true,
        }),
        Message::PaiReplyFragment(PaiReplyFragment {
            handle: 260,
            group: TestGroupElement(42),
        }),
        Message::PaiRequestSubspaceCapability(PaiRequestSubspaceCapability { handle: 2 }),
        Message::PaiReplySubspaceCapability(PaiReplySubspaceCapability {
            handle: 2,
            capability: TestSubspaceCapability { namespace: TestNamespace(7), receiver: 8 },
            signature: TestSignature(13),
        }),
        Message::SetupBindReadCapability(SetupBindReadCapability {
            handle: 1,
            capability: wgps_harness::schemes::TestReadCapability {
                namespace: TestNamespace(7),
                subspace: Some(TestSubspace(3)),
                path: path(&[b"blog", b"posts"]),
                receiver: 11,
            },
            signature: TestSignature(4),
        }),
        Message::SetupBindAreaOfInterest(SetupBindAreaOfInterest {
            authorisation: 1,
            area_of_interest: aoi,
        }),
        Message::SetupBindStaticToken(SetupBindStaticToken {
            static_token: TestStaticToken(0x5eed),
        }),
        Message::DataSendEntry(DataSendEntry {
            entry: entry(7, 3, path(&[b"a", b"b"]), 1000),
            static_token_handle: 0,
            dynamic_token: TestDynamicToken(500),
            offset: 0,
        }),
        Message::DataSendPayload(DataSendPayload {
            amount: 5,
            bytes: Bytes::from_static(b"hello"),
        }),
        Message::DataSetMetadata(DataSetMetadata {
            is_eager: true,
            sender_handle: 1,
            receiver_handle: 300,
        }),
        Message::DataBindPayloadRequest(DataBindPayloadRequest {
            entry: entry(7, 4, path(&[b"c"]), 77),
            capability_handle: 2,
            offset: 1024,
        }),
        Message::DataReplyPayload(DataReplyPayload { handle: 0 }),
    ])
    .await;
}

#[tokio::test]
async fn reconciliation_family_round_trips_with_privy() {
    let r1 = range(
        (10, Some(20)),
        (path(&[b"blog"]), Some(path(&[b"blog", b"z"]))),
        (5, Some(100)),
    );
    let r2 = range(
        (10, Some(20)),
        (path(&[b"blog", b"posts"]), None),
        (5, None),
    );

    assert_round_trip(vec![
        Message::ReconciliationSendFingerprint(ReconciliationSendFingerprint {
            range: r1.clone(),
            fingerprint: TestFingerprint(0xab),
            sender_handle: 1,
            receiver_handle: 2,
        }),
        Message::ReconciliationSendFingerprint(ReconciliationSendFingerprint {
            range: r2.clone(),
            fingerprint: TestFingerprint(0), // neutral
            sender_handle: 1,
            receiver_handle: 2,
        }),
        Message::ReconciliationAnnounceEntries(ReconciliationAnnounceEntries {
            range: r2,
            count: 2,
            wants_response: true,
            will_sort: false,
            sender_handle: 1,
            receiver_handle: 2,
        }),
        Message::ReconciliationSendEntry(ReconciliationSendEntry {
            entry: entry(7, 3, path(&[b"blog", b"posts", b"one"]), 50),
            static_token_handle: 9,
            dynamic_token: TestDynamicToken(1),
        }),
        Message::ReconciliationSendEntry(ReconciliationSendEntry {
            entry: entry(7, 3, path(&[b"blog", b"posts", b"two"]), 60),
            static_token_handle: 9,
            dynamic_token: TestDynamicToken(2),
        }),
        // Announced entries consumed; 0x50 dispatch flips back.
        Message::ReconciliationAnnounceEntries(ReconciliationAnnounceEntries {
            range: r1,
            count: 0,
            wants_response: false,
            will_sort: true,
            sender_handle: 3,
            receiver_handle: 4,
        }),
    ])
    .await;
}

#[tokio::test]
async fn back_references_shrink_the_second_fingerprint() {
    // Scenario: consecutive fingerprints with identical handles and
    // prefix-related ranges. The second first byte must carry both
    // handle back-reference flags and the encoding must be strictly
    // shorter than the first, context-free one.
    let ctx = FixedContext::new();
    let mut privy = ReconciliationPrivy::<TestSchemes>::new();

    let first = Message::ReconciliationSendFingerprint(ReconciliationSendFingerprint {
        range: range(
            (10, Some(20)),
            (path(&[b"blog", b"posts"]), Some(path(&[b"blog", b"posts", b"m"]))),
            (5, Some(100)),
        ),
        fingerprint: TestFingerprint(0xa1),
        sender_handle: 1,
        receiver_handle: 2,
    });
    let second = Message::ReconciliationSendFingerprint(ReconciliationSendFingerprint {
        range: range(
            (10, Some(20)),
            (path(&[b"blog", b"posts", b"m"]), Some(path(&[b"blog", b"posts", b"z"]))),
            (5, Some(100)),
        ),
        fingerprint: TestFingerprint(0xa2),
        sender_handle: 1,
        receiver_handle: 2,
    });

    let first_encoded = encode_message(&first, &mut privy, &ctx).unwrap();
    let second_encoded = encode_message(&second, &mut privy, &ctx).unwrap();

    let flags = second_encoded.bytes[0];
    assert_eq!(flags & 0xf0, 0x40);
    assert_ne!(flags & 0x08, 0, "sender handle must be a back-reference");
    assert_ne!(flags & 0x04, 0, "receiver handle must be a back-reference");
    assert!(
        second_encoded.bytes.len() < first_encoded.bytes.len(),
        "relative encoding must beat the naive one"
    );
}

#[test]
fn area_escaping_its_outer_area_is_rejected() {
    use wgps_proto::{EncodeError, codec::relative::encode_area_in};

    let outer: Area<TestSchemes> = Area {
        subspace: AreaSubspace::Id(TestSubspace(3)),
        path: path(&[b"blog"]),
        times: Range { start: 0, end: RangeEnd::Open },
    };

    // Path does not extend the outer path.
    let sideways = Area {
        subspace: AreaSubspace::Id(TestSubspace(3)),
        path: path(&[b"docs"]),
        times: Range { start: 0, end: RangeEnd::Open },
    };
    let mut out = Vec::new();
    assert_eq!(
        encode_area_in::<TestSchemes>(&sideways, &outer, &mut out),
        Err(EncodeError::AreaNotInOuter)
    );
    assert!(out.is_empty(), "a failed encode must write nothing");

    // Every subspace is wider than the outer's single subspace.
    let wider = Area {
        subspace: AreaSubspace::Any,
        path: path(&[b"blog", b"posts"]),
        times: Range { start: 0, end: RangeEnd::Open },
    };
    assert_eq!(
        encode_area_in::<TestSchemes>(&wider, &outer, &mut out),
        Err(EncodeError::AreaNotInOuter)
    );
    assert!(out.is_empty(), "a failed encode must write nothing");
}

// Property strategies. Handles referenced through the context stay in
// the fixed 0..4 window; free-standing handles range over all of u64.

fn arb_channel() -> impl Strategy<Value = LogicalChannel> {
    prop::sample::select(LogicalChannel::ALL.to_vec())
}

fn arb_path() -> impl Strategy<Value = Path> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..4), 0..4)
        .prop_map(|components| {
            Path::new(
                components
                    .into_iter()
                    .map(|c| wgps_proto::Component::from_slice(&c))
                    .collect(),
            )
        })
}

fn arb_entry() -> impl Strategy<Value = Entry<TestSchemes>> {
    (any::<u64>(), any::<u64>(), arb_path(), any::<u64>(), any::<u64>(), any::<u64>()).prop_map(
        |(ns, ss, p, timestamp, payload_length, digest)| Entry {
            namespace: TestNamespace(ns),
            subspace: TestSubspace(ss),
            path: p,
            timestamp,
            payload_length,
            payload_digest: TestDigest(digest),
        },
    )
}

fn arb_range3d() -> impl Strategy<Value = Range3d<TestSchemes>> {
    (
        (any::<u64>(), prop::option::of(any::<u64>())),
        (arb_path(), prop::option::of(arb_path())),
        (any::<u64>(), prop::option::of(any::<u64>())),
    )
        .prop_map(|(ss, paths, times)| range(ss, paths, times))
}

fn arb_control() -> impl Strategy<Value = Message<TestSchemes>> {
    (any::<u64>(), arb_channel(), 0..5u8, any::<bool>(), 0..5u8).prop_map(
        |(value, channel, kind, mine, handle_kind)| match kind {
            0 => Message::ControlIssueGuarantee(ControlIssueGuarantee { amount: value, channel }),
            1 => Message::ControlAbsolve(ControlAbsolve { amount: value, channel }),
            2 => Message::ControlPlead(ControlPlead { target: value, channel }),
            3 => Message::ControlLimitSending(ControlLimitSending { bound: value, channel }),
            _ => Message::ControlFree(ControlFree {
                handle: value,
                mine,
                handle_type: match handle_kind {
                    0 => HandleType::Intersection,
                    1 => HandleType::Capability,
                    2 => HandleType::AreaOfInterest,
                    3 => HandleType::PayloadRequest,
                    _ => HandleType::StaticToken,
                },
            }),
        },
    )
}

fn arb_pai() -> impl Strategy<Value = Message<TestSchemes>> {
    (any::<u64>(), any::<u64>(), any::<bool>(), 0..3u8).prop_map(
        |(handle, group, is_secondary, kind)| match kind {
            0 => Message::PaiBindFragment(PaiBindFragment {
                group: TestGroupElement(group),
                is_secondary,
            }),
            1 => Message::PaiReplyFragment(PaiReplyFragment {
                handle,
                group: TestGroupElement(group),
            }),
            _ => Message::PaiRequestSubspaceCapability(PaiRequestSubspaceCapability { handle }),
        },
    )
}

fn arb_fingerprint_message() -> impl Strategy<Value = Message<TestSchemes>> {
    (arb_range3d(), any::<u64>(), any::<u64>(), any::<u64>()).prop_map(
        |(range, fingerprint, sender_handle, receiver_handle)| {
            Message::ReconciliationSendFingerprint(ReconciliationSendFingerprint {
                range,
                fingerprint: TestFingerprint(fingerprint),
                sender_handle,
                receiver_handle,
            })
        },
    )
}

/// An announcement followed by exactly its announced entries, keeping
/// the `0x50` dispatch consistent.
fn arb_announce_block() -> impl Strategy<Value = Vec<Message<TestSchemes>>> {
    (
        arb_range3d(),
        any::<bool>(),
        any::<bool>(),
        any::<u64>(),
        any::<u64>(),
        prop::collection::vec((arb_entry(), any::<u64>(), any::<u64>()), 0..4),
    )
        .prop_map(|(range, wants_response, will_sort, sender, receiver, entries)| {
            let mut block = vec![Message::ReconciliationAnnounceEntries(
                ReconciliationAnnounceEntries {
                    range,
                    count: entries.len() as u64,
                    wants_response,
                    will_sort,
                    sender_handle: sender,
                    receiver_handle: receiver,
                },
            )];
            for (entry, token_handle, dynamic) in entries {
                block.push(Message::ReconciliationSendEntry(ReconciliationSendEntry {
                    entry,
                    static_token_handle: token_handle,
                    dynamic_token: TestDynamicToken(dynamic),
                }));
            }
            block
        })
}

fn arb_stream() -> impl Strategy<Value = Vec<Message<TestSchemes>>> {
    prop::collection::vec(
        prop_oneof![
            arb_control().prop_map(|m| vec![m]),
            arb_pai().prop_map(|m| vec![m]),
            arb_fingerprint_message().prop_map(|m| vec![m]),
            arb_announce_block(),
        ],
        0..8,
    )
    .prop_map(|blocks| blocks.into_iter().flatten().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_streams_round_trip(messages in arb_stream()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        runtime.block_on(assert_round_trip(messages));
    }
}
