//! Private area intersection scenarios, driven over two finders.
//!
//! The exchange helper plays postman: every output of one finder becomes
//! the matching input of the other, exactly as the session would route
//! the wire messages. Handle spaces line up because both sides bind in
//! message order.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;

use wgps_core::{
    error::PaiError,
    pai::{PaiFinder, PaiInput, PaiIntersection, PaiOutput, ReadAuthorisation},
};
use wgps_harness::{
    TestSchemes, complete_authorisation, selective_authorisation,
    schemes::{TestGroupElement, TestNamespace, TestSubspace},
};
use wgps_proto::{
    SyncSchemes,
    grouping::AreaSubspace,
    path::Path,
    schemes::SubspaceCapScheme,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Peer {
    A,
    B,
}

impl Peer {
    fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Two finders plus counters of everything they emitted.
struct Exchange {
    a: PaiFinder<TestSchemes>,
    b: PaiFinder<TestSchemes>,
    intersections: (Vec<PaiIntersection<TestSchemes>>, Vec<PaiIntersection<TestSchemes>>),
    binds: (usize, usize),
    replies: (usize, usize),
    subspace_requests: (usize, usize),
    subspace_replies: (usize, usize),
}

impl Exchange {
    fn new() -> Self {
        Self {
            a: PaiFinder::new(),
            b: PaiFinder::new(),
            intersections: (Vec::new(), Vec::new()),
            binds: (0, 0),
            replies: (0, 0),
            subspace_requests: (0, 0),
            subspace_replies: (0, 0),
        }
    }

    fn count(pair: &mut (usize, usize), peer: Peer) {
        match peer {
            Peer::A => pair.0 += 1,
            Peer::B => pair.1 += 1,
        }
    }

    /// Feed one input and keep routing until both sides go quiet.
    async fn inject(&mut self, peer: Peer, input: PaiInput<TestSchemes>) {
        let mut queue: VecDeque<(Peer, PaiInput<TestSchemes>)> = VecDeque::new();
        queue.push_back((peer, input));

        while let Some((destination, input)) = queue.pop_front() {
            let finder = match destination {
                Peer::A => &mut self.a,
                Peer::B => &mut self.b,
            };
            for output in finder.handle(input).await.unwrap() {
                match output {
                    PaiOutput::BindFragment { group, is_secondary } => {
                        Self::count(&mut self.binds, destination);
                        queue.push_back((
                            destination.other(),
                            PaiInput::ReceivedBind { group, is_secondary },
                        ));
                    }
                    PaiOutput::ReplyFragment { handle, group } => {
                        Self::count(&mut self.replies, destination);
                        queue.push_back((
                            destination.other(),
                            PaiInput::ReceivedReply { handle, group },
                        ));
                    }
                    PaiOutput::RequestSubspaceCapability { handle } => {
                        Self::count(&mut self.subspace_requests, destination);
                        queue.push_back((
                            destination.other(),
                            PaiInput::ReceivedSubspaceCapRequest { handle },
                        ));
                    }
                    PaiOutput::ReplySubspaceCapability { handle, capability, signature: _ } => {
                        Self::count(&mut self.subspace_replies, destination);
                        // The session verifies the capability before
                        // feeding the reply back in; the test scheme's
                        // capabilities are always valid.
                        let namespace = <<TestSchemes as SyncSchemes>::SubspaceCap
                            as SubspaceCapScheme<TestSchemes>>::granted_namespace(&capability);
                        queue.push_back((
                            destination.other(),
                            PaiInput::ReceivedVerifiedSubspaceCapReply { handle, namespace },
                        ));
                    }
                    PaiOutput::Intersection(intersection) => match destination {
                        Peer::A => self.intersections.0.push(intersection),
                        Peer::B => self.intersections.1.push(intersection),
                    },
                }
            }
        }
    }

    async fn submit(&mut self, peer: Peer, auth: ReadAuthorisation<TestSchemes>) {
        self.inject(peer, PaiInput::SubmitAuthorisation(auth)).await;
    }
}

#[tokio::test]
async fn standard_intersection() {
    // Scenario: both peers hold the same selective capability for
    // (Family, Alfie, [0]/[1]/[2]). Four primary triples and four
    // secondary pairs each; exactly one intersection per side, at the
    // most specific primary fragment.
    let mut exchange = Exchange::new();
    let path = Path::from_slices(&[b"0", b"1", b"2"]);

    exchange.submit(Peer::A, selective_authorisation(1, 10, path.clone(), 100)).await;
    exchange.submit(Peer::B, selective_authorisation(1, 10, path.clone(), 200)).await;

    assert_eq!(exchange.binds, (8, 8));
    // One reply per received bind, exactly.
    assert_eq!(exchange.replies, (8, 8));
    // Secondary fragments only met secondary fragments, so nobody asked
    // for subspace capabilities.
    assert_eq!(exchange.subspace_requests, (0, 0));

    assert_eq!(exchange.intersections.0.len(), 1);
    assert_eq!(exchange.intersections.1.len(), 1);

    for intersection in [&exchange.intersections.0[0], &exchange.intersections.1[0]] {
        assert_eq!(intersection.outer.subspace, AreaSubspace::Id(TestSubspace(10)));
        assert_eq!(intersection.outer.path, path);
        assert!(intersection.outer.times.end.is_open());
    }
}

#[tokio::test]
async fn disjoint_then_aligning() {
    // Scenario: different namespaces produce nothing; a later submission
    // of the shared namespace produces exactly one intersection per side.
    let mut exchange = Exchange::new();
    let path = Path::from_slices(&[b"docs"]);

    exchange.submit(Peer::A, selective_authorisation(1, 10, path.clone(), 100)).await;
    exchange.submit(Peer::B, selective_authorisation(2, 10, path.clone(), 200)).await;

    assert_eq!(exchange.intersections.0.len(), 0);
    assert_eq!(exchange.intersections.1.len(), 0);

    exchange.submit(Peer::B, selective_authorisation(1, 10, path, 200)).await;

    assert_eq!(exchange.intersections.0.len(), 1);
    assert_eq!(exchange.intersections.1.len(), 1);
}

#[tokio::test]
async fn subspace_capability_flow() {
    // Scenario: A holds (Family, subspace Gemma, path []); B holds an
    // any-subspace capability at (Family, [7]) plus the subspace
    // capability proving it. A's most specific secondary meets one of
    // B's primaries: A asks, B answers, and only then does A emit its
    // intersection with an any-subspace outer area.
    let mut exchange = Exchange::new();

    exchange.submit(Peer::A, selective_authorisation(1, 20, Path::empty(), 100)).await;
    exchange
        .submit(Peer::B, complete_authorisation(1, Path::from_slices(&[b"7"]), 200))
        .await;

    assert_eq!(exchange.subspace_requests, (1, 0), "only A asks");
    assert_eq!(exchange.subspace_replies, (0, 1), "only B answers");

    assert_eq!(exchange.intersections.0.len(), 1);
    assert_eq!(exchange.intersections.1.len(), 0);

    let intersection = &exchange.intersections.0[0];
    assert_eq!(intersection.outer.subspace, AreaSubspace::Any);
    assert!(intersection.outer.path.is_empty());
}

/// Drive the subspace-capability request flow by hand, stopping right
/// before the verified reply so the error paths can be probed.
async fn finder_with_pending_request()
-> (PaiFinder<TestSchemes>, PaiFinder<TestSchemes>, u64) {
    let mut a: PaiFinder<TestSchemes> = PaiFinder::new();
    let mut b: PaiFinder<TestSchemes> = PaiFinder::new();

    let a_binds = a
        .handle(PaiInput::SubmitAuthorisation(selective_authorisation(
            1,
            20,
            Path::empty(),
            100,
        )))
        .await
        .unwrap();
    let b_binds = b
        .handle(PaiInput::SubmitAuthorisation(complete_authorisation(1, Path::empty(), 200)))
        .await
        .unwrap();

    // Deliver B's fragment to A; A replies, nothing completes on A's
    // own side yet.
    for output in b_binds {
        if let PaiOutput::BindFragment { group, is_secondary } = output {
            a.handle(PaiInput::ReceivedBind { group, is_secondary }).await.unwrap();
        }
    }

    // Deliver A's fragments to B; route B's replies back to A until A's
    // secondary completes and it asks for a subspace capability.
    let mut request_handle = None;
    for output in a_binds {
        let PaiOutput::BindFragment { group, is_secondary } = output else {
            continue;
        };
        for reply in b.handle(PaiInput::ReceivedBind { group, is_secondary }).await.unwrap() {
            if let PaiOutput::ReplyFragment { handle, group } = reply {
                for event in
                    a.handle(PaiInput::ReceivedReply { handle, group }).await.unwrap()
                {
                    if let PaiOutput::RequestSubspaceCapability { handle } = event {
                        request_handle = Some(handle);
                    }
                }
            }
        }
    }

    let handle = request_handle.expect("A must have requested a subspace capability");
    (a, b, handle)
}

#[tokio::test]
async fn reply_for_unknown_handle_is_fatal() {
    let mut finder: PaiFinder<TestSchemes> = PaiFinder::new();

    let result = finder
        .handle(PaiInput::ReceivedReply { handle: 3, group: TestGroupElement(1) })
        .await;
    assert!(matches!(result, Err(PaiError::UnknownHandle { handle: 3, space: "ours" })));
}

#[tokio::test]
async fn unsolicited_subspace_reply_is_fatal() {
    let mut finder: PaiFinder<TestSchemes> = PaiFinder::new();
    finder
        .handle(PaiInput::SubmitAuthorisation(selective_authorisation(
            1,
            20,
            Path::empty(),
            100,
        )))
        .await
        .unwrap();

    let result = finder
        .handle(PaiInput::ReceivedVerifiedSubspaceCapReply {
            handle: 1,
            namespace: TestNamespace(1),
        })
        .await;
    assert!(matches!(result, Err(PaiError::NotRequested { handle: 1 })));
}

#[tokio::test]
async fn wrong_namespace_subspace_reply_is_fatal() {
    let (mut a, _b, handle) = finder_with_pending_request().await;

    let result = a
        .handle(PaiInput::ReceivedVerifiedSubspaceCapReply {
            handle,
            namespace: TestNamespace(9),
        })
        .await;
    assert!(matches!(result, Err(PaiError::WrongNamespace { .. })));
}

#[tokio::test]
async fn correct_namespace_completes_the_pending_request() {
    let (mut a, _b, handle) = finder_with_pending_request().await;

    let outputs = a
        .handle(PaiInput::ReceivedVerifiedSubspaceCapReply {
            handle,
            namespace: TestNamespace(1),
        })
        .await
        .unwrap();

    assert_eq!(outputs.len(), 1);
    assert!(matches!(outputs[0], PaiOutput::Intersection(_)));

    // A second identical reply is unsolicited now.
    let result = a
        .handle(PaiInput::ReceivedVerifiedSubspaceCapReply {
            handle,
            namespace: TestNamespace(1),
        })
        .await;
    assert!(matches!(result, Err(PaiError::NotRequested { .. })));
}
