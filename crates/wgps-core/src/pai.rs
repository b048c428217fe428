//! Private area intersection.
//!
//! Both peers blind the fragments of their read capabilities with a
//! private scalar and exchange the blinded group elements. Because the
//! group is commutative, a fragment both peers hold ends up as the same
//! doubly-blinded element on both sides, detectable without revealing
//! anything about fragments only one peer holds.
//!
//! The finder is a single state machine driven through an input queue and
//! answering on an output queue: the session feeds it local authorisation
//! submissions and decoded peer messages, and routes each output event to
//! the matching encoder entry point. Keeping one task removes any cyclic
//! waiting between the five event streams.
//!
//! # State Machine
//!
//! ```text
//!  submit ──> ours[h] pending ──(peer reply)──> complete ┐
//!                                                        ├─> intersection?
//!  peer bind ──> theirs[h] complete ─────────────────────┘
//! ```
//!
//! An intersection consults the local fragment info of the matched
//! our-side handle: the most specific primary fragment binds a read
//! capability, the most specific secondary fragment requests a subspace
//! capability first and only yields its intersection once the peer's
//! capability is verified.

use std::collections::{BTreeMap, HashSet};

use tokio::sync::mpsc;
use tracing::debug;

use wgps_proto::{
    fragment::Fragment,
    grouping::{Area, AreaSubspace, Range, RangeEnd},
    path::Path,
    schemes::{
        CapabilityPrivy, GroupElement, NamespaceId, PaiScheme, ReadCapability, Scalar,
        SubspaceCapability, SubspaceSignature, SyncSchemes, SyncSignature,
    },
};

use crate::{error::PaiError, handle_store::HandleStore};

/// A capability a peer is willing to sync under, with the optional
/// subspace capability proving any-subspace access.
///
/// The subspace variant only makes sense for capabilities whose granted
/// area covers every subspace; the harness and applications uphold this
/// when constructing authorisations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadAuthorisation<S: SyncSchemes> {
    /// The read capability itself.
    pub capability: ReadCapability<S>,
    /// Signature over the session challenge by the capability's receiver,
    /// sent alongside the capability when it is bound.
    pub sync_signature: SyncSignature<S>,
    /// Proof of any-subspace access at the capability's path with its
    /// challenge signature, if held.
    pub subspace_capability: Option<(SubspaceCapability<S>, SubspaceSignature<S>)>,
}

/// Inputs the finder consumes, from the application (submit) and from
/// decoded peer messages (the rest).
#[derive(Debug, Clone)]
pub enum PaiInput<S: SyncSchemes> {
    /// The application wants to sync under this authorisation.
    SubmitAuthorisation(ReadAuthorisation<S>),
    /// Peer bound a blinded fragment (`PaiBindFragment`).
    ReceivedBind {
        /// The singly blinded group element.
        group: GroupElement<S>,
        /// Peer's secondary flag.
        is_secondary: bool,
    },
    /// Peer returned one of our fragments doubly blinded
    /// (`PaiReplyFragment`).
    ReceivedReply {
        /// Our intersection handle the reply refers to.
        handle: u64,
        /// The doubly blinded group element.
        group: GroupElement<S>,
    },
    /// Peer asked us to prove any-subspace access
    /// (`PaiRequestSubspaceCapability`).
    ReceivedSubspaceCapRequest {
        /// Their intersection handle the request refers to.
        handle: u64,
    },
    /// Peer answered our subspace capability request and the session
    /// already verified the capability (`PaiReplySubspaceCapability`).
    ReceivedVerifiedSubspaceCapReply {
        /// Our intersection handle the reply refers to.
        handle: u64,
        /// Namespace the verified capability covers.
        namespace: NamespaceId<S>,
    },
}

/// Events the finder produces; the session routes each to an encoder
/// entry point or, for intersections, to capability binding.
#[derive(Debug, Clone)]
pub enum PaiOutput<S: SyncSchemes> {
    /// Send a `PaiBindFragment`.
    BindFragment {
        /// Our singly blinded group element.
        group: GroupElement<S>,
        /// Whether the fragment is from our secondary set.
        is_secondary: bool,
    },
    /// Send a `PaiReplyFragment`.
    ReplyFragment {
        /// The handle we bound for the peer's fragment.
        handle: u64,
        /// The doubly blinded group element.
        group: GroupElement<S>,
    },
    /// Send a `PaiRequestSubspaceCapability`.
    RequestSubspaceCapability {
        /// Our handle of the fragment needing proof.
        handle: u64,
    },
    /// Send a `PaiReplySubspaceCapability`.
    ReplySubspaceCapability {
        /// The handle from the peer's request, echoed back.
        handle: u64,
        /// Our subspace capability.
        capability: SubspaceCapability<S>,
        /// Its signature over the session challenge.
        signature: SubspaceSignature<S>,
    },
    /// An authorisation intersects the peer's interests: bind its read
    /// capability and areas of interest.
    Intersection(PaiIntersection<S>),
}

/// One detected intersection.
#[derive(Debug, Clone)]
pub struct PaiIntersection<S: SyncSchemes> {
    /// The authorisation whose fragment matched.
    pub authorisation: ReadAuthorisation<S>,
    /// Our intersection handle of the matched fragment.
    pub handle: u64,
    /// Outer area to encode the capability against.
    pub outer: Area<S>,
}

/// What to do when a locally bound fragment intersects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnIntersection {
    /// Not the most specific fragment; a more specific sibling acts.
    Nothing,
    /// Most specific primary fragment: bind the read capability.
    BindReadCap,
    /// Most specific secondary fragment: ask for a subspace capability.
    RequestSubspaceCap,
}

/// A blinded fragment in one of the two stores.
#[derive(Debug, Clone)]
struct FragmentState<S: SyncSchemes> {
    group: GroupElement<S>,
    /// Both scalars applied. Monotonic: never unset.
    is_complete: bool,
    is_secondary: bool,
}

/// Everything the finder remembers about a locally bound fragment.
#[derive(Debug, Clone)]
struct LocalFragmentInfo<S: SyncSchemes> {
    authorisation: ReadAuthorisation<S>,
    on_intersection: OnIntersection,
    namespace: NamespaceId<S>,
    subspace: AreaSubspace<S>,
    path: Path,
}

/// Which store a just-completed handle lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Ours,
    Theirs,
}

/// The PAI state machine for one session.
pub struct PaiFinder<S: SyncSchemes> {
    scalar: Scalar<S>,
    ours: HandleStore<FragmentState<S>>,
    theirs: HandleStore<FragmentState<S>>,
    fragment_info: BTreeMap<u64, LocalFragmentInfo<S>>,
    requested_subspace_cap_handles: HashSet<u64>,
}

// Manual Debug: the private scalar must never end up in logs.
impl<S: SyncSchemes> std::fmt::Debug for PaiFinder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaiFinder")
            .field("ours", &self.ours.len())
            .field("theirs", &self.theirs.len())
            .field("pending_subspace_requests", &self.requested_subspace_cap_handles.len())
            .finish_non_exhaustive()
    }
}

impl<S: SyncSchemes> Default for PaiFinder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SyncSchemes> PaiFinder<S> {
    /// Fresh finder with a newly drawn private scalar.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scalar: <S::Pai as PaiScheme<S>>::generate_scalar(),
            ours: HandleStore::new(),
            theirs: HandleStore::new(),
            fragment_info: BTreeMap::new(),
            requested_subspace_cap_handles: HashSet::new(),
        }
    }

    /// Drive the finder from an input queue until it closes, forwarding
    /// every output event.
    ///
    /// A closed output queue means the session is shutting down; the task
    /// drains and exits cleanly.
    ///
    /// # Errors
    ///
    /// The first [`PaiError`] aborts the loop; the session treats it as
    /// fatal.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<PaiInput<S>>,
        outputs: mpsc::Sender<PaiOutput<S>>,
    ) -> Result<(), PaiError> {
        while let Some(input) = inputs.recv().await {
            for event in self.handle(input).await? {
                if outputs.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Process one input, returning the resulting events in order.
    pub async fn handle(&mut self, input: PaiInput<S>) -> Result<Vec<PaiOutput<S>>, PaiError> {
        match input {
            PaiInput::SubmitAuthorisation(authorisation) => {
                Ok(self.submit_authorisation(authorisation).await)
            }
            PaiInput::ReceivedBind { group, is_secondary } => {
                self.received_bind(group, is_secondary).await
            }
            PaiInput::ReceivedReply { handle, group } => self.received_reply(handle, group),
            PaiInput::ReceivedSubspaceCapRequest { handle } => {
                self.received_subspace_cap_request(handle)
            }
            PaiInput::ReceivedVerifiedSubspaceCapReply { handle, namespace } => {
                self.received_verified_subspace_cap_reply(handle, namespace)
            }
        }
    }

    /// Derive, blind, and bind every fragment of an authorisation, least
    /// to most specific.
    async fn submit_authorisation(
        &mut self,
        authorisation: ReadAuthorisation<S>,
    ) -> Vec<PaiOutput<S>> {
        let kit = <S::Pai as PaiScheme<S>>::fragment_kit(&authorisation.capability);
        let set = kit.fragments();
        debug!(
            primary = set.primary.len(),
            secondary = set.secondary.len(),
            "submitting authorisation fragments"
        );

        let mut outputs = Vec::with_capacity(set.primary.len() + set.secondary.len());

        let primary_count = set.primary.len();
        for (index, fragment) in set.primary.into_iter().enumerate() {
            let action = if index + 1 == primary_count {
                OnIntersection::BindReadCap
            } else {
                OnIntersection::Nothing
            };
            outputs.push(self.bind_fragment(fragment, false, action, &authorisation).await);
        }

        let secondary_count = set.secondary.len();
        for (index, fragment) in set.secondary.into_iter().enumerate() {
            let action = if index + 1 == secondary_count {
                OnIntersection::RequestSubspaceCap
            } else {
                OnIntersection::Nothing
            };
            outputs.push(self.bind_fragment(fragment, true, action, &authorisation).await);
        }

        outputs
    }

    async fn bind_fragment(
        &mut self,
        fragment: Fragment<S>,
        is_secondary: bool,
        on_intersection: OnIntersection,
        authorisation: &ReadAuthorisation<S>,
    ) -> PaiOutput<S> {
        let unblinded = <S::Pai as PaiScheme<S>>::fragment_to_group(&fragment).await;
        let group = <S::Pai as PaiScheme<S>>::scalar_mult(&unblinded, &self.scalar).await;

        let (namespace, subspace, path) = match fragment {
            Fragment::Pair { namespace, path } => (namespace, AreaSubspace::Any, path),
            Fragment::Triple { namespace, subspace, path } => {
                (namespace, AreaSubspace::Id(subspace), path)
            }
        };

        let handle = self.ours.bind(FragmentState {
            group: group.clone(),
            is_complete: false,
            is_secondary,
        });
        self.fragment_info.insert(handle, LocalFragmentInfo {
            authorisation: authorisation.clone(),
            on_intersection,
            namespace,
            subspace,
            path,
        });

        PaiOutput::BindFragment { group, is_secondary }
    }

    /// Peer bound a fragment: blind it with our scalar, store it complete,
    /// reply, and look for intersections.
    async fn received_bind(
        &mut self,
        group: GroupElement<S>,
        is_secondary: bool,
    ) -> Result<Vec<PaiOutput<S>>, PaiError> {
        let blinded = <S::Pai as PaiScheme<S>>::scalar_mult(&group, &self.scalar).await;
        let handle = self.theirs.bind(FragmentState {
            group: blinded.clone(),
            is_complete: true,
            is_secondary,
        });
        debug!(handle, is_secondary, "bound peer fragment");

        let mut outputs = vec![PaiOutput::ReplyFragment { handle, group: blinded }];
        outputs.extend(self.check_intersections(handle, Side::Theirs)?);
        Ok(outputs)
    }

    /// Peer completed one of our fragments.
    fn received_reply(
        &mut self,
        handle: u64,
        group: GroupElement<S>,
    ) -> Result<Vec<PaiOutput<S>>, PaiError> {
        let state = self
            .ours
            .get_mut(handle)
            .ok_or(PaiError::UnknownHandle { handle, space: "ours" })?;
        state.group = group;
        state.is_complete = true;
        debug!(handle, "our fragment completed");

        self.check_intersections(handle, Side::Ours)
    }

    /// Peer wants proof of any-subspace access for one of its fragments.
    fn received_subspace_cap_request(
        &mut self,
        handle: u64,
    ) -> Result<Vec<PaiOutput<S>>, PaiError> {
        let group = self
            .theirs
            .get(handle)
            .ok_or(PaiError::UnknownHandle { handle, space: "theirs" })?
            .group
            .clone();

        for (our_handle, state) in self.ours.iter() {
            if !state.is_complete {
                continue;
            }
            if !<S::Pai as PaiScheme<S>>::is_group_equal(&state.group, &group) {
                continue;
            }
            let info = self
                .fragment_info
                .get(&our_handle)
                .ok_or(PaiError::MissingFragmentInfo { handle: our_handle })?;
            if let Some((capability, signature)) = &info.authorisation.subspace_capability {
                debug!(handle, our_handle, "answering subspace capability request");
                return Ok(vec![PaiOutput::ReplySubspaceCapability {
                    handle,
                    capability: capability.clone(),
                    signature: signature.clone(),
                }]);
            }
        }
        Ok(Vec::new())
    }

    /// A verified subspace capability arrived for a handle we requested
    /// one for.
    fn received_verified_subspace_cap_reply(
        &mut self,
        handle: u64,
        namespace: NamespaceId<S>,
    ) -> Result<Vec<PaiOutput<S>>, PaiError> {
        if !self.requested_subspace_cap_handles.remove(&handle) {
            return Err(PaiError::NotRequested { handle });
        }
        let info = self
            .fragment_info
            .get(&handle)
            .ok_or(PaiError::MissingFragmentInfo { handle })?;
        if info.namespace != namespace {
            return Err(PaiError::WrongNamespace { handle });
        }

        debug!(handle, "subspace capability verified, emitting intersection");
        Ok(vec![PaiOutput::Intersection(PaiIntersection {
            authorisation: info.authorisation.clone(),
            handle,
            outer: outer_area(info),
        })])
    }

    /// Look for the first intersection involving a just-completed handle.
    ///
    /// Secondary-vs-secondary matches are skipped: two subspace-less
    /// projections of selective capabilities matching each other says
    /// nothing about their actual subspaces.
    fn check_intersections(
        &mut self,
        completed: u64,
        side: Side,
    ) -> Result<Vec<PaiOutput<S>>, PaiError> {
        let completed_store = match side {
            Side::Ours => &self.ours,
            Side::Theirs => &self.theirs,
        };
        // The caller just bound or completed this handle.
        let completed_state = completed_store
            .get(completed)
            .ok_or(PaiError::MissingFragmentInfo { handle: completed })?;
        let completed_group = completed_state.group.clone();
        let completed_secondary = completed_state.is_secondary;

        let other_store = match side {
            Side::Ours => &self.theirs,
            Side::Theirs => &self.ours,
        };

        let mut matched = None;
        for (other_handle, state) in other_store.iter() {
            if !state.is_complete {
                continue;
            }
            if completed_secondary && state.is_secondary {
                continue;
            }
            if !<S::Pai as PaiScheme<S>>::is_group_equal(&completed_group, &state.group) {
                continue;
            }
            matched = Some(other_handle);
            break;
        }

        let Some(other_handle) = matched else {
            return Ok(Vec::new());
        };
        let our_handle = match side {
            Side::Ours => completed,
            Side::Theirs => other_handle,
        };

        let info = self
            .fragment_info
            .get(&our_handle)
            .ok_or(PaiError::MissingFragmentInfo { handle: our_handle })?;

        Ok(match info.on_intersection {
            OnIntersection::Nothing => Vec::new(),
            OnIntersection::BindReadCap => {
                debug!(our_handle, "intersection: binding read capability");
                vec![PaiOutput::Intersection(PaiIntersection {
                    authorisation: info.authorisation.clone(),
                    handle: our_handle,
                    outer: outer_area(info),
                })]
            }
            OnIntersection::RequestSubspaceCap => {
                debug!(our_handle, "intersection: requesting subspace capability");
                self.requested_subspace_cap_handles.insert(our_handle);
                vec![PaiOutput::RequestSubspaceCapability { handle: our_handle }]
            }
        })
    }
}

impl<S: SyncSchemes> PaiFinder<S> {
    /// Capability privy of one of our intersection handles, for encoding
    /// a `SetupBindReadCapability` against it.
    #[must_use]
    pub fn our_intersection_privy(&self, handle: u64) -> Option<CapabilityPrivy<S>> {
        let info = self.fragment_info.get(&handle)?;
        Some(CapabilityPrivy { namespace: info.namespace.clone(), outer: outer_area(info) })
    }

    /// Capability privy of one of the peer's intersection handles, for
    /// decoding a `SetupBindReadCapability` the peer encoded against it.
    ///
    /// An intersection handle only ever carries a capability after both
    /// sides observed the match, so the group-equal completed fragment on
    /// our side exists and its fragment equals the peer's, which makes
    /// the derived privy identical on both ends.
    #[must_use]
    pub fn their_intersection_privy(&self, handle: u64) -> Option<CapabilityPrivy<S>> {
        let their_state = self.theirs.get(handle)?;

        for (our_handle, state) in self.ours.iter() {
            if !state.is_complete {
                continue;
            }
            if state.is_secondary && their_state.is_secondary {
                continue;
            }
            if !<S::Pai as PaiScheme<S>>::is_group_equal(&state.group, &their_state.group) {
                continue;
            }
            let info = self.fragment_info.get(&our_handle)?;
            return Some(CapabilityPrivy {
                namespace: info.namespace.clone(),
                outer: outer_area(info),
            });
        }
        None
    }

    /// Release one of our intersection handles after the free exchange.
    pub fn free_ours(&mut self, handle: u64) {
        self.ours.free(handle);
        self.fragment_info.remove(&handle);
        self.requested_subspace_cap_handles.remove(&handle);
    }

    /// Release one of the peer's intersection handles.
    pub fn free_theirs(&mut self, handle: u64) {
        self.theirs.free(handle);
    }
}

/// Outer area of a fragment: its subspace selector and path, unbounded in
/// time.
fn outer_area<S: SyncSchemes>(info: &LocalFragmentInfo<S>) -> Area<S> {
    Area {
        subspace: info.subspace.clone(),
        path: info.path.clone(),
        times: Range { start: 0, end: RangeEnd::Open },
    }
}
