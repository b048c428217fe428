//! Session orchestrator.
//!
//! One session owns one transport and wires the engine together:
//!
//! ```text
//! transport rx ─> GrowingBytes ─> decoder ──> { PAI, stores, events }
//! { PAI events, app inputs } ─> encoder ─> guaranteed queues ─> transport tx
//! ```
//!
//! The orchestrator is a single cooperative task: it interleaves decoding
//! and application inputs at explicit suspension points only, so the
//! handle stores and the PAI state need no locking. Two auxiliary tasks do
//! pure byte shuffling (transport reads into the buffer, queued writes out
//! of it).
//!
//! Every non-benign failure funnels into one shutdown path: close the
//! transport, drain the queues, return a single terminal
//! [`SessionError`]. A peer that closes the transport cleanly between
//! messages ends the session with `Ok(())`.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use wgps_proto::{
    CodecContext, DecodedMessage, Entry, GrowingBytes, HandleType, LogicalChannel, Message,
    ReconciliationPrivy, StreamEnded, decode_message, encode_message,
    grouping::AreaOfInterest,
    messages::{
        CommitmentReveal, ControlAbsolve, ControlIssueGuarantee, PaiBindFragment,
        PaiReplyFragment, PaiReplySubspaceCapability, PaiRequestSubspaceCapability,
        SetupBindAreaOfInterest, SetupBindReadCapability,
    },
    schemes::{
        AccessControlScheme, CapabilityPrivy, NamespaceId, ReadCapability, StaticToken,
        SubspaceCapScheme, SyncSchemes,
    },
};

use crate::{
    credit::{GuaranteedQueue, ReceiverCredit},
    error::SessionError,
    handle_store::HandleStore,
    pai::{PaiFinder, PaiInput, PaiIntersection, PaiOutput, ReadAuthorisation},
    transport::{Role, Transport, TransportReceiver, TransportSender},
};

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// The commitment nonce revealed at session start. Must be exactly
    /// `CHALLENGE_LENGTH` bytes of the scheme bundle in use.
    pub commitment_nonce: Bytes,
    /// Byte capacity guaranteed to the peer on each logical channel.
    pub channel_capacity: u64,
}

impl SessionOptions {
    /// Options with the default per-channel capacity.
    #[must_use]
    pub fn new(commitment_nonce: Bytes) -> Self {
        Self { commitment_nonce, channel_capacity: 4096 }
    }
}

/// Requests the application side feeds into a running session.
#[derive(Debug, Clone)]
pub enum SessionInput<S: SyncSchemes> {
    /// Offer an authorisation to private area intersection.
    SubmitAuthorisation(ReadAuthorisation<S>),
    /// Send a message (reconciliation, data, or static token binds).
    /// Control and PAI messages are managed by the session itself.
    Send(Message<S>),
}

/// Events a running session surfaces to the application side.
#[derive(Debug, Clone)]
pub enum SessionEvent<S: SyncSchemes> {
    /// We bound a capability and an area of interest after an
    /// intersection.
    OurInterest {
        /// Handle of the bound read capability.
        capability_handle: u64,
        /// Handle of the bound area of interest.
        aoi_handle: u64,
        /// The area of interest itself.
        area_of_interest: AreaOfInterest<S>,
        /// Namespace it belongs to.
        namespace: NamespaceId<S>,
    },
    /// The peer bound a validated area of interest; reconciliation for
    /// the overlap may start.
    PeerInterest {
        /// The peer's authorising capability handle.
        authorisation: u64,
        /// The peer's area-of-interest handle.
        aoi_handle: u64,
        /// The area of interest itself.
        area_of_interest: AreaOfInterest<S>,
        /// Namespace it belongs to.
        namespace: NamespaceId<S>,
    },
    /// A validated reconciliation or data message for the store layer.
    Message(Message<S>),
}

/// Application-side handle to a running session.
#[derive(Debug)]
pub struct SessionHandle<S: SyncSchemes> {
    inputs: mpsc::Sender<SessionInput<S>>,
    events: mpsc::Receiver<SessionEvent<S>>,
}

impl<S: SyncSchemes> SessionHandle<S> {
    /// Offer an authorisation to PAI. Returns `false` if the session has
    /// already terminated.
    pub async fn submit_authorisation(&self, authorisation: ReadAuthorisation<S>) -> bool {
        self.inputs
            .send(SessionInput::SubmitAuthorisation(authorisation))
            .await
            .is_ok()
    }

    /// Send a message through the session's credit framing.
    pub async fn send(&self, message: Message<S>) -> bool {
        self.inputs.send(SessionInput::Send(message)).await.is_ok()
    }

    /// Next session event; `None` once the session has terminated.
    pub async fn next_event(&mut self) -> Option<SessionEvent<S>> {
        self.events.recv().await
    }
}

/// A bound area of interest with its resolved namespace.
#[derive(Debug, Clone)]
struct AoiState<S: SyncSchemes> {
    #[allow(dead_code)]
    area_of_interest: AreaOfInterest<S>,
    namespace: NamespaceId<S>,
}

enum Wake<S: SyncSchemes> {
    Input(Option<SessionInput<S>>),
    Bytes(Result<(), StreamEnded>),
}

/// One WGPS session over one transport.
pub struct Session<S: SyncSchemes, T: Transport> {
    role: Role,
    options: SessionOptions,
    transport: Option<T>,
    chunk_tx: Option<mpsc::Sender<Bytes>>,
    outbound_tx: Option<mpsc::Sender<Bytes>>,
    outbound_rx: Option<mpsc::Receiver<Bytes>>,

    bytes: GrowingBytes,
    our_privy: ReconciliationPrivy<S>,
    their_privy: ReconciliationPrivy<S>,

    pai: PaiFinder<S>,
    our_caps: HandleStore<ReadCapability<S>>,
    their_caps: HandleStore<ReadCapability<S>>,
    our_aois: HandleStore<AoiState<S>>,
    their_aois: HandleStore<AoiState<S>>,
    our_static_tokens: HandleStore<StaticToken<S>>,
    their_static_tokens: HandleStore<StaticToken<S>>,
    our_payload_requests: HandleStore<Entry<S>>,
    their_payload_requests: HandleStore<(Entry<S>, u64)>,

    queues: [GuaranteedQueue; 7],
    receivers: [ReceiverCredit; 7],
    peer_dropping: [bool; 7],
    peer_revealed: bool,

    inputs: mpsc::Receiver<SessionInput<S>>,
    inputs_open: bool,
    events_tx: mpsc::Sender<SessionEvent<S>>,
}

impl<S: SyncSchemes, T: Transport> Session<S, T> {
    /// Build a session over `transport`, returning the application-side
    /// handle. Nothing happens until [`Session::run`] is awaited.
    #[must_use]
    pub fn new(transport: T, options: SessionOptions) -> (Self, SessionHandle<S>) {
        let (input_tx, input_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (chunk_tx, bytes) = GrowingBytes::pair(64);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);

        let capacity = options.channel_capacity;
        let session = Self {
            role: transport.role(),
            options,
            transport: Some(transport),
            chunk_tx: Some(chunk_tx),
            outbound_tx: Some(outbound_tx),
            outbound_rx: Some(outbound_rx),
            bytes,
            our_privy: ReconciliationPrivy::new(),
            their_privy: ReconciliationPrivy::new(),
            pai: PaiFinder::new(),
            our_caps: HandleStore::new(),
            their_caps: HandleStore::new(),
            our_aois: HandleStore::new(),
            their_aois: HandleStore::new(),
            our_static_tokens: HandleStore::new(),
            their_static_tokens: HandleStore::new(),
            our_payload_requests: HandleStore::new(),
            their_payload_requests: HandleStore::new(),
            queues: LogicalChannel::ALL.map(|_| GuaranteedQueue::new()),
            receivers: LogicalChannel::ALL.map(|channel| ReceiverCredit::new(channel, capacity)),
            peer_dropping: [false; 7],
            peer_revealed: false,
            inputs: input_rx,
            inputs_open: true,
            events_tx: event_tx,
        };
        (session, SessionHandle { inputs: input_tx, events: event_rx })
    }

    /// True while the peer reports dropping our messages on `channel`.
    #[must_use]
    pub fn is_peer_dropping(&self, channel: LogicalChannel) -> bool {
        self.peer_dropping[index(channel)]
    }

    /// Run the session to completion.
    ///
    /// Terminates with `Ok(())` when the peer closes the transport on a
    /// message boundary, or with the first fatal error otherwise. Either
    /// way the transport is closed and the auxiliary tasks have exited
    /// before this returns.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let transport = self
            .transport
            .take()
            .ok_or(SessionError::Invariant("session run twice"))?;
        let (mut tx_half, mut rx_half) = transport.split();

        let chunk_tx = self
            .chunk_tx
            .take()
            .ok_or(SessionError::Invariant("missing chunk sender"))?;
        let feeder = tokio::spawn(async move {
            while let Some(chunk) = rx_half.recv().await {
                if chunk_tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });

        let mut outbound_rx = self
            .outbound_rx
            .take()
            .ok_or(SessionError::Invariant("missing outbound receiver"))?;
        let writer = tokio::spawn(async move {
            while let Some(blob) = outbound_rx.recv().await {
                if tx_half.send(blob).await.is_err() {
                    break;
                }
            }
            tx_half.close().await;
        });

        debug!(role = ?self.role, "session starting");
        let result = self.drive().await;
        match &result {
            Ok(()) => debug!("session ended cleanly"),
            Err(error) => warn!(%error, "session failed, closing transport"),
        }

        // Single shutdown path: closing the outbound channel lets the
        // writer drain and close the transport; the feeder ends once the
        // peer's stream does (or is aborted if it never will).
        self.outbound_tx = None;
        let _ = writer.await;
        feeder.abort();
        let _ = feeder.await;

        result
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        if self.options.commitment_nonce.len() != S::CHALLENGE_LENGTH {
            return Err(SessionError::CommitmentLength {
                actual: self.options.commitment_nonce.len(),
                expected: S::CHALLENGE_LENGTH,
            });
        }

        let nonce = self.options.commitment_nonce.clone();
        self.send_message(Message::CommitmentReveal(CommitmentReveal { nonce })).await?;

        for channel in LogicalChannel::ALL {
            let amount = self.receivers[index(channel)].initial_guarantee();
            self.send_message(Message::ControlIssueGuarantee(ControlIssueGuarantee {
                amount,
                channel,
            }))
            .await?;
        }

        loop {
            let wake = {
                let inputs_open = self.inputs_open;
                let inputs = &mut self.inputs;
                let bytes = &mut self.bytes;
                tokio::select! {
                    biased;
                    input = inputs.recv(), if inputs_open => Wake::Input(input),
                    waited = bytes.wait_absolute(1) => Wake::Bytes(waited),
                }
            };

            match wake {
                Wake::Input(Some(input)) => self.on_input(input).await?,
                Wake::Input(None) => self.inputs_open = false,
                Wake::Bytes(Ok(())) => {
                    let decoded = {
                        let view = DecodeView {
                            pai: &self.pai,
                            caps: &self.their_caps,
                            aois: &self.our_aois,
                        };
                        decode_message(&mut self.bytes, &mut self.their_privy, &view).await?
                    };
                    match decoded {
                        Some(decoded) => self.on_message(decoded).await?,
                        None => return Ok(()),
                    }
                }
                Wake::Bytes(Err(StreamEnded)) => return Ok(()),
            }
        }
    }

    async fn on_input(&mut self, input: SessionInput<S>) -> Result<(), SessionError> {
        match input {
            SessionInput::SubmitAuthorisation(authorisation) => {
                self.on_pai_input(PaiInput::SubmitAuthorisation(authorisation)).await
            }
            SessionInput::Send(message) => {
                // Our own binds allocate their handle at send time; the
                // peer allocates the mirror handle in receive order.
                match &message {
                    Message::SetupBindStaticToken(m) => {
                        self.our_static_tokens.bind(m.static_token.clone());
                    }
                    Message::DataBindPayloadRequest(m) => {
                        self.our_payload_requests.bind(m.entry.clone());
                    }
                    _ => {}
                }
                self.send_message(message).await
            }
        }
    }

    async fn on_message(&mut self, decoded: DecodedMessage<S>) -> Result<(), SessionError> {
        let DecodedMessage { message, length } = decoded;
        debug!(kind = message.kind(), length, "received message");

        if let Some(channel) = message.channel()
            && let Some(refill) = self.receivers[index(channel)].admit(length)?
        {
            self.send_message(Message::ControlIssueGuarantee(ControlIssueGuarantee {
                amount: refill,
                channel,
            }))
            .await?;
        }

        match message {
            Message::CommitmentReveal(_) => {
                if self.peer_revealed {
                    return Err(SessionError::DuplicateCommitmentReveal);
                }
                self.peer_revealed = true;
                Ok(())
            }

            Message::ControlIssueGuarantee(m) => {
                let ready = self.queues[index(m.channel)].receive_guarantee(m.amount, m.channel)?;
                self.push_outbound(ready).await;
                Ok(())
            }
            Message::ControlAbsolve(m) => {
                self.receivers[index(m.channel)].absolved(m.amount)?;
                Ok(())
            }
            Message::ControlPlead(m) => {
                let absolved = self.queues[index(m.channel)].plead(m.target);
                if absolved > 0 {
                    self.send_message(Message::ControlAbsolve(ControlAbsolve {
                        amount: absolved,
                        channel: m.channel,
                    }))
                    .await?;
                }
                Ok(())
            }
            Message::ControlLimitSending(m) => {
                debug!(channel = ?m.channel, bound = m.bound, "peer limited its sending");
                Ok(())
            }
            Message::ControlLimitReceiving(m) => {
                debug!(channel = ?m.channel, bound = m.bound, "peer limited its receiving");
                Ok(())
            }
            Message::ControlAnnounceDropping(m) => {
                warn!(channel = ?m.channel, "peer started dropping our messages");
                self.peer_dropping[index(m.channel)] = true;
                Ok(())
            }
            Message::ControlApologise(m) => {
                debug!(channel = ?m.channel, "peer stopped dropping");
                self.peer_dropping[index(m.channel)] = false;
                Ok(())
            }
            Message::ControlFree(m) => {
                self.free_handle(m.handle, m.mine, m.handle_type);
                Ok(())
            }

            Message::PaiBindFragment(m) => {
                self.on_pai_input(PaiInput::ReceivedBind {
                    group: m.group,
                    is_secondary: m.is_secondary,
                })
                .await
            }
            Message::PaiReplyFragment(m) => {
                self.on_pai_input(PaiInput::ReceivedReply { handle: m.handle, group: m.group })
                    .await
            }
            Message::PaiRequestSubspaceCapability(m) => {
                self.on_pai_input(PaiInput::ReceivedSubspaceCapRequest { handle: m.handle }).await
            }
            Message::PaiReplySubspaceCapability(m) => {
                if !<S::SubspaceCap as SubspaceCapScheme<S>>::is_valid(&m.capability) {
                    return Err(SessionError::InvalidCapability);
                }
                let namespace =
                    <S::SubspaceCap as SubspaceCapScheme<S>>::granted_namespace(&m.capability);
                self.on_pai_input(PaiInput::ReceivedVerifiedSubspaceCapReply {
                    handle: m.handle,
                    namespace,
                })
                .await
            }

            Message::SetupBindReadCapability(m) => {
                if !<S::AccessControl as AccessControlScheme<S>>::is_valid(&m.capability) {
                    return Err(SessionError::InvalidCapability);
                }
                self.their_caps.bind(m.capability);
                Ok(())
            }
            Message::SetupBindAreaOfInterest(m) => {
                let capability = self
                    .their_caps
                    .get(m.authorisation)
                    .ok_or(SessionError::UnknownHandle {
                        handle: m.authorisation,
                        what: "capability",
                    })?;
                let granted =
                    <S::AccessControl as AccessControlScheme<S>>::granted_area(capability);
                if !granted.includes_area(&m.area_of_interest.area) {
                    return Err(SessionError::AreaNotGranted { handle: m.authorisation });
                }
                let namespace =
                    <S::AccessControl as AccessControlScheme<S>>::granted_namespace(capability);
                let aoi_handle = self.their_aois.bind(AoiState {
                    area_of_interest: m.area_of_interest.clone(),
                    namespace: namespace.clone(),
                });
                self.emit(SessionEvent::PeerInterest {
                    authorisation: m.authorisation,
                    aoi_handle,
                    area_of_interest: m.area_of_interest,
                    namespace,
                })
                .await;
                Ok(())
            }
            Message::SetupBindStaticToken(m) => {
                self.their_static_tokens.bind(m.static_token);
                Ok(())
            }

            Message::ReconciliationSendFingerprint(ref m) => {
                self.require_aoi_pair(m.sender_handle, m.receiver_handle)?;
                self.emit(SessionEvent::Message(message)).await;
                Ok(())
            }
            Message::ReconciliationAnnounceEntries(ref m) => {
                self.require_aoi_pair(m.sender_handle, m.receiver_handle)?;
                self.emit(SessionEvent::Message(message)).await;
                Ok(())
            }
            Message::ReconciliationSendEntry(ref m) => {
                if !self.their_static_tokens.is_bound(m.static_token_handle) {
                    return Err(SessionError::UnknownHandle {
                        handle: m.static_token_handle,
                        what: "static token",
                    });
                }
                self.emit(SessionEvent::Message(message)).await;
                Ok(())
            }

            Message::DataSendEntry(ref m) => {
                if !self.their_static_tokens.is_bound(m.static_token_handle) {
                    return Err(SessionError::UnknownHandle {
                        handle: m.static_token_handle,
                        what: "static token",
                    });
                }
                self.emit(SessionEvent::Message(message)).await;
                Ok(())
            }
            Message::DataSendPayload(_) => {
                self.emit(SessionEvent::Message(message)).await;
                Ok(())
            }
            Message::DataSetMetadata(ref m) => {
                self.require_aoi_pair(m.sender_handle, m.receiver_handle)?;
                self.emit(SessionEvent::Message(message)).await;
                Ok(())
            }
            Message::DataBindPayloadRequest(ref m) => {
                if !self.their_caps.is_bound(m.capability_handle) {
                    return Err(SessionError::UnknownHandle {
                        handle: m.capability_handle,
                        what: "capability",
                    });
                }
                self.their_payload_requests.bind((m.entry.clone(), m.offset));
                self.emit(SessionEvent::Message(message)).await;
                Ok(())
            }
            Message::DataReplyPayload(ref m) => {
                if !self.our_payload_requests.is_bound(m.handle) {
                    return Err(SessionError::UnknownHandle {
                        handle: m.handle,
                        what: "payload request",
                    });
                }
                self.emit(SessionEvent::Message(message)).await;
                Ok(())
            }
        }
    }

    /// Reconciliation handles: the sender side refers to the peer's
    /// bindings, the receiver side to ours.
    fn require_aoi_pair(&self, sender: u64, receiver: u64) -> Result<(), SessionError> {
        if !self.their_aois.is_bound(sender) {
            return Err(SessionError::UnknownHandle { handle: sender, what: "area of interest" });
        }
        if !self.our_aois.is_bound(receiver) {
            return Err(SessionError::UnknownHandle {
                handle: receiver,
                what: "area of interest",
            });
        }
        Ok(())
    }

    fn free_handle(&mut self, handle: u64, mine: bool, handle_type: HandleType) {
        // `mine` is from the sender's perspective: true means the peer
        // bound the handle, so it lives in our mirror of their space.
        match (mine, handle_type) {
            (true, HandleType::Intersection) => self.pai.free_theirs(handle),
            (false, HandleType::Intersection) => self.pai.free_ours(handle),
            (true, HandleType::Capability) => {
                self.their_caps.free(handle);
            }
            (false, HandleType::Capability) => {
                self.our_caps.free(handle);
            }
            (true, HandleType::AreaOfInterest) => {
                self.their_aois.free(handle);
            }
            (false, HandleType::AreaOfInterest) => {
                self.our_aois.free(handle);
            }
            (true, HandleType::PayloadRequest) => {
                self.their_payload_requests.free(handle);
            }
            (false, HandleType::PayloadRequest) => {
                self.our_payload_requests.free(handle);
            }
            (true, HandleType::StaticToken) => {
                self.their_static_tokens.free(handle);
            }
            (false, HandleType::StaticToken) => {
                self.our_static_tokens.free(handle);
            }
        }
    }

    async fn on_pai_input(&mut self, input: PaiInput<S>) -> Result<(), SessionError> {
        let outputs = self.pai.handle(input).await?;
        for output in outputs {
            self.on_pai_output(output).await?;
        }
        Ok(())
    }

    async fn on_pai_output(&mut self, output: PaiOutput<S>) -> Result<(), SessionError> {
        match output {
            PaiOutput::BindFragment { group, is_secondary } => {
                self.send_message(Message::PaiBindFragment(PaiBindFragment {
                    group,
                    is_secondary,
                }))
                .await
            }
            PaiOutput::ReplyFragment { handle, group } => {
                self.send_message(Message::PaiReplyFragment(PaiReplyFragment { handle, group }))
                    .await
            }
            PaiOutput::RequestSubspaceCapability { handle } => {
                self.send_message(Message::PaiRequestSubspaceCapability(
                    PaiRequestSubspaceCapability { handle },
                ))
                .await
            }
            PaiOutput::ReplySubspaceCapability { handle, capability, signature } => {
                self.send_message(Message::PaiReplySubspaceCapability(
                    PaiReplySubspaceCapability { handle, capability, signature },
                ))
                .await
            }
            PaiOutput::Intersection(intersection) => self.on_intersection(intersection).await,
        }
    }

    /// An intersection: bind and send our capability, then declare an
    /// interest covering its whole granted area.
    async fn on_intersection(
        &mut self,
        intersection: PaiIntersection<S>,
    ) -> Result<(), SessionError> {
        let ReadAuthorisation { capability, sync_signature, .. } = intersection.authorisation;
        let namespace =
            <S::AccessControl as AccessControlScheme<S>>::granted_namespace(&capability);
        let granted = <S::AccessControl as AccessControlScheme<S>>::granted_area(&capability);

        let capability_handle = self.our_caps.bind(capability.clone());
        self.send_message(Message::SetupBindReadCapability(SetupBindReadCapability {
            handle: intersection.handle,
            capability,
            signature: sync_signature,
        }))
        .await?;

        let area_of_interest = AreaOfInterest::unbounded(granted);
        let aoi_handle = self.our_aois.bind(AoiState {
            area_of_interest: area_of_interest.clone(),
            namespace: namespace.clone(),
        });
        self.send_message(Message::SetupBindAreaOfInterest(SetupBindAreaOfInterest {
            authorisation: capability_handle,
            area_of_interest: area_of_interest.clone(),
        }))
        .await?;

        self.emit(SessionEvent::OurInterest {
            capability_handle,
            aoi_handle,
            area_of_interest,
            namespace,
        })
        .await;
        Ok(())
    }

    /// Encode a message and route it: control-plane blobs go straight
    /// out, channel messages through their guaranteed queue.
    async fn send_message(&mut self, message: Message<S>) -> Result<(), SessionError> {
        debug!(kind = message.kind(), "sending message");
        let encoded = {
            let view =
                EncodeView { pai: &self.pai, caps: &self.our_caps, aois: &self.our_aois };
            encode_message(&message, &mut self.our_privy, &view)?
        };

        match encoded.channel {
            None => self.push_outbound(vec![encoded.bytes]).await,
            Some(channel) => {
                let ready = self.queues[index(channel)].enqueue(encoded.bytes);
                self.push_outbound(ready).await;
            }
        }
        Ok(())
    }

    async fn push_outbound(&mut self, blobs: Vec<Bytes>) {
        // A missing sender means shutdown is underway; the queues are
        // draining and the bytes have nowhere to go.
        if let Some(tx) = &self.outbound_tx {
            for blob in blobs {
                if tx.send(blob).await.is_err() {
                    break;
                }
            }
        }
    }

    async fn emit(&mut self, event: SessionEvent<S>) {
        // The application dropping its handle is not an error; the
        // session keeps serving the peer.
        let _ = self.events_tx.send(event).await;
    }
}

fn index(channel: LogicalChannel) -> usize {
    channel.to_byte() as usize
}

/// Codec context over the sending side's own stores.
struct EncodeView<'a, S: SyncSchemes> {
    pai: &'a PaiFinder<S>,
    caps: &'a HandleStore<ReadCapability<S>>,
    aois: &'a HandleStore<AoiState<S>>,
}

impl<S: SyncSchemes> CodecContext<S> for EncodeView<'_, S> {
    fn intersection_privy(&self, handle: u64) -> Option<CapabilityPrivy<S>> {
        self.pai.our_intersection_privy(handle)
    }

    fn capability_privy(&self, handle: u64) -> Option<CapabilityPrivy<S>> {
        self.caps.get(handle).map(capability_privy::<S>)
    }

    fn aoi_namespace(&self, sender_handle: u64, _receiver_handle: u64) -> Option<NamespaceId<S>> {
        self.aois.get(sender_handle).map(|state| state.namespace.clone())
    }
}

/// Codec context over the receiving side's mirror stores.
struct DecodeView<'a, S: SyncSchemes> {
    pai: &'a PaiFinder<S>,
    caps: &'a HandleStore<ReadCapability<S>>,
    aois: &'a HandleStore<AoiState<S>>,
}

impl<S: SyncSchemes> CodecContext<S> for DecodeView<'_, S> {
    fn intersection_privy(&self, handle: u64) -> Option<CapabilityPrivy<S>> {
        self.pai.their_intersection_privy(handle)
    }

    fn capability_privy(&self, handle: u64) -> Option<CapabilityPrivy<S>> {
        self.caps.get(handle).map(capability_privy::<S>)
    }

    fn aoi_namespace(&self, _sender_handle: u64, receiver_handle: u64) -> Option<NamespaceId<S>> {
        self.aois.get(receiver_handle).map(|state| state.namespace.clone())
    }
}

fn capability_privy<S: SyncSchemes>(capability: &ReadCapability<S>) -> CapabilityPrivy<S> {
    CapabilityPrivy {
        namespace: <S::AccessControl as AccessControlScheme<S>>::granted_namespace(capability),
        outer: <S::AccessControl as AccessControlScheme<S>>::granted_area(capability),
    }
}
