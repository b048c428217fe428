//! Rolling reconciliation context ("privy").
//!
//! The reconciliation wire format leans on what was just exchanged: ranges
//! encode relative to the previous range, entries relative to the previous
//! entry, handles collapse to a flag bit when unchanged. Both directions of
//! a session keep one privy per side (the encoder updates its copy as it
//! sends, the decoder updates its copy as it receives) and the two stay
//! byte-for-byte in agreement because they observe the same message
//! sequence.
//!
//! The privy also resolves the one genuinely ambiguous point of the tag
//! table: a first byte in `0x50..=0x5f` is a `ReconciliationSendEntry`
//! while announced entries remain outstanding, and a
//! `ReconciliationAnnounceEntries` otherwise.

use crate::{
    entry::Entry,
    grouping::Range3d,
    messages::{
        ReconciliationAnnounceEntries, ReconciliationSendEntry, ReconciliationSendFingerprint,
    },
    schemes::{NamespaceId, SyncSchemes},
};

/// Rolling context for the reconciliation message family.
///
/// All fields have defined defaults so the first message of a session can
/// already use relative encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPrivy<S: SyncSchemes> {
    /// The most recently exchanged 3-D range.
    pub prev_range: Range3d<S>,
    /// Sender-side area-of-interest handle of the last message.
    pub prev_sender_handle: u64,
    /// Receiver-side area-of-interest handle of the last message.
    pub prev_receiver_handle: u64,
    /// The most recently exchanged entry.
    pub prev_entry: Entry<S>,
    /// Static token handle of the last entry.
    pub prev_static_token_handle: u64,
    /// Range of the most recent entry announcement.
    pub announced_range: Range3d<S>,
    /// Namespace of the most recent entry announcement.
    pub announced_namespace: NamespaceId<S>,
    /// How many announced entries are still outstanding.
    pub announced_entries_remaining: u64,
    /// True while an announcement that wants a response has not been
    /// answered by a matching announcement from the other direction.
    pub is_awaiting_termination: bool,
}

impl<S: SyncSchemes> Default for ReconciliationPrivy<S> {
    fn default() -> Self {
        Self {
            prev_range: Range3d::full(),
            prev_sender_handle: 0,
            prev_receiver_handle: 0,
            prev_entry: Entry::default(),
            prev_static_token_handle: 0,
            announced_range: Range3d::full(),
            announced_namespace: NamespaceId::<S>::default(),
            announced_entries_remaining: 0,
            is_awaiting_termination: false,
        }
    }
}

impl<S: SyncSchemes> ReconciliationPrivy<S> {
    /// Fresh privy with session-start defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the next `0x50`-family first byte is a
    /// `ReconciliationSendEntry` rather than an announcement.
    #[must_use]
    pub fn expects_send_entry(&self) -> bool {
        self.announced_entries_remaining > 0
    }

    /// Record a fingerprint message.
    pub fn note_fingerprint(&mut self, message: &ReconciliationSendFingerprint<S>) {
        self.prev_range = message.range.clone();
        self.prev_sender_handle = message.sender_handle;
        self.prev_receiver_handle = message.receiver_handle;
    }

    /// Record an announcement.
    ///
    /// `namespace` is the namespace of the announced area-of-interest
    /// pairing when the caller can resolve it; `None` leaves the previous
    /// value in place.
    pub fn note_announcement(
        &mut self,
        message: &ReconciliationAnnounceEntries<S>,
        namespace: Option<NamespaceId<S>>,
    ) {
        self.prev_range = message.range.clone();
        self.prev_sender_handle = message.sender_handle;
        self.prev_receiver_handle = message.receiver_handle;
        self.announced_range = message.range.clone();
        if let Some(namespace) = namespace {
            self.announced_namespace = namespace;
        }
        self.announced_entries_remaining = message.count;
        self.is_awaiting_termination = message.wants_response;
    }

    /// Record one announced entry.
    ///
    /// Must only be called while entries are outstanding; the decoder's
    /// dispatch guarantees this on the receive path.
    pub fn note_entry(&mut self, message: &ReconciliationSendEntry<S>) {
        debug_assert!(self.announced_entries_remaining > 0);
        self.prev_entry = message.entry.clone();
        self.prev_static_token_handle = message.static_token_handle;
        self.announced_entries_remaining = self.announced_entries_remaining.saturating_sub(1);
    }
}
