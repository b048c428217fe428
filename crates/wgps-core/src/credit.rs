//! Per-channel credit accounting.
//!
//! Each logical channel is flow-controlled independently in each
//! direction. The sender side holds a [`GuaranteedQueue`]: encoded
//! messages wait in order until enough granted bytes accumulate, and every
//! release decrements the grant. The receiver side holds a
//! [`ReceiverCredit`]: it issues guarantees up front, charges every
//! decoded message against them, and refills when the outstanding grant
//! runs low.
//!
//! Both are pure state machines in the style of the session layer: methods
//! take events and return what must be sent, the caller does the I/O.

use std::collections::VecDeque;

use bytes::Bytes;

use wgps_proto::LogicalChannel;

use crate::error::CreditError;

/// Outbound half: messages queued until the peer's guarantees cover them.
///
/// # Invariants
///
/// - Messages leave in the order they were enqueued (per-channel ordering
///   is a protocol guarantee).
/// - A message is released only when the full encoded length fits in the
///   available credit, and the credit is debited at release time.
#[derive(Debug, Default)]
pub struct GuaranteedQueue {
    available: u64,
    queue: VecDeque<Bytes>,
}

impl GuaranteedQueue {
    /// Empty queue with zero credit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of credit currently available.
    #[must_use]
    pub fn available(&self) -> u64 {
        self.available
    }

    /// Number of messages waiting for credit.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Enqueue an encoded message; returns every message (including
    /// possibly this one) that the current credit now covers, in order.
    pub fn enqueue(&mut self, blob: Bytes) -> Vec<Bytes> {
        self.queue.push_back(blob);
        self.release()
    }

    /// Absorb an `IssueGuarantee` from the peer.
    ///
    /// # Errors
    ///
    /// [`CreditError::Overflow`] if the grant would overflow the
    /// accumulator; only a hostile peer can get near `u64::MAX`.
    pub fn receive_guarantee(
        &mut self,
        amount: u64,
        channel: LogicalChannel,
    ) -> Result<Vec<Bytes>, CreditError> {
        self.available = self
            .available
            .checked_add(amount)
            .ok_or(CreditError::Overflow { channel })?;
        Ok(self.release())
    }

    /// Handle a `Plead{target}` from the peer: reduce remaining credit to
    /// `target` and return how many bytes were absolved (to be announced
    /// back with a `ControlAbsolve`). Returns 0 when no reduction applies.
    pub fn plead(&mut self, target: u64) -> u64 {
        if self.available > target {
            let absolved = self.available - target;
            self.available = target;
            absolved
        } else {
            0
        }
    }

    fn release(&mut self) -> Vec<Bytes> {
        let mut ready = Vec::new();
        while let Some(front) = self.queue.front() {
            let length = front.len() as u64;
            if length > self.available {
                break;
            }
            self.available -= length;
            // Length was just checked against the front element.
            if let Some(blob) = self.queue.pop_front() {
                ready.push(blob);
            }
        }
        ready
    }
}

/// Inbound half: guarantees issued to the peer and their consumption.
///
/// When the outstanding grant drops below half the configured capacity the
/// receiver tops it back up; the returned refill amount must be sent to
/// the peer as a `ControlIssueGuarantee`.
#[derive(Debug)]
pub struct ReceiverCredit {
    channel: LogicalChannel,
    capacity: u64,
    outstanding: u64,
    dropping: bool,
}

impl ReceiverCredit {
    /// Admission control for one channel with the given byte capacity.
    #[must_use]
    pub fn new(channel: LogicalChannel, capacity: u64) -> Self {
        Self { channel, capacity, outstanding: 0, dropping: false }
    }

    /// The initial guarantee to issue at session start.
    pub fn initial_guarantee(&mut self) -> u64 {
        self.outstanding = self.capacity;
        self.capacity
    }

    /// Bytes the peer may still send.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    /// Charge one decoded message of `length` bytes.
    ///
    /// Returns the refill amount to issue, if the low-water mark was
    /// crossed.
    ///
    /// # Errors
    ///
    /// [`CreditError::Overrun`] if the peer sent beyond its guarantee.
    /// That is a fatal sender-side bug in the peer.
    pub fn admit(&mut self, length: u64) -> Result<Option<u64>, CreditError> {
        if length > self.outstanding {
            return Err(CreditError::Overrun {
                channel: self.channel,
                overrun: length - self.outstanding,
            });
        }
        self.outstanding -= length;

        if self.outstanding < self.capacity / 2 {
            let refill = self.capacity - self.outstanding;
            self.outstanding = self.capacity;
            Ok(Some(refill))
        } else {
            Ok(None)
        }
    }

    /// The peer voluntarily forfeited `amount` bytes of its grant.
    ///
    /// # Errors
    ///
    /// [`CreditError::Overrun`] if the peer absolves more than it holds.
    pub fn absolved(&mut self, amount: u64) -> Result<(), CreditError> {
        if amount > self.outstanding {
            return Err(CreditError::Overrun {
                channel: self.channel,
                overrun: amount - self.outstanding,
            });
        }
        self.outstanding -= amount;
        Ok(())
    }

    /// Enter or leave the dropping state; returns `true` if the state
    /// changed (and an `AnnounceDropping`/`Apologise` must be sent).
    pub fn set_dropping(&mut self, dropping: bool) -> bool {
        if self.dropping == dropping {
            return false;
        }
        self.dropping = dropping;
        true
    }

    /// True while messages on this channel are being dropped.
    #[must_use]
    pub fn is_dropping(&self) -> bool {
        self.dropping
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn blob(length: usize) -> Bytes {
        Bytes::from(vec![0u8; length])
    }

    #[test]
    fn messages_wait_for_credit() {
        let mut queue = GuaranteedQueue::new();

        assert!(queue.enqueue(blob(10)).is_empty());
        assert_eq!(queue.queued(), 1);

        let ready = queue
            .receive_guarantee(25, LogicalChannel::Intersection)
            .unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(queue.available(), 15);
    }

    #[test]
    fn release_preserves_order_and_stops_at_first_oversized() {
        let mut queue = GuaranteedQueue::new();
        queue.receive_guarantee(10, LogicalChannel::Data).unwrap();

        assert_eq!(queue.enqueue(blob(4)).len(), 1);
        assert!(queue.enqueue(blob(20)).is_empty());
        // Credit remains but the queue head is too large; later small
        // messages must not overtake it.
        assert!(queue.enqueue(blob(1)).is_empty());

        let ready = queue.receive_guarantee(30, LogicalChannel::Data).unwrap();
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].len(), 20);
        assert_eq!(ready[1].len(), 1);
    }

    #[test]
    fn plead_absolves_down_to_target() {
        let mut queue = GuaranteedQueue::new();
        queue.receive_guarantee(100, LogicalChannel::Capability).unwrap();

        assert_eq!(queue.plead(30), 70);
        assert_eq!(queue.available(), 30);
        assert_eq!(queue.plead(30), 0);
        assert_eq!(queue.plead(50), 0);
    }

    #[test]
    fn guarantee_overflow_is_fatal() {
        let mut queue = GuaranteedQueue::new();
        queue.receive_guarantee(u64::MAX, LogicalChannel::Data).unwrap();
        let result = queue.receive_guarantee(1, LogicalChannel::Data);
        assert_eq!(result, Err(CreditError::Overflow { channel: LogicalChannel::Data }));
    }

    #[test]
    fn receiver_charges_and_refills() {
        let mut credit = ReceiverCredit::new(LogicalChannel::Reconciliation, 100);
        assert_eq!(credit.initial_guarantee(), 100);

        assert_eq!(credit.admit(30).unwrap(), None);
        assert_eq!(credit.outstanding(), 70);

        // Crossing the half-way mark tops the grant back up.
        assert_eq!(credit.admit(25).unwrap(), Some(55));
        assert_eq!(credit.outstanding(), 100);
    }

    #[test]
    fn receiver_overrun_is_fatal() {
        let mut credit = ReceiverCredit::new(LogicalChannel::Data, 10);
        credit.initial_guarantee();

        let result = credit.admit(11);
        assert_eq!(
            result,
            Err(CreditError::Overrun { channel: LogicalChannel::Data, overrun: 1 })
        );
    }

    #[test]
    fn dropping_transitions_fire_once() {
        let mut credit = ReceiverCredit::new(LogicalChannel::Data, 10);
        assert!(credit.set_dropping(true));
        assert!(!credit.set_dropping(true));
        assert!(credit.set_dropping(false));
    }
}
