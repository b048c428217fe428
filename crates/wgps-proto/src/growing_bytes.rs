//! Incremental byte buffer between the transport and the decoder.
//!
//! One producer (the transport read loop) appends chunks in arrival order
//! through an mpsc channel; one consumer (the decoder task) owns the
//! [`GrowingBytes`] and suspends on [`GrowingBytes::wait_absolute`] until
//! enough bytes have accumulated. Exclusive ownership by a single task is
//! what enforces the at-most-one-waiter rule: a `&mut self` future is the
//! only way to wait.
//!
//! Closing the producer half is the end-of-stream signal. A pending wait
//! that can no longer be satisfied resolves to [`StreamEnded`].

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::compact_width::{CompactWidth, compact_from_be};

/// The producer closed and the buffered bytes cannot satisfy the wait.
///
/// Whether this is benign depends on where it happens: before the first
/// byte of a message it is a clean shutdown, in the middle of one it is a
/// decode error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("byte stream ended")]
pub struct StreamEnded;

/// Single-consumer growing byte buffer fed by a chunk channel.
///
/// # Invariants
///
/// - Chunks are appended in the order the producer sent them; pruning only
///   ever removes a prefix.
/// - Callers must read [`GrowingBytes::slice`] before calling
///   [`GrowingBytes::prune`]: pruning shrinks the buffer, so a slice taken
///   earlier may alias bytes that are no longer part of the stream.
#[derive(Debug)]
pub struct GrowingBytes {
    buffer: BytesMut,
    chunks: mpsc::Receiver<Bytes>,
    ended: bool,
    consumed: u64,
}

impl GrowingBytes {
    /// Wrap a chunk receiver. The matching sender is the producer half.
    #[must_use]
    pub fn new(chunks: mpsc::Receiver<Bytes>) -> Self {
        Self { buffer: BytesMut::new(), chunks, ended: false, consumed: 0 }
    }

    /// Convenience constructor returning the producer half alongside.
    #[must_use]
    pub fn pair(capacity: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    /// Number of buffered bytes currently available without waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if no bytes are currently buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total bytes pruned from the front since creation.
    ///
    /// The decoder uses the difference across a message to learn the
    /// message's encoded length for credit accounting.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// The currently buffered bytes.
    #[must_use]
    pub fn slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Suspend until at least `target` bytes are buffered.
    ///
    /// Resolves immediately if the buffer is already long enough. The
    /// target is absolute (buffer length, not bytes-since-call), so an
    /// interleaved [`GrowingBytes::prune`] by the same task moves the goal.
    ///
    /// # Errors
    ///
    /// [`StreamEnded`] if the producer closed before `target` bytes
    /// arrived.
    pub async fn wait_absolute(&mut self, target: usize) -> Result<(), StreamEnded> {
        while self.buffer.len() < target {
            if self.ended {
                return Err(StreamEnded);
            }
            match self.chunks.recv().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => self.ended = true,
            }
        }
        Ok(())
    }

    /// Drop the first `count` bytes.
    ///
    /// `count` must not exceed the buffered length; the decoder only ever
    /// prunes bytes it has already observed via [`GrowingBytes::slice`].
    pub fn prune(&mut self, count: usize) {
        debug_assert!(count <= self.buffer.len());
        self.buffer.advance(count);
        self.consumed += count as u64;
    }

    /// Wait for `count` bytes, then remove and return them.
    pub async fn take(&mut self, count: usize) -> Result<Bytes, StreamEnded> {
        self.wait_absolute(count).await?;
        let bytes = self.buffer.split_to(count).freeze();
        self.consumed += count as u64;
        Ok(bytes)
    }

    /// Wait for one byte and return it without removing it.
    pub async fn peek_byte(&mut self) -> Result<u8, StreamEnded> {
        self.wait_absolute(1).await?;
        Ok(self.buffer[0])
    }

    /// Wait for one byte, remove it, and return it.
    pub async fn take_byte(&mut self) -> Result<u8, StreamEnded> {
        self.wait_absolute(1).await?;
        let byte = self.buffer[0];
        self.prune(1);
        Ok(byte)
    }

    /// Remove and decode a compact integer of the given width.
    pub async fn take_compact(&mut self, width: CompactWidth) -> Result<u64, StreamEnded> {
        let count = width.bytes();
        self.wait_absolute(count).await?;
        let value = compact_from_be(width, &self.buffer[..count]);
        self.prune(count);
        Ok(value)
    }

    /// Remove and decode a compact integer with a leading width byte.
    ///
    /// Counterpart of [`crate::compact_width::put_tagged`].
    pub async fn take_tagged(&mut self) -> Result<u64, StreamEnded> {
        let tag = self.take_byte().await?;
        self.take_compact(CompactWidth::from_tag_bits(tag)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_immediately_when_satisfied() {
        let (tx, mut bytes) = GrowingBytes::pair(4);
        tx.send(Bytes::from_static(b"abcd")).await.unwrap();

        bytes.wait_absolute(4).await.unwrap();
        assert_eq!(bytes.slice(), b"abcd");
    }

    #[tokio::test]
    async fn accumulates_across_chunks() {
        let (tx, mut bytes) = GrowingBytes::pair(4);

        let feeder = tokio::spawn(async move {
            tx.send(Bytes::from_static(b"ab")).await.unwrap();
            tx.send(Bytes::from_static(b"cd")).await.unwrap();
            tx.send(Bytes::from_static(b"ef")).await.unwrap();
        });

        bytes.wait_absolute(5).await.unwrap();
        assert!(bytes.len() >= 5);
        feeder.await.unwrap();
    }

    #[tokio::test]
    async fn prune_removes_prefix_only() {
        let (tx, mut bytes) = GrowingBytes::pair(4);
        tx.send(Bytes::from_static(b"abcdef")).await.unwrap();

        bytes.wait_absolute(6).await.unwrap();
        bytes.prune(2);
        assert_eq!(bytes.slice(), b"cdef");
        assert_eq!(bytes.consumed(), 2);
    }

    #[tokio::test]
    async fn closed_producer_ends_stream() {
        let (tx, mut bytes) = GrowingBytes::pair(4);
        tx.send(Bytes::from_static(b"ab")).await.unwrap();
        drop(tx);

        // The two buffered bytes are still readable.
        bytes.wait_absolute(2).await.unwrap();
        // Anything beyond them is not.
        assert_eq!(bytes.wait_absolute(3).await, Err(StreamEnded));
    }

    #[tokio::test]
    async fn tagged_round_trip() {
        use crate::compact_width::put_tagged;

        let mut wire = Vec::new();
        put_tagged(&mut wire, 0x1234);

        let (tx, mut bytes) = GrowingBytes::pair(1);
        tx.send(Bytes::from(wire)).await.unwrap();

        assert_eq!(bytes.take_tagged().await.unwrap(), 0x1234);
        assert!(bytes.is_empty());
    }
}
