//! Transport abstraction.
//!
//! The engine asks very little of its transport: an ordered bidirectional
//! byte stream with a closure signal and a role marker. Sending and receiving are split into separate halves so the
//! session can run its read loop and write loop as independent tasks; a
//! transport that cannot be split can hand out clones of a shared
//! connection.

use std::future::Future;

use bytes::Bytes;
use thiserror::Error;

/// Which side of the session this peer plays.
///
/// Alfie initiates the underlying connection, Betty accepts it. The
/// engine itself is symmetric; the role exists for tie-breaking in layers
/// above and for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The initiating peer.
    Alfie,
    /// The accepting peer.
    Betty,
}

/// The peer closed the connection; no more bytes can be sent.
///
/// This is the benign terminal state of a session, not a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("transport closed")]
pub struct TransportClosed;

/// A bidirectional byte stream to one peer.
pub trait Transport: Send + 'static {
    /// Outbound half.
    type Sender: TransportSender;
    /// Inbound half.
    type Receiver: TransportReceiver;

    /// Which role this side plays.
    fn role(&self) -> Role;

    /// Split into independently owned halves.
    fn split(self) -> (Self::Sender, Self::Receiver);
}

/// Outbound half of a transport.
pub trait TransportSender: Send + 'static {
    /// Send one chunk of bytes, preserving order.
    fn send(&mut self, bytes: Bytes) -> impl Future<Output = Result<(), TransportClosed>> + Send;

    /// Close the connection. Idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// True once the connection is closed in either direction.
    fn is_closed(&self) -> bool;
}

/// Inbound half of a transport.
pub trait TransportReceiver: Send + 'static {
    /// Receive the next chunk; `None` once the stream has ended.
    fn recv(&mut self) -> impl Future<Output = Option<Bytes>> + Send;
}
