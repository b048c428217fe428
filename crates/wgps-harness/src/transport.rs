//! In-memory duplex transport.
//!
//! Two mpsc channels crossed over, with closure propagating the way a
//! real connection does: dropping either side's sender ends the peer's
//! receive stream.

use bytes::Bytes;
use tokio::sync::mpsc;

use wgps_core::transport::{
    Role, Transport, TransportClosed, TransportReceiver, TransportSender,
};

/// One end of an in-memory connection.
#[derive(Debug)]
pub struct DuplexTransport {
    role: Role,
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
}

/// Outbound half of a [`DuplexTransport`].
#[derive(Debug)]
pub struct DuplexSender {
    tx: Option<mpsc::Sender<Bytes>>,
}

/// Inbound half of a [`DuplexTransport`].
#[derive(Debug)]
pub struct DuplexReceiver {
    rx: mpsc::Receiver<Bytes>,
}

/// A connected pair: Alfie's end and Betty's end.
#[must_use]
pub fn pair() -> (DuplexTransport, DuplexTransport) {
    let (alfie_tx, betty_rx) = mpsc::channel(64);
    let (betty_tx, alfie_rx) = mpsc::channel(64);
    (
        DuplexTransport { role: Role::Alfie, tx: alfie_tx, rx: alfie_rx },
        DuplexTransport { role: Role::Betty, tx: betty_tx, rx: betty_rx },
    )
}

impl Transport for DuplexTransport {
    type Sender = DuplexSender;
    type Receiver = DuplexReceiver;

    fn role(&self) -> Role {
        self.role
    }

    fn split(self) -> (Self::Sender, Self::Receiver) {
        (DuplexSender { tx: Some(self.tx) }, DuplexReceiver { rx: self.rx })
    }
}

impl TransportSender for DuplexSender {
    async fn send(&mut self, bytes: Bytes) -> Result<(), TransportClosed> {
        match &self.tx {
            Some(tx) => tx.send(bytes).await.map_err(|_| TransportClosed),
            None => Err(TransportClosed),
        }
    }

    async fn close(&mut self) {
        self.tx = None;
    }

    fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

impl TransportReceiver for DuplexReceiver {
    async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}
