//! WGPS engine: everything between the wire layer and the application.
//!
//! `wgps-proto` turns bytes into messages; this crate decides what the
//! messages mean. It owns the handle stores, the per-channel credit
//! accounting, the private area intersection state machine, and the
//! session orchestrator that wires them all over a transport.
//!
//! The concurrency model is cooperative: one session is one logical task
//! (plus two byte-shuffling helpers), state is owned rather than shared,
//! and tasks interleave only at explicit suspension points. See the
//! `session` module for the full data flow.

pub mod credit;
pub mod error;
pub mod handle_store;
pub mod pai;
pub mod session;
pub mod transport;

pub use credit::{GuaranteedQueue, ReceiverCredit};
pub use error::{CreditError, PaiError, SessionError};
pub use handle_store::HandleStore;
pub use pai::{PaiFinder, PaiInput, PaiIntersection, PaiOutput, ReadAuthorisation};
pub use session::{Session, SessionEvent, SessionHandle, SessionInput, SessionOptions};
pub use transport::{Role, Transport, TransportClosed, TransportReceiver, TransportSender};
