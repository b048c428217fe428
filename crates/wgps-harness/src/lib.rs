//! Test support for the WGPS engine.
//!
//! Everything here is deliberately small and deterministic: fixed-width
//! identifier schemes, a toy (insecure!) commutative PAI group, trivial
//! capabilities and tokens, and an in-memory duplex transport. The point
//! is to exercise the engine's logic, not to be cryptography.

pub mod schemes;
pub mod transport;

pub use schemes::{
    TestNamespace, TestSchemes, TestSubspace, complete_authorisation, selective_authorisation,
    test_nonce,
};
pub use transport::{DuplexTransport, pair};
