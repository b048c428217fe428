//! The `TestSchemes` bundle: fixed-width everything.
//!
//! Identifiers, digests, tokens, fingerprints, and group elements are all
//! 8-byte big-endian integers. The PAI group hashes a fragment with
//! SHA-256 and blinds by multiplying with odd scalars modulo 2^64:
//! multiplication commutes and odd scalars are invertible, which is all
//! the engine's tests need. None of this hides anything from an actual
//! adversary; it exists purely to drive the state machines.

use bytes::Bytes;
use sha2::{Digest, Sha256};

use wgps_core::pai::ReadAuthorisation;
use wgps_proto::{
    error::DecodeError,
    fragment::{Fragment, FragmentKit},
    grouping::{Area, AreaSubspace, Range, RangeEnd},
    growing_bytes::GrowingBytes,
    path::{Path, decode_path, encode_path},
    schemes::{
        AccessControlScheme, AuthorisationTokenScheme, CapabilityPrivy, FingerprintScheme,
        PaiScheme, ParameterScheme, PathScheme, SubspaceCapScheme, SubspaceScheme, SyncSchemes,
    },
};

/// The scheme bundle used by every engine test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSchemes;

/// 64-bit namespace identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TestNamespace(pub u64);

/// 64-bit subspace identifier, ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TestSubspace(pub u64);

/// 64-bit payload digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TestDigest(pub u64);

/// An element of the toy blinding group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestGroupElement(pub u64);

/// A read capability: a namespace, an optional single subspace (none
/// means every subspace), a path, and a receiver identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReadCapability {
    /// Granted namespace.
    pub namespace: TestNamespace,
    /// Granted subspace, or `None` for all subspaces.
    pub subspace: Option<TestSubspace>,
    /// Granted path prefix.
    pub path: Path,
    /// Receiver identity the capability was issued to.
    pub receiver: u64,
}

/// A subspace capability: proof of any-subspace access in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSubspaceCapability {
    /// Covered namespace.
    pub namespace: TestNamespace,
    /// Receiver identity.
    pub receiver: u64,
}

/// Trivial signature stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestSignature(pub u64);

/// Static half of an authorisation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestStaticToken(pub u64);

/// Dynamic half of an authorisation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestDynamicToken(pub u64);

/// A recomposed authorisation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestAuthorisationToken {
    /// Static half.
    pub static_token: TestStaticToken,
    /// Dynamic half.
    pub dynamic_token: TestDynamicToken,
}

/// 64-bit range fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestFingerprint(pub u64);

fn put_u64(value: u64, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_be_bytes());
}

async fn take_u64(bytes: &mut GrowingBytes) -> Result<u64, DecodeError> {
    let taken = bytes.take(8).await?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&taken);
    Ok(u64::from_be_bytes(raw))
}

/// Namespace scheme: 8 big-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestNamespaceScheme;

impl ParameterScheme for TestNamespaceScheme {
    type Value = TestNamespace;

    fn encode(value: &Self::Value, out: &mut Vec<u8>) {
        put_u64(value.0, out);
    }

    async fn decode(bytes: &mut GrowingBytes) -> Result<Self::Value, DecodeError> {
        Ok(TestNamespace(take_u64(bytes).await?))
    }
}

/// Subspace scheme: 8 big-endian bytes, numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSubspaceScheme;

impl ParameterScheme for TestSubspaceScheme {
    type Value = TestSubspace;

    fn encode(value: &Self::Value, out: &mut Vec<u8>) {
        put_u64(value.0, out);
    }

    async fn decode(bytes: &mut GrowingBytes) -> Result<Self::Value, DecodeError> {
        Ok(TestSubspace(take_u64(bytes).await?))
    }
}

impl SubspaceScheme for TestSubspaceScheme {}

/// Digest scheme: 8 big-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestDigestScheme;

impl ParameterScheme for TestDigestScheme {
    type Value = TestDigest;

    fn encode(value: &Self::Value, out: &mut Vec<u8>) {
        put_u64(value.0, out);
    }

    async fn decode(bytes: &mut GrowingBytes) -> Result<Self::Value, DecodeError> {
        Ok(TestDigest(take_u64(bytes).await?))
    }
}

/// Small limits so limit violations are easy to trigger in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestPathLimits;

impl PathScheme for TestPathLimits {
    const MAX_COMPONENT_LENGTH: usize = 64;
    const MAX_COMPONENT_COUNT: usize = 16;
}

/// The toy PAI group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestPaiScheme;

impl PaiScheme<TestSchemes> for TestPaiScheme {
    type GroupElement = TestGroupElement;
    type Scalar = u64;

    async fn fragment_to_group(fragment: &Fragment<TestSchemes>) -> Self::GroupElement {
        let mut hasher = Sha256::new();
        match fragment {
            Fragment::Pair { namespace, path } => {
                hasher.update([0u8]);
                hasher.update(namespace.0.to_be_bytes());
                let mut encoded = Vec::new();
                encode_path(path, &mut encoded);
                hasher.update(&encoded);
            }
            Fragment::Triple { namespace, subspace, path } => {
                hasher.update([1u8]);
                hasher.update(namespace.0.to_be_bytes());
                hasher.update(subspace.0.to_be_bytes());
                let mut encoded = Vec::new();
                encode_path(path, &mut encoded);
                hasher.update(&encoded);
            }
        }
        let digest = hasher.finalize();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        TestGroupElement(u64::from_be_bytes(raw))
    }

    fn generate_scalar() -> Self::Scalar {
        // Odd scalars are units modulo 2^64, so blinding is invertible
        // and commutative.
        rand::random::<u64>() | 1
    }

    async fn scalar_mult(
        group: &Self::GroupElement,
        scalar: &Self::Scalar,
    ) -> Self::GroupElement {
        TestGroupElement(group.0.wrapping_mul(*scalar))
    }

    fn is_group_equal(a: &Self::GroupElement, b: &Self::GroupElement) -> bool {
        a == b
    }

    fn fragment_kit(capability: &TestReadCapability) -> FragmentKit<TestSchemes> {
        match capability.subspace {
            Some(subspace) => FragmentKit::Selective {
                namespace: capability.namespace,
                subspace,
                path: capability.path.clone(),
            },
            None => FragmentKit::Complete {
                namespace: capability.namespace,
                path: capability.path.clone(),
            },
        }
    }

    fn encode_group_member(group: &Self::GroupElement, out: &mut Vec<u8>) {
        put_u64(group.0, out);
    }

    async fn decode_group_member(
        bytes: &mut GrowingBytes,
    ) -> Result<Self::GroupElement, DecodeError> {
        Ok(TestGroupElement(take_u64(bytes).await?))
    }
}

/// Capabilities are encoded in full; the privy is ignored because the
/// test capability is already tiny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestAccessControl;

impl AccessControlScheme<TestSchemes> for TestAccessControl {
    type ReadCapability = TestReadCapability;
    type Receiver = u64;
    type SyncSignature = TestSignature;

    fn receiver(capability: &Self::ReadCapability) -> &Self::Receiver {
        &capability.receiver
    }

    fn granted_namespace(capability: &Self::ReadCapability) -> TestNamespace {
        capability.namespace
    }

    fn granted_area(capability: &Self::ReadCapability) -> Area<TestSchemes> {
        Area {
            subspace: match capability.subspace {
                Some(subspace) => AreaSubspace::Id(subspace),
                None => AreaSubspace::Any,
            },
            path: capability.path.clone(),
            times: Range { start: 0, end: RangeEnd::Open },
        }
    }

    fn is_valid(_capability: &Self::ReadCapability) -> bool {
        true
    }

    fn encode_capability(
        capability: &Self::ReadCapability,
        _privy: &CapabilityPrivy<TestSchemes>,
        out: &mut Vec<u8>,
    ) {
        put_u64(capability.namespace.0, out);
        match capability.subspace {
            Some(subspace) => {
                out.push(1);
                put_u64(subspace.0, out);
            }
            None => out.push(0),
        }
        encode_path(&capability.path, out);
        put_u64(capability.receiver, out);
    }

    async fn decode_capability(
        bytes: &mut GrowingBytes,
        _privy: &CapabilityPrivy<TestSchemes>,
    ) -> Result<Self::ReadCapability, DecodeError> {
        let namespace = TestNamespace(take_u64(bytes).await?);
        let subspace = match bytes.take_byte().await? {
            0 => None,
            1 => Some(TestSubspace(take_u64(bytes).await?)),
            _ => return Err(DecodeError::InvalidParameter("read capability")),
        };
        let path = decode_path(
            bytes,
            TestPathLimits::MAX_COMPONENT_COUNT,
            TestPathLimits::MAX_COMPONENT_LENGTH,
        )
        .await?;
        let receiver = take_u64(bytes).await?;
        Ok(TestReadCapability { namespace, subspace, path, receiver })
    }

    fn encode_signature(signature: &Self::SyncSignature, out: &mut Vec<u8>) {
        put_u64(signature.0, out);
    }

    async fn decode_signature(
        bytes: &mut GrowingBytes,
    ) -> Result<Self::SyncSignature, DecodeError> {
        Ok(TestSignature(take_u64(bytes).await?))
    }
}

/// Subspace capabilities: namespace plus receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSubspaceCapScheme;

impl SubspaceCapScheme<TestSchemes> for TestSubspaceCapScheme {
    type SubspaceCapability = TestSubspaceCapability;
    type SubspaceSignature = TestSignature;

    fn granted_namespace(capability: &Self::SubspaceCapability) -> TestNamespace {
        capability.namespace
    }

    fn is_valid(_capability: &Self::SubspaceCapability) -> bool {
        true
    }

    fn encode_capability(capability: &Self::SubspaceCapability, out: &mut Vec<u8>) {
        put_u64(capability.namespace.0, out);
        put_u64(capability.receiver, out);
    }

    async fn decode_capability(
        bytes: &mut GrowingBytes,
    ) -> Result<Self::SubspaceCapability, DecodeError> {
        let namespace = TestNamespace(take_u64(bytes).await?);
        let receiver = take_u64(bytes).await?;
        Ok(TestSubspaceCapability { namespace, receiver })
    }

    fn encode_signature(signature: &Self::SubspaceSignature, out: &mut Vec<u8>) {
        put_u64(signature.0, out);
    }

    async fn decode_signature(
        bytes: &mut GrowingBytes,
    ) -> Result<Self::SubspaceSignature, DecodeError> {
        Ok(TestSignature(take_u64(bytes).await?))
    }
}

/// Token scheme: both halves are bare integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestTokenScheme;

impl AuthorisationTokenScheme<TestSchemes> for TestTokenScheme {
    type AuthorisationToken = TestAuthorisationToken;
    type StaticToken = TestStaticToken;
    type DynamicToken = TestDynamicToken;

    fn recompose(
        static_token: &Self::StaticToken,
        dynamic_token: &Self::DynamicToken,
    ) -> Self::AuthorisationToken {
        TestAuthorisationToken { static_token: *static_token, dynamic_token: *dynamic_token }
    }

    fn decompose(token: Self::AuthorisationToken) -> (Self::StaticToken, Self::DynamicToken) {
        (token.static_token, token.dynamic_token)
    }

    fn encode_static(token: &Self::StaticToken, out: &mut Vec<u8>) {
        put_u64(token.0, out);
    }

    async fn decode_static(bytes: &mut GrowingBytes) -> Result<Self::StaticToken, DecodeError> {
        Ok(TestStaticToken(take_u64(bytes).await?))
    }

    fn encode_dynamic(token: &Self::DynamicToken, out: &mut Vec<u8>) {
        put_u64(token.0, out);
    }

    async fn decode_dynamic(bytes: &mut GrowingBytes) -> Result<Self::DynamicToken, DecodeError> {
        Ok(TestDynamicToken(take_u64(bytes).await?))
    }
}

/// Fingerprint scheme: 8 bytes, zero is neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestFingerprintScheme;

impl FingerprintScheme<TestSchemes> for TestFingerprintScheme {
    type Fingerprint = TestFingerprint;

    fn neutral() -> Self::Fingerprint {
        TestFingerprint(0)
    }

    fn encode(fingerprint: &Self::Fingerprint, out: &mut Vec<u8>) {
        put_u64(fingerprint.0, out);
    }

    async fn decode(bytes: &mut GrowingBytes) -> Result<Self::Fingerprint, DecodeError> {
        Ok(TestFingerprint(take_u64(bytes).await?))
    }
}

impl SyncSchemes for TestSchemes {
    type Namespace = TestNamespaceScheme;
    type Subspace = TestSubspaceScheme;
    type PayloadDigest = TestDigestScheme;
    type Path = TestPathLimits;
    type Pai = TestPaiScheme;
    type AccessControl = TestAccessControl;
    type SubspaceCap = TestSubspaceCapScheme;
    type AuthorisationToken = TestTokenScheme;
    type Fingerprint = TestFingerprintScheme;

    const CHALLENGE_LENGTH: usize = 16;
}

/// A commitment nonce of the right length for [`TestSchemes`].
#[must_use]
pub fn test_nonce(fill: u8) -> Bytes {
    Bytes::from(vec![fill; TestSchemes::CHALLENGE_LENGTH])
}

/// Authorisation granting a single subspace at `path`.
///
/// Selective capabilities carry no subspace capability; on intersection
/// through their secondary fragments they request one from the peer.
#[must_use]
pub fn selective_authorisation(
    namespace: u64,
    subspace: u64,
    path: Path,
    receiver: u64,
) -> ReadAuthorisation<TestSchemes> {
    ReadAuthorisation {
        capability: TestReadCapability {
            namespace: TestNamespace(namespace),
            subspace: Some(TestSubspace(subspace)),
            path,
            receiver,
        },
        sync_signature: TestSignature(receiver),
        subspace_capability: None,
    }
}

/// Authorisation granting every subspace at `path`, with the subspace
/// capability proving it.
#[must_use]
pub fn complete_authorisation(
    namespace: u64,
    path: Path,
    receiver: u64,
) -> ReadAuthorisation<TestSchemes> {
    ReadAuthorisation {
        capability: TestReadCapability {
            namespace: TestNamespace(namespace),
            subspace: None,
            path,
            receiver,
        },
        sync_signature: TestSignature(receiver),
        subspace_capability: Some((
            TestSubspaceCapability { namespace: TestNamespace(namespace), receiver },
            TestSignature(receiver),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blinding_commutes() {
        let fragment: Fragment<TestSchemes> = Fragment::Pair {
            namespace: TestNamespace(1),
            path: Path::from_slices(&[b"a"]),
        };
        let base = TestPaiScheme::fragment_to_group(&fragment).await;

        let ours = TestPaiScheme::generate_scalar();
        let theirs = TestPaiScheme::generate_scalar();

        let ours_first =
            TestPaiScheme::scalar_mult(&TestPaiScheme::scalar_mult(&base, &ours).await, &theirs)
                .await;
        let theirs_first =
            TestPaiScheme::scalar_mult(&TestPaiScheme::scalar_mult(&base, &theirs).await, &ours)
                .await;

        assert!(TestPaiScheme::is_group_equal(&ours_first, &theirs_first));
    }

    #[tokio::test]
    async fn pair_and_triple_over_the_same_path_differ() {
        let path = Path::from_slices(&[b"a"]);
        let pair: Fragment<TestSchemes> =
            Fragment::Pair { namespace: TestNamespace(1), path: path.clone() };
        let triple: Fragment<TestSchemes> = Fragment::Triple {
            namespace: TestNamespace(1),
            subspace: TestSubspace(0),
            path,
        };

        let a = TestPaiScheme::fragment_to_group(&pair).await;
        let b = TestPaiScheme::fragment_to_group(&triple).await;
        assert!(!TestPaiScheme::is_group_equal(&a, &b));
    }

    #[test]
    fn tokens_recompose_and_decompose() {
        let token = TestTokenScheme::recompose(&TestStaticToken(3), &TestDynamicToken(4));
        assert_eq!(
            TestTokenScheme::decompose(token),
            (TestStaticToken(3), TestDynamicToken(4))
        );
    }
}
