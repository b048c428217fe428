//! Parameter schemes: the per-deployment plug points of the protocol.
//!
//! WGPS is generic over its cryptographic and identifier primitives. Every
//! deployment supplies concrete namespace/subspace/digest encodings, a PAI
//! group, capability formats, token formats, and a fingerprint scheme; the
//! engine itself never looks inside any of these values. The
//! [`SyncSchemes`] bundle trait collects one implementation of each scheme
//! and is the single type parameter threaded through messages, codec, and
//! session.
//!
//! All codecs here are pure: encoding is infallible and synchronous,
//! decoding consumes a [`GrowingBytes`] incrementally and may suspend.
//! Scheme bundles are stateless marker types; per-session state (such as
//! the PAI scalar) is held by the engine, not the scheme.

use std::{cmp::Ordering, fmt, future::Future};

use crate::{
    error::DecodeError,
    fragment::{Fragment, FragmentKit},
    grouping::Area,
    growing_bytes::GrowingBytes,
};

/// An encodable protocol parameter: namespaces, subspaces, payload digests.
///
/// # Invariants
///
/// - `decode` must accept exactly the bytes `encode` produces and consume
///   nothing beyond them.
/// - `Value::default()` is the codec baseline at session start (the value
///   relative encodings resolve against before anything was exchanged).
pub trait ParameterScheme: Send + Sync + 'static {
    /// The parameter value itself.
    type Value: Clone + PartialEq + Eq + Default + fmt::Debug + Send + Sync + 'static;

    /// Append the encoding of `value` to `out`.
    fn encode(value: &Self::Value, out: &mut Vec<u8>);

    /// Decode one value from the stream, consuming exactly its encoding.
    fn decode(
        bytes: &mut GrowingBytes,
    ) -> impl Future<Output = Result<Self::Value, DecodeError>> + Send;
}

/// Subspace identifiers additionally carry a total order.
///
/// The order is what makes subspace ranges meaningful; `Ord` on the value
/// type must agree with the semantic order of the deployment.
pub trait SubspaceScheme: ParameterScheme<Value: Ord> {
    /// Total order over subspace identifiers.
    fn order(a: &Self::Value, b: &Self::Value) -> Ordering {
        a.cmp(b)
    }
}

/// Static limits on path shape.
pub trait PathScheme: Send + Sync + 'static {
    /// Maximum byte length of a single component.
    const MAX_COMPONENT_LENGTH: usize;
    /// Maximum number of components in a path.
    const MAX_COMPONENT_COUNT: usize;
}

/// The commutative-blinding group behind private area intersection.
///
/// # Invariants
///
/// - `scalar_mult` must commute: multiplying by scalar `a` then `b` yields
///   a group element equal (under `is_group_equal`) to multiplying by `b`
///   then `a`. This is what lets both peers blind each other's fragments
///   and still detect equality.
/// - `fragment_to_group` must be deterministic and injective up to
///   negligible collision probability; in particular pair and triple
///   fragments over the same path must map to distinct elements.
pub trait PaiScheme<S: SyncSchemes>: Send + Sync + 'static {
    /// A blinded (or unblinded) group element.
    type GroupElement: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static;
    /// A private blinding scalar.
    type Scalar: Clone + Send + Sync + 'static;

    /// Hash a fragment into the group.
    fn fragment_to_group(
        fragment: &Fragment<S>,
    ) -> impl Future<Output = Self::GroupElement> + Send;

    /// Draw a fresh private scalar for one session.
    fn generate_scalar() -> Self::Scalar;

    /// Multiply a group element by a scalar.
    fn scalar_mult(
        group: &Self::GroupElement,
        scalar: &Self::Scalar,
    ) -> impl Future<Output = Self::GroupElement> + Send;

    /// Group element equality. PAI must compare through this, never `==`,
    /// so schemes with non-canonical representations stay correct.
    fn is_group_equal(a: &Self::GroupElement, b: &Self::GroupElement) -> bool;

    /// Derive the fragment kit of a read capability.
    ///
    /// Capabilities granting a single subspace produce
    /// [`FragmentKit::Selective`]; capabilities granting every subspace
    /// produce [`FragmentKit::Complete`].
    fn fragment_kit(capability: &ReadCapability<S>) -> FragmentKit<S>;

    /// Append the wire encoding of a group element.
    fn encode_group_member(group: &Self::GroupElement, out: &mut Vec<u8>);

    /// Decode one group element from the stream.
    fn decode_group_member(
        bytes: &mut GrowingBytes,
    ) -> impl Future<Output = Result<Self::GroupElement, DecodeError>> + Send;
}

/// Context a read capability is encoded against.
///
/// Capabilities travel only after an intersection establishes shared
/// knowledge of a namespace and an outer area; the capability encoding may
/// omit everything this privy already pins down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityPrivy<S: SyncSchemes> {
    /// Namespace both peers already know.
    pub namespace: NamespaceId<S>,
    /// Outer area the capability's granted area is contained in.
    pub outer: Area<S>,
}

/// Read capabilities and their signatures.
pub trait AccessControlScheme<S: SyncSchemes>: Send + Sync + 'static {
    /// A signed grant to read an area of a namespace.
    type ReadCapability: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static;
    /// The public identity a capability is granted to.
    type Receiver: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static;
    /// Signature binding a capability to a session challenge.
    type SyncSignature: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static;

    /// The identity this capability was granted to.
    fn receiver(capability: &Self::ReadCapability) -> &Self::Receiver;

    /// Namespace the capability grants access to.
    fn granted_namespace(capability: &Self::ReadCapability) -> NamespaceId<S>;

    /// Area the capability grants access to.
    fn granted_area(capability: &Self::ReadCapability) -> Area<S>;

    /// Structural validity of the capability (delegation chain, signatures).
    fn is_valid(capability: &Self::ReadCapability) -> bool;

    /// Append the encoding of `capability` relative to `privy`.
    fn encode_capability(
        capability: &Self::ReadCapability,
        privy: &CapabilityPrivy<S>,
        out: &mut Vec<u8>,
    );

    /// Decode a capability encoded relative to `privy`.
    fn decode_capability(
        bytes: &mut GrowingBytes,
        privy: &CapabilityPrivy<S>,
    ) -> impl Future<Output = Result<Self::ReadCapability, DecodeError>> + Send;

    /// Append the encoding of a sync signature.
    fn encode_signature(signature: &Self::SyncSignature, out: &mut Vec<u8>);

    /// Decode one sync signature.
    fn decode_signature(
        bytes: &mut GrowingBytes,
    ) -> impl Future<Output = Result<Self::SyncSignature, DecodeError>> + Send;
}

/// Subspace capabilities: proofs of access to every subspace at a path.
pub trait SubspaceCapScheme<S: SyncSchemes>: Send + Sync + 'static {
    /// A signed grant covering all subspaces of a namespace.
    type SubspaceCapability: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static;
    /// Signature binding a subspace capability to a session challenge.
    type SubspaceSignature: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static;

    /// Namespace the capability covers.
    fn granted_namespace(capability: &Self::SubspaceCapability) -> NamespaceId<S>;

    /// Structural validity of the capability.
    fn is_valid(capability: &Self::SubspaceCapability) -> bool;

    /// Append the encoding of a subspace capability.
    fn encode_capability(capability: &Self::SubspaceCapability, out: &mut Vec<u8>);

    /// Decode one subspace capability.
    fn decode_capability(
        bytes: &mut GrowingBytes,
    ) -> impl Future<Output = Result<Self::SubspaceCapability, DecodeError>> + Send;

    /// Append the encoding of a subspace signature.
    fn encode_signature(signature: &Self::SubspaceSignature, out: &mut Vec<u8>);

    /// Decode one subspace signature.
    fn decode_signature(
        bytes: &mut GrowingBytes,
    ) -> impl Future<Output = Result<Self::SubspaceSignature, DecodeError>> + Send;
}

/// Authorisation tokens, split into a handle-bound static half and a
/// per-message dynamic half.
pub trait AuthorisationTokenScheme<S: SyncSchemes>: Send + Sync + 'static {
    /// The full token proving an entry was written with authorisation.
    type AuthorisationToken: Clone + fmt::Debug + Send + Sync + 'static;
    /// Half shared across many entries, bound once to a handle.
    type StaticToken: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static;
    /// Half unique per entry, travelling inline.
    type DynamicToken: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static;

    /// Reassemble a full token from its halves.
    fn recompose(
        static_token: &Self::StaticToken,
        dynamic_token: &Self::DynamicToken,
    ) -> Self::AuthorisationToken;

    /// Split a full token into its halves.
    fn decompose(token: Self::AuthorisationToken) -> (Self::StaticToken, Self::DynamicToken);

    /// Append the encoding of a static token.
    fn encode_static(token: &Self::StaticToken, out: &mut Vec<u8>);

    /// Decode one static token.
    fn decode_static(
        bytes: &mut GrowingBytes,
    ) -> impl Future<Output = Result<Self::StaticToken, DecodeError>> + Send;

    /// Append the encoding of a dynamic token.
    fn encode_dynamic(token: &Self::DynamicToken, out: &mut Vec<u8>);

    /// Decode one dynamic token.
    fn decode_dynamic(
        bytes: &mut GrowingBytes,
    ) -> impl Future<Output = Result<Self::DynamicToken, DecodeError>> + Send;
}

/// Range fingerprints used by reconciliation.
pub trait FingerprintScheme<S: SyncSchemes>: Send + Sync + 'static {
    /// The fingerprint value.
    type Fingerprint: Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static;

    /// Fingerprint of the empty set of entries.
    ///
    /// The wire format has a dedicated flag for this value, so announcing
    /// an empty range costs no fingerprint bytes.
    fn neutral() -> Self::Fingerprint;

    /// Append the encoding of a fingerprint.
    fn encode(fingerprint: &Self::Fingerprint, out: &mut Vec<u8>);

    /// Decode one fingerprint.
    fn decode(
        bytes: &mut GrowingBytes,
    ) -> impl Future<Output = Result<Self::Fingerprint, DecodeError>> + Send;
}

/// Bundle of one scheme per protocol concern.
///
/// Implementations are stateless markers; the `Clone`/`Eq`/`Debug`
/// supertraits exist so protocol types generic over the bundle can derive
/// their own impls.
pub trait SyncSchemes:
    Sized + Clone + PartialEq + Eq + fmt::Debug + Send + Sync + 'static
{
    /// Namespace identifier scheme.
    type Namespace: ParameterScheme;
    /// Subspace identifier scheme (totally ordered).
    type Subspace: SubspaceScheme;
    /// Payload digest scheme.
    type PayloadDigest: ParameterScheme;
    /// Path shape limits.
    type Path: PathScheme;
    /// Private area intersection group.
    type Pai: PaiScheme<Self>;
    /// Read capability scheme.
    type AccessControl: AccessControlScheme<Self>;
    /// Subspace capability scheme.
    type SubspaceCap: SubspaceCapScheme<Self>;
    /// Authorisation token scheme.
    type AuthorisationToken: AuthorisationTokenScheme<Self>;
    /// Range fingerprint scheme.
    type Fingerprint: FingerprintScheme<Self>;

    /// Byte length of the commitment nonce both peers reveal at startup.
    const CHALLENGE_LENGTH: usize;
}

/// Namespace identifier of a scheme bundle.
pub type NamespaceId<S> = <<S as SyncSchemes>::Namespace as ParameterScheme>::Value;
/// Subspace identifier of a scheme bundle.
pub type SubspaceId<S> = <<S as SyncSchemes>::Subspace as ParameterScheme>::Value;
/// Payload digest of a scheme bundle.
pub type PayloadDigest<S> = <<S as SyncSchemes>::PayloadDigest as ParameterScheme>::Value;
/// PAI group element of a scheme bundle.
pub type GroupElement<S> = <<S as SyncSchemes>::Pai as PaiScheme<S>>::GroupElement;
/// PAI blinding scalar of a scheme bundle.
pub type Scalar<S> = <<S as SyncSchemes>::Pai as PaiScheme<S>>::Scalar;
/// Read capability of a scheme bundle.
pub type ReadCapability<S> =
    <<S as SyncSchemes>::AccessControl as AccessControlScheme<S>>::ReadCapability;
/// Capability receiver identity of a scheme bundle.
pub type CapabilityReceiver<S> =
    <<S as SyncSchemes>::AccessControl as AccessControlScheme<S>>::Receiver;
/// Sync signature of a scheme bundle.
pub type SyncSignature<S> =
    <<S as SyncSchemes>::AccessControl as AccessControlScheme<S>>::SyncSignature;
/// Subspace capability of a scheme bundle.
pub type SubspaceCapability<S> =
    <<S as SyncSchemes>::SubspaceCap as SubspaceCapScheme<S>>::SubspaceCapability;
/// Subspace signature of a scheme bundle.
pub type SubspaceSignature<S> =
    <<S as SyncSchemes>::SubspaceCap as SubspaceCapScheme<S>>::SubspaceSignature;
/// Static authorisation token of a scheme bundle.
pub type StaticToken<S> =
    <<S as SyncSchemes>::AuthorisationToken as AuthorisationTokenScheme<S>>::StaticToken;
/// Dynamic authorisation token of a scheme bundle.
pub type DynamicToken<S> =
    <<S as SyncSchemes>::AuthorisationToken as AuthorisationTokenScheme<S>>::DynamicToken;
/// Range fingerprint of a scheme bundle.
pub type Fingerprint<S> = <<S as SyncSchemes>::Fingerprint as FingerprintScheme<S>>::Fingerprint;
