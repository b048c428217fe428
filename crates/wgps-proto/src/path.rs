//! Hierarchical paths: sequences of byte-string components.
//!
//! Paths order entries hierarchically; prefix relationships drive both the
//! PAI fragment derivation (every prefix of an authorised path becomes a
//! fragment) and the relative wire encodings (paths are encoded as a
//! common-prefix count plus a suffix against some reference path).
//!
//! Component count and length limits come from the deployment's path
//! scheme; this type itself is unbounded and the codec enforces the limits
//! on decode.

use bytes::Bytes;

use crate::{
    compact_width::put_tagged,
    error::DecodeError,
    growing_bytes::GrowingBytes,
};

/// One path component: an opaque byte string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Component(Bytes);

impl Component {
    /// Wrap raw bytes as a component.
    #[must_use]
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// Copy a slice into a component.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    /// Component bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty component.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A path: zero or more components, outermost first.
///
/// Ordering is lexicographic by component, which matches the ordering that
/// 3-D range boundaries use on the path dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Path {
    components: Vec<Component>,
}

impl Path {
    /// The empty path, prefix of every path.
    #[must_use]
    pub const fn empty() -> Self {
        Self { components: Vec::new() }
    }

    /// Build a path from components.
    #[must_use]
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Build a path from component byte slices. Test-friendly constructor.
    #[must_use]
    pub fn from_slices(components: &[&[u8]]) -> Self {
        Self { components: components.iter().map(|c| Component::from_slice(c)).collect() }
    }

    /// The components, outermost first.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Number of components.
    #[must_use]
    pub fn count(&self) -> usize {
        self.components.len()
    }

    /// True for the empty path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// True if `self` is a (non-strict) prefix of `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.components.len() <= other.components.len()
            && self.components.iter().zip(&other.components).all(|(a, b)| a == b)
    }

    /// Number of leading components shared with `other`.
    #[must_use]
    pub fn common_prefix_len(&self, other: &Self) -> usize {
        self.components
            .iter()
            .zip(&other.components)
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// The prefix consisting of the first `count` components.
    ///
    /// `count` is clamped to the component count.
    #[must_use]
    pub fn prefix(&self, count: usize) -> Self {
        Self { components: self.components[..count.min(self.components.len())].to_vec() }
    }

    /// A new path with `component` appended.
    #[must_use]
    pub fn child(&self, component: Component) -> Self {
        let mut components = self.components.clone();
        components.push(component);
        Self { components }
    }

    /// All prefixes from least specific (empty) to most specific (self).
    pub fn prefixes(&self) -> impl Iterator<Item = Self> + '_ {
        (0..=self.components.len()).map(|count| self.prefix(count))
    }
}

/// Append the absolute encoding of `path` to `out`.
///
/// Layout: tagged component count, then per component a tagged length and
/// the raw bytes.
pub fn encode_path(path: &Path, out: &mut Vec<u8>) {
    put_tagged(out, path.count() as u64);
    for component in path.components() {
        put_tagged(out, component.len() as u64);
        out.extend_from_slice(component.as_bytes());
    }
}

/// Decode an absolute path, enforcing the scheme limits.
pub async fn decode_path(
    bytes: &mut GrowingBytes,
    max_component_count: usize,
    max_component_length: usize,
) -> Result<Path, DecodeError> {
    let count = bytes.take_tagged().await?;
    if count > max_component_count as u64 {
        return Err(DecodeError::PathTooLong { count, max: max_component_count });
    }

    let mut components = Vec::with_capacity(count as usize);
    for _ in 0..count {
        components.push(decode_component(bytes, max_component_length).await?);
    }
    Ok(Path::new(components))
}

/// Append the encoding of `path` relative to `reference`.
///
/// Layout: tagged shared-prefix count, tagged suffix count, then the suffix
/// components. The decoder reconstructs the shared prefix from its own copy
/// of the reference path.
pub fn encode_path_relative(path: &Path, reference: &Path, out: &mut Vec<u8>) {
    let common = path.common_prefix_len(reference);
    put_tagged(out, common as u64);
    put_tagged(out, (path.count() - common) as u64);
    for component in &path.components()[common..] {
        put_tagged(out, component.len() as u64);
        out.extend_from_slice(component.as_bytes());
    }
}

/// Decode a path encoded relative to `reference`.
pub async fn decode_path_relative(
    bytes: &mut GrowingBytes,
    reference: &Path,
    max_component_count: usize,
    max_component_length: usize,
) -> Result<Path, DecodeError> {
    let common = bytes.take_tagged().await?;
    if common > reference.count() as u64 {
        return Err(DecodeError::InvalidPathPrefix { prefix: common, reference: reference.count() });
    }

    let suffix = bytes.take_tagged().await?;
    let total = common + suffix;
    if total > max_component_count as u64 {
        return Err(DecodeError::PathTooLong { count: total, max: max_component_count });
    }

    let mut components = reference.components()[..common as usize].to_vec();
    for _ in 0..suffix {
        components.push(decode_component(bytes, max_component_length).await?);
    }
    Ok(Path::new(components))
}

async fn decode_component(
    bytes: &mut GrowingBytes,
    max_component_length: usize,
) -> Result<Component, DecodeError> {
    let length = bytes.take_tagged().await?;
    if length > max_component_length as u64 {
        return Err(DecodeError::ComponentTooLong { length, max: max_component_length });
    }
    Ok(Component::new(bytes.take(length as usize).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn feed(wire: Vec<u8>) -> GrowingBytes {
        let (tx, bytes) = GrowingBytes::pair(1);
        tx.try_send(Bytes::from(wire)).unwrap();
        drop(tx);
        bytes
    }

    #[test]
    fn prefix_relationships() {
        let path = Path::from_slices(&[b"blog", b"posts", b"2024"]);
        let prefix = Path::from_slices(&[b"blog", b"posts"]);
        let other = Path::from_slices(&[b"blog", b"drafts"]);

        assert!(prefix.is_prefix_of(&path));
        assert!(Path::empty().is_prefix_of(&path));
        assert!(!other.is_prefix_of(&path));
        assert_eq!(other.common_prefix_len(&path), 1);
    }

    #[test]
    fn prefixes_enumerate_least_to_most_specific() {
        let path = Path::from_slices(&[b"a", b"b"]);
        let all: Vec<Path> = path.prefixes().collect();

        assert_eq!(all.len(), 3);
        assert_eq!(all[0], Path::empty());
        assert_eq!(all[1], Path::from_slices(&[b"a"]));
        assert_eq!(all[2], path);
    }

    #[tokio::test]
    async fn absolute_round_trip() {
        let path = Path::from_slices(&[b"blog", b"", b"2024"]);

        let mut wire = Vec::new();
        encode_path(&path, &mut wire);

        let mut bytes = feed(wire);
        let decoded = decode_path(&mut bytes, 16, 64).await.unwrap();
        assert_eq!(decoded, path);
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn relative_round_trip_shares_prefix() {
        let reference = Path::from_slices(&[b"blog", b"posts", b"2023"]);
        let path = Path::from_slices(&[b"blog", b"posts", b"2024", b"march"]);

        let mut relative = Vec::new();
        encode_path_relative(&path, &reference, &mut relative);

        let mut absolute = Vec::new();
        encode_path(&path, &mut absolute);

        // The shared prefix is not re-encoded.
        assert!(relative.len() < absolute.len());

        let mut bytes = feed(relative);
        let decoded = decode_path_relative(&mut bytes, &reference, 16, 64).await.unwrap();
        assert_eq!(decoded, path);
    }

    #[tokio::test]
    async fn rejects_component_count_over_limit() {
        let path = Path::from_slices(&[b"a", b"b", b"c"]);
        let mut wire = Vec::new();
        encode_path(&path, &mut wire);

        let mut bytes = feed(wire);
        let result = decode_path(&mut bytes, 2, 64).await;
        assert_eq!(result, Err(DecodeError::PathTooLong { count: 3, max: 2 }));
    }

    #[tokio::test]
    async fn rejects_prefix_longer_than_reference() {
        let mut wire = Vec::new();
        put_tagged(&mut wire, 5); // claimed common prefix
        put_tagged(&mut wire, 0);

        let mut bytes = feed(wire);
        let reference = Path::from_slices(&[b"a"]);
        let result = decode_path_relative(&mut bytes, &reference, 16, 64).await;
        assert_eq!(result, Err(DecodeError::InvalidPathPrefix { prefix: 5, reference: 1 }));
    }
}
