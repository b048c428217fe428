//! PAI fragments: the units peers blind and compare.
//!
//! A read capability is decomposed into fragments, one per prefix of its
//! granted path. Capabilities granting a single subspace produce two
//! parallel sets: *primary* triples carrying the subspace, and *secondary*
//! pairs without it. Capabilities granting every subspace produce pairs
//! only, and those pairs count as primary. The secondary set exists so a
//! selective capability can still meet an any-subspace capability in the
//! middle. Two secondary sets matching each other proves nothing,
//! which is why the intersection check excludes secondary-vs-secondary
//! matches.

use crate::{
    path::Path,
    schemes::{NamespaceId, SubspaceId, SyncSchemes},
};

/// One fragment derived from a capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment<S: SyncSchemes> {
    /// Namespace and path, no subspace.
    Pair {
        /// Namespace of the capability.
        namespace: NamespaceId<S>,
        /// One prefix of the granted path.
        path: Path,
    },
    /// Namespace, subspace, and path.
    Triple {
        /// Namespace of the capability.
        namespace: NamespaceId<S>,
        /// Subspace the capability grants.
        subspace: SubspaceId<S>,
        /// One prefix of the granted path.
        path: Path,
    },
}

/// What a capability contributes to PAI, before prefix expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentKit<S: SyncSchemes> {
    /// Capability grants every subspace: pairs only, all primary.
    Complete {
        /// Granted namespace.
        namespace: NamespaceId<S>,
        /// Granted path.
        path: Path,
    },
    /// Capability grants one subspace: primary triples plus secondary
    /// pairs.
    Selective {
        /// Granted namespace.
        namespace: NamespaceId<S>,
        /// Granted subspace.
        subspace: SubspaceId<S>,
        /// Granted path.
        path: Path,
    },
}

/// The expanded fragments of one capability, ready for binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSet<S: SyncSchemes> {
    /// Primary fragments, least to most specific.
    pub primary: Vec<Fragment<S>>,
    /// Secondary fragments, least to most specific. Empty for complete
    /// kits.
    pub secondary: Vec<Fragment<S>>,
}

impl<S: SyncSchemes> FragmentKit<S> {
    /// Expand into fragments, each list ordered least to most specific
    /// (the empty prefix first, the full path last).
    ///
    /// Derivation is deterministic: the same kit always yields the same
    /// fragments in the same order, which is what keeps the handle spaces
    /// of both peers aligned.
    #[must_use]
    pub fn fragments(self) -> FragmentSet<S> {
        match self {
            Self::Complete { namespace, path } => FragmentSet {
                primary: path
                    .prefixes()
                    .map(|prefix| Fragment::Pair { namespace: namespace.clone(), path: prefix })
                    .collect(),
                secondary: Vec::new(),
            },
            Self::Selective { namespace, subspace, path } => FragmentSet {
                primary: path
                    .prefixes()
                    .map(|prefix| Fragment::Triple {
                        namespace: namespace.clone(),
                        subspace: subspace.clone(),
                        path: prefix,
                    })
                    .collect(),
                secondary: path
                    .prefixes()
                    .map(|prefix| Fragment::Pair { namespace: namespace.clone(), path: prefix })
                    .collect(),
            },
        }
    }
}
