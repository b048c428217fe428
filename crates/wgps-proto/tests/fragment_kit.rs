//! PAI fragment kit expansion.

use wgps_harness::schemes::{TestNamespace, TestSchemes, TestSubspace};
use wgps_proto::{Fragment, FragmentKit, Path};

fn kit_path() -> Path {
    Path::from_slices(&[b"blog", b"posts"])
}

#[test]
fn selective_kit_expands_least_to_most_specific() {
    let kit: FragmentKit<TestSchemes> = FragmentKit::Selective {
        namespace: TestNamespace(1),
        subspace: TestSubspace(2),
        path: kit_path(),
    };
    let set = kit.fragments();

    assert_eq!(set.primary.len(), 3);
    assert_eq!(set.secondary.len(), 3);

    // Empty prefix first, full path last, triple and pair sets in
    // lockstep.
    match &set.primary[0] {
        Fragment::Triple { path, .. } => assert!(path.is_empty()),
        Fragment::Pair { .. } => unreachable!("primary fragments of a selective kit"),
    }
    match &set.primary[2] {
        Fragment::Triple { path, .. } => assert_eq!(*path, kit_path()),
        Fragment::Pair { .. } => unreachable!("primary fragments of a selective kit"),
    }
    match &set.secondary[2] {
        Fragment::Pair { path, .. } => assert_eq!(*path, kit_path()),
        Fragment::Triple { .. } => unreachable!("secondary fragments are pairs"),
    }
}

#[test]
fn complete_kit_has_no_secondary_fragments() {
    let kit: FragmentKit<TestSchemes> =
        FragmentKit::Complete { namespace: TestNamespace(1), path: kit_path() };
    let set = kit.fragments();

    assert_eq!(set.primary.len(), 3);
    assert!(set.secondary.is_empty());
    assert!(set.primary.iter().all(|f| matches!(f, Fragment::Pair { .. })));
}

#[test]
fn derivation_is_deterministic() {
    let kit: FragmentKit<TestSchemes> = FragmentKit::Selective {
        namespace: TestNamespace(1),
        subspace: TestSubspace(2),
        path: kit_path(),
    };
    assert_eq!(kit.clone().fragments(), kit.fragments());
}
