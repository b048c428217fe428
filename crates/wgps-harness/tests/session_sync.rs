//! Two full sessions over an in-memory transport.
//!
//! Exercises the whole stack end to end: commitment reveal, the initial
//! credit handshake, PAI over the intersection channel, capability and
//! interest binding on their channels, and clean shutdown propagation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use tokio::time::timeout;

use wgps_core::session::{Session, SessionEvent, SessionOptions};
use wgps_harness::{TestSchemes, pair, schemes::test_nonce, selective_authorisation};
use wgps_proto::{grouping::AreaSubspace, path::Path};

const TICK: Duration = Duration::from_secs(5);

#[tokio::test]
async fn sessions_discover_mutual_interest() {
    let (alfie_transport, betty_transport) = pair();

    let (alfie, alfie_handle) =
        Session::<TestSchemes, _>::new(alfie_transport, SessionOptions::new(test_nonce(1)));
    let (betty, betty_handle) =
        Session::<TestSchemes, _>::new(betty_transport, SessionOptions::new(test_nonce(2)));

    let alfie_task = tokio::spawn(alfie.run());
    let betty_task = tokio::spawn(betty.run());

    let path = Path::from_slices(&[b"blog", b"recipes"]);
    assert!(
        alfie_handle
            .submit_authorisation(selective_authorisation(1, 10, path.clone(), 100))
            .await
    );
    assert!(
        betty_handle
            .submit_authorisation(selective_authorisation(1, 10, path.clone(), 200))
            .await
    );

    // Each side must see its own interest bound and the peer's validated
    // interest, in some order.
    for mut handle in [alfie_handle, betty_handle] {
        let mut ours = 0;
        let mut theirs = 0;
        while ours == 0 || theirs == 0 {
            let event = timeout(TICK, handle.next_event())
                .await
                .expect("session made no progress")
                .expect("session terminated early");
            match event {
                SessionEvent::OurInterest { area_of_interest, .. } => {
                    assert_eq!(
                        area_of_interest.area.subspace,
                        AreaSubspace::Id(wgps_harness::TestSubspace(10))
                    );
                    assert_eq!(area_of_interest.area.path, path);
                    ours += 1;
                }
                SessionEvent::PeerInterest { area_of_interest, aoi_handle, .. } => {
                    assert_eq!(area_of_interest.area.path, path);
                    assert_eq!(aoi_handle, 0);
                    theirs += 1;
                }
                SessionEvent::Message(_) => {}
            }
        }
        assert_eq!(ours, 1);
        assert_eq!(theirs, 1);
    }

    alfie_task.abort();
    betty_task.abort();
}

#[tokio::test]
async fn closing_one_side_ends_the_other_cleanly() {
    let (alfie_transport, betty_transport) = pair();

    let (alfie, _alfie_handle) =
        Session::<TestSchemes, _>::new(alfie_transport, SessionOptions::new(test_nonce(1)));
    let (betty, _betty_handle) =
        Session::<TestSchemes, _>::new(betty_transport, SessionOptions::new(test_nonce(2)));

    let alfie_task = tokio::spawn(alfie.run());
    let betty_task = tokio::spawn(betty.run());

    // Give both sessions a moment to exchange their startup messages,
    // then tear Alfie down. Betty must observe end-of-stream on a
    // message boundary and terminate without error.
    tokio::time::sleep(Duration::from_millis(50)).await;
    alfie_task.abort();
    let _ = alfie_task.await;

    let result = timeout(TICK, betty_task)
        .await
        .expect("betty did not terminate")
        .expect("betty task panicked");
    assert!(result.is_ok(), "clean peer close must not be an error: {result:?}");
}

#[tokio::test]
async fn wrong_nonce_length_fails_fast() {
    let (alfie_transport, _betty_transport) = pair();

    let (alfie, _handle) = Session::<TestSchemes, _>::new(
        alfie_transport,
        SessionOptions::new(bytes::Bytes::from_static(b"short")),
    );

    let result = alfie.run().await;
    assert!(matches!(
        result,
        Err(wgps_core::SessionError::CommitmentLength { actual: 5, expected: 16 })
    ));
}
