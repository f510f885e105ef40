//! Handshake and encrypted DATA across the overlay.

use crate::test_utils::*;
use meshlink_mesh::{NodeEvent, SessionState, UnwrappedPayload};
use std::time::Duration;

async fn wait_secure(overlay: &mut TestOverlay, id: &str, peer: &str) {
    match overlay.node(id).next_event().await {
        NodeEvent::SecureChannelEstablished { peer: got } => assert_eq!(got, peer),
        other => panic!("{id}: expected secure channel with {peer}, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_across_relay_then_encrypted_send() {
    init_tracing();
    let ca = start_ca().await;
    let mut overlay = TestOverlay::start(LINE, &ca).await;

    overlay.handle("A").connect("C").await.unwrap();
    wait_secure(&mut overlay, "A", "C").await;
    wait_secure(&mut overlay, "C", "A").await;

    assert_eq!(overlay.handle("A").session_state("C").await.unwrap(), SessionState::Secure);
    assert_eq!(overlay.handle("C").session_state("A").await.unwrap(), SessionState::Secure);
    assert_eq!(overlay.handle("B").session_state("A").await.unwrap(), SessionState::None);

    overlay.handle("A").send("C", "top secret").await.unwrap();
    assert_eq!(
        overlay.node("C").next_event().await,
        NodeEvent::DataReceived {
            from: "A".to_string(),
            payload: UnwrappedPayload::Decrypted("top secret".to_string()),
        }
    );

    overlay.handle("C").send("A", "ack").await.unwrap();
    assert_eq!(
        overlay.node("A").next_event().await,
        NodeEvent::DataReceived {
            from: "C".to_string(),
            payload: UnwrappedPayload::Decrypted("ack".to_string()),
        }
    );
}

#[tokio::test]
async fn test_peer_with_foreign_certificate_never_secure() {
    init_tracing();
    let ca = start_ca().await;
    let rogue = start_ca().await;
    let mut overlay =
        TestOverlay::start_with(LINE, &ca, |id| (id == "C").then(|| rogue.clone())).await;

    overlay.handle("A").connect("C").await.unwrap();

    assert!(overlay.node("A").stays_quiet(Duration::from_millis(800)).await);
    assert_eq!(
        overlay.handle("A").session_state("C").await.unwrap(),
        SessionState::HandshakeStarted
    );

    overlay.handle("A").send("C", "in the clear").await.unwrap();
    assert_eq!(
        overlay.node("C").next_event().await,
        NodeEvent::DataReceived {
            from: "A".to_string(),
            payload: UnwrappedPayload::Plain("in the clear".to_string()),
        }
    );
}
