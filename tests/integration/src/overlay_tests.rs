//! Routing, relaying and broadcast over real sockets.

use crate::test_utils::*;
use meshlink_mesh::{MeshError, NodeEvent, UnwrappedPayload};
use std::time::Duration;

#[tokio::test]
async fn test_send_relayed_through_intermediate() {
    init_tracing();
    let ca = start_ca().await;
    let mut overlay = TestOverlay::start(LINE, &ca).await;

    overlay.handle("A").send("C", "hello").await.unwrap();

    let event = overlay.node("C").next_event().await;
    assert_eq!(
        event,
        NodeEvent::DataReceived {
            from: "A".to_string(),
            payload: UnwrappedPayload::Plain("hello".to_string()),
        }
    );
    assert!(overlay.node("B").stays_quiet(Duration::from_millis(300)).await);
}

#[tokio::test]
async fn test_long_message_reassembled() {
    init_tracing();
    let ca = start_ca().await;
    let mut overlay = TestOverlay::start(LINE, &ca).await;
    let text: String = (0..40).map(|i| format!("chunk-{i:02} ünïcödé ")).collect();

    overlay.handle("C").send("A", text.clone()).await.unwrap();

    match overlay.node("A").next_event().await {
        NodeEvent::DataReceived { from, payload } => {
            assert_eq!(from, "C");
            assert_eq!(payload, UnwrappedPayload::Plain(text));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_broadcast_delivered_once_per_node() {
    init_tracing();
    let ca = start_ca().await;
    let mut overlay = TestOverlay::start(CYCLE, &ca).await;

    overlay.handle("A").broadcast("all hands").await.unwrap();

    for id in ["B", "C", "D"] {
        let node = overlay.node(id);
        assert_eq!(
            node.next_event().await,
            NodeEvent::BroadcastReceived {
                from: "A".to_string(),
                text: "all hands".to_string(),
            }
        );
        assert!(node.stays_quiet(Duration::from_millis(300)).await);
    }
    assert!(overlay.node("A").stays_quiet(Duration::from_millis(100)).await);
}

#[tokio::test]
async fn test_unreachable_destination_reported() {
    init_tracing();
    let ca = start_ca().await;
    let mut overlay = TestOverlay::start(&[("A", &[]), ("B", &[])], &ca).await;

    let err = overlay.handle("A").send("B", "anyone?").await.unwrap_err();
    assert!(matches!(err, MeshError::NoRoute { .. }));
    assert!(overlay.node("B").stays_quiet(Duration::from_millis(200)).await);
}
