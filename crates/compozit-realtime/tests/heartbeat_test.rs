//! Heartbeat supervision against a live hub.

use std::sync::Arc;
use std::time::Duration;

use compozit_core::config::RealtimeConfig;
use compozit_core::types::UserId;
use compozit_realtime::{HeartbeatConfig, NotificationHub, OutboundFrame, run_heartbeat};

fn fast() -> HeartbeatConfig {
    HeartbeatConfig {
        ping_interval: Duration::from_millis(40),
        ping_timeout: Duration::from_millis(40),
    }
}

#[tokio::test]
async fn test_silent_connection_is_dropped() {
    let hub = Arc::new(NotificationHub::new(RealtimeConfig::default()));
    let (handle, mut rx) = hub.register(UserId::from("alice"));

    let task = tokio::spawn(run_heartbeat(hub.clone(), handle.clone(), fast()));
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("heartbeat ends")
        .expect("join");

    assert!(!handle.is_alive());
    assert_eq!(hub.connection_count(), 0);

    let mut saw_ping = false;
    let mut saw_close = false;
    while let Ok(frame) = rx.try_recv() {
        match frame {
            OutboundFrame::Ping => saw_ping = true,
            OutboundFrame::Close => saw_close = true,
            OutboundFrame::Text(_) => {}
        }
    }
    assert!(saw_ping);
    assert!(saw_close);
}

#[tokio::test]
async fn test_ponging_connection_stays_registered() {
    let hub = Arc::new(NotificationHub::new(RealtimeConfig::default()));
    let (handle, _rx) = hub.register(UserId::from("alice"));

    let task = tokio::spawn(run_heartbeat(hub.clone(), handle.clone(), fast()));
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        hub.handle_inbound(&handle.id, r#"{"type":"pong"}"#).await;
    }
    assert!(handle.is_alive());
    assert_eq!(hub.connection_count(), 1);

    hub.unregister(&handle.id);
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("heartbeat stops once the connection closes")
        .expect("join");
}
