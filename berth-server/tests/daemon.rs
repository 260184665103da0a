//! Integration tests for the synchronization core
//!
//! These drive the command layer, reconciliation loop, and event hub
//! together over the simulated engine, the way the daemon wires them.

mod common;

use common::{create_daemon, hash, magnet};

use berth_common::protocol::{PushEvent, SubscriberFrame};
use berth_common::transfer::TransferStatus;
use berth_server::commands::{
    handle_add, handle_pause, handle_recheck, handle_remove, handle_resume, handle_stop_seeding,
    restore_saved_transfers,
};
use berth_server::hub::subscriber::{SubscriberParams, run_subscriber};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;

// ============================================================================
// Command / reconciliation interplay
// ============================================================================

#[tokio::test]
async fn test_last_accepted_command_wins_across_ticks() {
    let (ctx, reconciler) = create_daemon().await;
    handle_add(&ctx, &magnet(1), None).await.unwrap();
    reconciler.tick().await;

    handle_pause(&ctx, &hash(1)).await.unwrap();
    for _ in 0..5 {
        reconciler.tick().await;
    }
    assert_eq!(
        ctx.store.get(&hash(1)).await.unwrap().status,
        TransferStatus::Paused
    );

    handle_resume(&ctx, &hash(1)).await.unwrap();
    for _ in 0..5 {
        reconciler.tick().await;
    }
    assert_eq!(
        ctx.store.get(&hash(1)).await.unwrap().status,
        TransferStatus::Downloading
    );

    // Rapid flip-flop settling on pause
    handle_pause(&ctx, &hash(1)).await.unwrap();
    handle_resume(&ctx, &hash(1)).await.unwrap();
    handle_pause(&ctx, &hash(1)).await.unwrap();
    reconciler.tick().await;
    assert_eq!(
        ctx.store.get(&hash(1)).await.unwrap().status,
        TransferStatus::Paused
    );
}

#[tokio::test]
async fn test_progress_never_decreases_without_recheck() {
    let (ctx, reconciler) = create_daemon().await;
    handle_add(&ctx, &magnet(1), None).await.unwrap();

    ctx.engine.set_progress(&hash(1), 60.0);
    reconciler.tick().await;
    assert_eq!(ctx.store.get(&hash(1)).await.unwrap().progress, 60.0);

    // The engine reporting less is not believed...
    ctx.engine.set_progress(&hash(1), 45.0);
    reconciler.tick().await;
    assert_eq!(ctx.store.get(&hash(1)).await.unwrap().progress, 60.0);

    // ...until a recheck is in flight
    handle_recheck(&ctx, &hash(1)).await.unwrap();
    reconciler.tick().await;
    let record = ctx.store.get(&hash(1)).await.unwrap();
    assert_eq!(record.progress, 45.0);
    assert_eq!(record.status, TransferStatus::Downloading);
}

#[tokio::test]
async fn test_queued_to_seeding_in_one_tick() {
    let (ctx, reconciler) = create_daemon().await;
    handle_add(&ctx, &magnet(1), None).await.unwrap();
    assert_eq!(
        ctx.store.get(&hash(1)).await.unwrap().status,
        TransferStatus::Queued
    );

    ctx.engine.set_progress(&hash(1), 100.0);
    reconciler.tick().await;

    let record = ctx.store.get(&hash(1)).await.unwrap();
    assert_eq!(record.status, TransferStatus::Seeding);
    let stamped = record.completed_at.unwrap();

    reconciler.tick().await;
    assert_eq!(
        ctx.store.get(&hash(1)).await.unwrap().completed_at,
        Some(stamped)
    );
}

#[tokio::test]
async fn test_seeding_disabled_goes_straight_to_completed() {
    let (ctx, reconciler) = create_daemon().await;
    ctx.db.config.set_seeding_enabled(false).await.unwrap();
    handle_add(&ctx, &magnet(1), None).await.unwrap();

    ctx.engine.set_progress(&hash(1), 100.0);
    reconciler.tick().await;

    let record = ctx.store.get(&hash(1)).await.unwrap();
    assert_eq!(record.status, TransferStatus::Completed);
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn test_stop_seeding_sticks_across_ticks() {
    let (ctx, reconciler) = create_daemon().await;
    handle_add(&ctx, &magnet(1), None).await.unwrap();
    ctx.engine.set_progress(&hash(1), 100.0);
    reconciler.tick().await;
    assert_eq!(
        ctx.store.get(&hash(1)).await.unwrap().status,
        TransferStatus::Seeding
    );

    handle_stop_seeding(&ctx, &hash(1)).await.unwrap();
    for _ in 0..3 {
        reconciler.tick().await;
    }

    let record = ctx.store.get(&hash(1)).await.unwrap();
    assert_eq!(record.status, TransferStatus::Completed);
    assert!(!record.resume_on_start);
}

#[tokio::test]
async fn test_desync_after_threshold_ticks() {
    let (ctx, reconciler) = create_daemon().await;
    handle_add(&ctx, &magnet(1), None).await.unwrap();
    reconciler.tick().await;

    ctx.engine.vanish(&hash(1));
    for _ in 0..5 {
        reconciler.tick().await;
    }

    let record = ctx.store.get(&hash(1)).await.unwrap();
    assert_eq!(record.status, TransferStatus::Error);
    assert!(record.error.is_some());
}

#[tokio::test]
async fn test_removed_transfer_stays_gone_through_ticks() {
    let (ctx, reconciler) = create_daemon().await;
    handle_add(&ctx, &magnet(1), None).await.unwrap();
    reconciler.tick().await;

    handle_remove(&ctx, &hash(1), false).await.unwrap();
    for _ in 0..3 {
        reconciler.tick().await;
    }
    assert!(ctx.store.get(&hash(1)).await.is_none());
    assert!(ctx.store.is_empty().await);
}

// ============================================================================
// Restart recovery
// ============================================================================

#[tokio::test]
async fn test_restart_recovery_resumes_unfinished_transfers() {
    let (ctx, reconciler) = create_daemon().await;
    handle_add(&ctx, &magnet(1), None).await.unwrap();
    handle_add(&ctx, &magnet(2), None).await.unwrap();
    ctx.engine.set_progress(&hash(1), 30.0);
    ctx.engine.set_progress(&hash(2), 100.0);
    reconciler.tick().await;
    handle_stop_seeding(&ctx, &hash(2)).await.unwrap();

    // "Restart": same database, fresh store/engine/hub
    let (fresh, _fresh_reconciler) = create_daemon().await;
    let fresh = berth_server::commands::CommandContext {
        db: ctx.db.clone(),
        ..fresh
    };

    let restored = restore_saved_transfers(&fresh).await;
    assert_eq!(restored, 1);
    let record = fresh.store.get(&hash(1)).await.unwrap();
    assert_eq!(record.progress, 30.0);
    assert_eq!(record.status, TransferStatus::Queued);
    // The stopped transfer stays stopped
    assert!(fresh.store.get(&hash(2)).await.is_none());
}

// ============================================================================
// Subscriber catch-up and keep-alive
// ============================================================================

async fn connect_subscriber(
    ctx: &berth_server::commands::CommandContext<berth_server::engine::SimEngine>,
) -> (
    tokio::task::JoinHandle<std::io::Result<()>>,
    WebSocketStream<tokio::io::DuplexStream>,
) {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client_ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

    let params = SubscriberParams {
        peer_addr: "127.0.0.1:9".parse().unwrap(),
        hub: ctx.hub.clone(),
        store: ctx.store.clone(),
        debug: false,
    };
    let server = tokio::spawn(run_subscriber(server_ws, params));
    (server, client_ws)
}

async fn next_event(client: &mut WebSocketStream<tokio::io::DuplexStream>) -> PushEvent {
    loop {
        match client.next().await.expect("stream ended").expect("ws error") {
            Message::Text(text) => return serde_json::from_str(&text).expect("bad event json"),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_late_subscriber_sees_cumulative_state_in_snapshot() {
    let (ctx, reconciler) = create_daemon().await;
    handle_add(&ctx, &magnet(1), None).await.unwrap();

    // 100+ change events happen with nobody listening
    for step in 1..=50 {
        ctx.engine.set_progress(&hash(1), (step as f64) * 2.0);
        reconciler.tick().await;
    }
    handle_add(&ctx, &magnet(2), None).await.unwrap();

    let (server, mut client) = connect_subscriber(&ctx).await;

    match next_event(&mut client).await {
        PushEvent::InitialData { transfers, stats, .. } => {
            assert_eq!(transfers.len(), 2);
            assert_eq!(transfers[0].hash, hash(1));
            assert_eq!(transfers[0].progress, 100.0);
            assert_eq!(transfers[0].status, TransferStatus::Seeding);
            assert_eq!(transfers[1].hash, hash(2));
            assert!(stats.total_downloaded > 0);
        }
        other => panic!("expected initial_data, got {}", other.kind()),
    }

    client.close(None).await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_subscriber_receives_live_updates_after_snapshot() {
    let (ctx, reconciler) = create_daemon().await;
    handle_add(&ctx, &magnet(1), None).await.unwrap();

    let (server, mut client) = connect_subscriber(&ctx).await;
    assert!(matches!(
        next_event(&mut client).await,
        PushEvent::InitialData { .. }
    ));

    ctx.engine.set_progress(&hash(1), 42.0);
    reconciler.tick().await;

    match next_event(&mut client).await {
        PushEvent::StatusUpdate { transfers, .. } => {
            assert_eq!(transfers.len(), 1);
            assert_eq!(transfers[0].progress, 42.0);
        }
        other => panic!("expected status_update, got {}", other.kind()),
    }

    client.close(None).await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_ping_pong() {
    let (ctx, _reconciler) = create_daemon().await;
    let (server, mut client) = connect_subscriber(&ctx).await;
    assert!(matches!(
        next_event(&mut client).await,
        PushEvent::InitialData { .. }
    ));

    let ping = serde_json::to_string(&SubscriberFrame::Ping).unwrap();
    client.send(Message::Text(ping.into())).await.unwrap();
    assert!(matches!(next_event(&mut client).await, PushEvent::Pong { .. }));

    client.close(None).await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_frame_gets_error_event_and_connection_survives() {
    let (ctx, _reconciler) = create_daemon().await;
    let (server, mut client) = connect_subscriber(&ctx).await;
    assert!(matches!(
        next_event(&mut client).await,
        PushEvent::InitialData { .. }
    ));

    client
        .send(Message::Text(r#"{"type":"shout"}"#.into()))
        .await
        .unwrap();
    assert!(matches!(next_event(&mut client).await, PushEvent::Error { .. }));

    // Still alive
    let ping = serde_json::to_string(&SubscriberFrame::Ping).unwrap();
    client.send(Message::Text(ping.into())).await.unwrap();
    assert!(matches!(next_event(&mut client).await, PushEvent::Pong { .. }));

    client.close(None).await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_subscriber_disconnect_unregisters() {
    let (ctx, _reconciler) = create_daemon().await;
    let (server, mut client) = connect_subscriber(&ctx).await;
    assert!(matches!(
        next_event(&mut client).await,
        PushEvent::InitialData { .. }
    ));
    assert_eq!(ctx.hub.subscriber_count(), 1);

    client.close(None).await.unwrap();
    server.await.unwrap().unwrap();
    assert_eq!(ctx.hub.subscriber_count(), 0);
}
