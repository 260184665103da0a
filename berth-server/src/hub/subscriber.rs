//! Per-subscriber connection loop
//!
//! Each connection runs one independent send loop: events arrive on the
//! subscriber's bounded hub queue and are written out as JSON text
//! frames. The loop also answers keep-alive pings and drops connections
//! that stay silent past the heartbeat timeout.
//!
//! The first frame sent is always the `initial_data` snapshot. The
//! subscriber is registered with the hub *before* the snapshot is taken,
//! so every mutation is covered either by the snapshot or by a queued
//! event — never by neither.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use berth_common::SUBSCRIBER_IDLE_TIMEOUT_SECS;
use berth_common::protocol::{PushEvent, SubscriberFrame};
use berth_common::time::unix_now;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use super::{EventHub, SubscriberGuard};
use crate::constants::HEARTBEAT_CHECK_INTERVAL_SECS;
use crate::store::TransferStore;

/// Shared resources for one subscriber connection
pub struct SubscriberParams {
    pub peer_addr: SocketAddr,
    pub hub: Arc<EventHub>,
    pub store: Arc<TransferStore>,
    pub debug: bool,
}

/// Serialize and send one event as a JSON text frame
async fn send_event<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Message>,
    event: &PushEvent,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let json = serde_json::to_string(event)
        .map_err(|e| io::Error::other(format!("event serialization failed: {}", e)))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| io::Error::other(format!("WebSocket send failed: {}", e)))
}

/// Run an authenticated subscriber connection to completion
pub async fn run_subscriber<S>(ws: WebSocketStream<S>, params: SubscriberParams) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let SubscriberParams {
        peer_addr,
        hub,
        store,
        debug,
    } = params;

    // Register first, snapshot second (catch-up guarantee)
    let (id, mut rx) = hub.subscribe();
    let _guard = SubscriberGuard::new(hub.clone(), id);

    if debug {
        eprintln!(
            "Subscriber {} connected from {} (total: {})",
            id,
            peer_addr,
            hub.subscriber_count()
        );
    }

    let (mut sink, mut stream) = ws.split();

    let initial = PushEvent::InitialData {
        transfers: store.summaries().await,
        stats: store.stats().await,
        timestamp: unix_now(),
    };
    send_event(&mut sink, &initial).await?;

    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_CHECK_INTERVAL_SECS));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let idle_timeout = Duration::from_secs(SUBSCRIBER_IDLE_TIMEOUT_SECS);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => send_event(&mut sink, &event).await?,
                    None => {
                        // The hub dropped us: our queue overflowed while a
                        // broadcast was in flight. Close rather than block others.
                        let _ = sink
                            .send(Message::Close(Some(CloseFrame {
                                code: CloseCode::Again,
                                reason: "subscriber too slow".into(),
                            })))
                            .await;
                        break;
                    }
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        match serde_json::from_str::<SubscriberFrame>(&text) {
                            Ok(SubscriberFrame::Ping) => {
                                send_event(&mut sink, &PushEvent::Pong { timestamp: unix_now() })
                                    .await?;
                            }
                            Err(_) => {
                                send_event(
                                    &mut sink,
                                    &PushEvent::Error {
                                        message: "unrecognized frame".to_string(),
                                    },
                                )
                                .await?;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        last_seen = Instant::now();
                        sink.send(Message::Pong(payload))
                            .await
                            .map_err(|e| io::Error::other(format!("WebSocket send failed: {}", e)))?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Binary frames have no meaning on this protocol
                    }
                    Some(Err(e)) => {
                        return Err(io::Error::other(format!("WebSocket error: {}", e)));
                    }
                }
            }
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > idle_timeout {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Policy,
                            reason: "heartbeat timeout".into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    }

    if debug {
        eprintln!(
            "Subscriber {} disconnected (total: {})",
            id,
            hub.subscriber_count().saturating_sub(1)
        );
    }

    Ok(())
}
