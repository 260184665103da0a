//! Subscriber WebSocket endpoint
//!
//! TLS is mandatory. The api key travels in the request query string
//! (`/ws?api_key=...`); a bad or missing key is answered with an `error`
//! event and close code 4001 so clients can tell credentials apart from
//! transient failures and skip their reconnect loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use berth_common::AUTH_REJECT_CLOSE_CODE;
use berth_common::protocol::PushEvent;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::hub::EventHub;
use crate::hub::subscriber::{SubscriberParams, run_subscriber};
use crate::store::TransferStore;

/// Parameters for handling a subscriber connection
pub struct WsParams {
    pub peer_addr: SocketAddr,
    pub api_key: Arc<String>,
    pub hub: Arc<EventHub>,
    pub store: Arc<TransferStore>,
    pub debug: bool,
}

/// Extract the api key from a request query string
pub fn extract_api_key(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .find_map(|param| param.strip_prefix("api_key=").map(str::to_string))
}

/// Handle one subscriber connection: TLS, WebSocket handshake,
/// authentication, then the hub send loop
pub async fn handle_subscriber_connection(
    socket: TcpStream,
    tls_acceptor: TlsAcceptor,
    params: WsParams,
) -> io::Result<()> {
    let tls_stream = tls_acceptor
        .accept(socket)
        .await
        .map_err(|e| io::Error::other(format!("TLS handshake failed: {}", e)))?;

    let mut supplied = None;
    let mut ws = tokio_tungstenite::accept_hdr_async(tls_stream, |req: &Request, resp: Response| {
        supplied = extract_api_key(req.uri().query());
        Ok(resp)
    })
    .await
    .map_err(|e| io::Error::other(format!("WebSocket handshake failed: {}", e)))?;

    if supplied.as_deref() != Some(params.api_key.as_str()) {
        if let Ok(json) = serde_json::to_string(&PushEvent::Error {
            message: "invalid api key".to_string(),
        }) {
            let _ = ws.send(Message::Text(json.into())).await;
        }
        let _ = ws
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Library(AUTH_REJECT_CLOSE_CODE),
                reason: "unauthorized".into(),
            })))
            .await;
        if params.debug {
            eprintln!("Rejected subscriber with bad api key from {}", params.peer_addr);
        }
        return Ok(());
    }

    run_subscriber(
        ws,
        SubscriberParams {
            peer_addr: params.peer_addr,
            hub: params.hub,
            store: params.store,
            debug: params.debug,
        },
    )
    .await
}
