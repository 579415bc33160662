//! WebSocket upgrade handler.
//!
//! Each socket is split into a writer task that drains the connection's
//! outbound buffer and an inbound loop that only accepts keep-alive
//! traffic. The hub owns the connection's lifetime: once it marks the
//! handle dead, both halves wind down.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use compozit_core::error::AppError;
use compozit_core::types::UserId;
use compozit_realtime::{HeartbeatConfig, OutboundFrame, run_heartbeat};

use crate::error::ApiResult;
use crate::extractors::auth::identity_from_headers;
use crate::state::AppState;

/// How long the writer may take to flush its close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Query parameters accepted on upgrade.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Identity for clients that cannot set headers on the upgrade request.
    pub user_id: Option<String>,
}

/// GET /ws
pub async fn ws_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let owner = resolve_identity(&headers, &query, &state.config.server.identity_header)
        .ok_or_else(|| AppError::unauthorized("Missing caller identity"))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(state, owner, socket)))
}

/// Header identity wins over the query parameter.
pub fn resolve_identity(headers: &HeaderMap, query: &WsQuery, header: &str) -> Option<UserId> {
    identity_from_headers(headers, header).or_else(|| {
        query
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(UserId::from)
    })
}

async fn handle_socket(state: AppState, owner: UserId, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (handle, mut outbound_rx) = state.hub.register(owner.clone());
    let conn_id = handle.id;

    tokio::spawn(run_heartbeat(
        state.hub.clone(),
        handle.clone(),
        HeartbeatConfig::from(state.hub.config()),
    ));

    let writer_handle = handle.clone();
    let writer_hub = state.hub.clone();
    let mut writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                biased;
                frame = outbound_rx.recv() => frame,
                _ = writer_handle.closed() => Some(OutboundFrame::Close),
            };

            let message = match frame {
                Some(OutboundFrame::Text(text)) => Message::Text(text.into()),
                Some(OutboundFrame::Ping) => Message::Ping(Bytes::new()),
                Some(OutboundFrame::Close) | None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = ws_tx.send(message).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket write failed");
                writer_hub.unregister(&conn_id);
                break;
            }
        }
    });

    loop {
        let next = tokio::select! {
            next = ws_rx.next() => next,
            _ = handle.closed() => break,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                state.hub.handle_inbound(&conn_id, text.as_str()).await;
            }
            Some(Ok(Message::Pong(_))) => state.hub.record_pong(&conn_id).await,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.hub.unregister(&conn_id);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }

    info!(conn_id = %conn_id, owner_id = %owner, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_resolve_identity_prefers_header() {
        let mut headers = HeaderMap::new();
        let query = WsQuery {
            user_id: Some("bob".into()),
        };
        assert_eq!(
            resolve_identity(&headers, &query, "x-user-id"),
            Some(UserId::from("bob"))
        );

        headers.insert("x-user-id", HeaderValue::from_static("alice"));
        assert_eq!(
            resolve_identity(&headers, &query, "x-user-id"),
            Some(UserId::from("alice"))
        );

        assert_eq!(
            resolve_identity(&HeaderMap::new(), &WsQuery::default(), "x-user-id"),
            None
        );
    }
}
