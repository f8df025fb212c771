// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! WebSocket stream of portal events.
//!
//! Clients connected to `/ws` receive a `{"type":"connected"}` greeting and
//! then every [`PortalEvent`](crate::events::PortalEvent) as a JSON text
//! frame. The stream is read-only; incoming frames other than close are
//! ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::{events::EventBus, state::AppState};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.events.clone()))
}

async fn handle_socket(socket: WebSocket, events: EventBus) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = events.subscribe();

    debug!(subscribers = events.subscriber_count(), "WebSocket client connected");

    let welcome = serde_json::json!({
        "type": "connected",
        "message": "Portal event stream connected"
    });
    if let Err(e) = sender.send(Message::Text(welcome.to_string().into())).await {
        warn!(error = %e, "Failed to send welcome message");
        return;
    }

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                // axum answers pings itself
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut recv_task => {
                debug!("WebSocket client disconnected");
                break;
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize event");
                                continue;
                            }
                        };
                        if let Err(e) = sender.send(Message::Text(json.into())).await {
                            debug!(error = %e, "Failed to send event");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "WebSocket client lagged; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    recv_task.abort();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use futures::{SinkExt, StreamExt};
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, tungstenite::Message as ClientMessage};

    use crate::{
        api::router,
        blockchain::{EntityKind, LedgerAction},
        events::{LedgerNotice, PortalEvent},
        state::AppState,
        storage::{repository::ledger::append_entry, AuditContext},
    };

    async fn serve(state: AppState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state, None);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{addr}/ws")
    }

    async fn next_json<S>(read: &mut S) -> Value
    where
        S: futures::Stream<Item = Result<ClientMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        let msg = tokio::time::timeout(Duration::from_secs(5), read.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("frame error");
        match msg {
            ClientMessage::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_receives_greeting_then_ledger_events() {
        let state = AppState::for_tests();
        let url = serve(state.clone()).await;
        let (stream, _) = connect_async(url.as_str()).await.unwrap();
        let (_write, mut read) = stream.split();

        let greeting = next_json(&mut read).await;
        assert_eq!(greeting["type"], "connected");
        // The socket subscribes before greeting.
        assert_eq!(state.events.subscriber_count(), 1);

        let entry = state
            .db
            .write(|txn| {
                append_entry(
                    txn,
                    &AuditContext::system(),
                    EntityKind::Case,
                    LedgerAction::Create,
                    "case-1",
                    "ab",
                    Utc::now(),
                )
            })
            .unwrap();
        state.events.publish(PortalEvent::LedgerRecorded(LedgerNotice::from(&entry)));

        let event = next_json(&mut read).await;
        assert_eq!(event["type"], "ledger_recorded");
        assert_eq!(event["entity_id"], "case-1");
        assert_eq!(event["tx_hash"], entry.tx_hash.as_str());
        assert_eq!(event["status"], "pending");
    }

    #[tokio::test]
    async fn closing_the_socket_unsubscribes() {
        let state = AppState::for_tests();
        let url = serve(state.clone()).await;
        let (stream, _) = connect_async(url.as_str()).await.unwrap();
        let (mut write, mut read) = stream.split();
        next_json(&mut read).await;
        assert_eq!(state.events.subscriber_count(), 1);

        write.send(ClientMessage::Close(None)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.events.subscriber_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscriber was not released");
    }
}
