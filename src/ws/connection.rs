//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered change events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{BunnyId, ChangeEvent};
use crate::service::HappinessService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<ChangeEvent>,
    service: Arc<HappinessService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, &service).await;
                        if let Some(json) = encode(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(change) => {
                        if !subs.matches(&change) {
                            continue;
                        }
                        let Ok(payload) = serde_json::to_value(&change) else {
                            continue;
                        };
                        let msg = WsMessage::new(
                            uuid::Uuid::new_v4().to_string(),
                            WsMessageType::Event,
                            payload,
                        );
                        if let Some(json) = encode(&msg)
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn encode(msg: &WsMessage) -> Option<String> {
    serde_json::to_string(msg).ok()
}

/// Handles a text message from the client and builds the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    service: &HappinessService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error("", 400, "malformed JSON");
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe { bunny_ids } => {
            let (ids, wildcard) = parse_ids(&bunny_ids);
            subs.subscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { bunny_ids } => {
            let (ids, wildcard) = parse_ids(&bunny_ids);
            subs.unsubscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": ids,
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::GetBunny { bunny_id } => {
            let Ok(uuid) = bunny_id.parse::<uuid::Uuid>() else {
                return WsMessage::error(msg.id, 400, "invalid bunny id");
            };
            match service.get_bunny(BunnyId::from_uuid(uuid)).await {
                Ok(bunny) => reply(msg.id, &bunny),
                Err(err) => WsMessage::error(msg.id, err.error_code(), &err.to_string()),
            }
        }
        WsCommand::GetConfig => match service.current_config().await {
            Ok(config) => reply(msg.id, &config),
            Err(err) => WsMessage::error(msg.id, err.error_code(), &err.to_string()),
        },
    }
}

fn reply<T: serde::Serialize>(id: String, body: &T) -> WsMessage {
    match serde_json::to_value(body) {
        Ok(payload) => WsMessage::new(id, WsMessageType::Response, payload),
        Err(err) => WsMessage::error(id, 500, &err.to_string()),
    }
}

/// Splits raw ids into parsed bunny ids and the wildcard flag. Unparseable
/// ids are skipped.
fn parse_ids(raw: &[String]) -> (Vec<BunnyId>, bool) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    for s in raw {
        if s == "*" {
            wildcard = true;
        } else if let Ok(uuid) = s.parse::<uuid::Uuid>() {
            ids.push(BunnyId::from_uuid(uuid));
        }
    }
    (ids, wildcard)
}
