use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use lendx_core::registry::{Client, SubscriptionRegistry};
use lendx_core::user_connections::user_channel_id;
use lendx_sdk::objects::lending::is_hex_address;
use lendx_sdk::objects::ws::channels;
use lendx_sdk::objects::{
    ControlEvent, EventType, OrderBookSubscription, WsErrorPayload, WsEvent, WsFrame,
    lending_order_book_channel_id,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::state::AppState;

/// Notifications sent in the `notification` INIT frame.
const NOTIFICATION_HISTORY_LIMIT: i64 = 50;

/// `GET /ws`: multiplexed lending websocket.
///
/// Clients send `SUBSCRIBE` / `UNSUBSCRIBE` frames on the
/// `lending_orderbook`, `lending_orders` and `notification` channels and
/// receive `INIT`, `UPDATE`, lifecycle and `ERROR` frames back.
pub(super) async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Background task that drives a single WebSocket connection.
///
/// Outbound frames come from the client's bounded queue. The loop ends
/// when the peer disconnects, the client is kicked for overflowing its
/// queue, or the server shuts down. The client is then removed from every
/// registry.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client, mut outbound) = Client::new(state.client_queue_capacity);
    let (mut sink, mut stream) = socket.split();
    let mut shutdown = state.shutdown.clone();
    tracing::debug!(client_id = %client.id(), "WS: connection opened");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            _ = client.kicked() => {
                tracing::warn!(client_id = %client.id(), "WS: client kicked for slow consumption");
                break;
            }

            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&state, &client, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(client_id = %client.id(), error = %e, "WS: receive failed");
                        break;
                    }
                }
            }
        }
    }

    state.order_books.unsubscribe(&client).await;
    state.users.lending_orders.unsubscribe(&client).await;
    state.users.notifications.unsubscribe(&client).await;
    let _ = sink.send(Message::Close(None)).await;
    tracing::debug!(client_id = %client.id(), "WS: connection closed");
}

async fn handle_client_frame(state: &AppState, client: &Arc<Client>, text: &str) {
    let frame: WsFrame<Value> = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(client_id = %client.id(), error = %e, "WS: undecodable frame");
            return;
        }
    };

    let WsFrame { channel, event } = frame;
    match channel.as_str() {
        channels::LENDING_ORDER_BOOK => {
            handle_order_book(state, client, event).await;
        }
        channels::LENDING_ORDERS => {
            handle_address_channel(&state.users.lending_orders, client, event).await;
        }
        channels::NOTIFICATION => {
            if let Some(address) =
                handle_address_channel(&state.users.notifications, client, event).await
            {
                send_notification_history(state, client, &address).await;
            }
        }
        other => {
            reply_error(client, other, "unknown channel");
        }
    }
}

async fn handle_order_book(state: &AppState, client: &Arc<Client>, event: WsEvent<Value>) {
    let registry = state.order_books.as_ref();
    match event.event_type {
        EventType::Control(ControlEvent::Subscribe) => {
            let (term, token) = match parse_order_book_subscription(event.payload) {
                Ok(sub) => sub,
                Err(msg) => {
                    reply_error(client, registry.name(), msg);
                    return;
                }
            };
            let channel_id = lending_order_book_channel_id(term, &token);
            if !join(registry, &channel_id, client).await {
                return;
            }
            match state.store.get_lending_order_book(term, &token).await {
                Ok(book) => {
                    let _ = registry.send_init_message(client, &book);
                }
                Err(e) => {
                    tracing::error!(channel_id = %channel_id, error = %e, "WS: failed to load order book");
                    let _ = registry.send_error_message(client, "failed to load order book");
                }
            }
        }
        EventType::Control(ControlEvent::Unsubscribe) => {
            match parse_order_book_subscription(event.payload) {
                Ok((term, token)) => {
                    registry
                        .unsubscribe_channel(&lending_order_book_channel_id(term, &token), client)
                        .await;
                }
                Err(_) => registry.unsubscribe(client).await,
            }
        }
        _ => reply_error(client, registry.name(), "unsupported event"),
    }
}

/// Subscribe / unsubscribe on an address-keyed channel. Returns the address
/// on a successful subscribe.
async fn handle_address_channel<P: Serialize>(
    registry: &SubscriptionRegistry<P>,
    client: &Arc<Client>,
    event: WsEvent<Value>,
) -> Option<String> {
    match event.event_type {
        EventType::Control(ControlEvent::Subscribe) => {
            let address = match parse_address(event.payload) {
                Ok(address) => address,
                Err(msg) => {
                    reply_error(client, registry.name(), msg);
                    return None;
                }
            };
            join(registry, &user_channel_id(&address), client)
                .await
                .then_some(address)
        }
        EventType::Control(ControlEvent::Unsubscribe) => {
            match parse_address(event.payload) {
                Ok(address) => {
                    registry
                        .unsubscribe_channel(&user_channel_id(&address), client)
                        .await
                }
                Err(_) => registry.unsubscribe(client).await,
            }
            None
        }
        _ => {
            reply_error(client, registry.name(), "unsupported event");
            None
        }
    }
}

/// Subscribe, logging when the connection is already gone. Nothing is
/// replied since nobody is left to read it.
async fn join<P: Serialize>(
    registry: &SubscriptionRegistry<P>,
    channel_id: &str,
    client: &Arc<Client>,
) -> bool {
    match registry.subscribe(channel_id, client).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(
                registry = registry.name(),
                channel_id,
                error = %e,
                "WS: subscribe on a closed connection"
            );
            false
        }
    }
}

async fn send_notification_history(state: &AppState, client: &Client, address: &str) {
    let registry = &state.users.notifications;
    match state
        .store
        .get_notifications_by_user(address, NOTIFICATION_HISTORY_LIMIT)
        .await
    {
        Ok(notifications) => {
            let _ = registry.send_init_message(client, &notifications);
        }
        Err(e) => {
            tracing::error!(address, error = %e, "WS: failed to load notifications");
            let _ = registry.send_error_message(client, "failed to load notifications");
        }
    }
}

fn reply_error(client: &Client, channel: &str, message: &str) {
    let _ = client.send_message(channel, ControlEvent::Error, &WsErrorPayload::new(message));
}

fn parse_order_book_subscription(payload: Value) -> Result<(u64, String), &'static str> {
    let sub: OrderBookSubscription =
        serde_json::from_value(payload).map_err(|_| "expected {\"term\", \"lendingToken\"}")?;
    if sub.term == 0 {
        return Err("term must be greater than zero");
    }
    if !is_hex_address(&sub.lending_token) {
        return Err("lendingToken is not a valid address");
    }
    Ok((sub.term, sub.lending_token))
}

fn parse_address(payload: Value) -> Result<String, &'static str> {
    match payload {
        Value::String(address) if is_hex_address(&address) => Ok(address),
        _ => Err("expected a user address"),
    }
}
