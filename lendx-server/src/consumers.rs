//! Broker subscribers feeding the in-process channels.

use async_nats::Subscriber;
use futures_util::StreamExt;
use lendx_core::events::{EngineResponseSender, OrderMessageSender};
use lendx_sdk::objects::broker::message_types;
use lendx_sdk::objects::{BrokerMessage, EngineResponse};
use tokio::sync::watch;

/// Turn one raw response-subject payload into an [`EngineResponse`].
///
/// Returns `None` (after logging) for anything that is not a well-formed
/// `LENDING_ORDER_RESPONSE` envelope.
fn decode_engine_response(payload: &[u8]) -> Option<EngineResponse> {
    let message = match BrokerMessage::from_slice(payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding undecodable broker message");
            return None;
        }
    };
    if message.message_type != message_types::LENDING_ORDER_RESPONSE {
        tracing::warn!(message_type = %message.message_type, "Unexpected message on response subject");
        return None;
    }
    match message.decode::<EngineResponse>() {
        Ok(res) => Some(res),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding malformed engine response");
            None
        }
    }
}

/// Forward engine responses from the response subject to the dispatcher.
pub async fn consume_engine_responses(
    mut subscriber: Subscriber,
    response_tx: EngineResponseSender,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!("EngineResponse consumer started");

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("EngineResponse consumer received shutdown signal");
                    break;
                }
            }

            Some(message) = subscriber.next() => {
                let Some(res) = decode_engine_response(&message.payload) else {
                    continue;
                };
                if response_tx.send(res).await.is_err() {
                    tracing::warn!("Dispatcher channel closed");
                    break;
                }
            }

            else => {
                tracing::info!("Response subscription ended");
                break;
            }
        }
    }

    tracing::info!("EngineResponse consumer shutdown complete");
}

/// Forward inbound order messages from the order subject to the intake.
pub async fn consume_order_messages(
    mut subscriber: Subscriber,
    message_tx: OrderMessageSender,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!("Order message consumer started");

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Order message consumer received shutdown signal");
                    break;
                }
            }

            Some(message) = subscriber.next() => {
                let decoded = match BrokerMessage::from_slice(&message.payload) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        tracing::warn!(error = %e, "Discarding undecodable order message");
                        continue;
                    }
                };
                if message_tx.send(decoded).await.is_err() {
                    tracing::warn!("Intake channel closed");
                    break;
                }
            }

            else => {
                tracing::info!("Order subscription ended");
                break;
            }
        }
    }

    tracing::info!("Order message consumer shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendx_sdk::objects::EngineStatus;
    use serde_json::json;

    fn order_json() -> serde_json::Value {
        json!({
            "hash": "0xabc",
            "userAddress": "0x1111111111111111111111111111111111111111",
            "side": "BORROW",
            "term": 60,
            "interest": 5,
            "lendingToken": "0x2222222222222222222222222222222222222222",
            "quantity": "100",
            "status": "OPEN"
        })
    }

    #[test]
    fn test_decodes_engine_response_envelope() {
        let raw = json!({
            "type": "LENDING_ORDER_RESPONSE",
            "data": {"status": "LENDING_ORDER_ADDED", "lendingOrder": order_json()}
        });
        let res = decode_engine_response(raw.to_string().as_bytes()).unwrap();
        assert_eq!(res.status, EngineStatus::Added);
        assert_eq!(res.lending_order.hash, "0xabc");
    }

    #[test]
    fn test_skips_foreign_or_broken_payloads() {
        let wrong_type = json!({"type": "NEW_LENDING_ORDER", "data": order_json()});
        assert!(decode_engine_response(wrong_type.to_string().as_bytes()).is_none());
        assert!(decode_engine_response(b"not json").is_none());
        let bad_data = json!({"type": "LENDING_ORDER_RESPONSE", "data": {"status": 1}});
        assert!(decode_engine_response(bad_data.to_string().as_bytes()).is_none());
    }
}
