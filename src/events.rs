//! Domain events published to NATS

use crate::AppState;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderCreated { order_id: Uuid, customer_id: Uuid },
}

impl DomainEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "store.orders.created",
        }
    }
}

/// Best-effort publish. Consumers (stock sync, notifications) are outside
/// this service; a failed publish is logged and never fails the request.
pub async fn publish(state: &AppState, event: &DomainEvent) {
    let Some(nats) = &state.nats else { return };
    let payload = match serde_json::to_vec(event) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("event serialization failed: {}", e);
            return;
        }
    };
    if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
        tracing::warn!(subject = event.subject(), "event publish failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_created_payload() {
        let event = DomainEvent::OrderCreated { order_id: Uuid::nil(), customer_id: Uuid::nil() };
        assert_eq!(event.subject(), "store.orders.created");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order_created");
        assert!(json["order_id"].is_string());
    }
}
