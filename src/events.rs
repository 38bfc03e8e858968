//! Best-effort domain event publication over NATS.
//!
//! The bus is a no-op when no NATS url is configured; publish failures are
//! logged and never propagated into the request path.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderCreated {
        order_id: Uuid,
        user_id: Uuid,
        total_amount: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    PaymentStatusChanged {
        order_id: Uuid,
        status: PaymentStatus,
    },
}

impl DomainEvent {
    fn subject(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated { .. } => "orders.created",
            DomainEvent::OrderStatusChanged { .. } => "orders.status",
            DomainEvent::PaymentStatusChanged { .. } => "orders.payment",
        }
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    client: Option<async_nats::Client>,
}

impl EventBus {
    pub fn new(client: Option<async_nats::Client>) -> Self {
        Self { client }
    }

    pub async fn publish(&self, event: DomainEvent) {
        let Some(client) = &self.client else { return };
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize domain event");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject(), payload.into()).await {
            tracing::warn!(error = %e, subject = event.subject(), "failed to publish event");
        }
    }
}
