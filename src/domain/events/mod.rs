//! Domain events
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Money, Slug};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, slug: Slug },
    InventoryRemoved { product_id: Uuid, quantity: u32 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, user_id: Uuid, total: Money },
    Paid { order_id: Uuid, paid_at: DateTime<Utc> },
    Delivered { order_id: Uuid, delivered_at: DateTime<Utc> },
}

impl DomainEvent {
    /// Message subject, e.g. `ecommerce.order.paid`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(ProductEvent::Created { .. }) => ("product", "created"),
            Self::Product(ProductEvent::InventoryRemoved { .. }) => ("product", "inventory_removed"),
            Self::Order(OrderEvent::Created { .. }) => ("order", "created"),
            Self::Order(OrderEvent::Paid { .. }) => ("order", "paid"),
            Self::Order(OrderEvent::Delivered { .. }) => ("order", "delivered"),
        };
        format!("ecommerce.{aggregate}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_and_payload() {
        let event = DomainEvent::Order(OrderEvent::Created { order_id: Uuid::nil(), user_id: Uuid::nil(), total: Money::from_cents(6400) });
        assert_eq!(event.subject(), "ecommerce.order.created");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["aggregate"], "order");
        assert_eq!(json["event"]["type"], "created");
        assert_eq!(json["event"]["total"], "64.00");
    }
}
