//! Order aggregate: an immutable line-item and price snapshot plus the
//! order/payment status state machines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::Error;
use crate::pricing::OrderTotals;

/// PENDING -> PROCESSING -> SHIPPED -> DELIVERED, forward-only and without
/// skipping; any non-terminal state may move to CANCELLED. DELIVERED and
/// CANCELLED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
                | (Shipped, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(Error::Invalid(format!("Invalid order status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(Error::Invalid(format!("Invalid payment status: {other}"))),
        }
    }
}

/// Line item with the unit price captured at reservation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Rejects empty and whitespace-only values.
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(custom(function = "not_blank", message = "street is required"))]
    pub street: String,
    #[validate(custom(function = "not_blank", message = "city is required"))]
    pub city: String,
    #[validate(custom(function = "not_blank", message = "state is required"))]
    pub state: String,
    #[validate(custom(function = "not_blank", message = "country is required"))]
    pub country: String,
    #[validate(custom(function = "not_blank", message = "pincode is required"))]
    pub pincode: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub payment_id: Option<String>,
    /// Item subtotal only; tax and shipping are carried separately.
    pub total_amount: Decimal,
    pub tax: Decimal,
    pub shipping_charges: Decimal,
    pub order_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a PENDING/PENDING order from reserved line items and a pricing
    /// quote. Totals are computed once here and never recomputed.
    pub fn new(
        user_id: Uuid,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        payment_method: String,
        payment_id: Option<String>,
        order_notes: Option<String>,
        totals: OrderTotals,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number: format!("ORD-{:08}", rand::random::<u32>() % 100_000_000),
            user_id,
            items,
            shipping_address,
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method,
            payment_id,
            total_amount: totals.subtotal,
            tax: totals.tax,
            shipping_charges: totals.shipping_charges,
            order_notes,
            created_at: now,
            updated_at: now,
        }
    }
}
