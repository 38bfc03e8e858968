//! Product record. `stock_quantity` is the authoritative stock ledger,
//! mutated only through the store's reserve/release operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock_quantity: u32,
    /// Per-size sub-counts. Kept independent of `stock_quantity`; the two
    /// are never reconciled against each other.
    pub sizes: Vec<SizeStock>,
    /// Soft-delete flag; unavailable products cannot be added to a cart.
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeStock {
    pub size: String,
    pub quantity: u32,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Decimal, stock_quantity: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            price,
            stock_quantity,
            sizes: vec![],
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }
}
