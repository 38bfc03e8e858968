//! Cart aggregate: one mutable, per-user collection of candidate line items
//! with cached unit prices.
//!
//! Items and the cached total are private. Every mutator recomputes the total
//! from the items, so the cached value can never drift from the contents.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    Active,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: u32,
    /// Unit price captured from the catalog at the last mutation touching
    /// this line; decoupled from the live product price afterwards.
    pub unit_price: Decimal,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: CartStatus,
    items: Vec<CartItem>,
    total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: CartStatus::Active,
            items: vec![],
            total_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a cart loaded from storage. The total is recomputed from the
    /// items rather than trusted from the row.
    pub fn restore(
        id: Uuid,
        user_id: Uuid,
        status: CartStatus,
        items: Vec<CartItem>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut cart = Self { id, user_id, status, items, total_amount: Decimal::ZERO, created_at, updated_at };
        cart.recalculate();
        cart
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, product_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Adds `quantity` units, merging into an existing line if present.
    /// The price snapshot is refreshed from the catalog on every add.
    pub fn add_item(&mut self, product_id: Uuid, quantity: u32, unit_price: Decimal) {
        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(existing) => {
                existing.quantity += quantity;
                existing.unit_price = unit_price;
            }
            None => self.items.push(CartItem { product_id, quantity, unit_price }),
        }
        self.recalculate();
    }

    /// Sets an existing line to `quantity`, refreshing its price snapshot.
    /// Quantity zero removes the line. Returns false if the line is absent.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: u32, unit_price: Decimal) -> bool {
        if quantity == 0 {
            let before = self.items.len();
            self.items.retain(|i| i.product_id != product_id);
            if self.items.len() == before {
                return false;
            }
        } else {
            let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) else {
                return false;
            };
            item.quantity = quantity;
            item.unit_price = unit_price;
        }
        self.recalculate();
        true
    }

    /// Idempotent removal; absent lines are a no-op.
    pub fn remove_item(&mut self, product_id: Uuid) {
        self.items.retain(|i| i.product_id != product_id);
        self.recalculate();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.recalculate();
    }

    pub fn abandon(&mut self) {
        self.status = CartStatus::Abandoned;
        self.touch();
    }

    pub fn complete(&mut self) {
        self.status = CartStatus::Completed;
        self.touch();
    }

    fn recalculate(&mut self) {
        self.total_amount = self
            .items
            .iter()
            .fold(Decimal::ZERO, |acc, item| acc + item.line_total());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
