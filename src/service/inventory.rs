//! Inventory reservation: the sole writer of the stock ledger.
//!
//! `reserve` validates and commits the whole batch or none of it, returning
//! order line items with prices captured at the moment of the decrement.
//! `release` is the best-effort inverse used on cancellation.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::OrderItem;
use crate::error::{Error, Result};
use crate::store::{ProductStore, StockLine};

/// Outcome of a successful reservation: priced line items plus their subtotal.
#[derive(Debug, Clone)]
pub struct ReservedOrder {
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
}

#[derive(Clone)]
pub struct InventoryReservation {
    products: Arc<dyn ProductStore>,
}

impl InventoryReservation {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self { products }
    }

    /// Atomically decrements stock for every requested line.
    ///
    /// Fails with Invalid on an empty batch or a zero quantity, NotFound if
    /// any product is missing, Invalid if any line exceeds available stock.
    /// On failure no stock is decremented for any line in the batch.
    pub async fn reserve(&self, lines: &[StockLine]) -> Result<ReservedOrder> {
        if lines.is_empty() {
            return Err(Error::Invalid("Products are required".into()));
        }
        if lines.iter().any(|l| l.quantity == 0) {
            return Err(Error::Invalid("Quantity must be at least 1".into()));
        }

        let reserved = self.products.reserve(lines).await?;

        let mut subtotal = Decimal::ZERO;
        let mut items = Vec::with_capacity(reserved.len());
        for line in reserved {
            subtotal += line.unit_price * Decimal::from(line.quantity);
            items.push(OrderItem {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        tracing::info!(lines = items.len(), %subtotal, "stock reserved");
        Ok(ReservedOrder { items, subtotal })
    }

    /// Restores stock for the given lines. Products that have disappeared
    /// from the catalog are skipped silently.
    pub async fn release(&self, lines: &[StockLine]) -> Result<()> {
        self.products.release(lines).await?;
        tracing::info!(lines = lines.len(), "stock released");
        Ok(())
    }
}
