//! Storage traits. Two implementations: Postgres (production) and in-memory
//! (tests). Stock mutation goes through `ProductStore::reserve` and
//! `ProductStore::release` only; nothing else writes `stock_quantity`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Cart, Order, OrderStatus, PaymentStatus, Product};
use crate::error::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A (product, quantity) pair requested for reservation or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// A committed decrement, with the unit price captured at that moment.
#[derive(Debug, Clone)]
pub struct ReservedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert(&self, product: &Product) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<Product>>;

    /// Atomically decrements stock for every line, or for none of them.
    ///
    /// Fails with NotFound on the first missing product and with Invalid
    /// ("Insufficient stock for product: ...") on the first line whose
    /// quantity exceeds the available stock; in both cases no decrement from
    /// this call survives.
    async fn reserve(&self, lines: &[StockLine]) -> Result<Vec<ReservedLine>>;

    /// Best-effort restock: increments stock per line, silently skipping
    /// products that no longer exist.
    async fn release(&self, lines: &[StockLine]) -> Result<()>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// The user's cart with status `active`, if any. At most one exists.
    async fn find_active(&self, user_id: Uuid) -> Result<Option<Cart>>;

    /// Upserts the cart. Fails with Conflict if saving would leave the user
    /// with two active carts.
    async fn save(&self, cart: &Cart) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<Order>>;

    /// Orders for one user, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;

    /// All orders, newest first.
    async fn list_all(&self) -> Result<Vec<Order>>;

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<()>;

    /// Marks the order CANCELLED and restores the given stock lines in one
    /// atomic step; both take effect or neither does. Lines whose product no
    /// longer exists are skipped, as in `ProductStore::release`.
    async fn cancel(&self, id: Uuid, restock: &[StockLine]) -> Result<()>;

    async fn update_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_id: Option<String>,
    ) -> Result<()>;
}
