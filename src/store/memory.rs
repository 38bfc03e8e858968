//! In-memory store backed by mutex-guarded maps. Used by the test suite;
//! batch reservation is atomic because validation and decrement happen under
//! a single lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Cart, CartStatus, Order, OrderStatus, PaymentStatus, Product};
use crate::error::{Error, Result};

use super::{CartStore, OrderStore, ProductStore, ReservedLine, StockLine};

#[derive(Default)]
struct Inner {
    products: Mutex<HashMap<Uuid, Product>>,
    carts: Mutex<HashMap<Uuid, Cart>>,
    orders: Mutex<HashMap<Uuid, Order>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stock for a product; test helper.
    pub fn stock_of(&self, product_id: Uuid) -> Option<u32> {
        self.inner
            .products
            .lock()
            .unwrap()
            .get(&product_id)
            .map(|p| p.stock_quantity)
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn insert(&self, product: &Product) -> Result<()> {
        self.inner
            .products
            .lock()
            .unwrap()
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.inner.products.lock().unwrap().get(&id).cloned())
    }

    async fn reserve(&self, lines: &[StockLine]) -> Result<Vec<ReservedLine>> {
        let mut products = self.inner.products.lock().unwrap();

        // Validate every line before touching any counter; the lock makes
        // the whole batch atomic with respect to concurrent reservations.
        for line in lines {
            let product = products.get(&line.product_id).ok_or_else(|| {
                Error::NotFound(format!("Product not found with id: {}", line.product_id))
            })?;
            if line.quantity > product.stock_quantity {
                return Err(Error::Invalid(format!(
                    "Insufficient stock for product: {}",
                    product.name
                )));
            }
        }

        let mut reserved = Vec::with_capacity(lines.len());
        for line in lines {
            let product = products
                .get_mut(&line.product_id)
                .expect("validated above");
            product.stock_quantity -= line.quantity;
            reserved.push(ReservedLine {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.price,
            });
        }
        Ok(reserved)
    }

    async fn release(&self, lines: &[StockLine]) -> Result<()> {
        let mut products = self.inner.products.lock().unwrap();
        for line in lines {
            if let Some(product) = products.get_mut(&line.product_id) {
                product.stock_quantity = product.stock_quantity.saturating_add(line.quantity);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find_active(&self, user_id: Uuid) -> Result<Option<Cart>> {
        Ok(self
            .inner
            .carts
            .lock()
            .unwrap()
            .values()
            .find(|c| c.user_id == user_id && c.status == CartStatus::Active)
            .cloned())
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        let mut carts = self.inner.carts.lock().unwrap();
        if cart.status == CartStatus::Active {
            let duplicate = carts
                .values()
                .any(|c| c.user_id == cart.user_id && c.status == CartStatus::Active && c.id != cart.id);
            if duplicate {
                return Err(Error::Conflict("User already has an active cart".into()));
            }
        }
        carts.insert(cart.id, cart.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        self.inner.orders.lock().unwrap().insert(order.id, order.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.inner.orders.lock().unwrap().get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .inner
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.inner.orders.lock().unwrap().values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<()> {
        let mut orders = self.inner.orders.lock().unwrap();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("Order not found".into()))?;
        order.order_status = status;
        order.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn cancel(&self, id: Uuid, restock: &[StockLine]) -> Result<()> {
        let mut orders = self.inner.orders.lock().unwrap();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("Order not found".into()))?;
        order.order_status = OrderStatus::Cancelled;
        order.updated_at = chrono::Utc::now();

        let mut products = self.inner.products.lock().unwrap();
        for line in restock {
            if let Some(product) = products.get_mut(&line.product_id) {
                product.stock_quantity = product.stock_quantity.saturating_add(line.quantity);
            }
        }
        Ok(())
    }

    async fn update_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_id: Option<String>,
    ) -> Result<()> {
        let mut orders = self.inner.orders.lock().unwrap();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("Order not found".into()))?;
        order.payment_status = status;
        if payment_id.is_some() {
            order.payment_id = payment_id;
        }
        order.updated_at = chrono::Utc::now();
        Ok(())
    }
}
