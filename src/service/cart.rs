//! Cart operations.
//!
//! Every mutating operation holds a per-user async lock for its whole
//! read-modify-write span, so rapid double-submits from one user cannot lose
//! updates. Stock checks here are advisory previews against the live ledger;
//! the binding check happens at reservation time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::domain::{Cart, Product};
use crate::error::{Error, Result};
use crate::store::{CartStore, ProductStore};

#[derive(Clone)]
pub struct CartService {
    products: Arc<dyn ProductStore>,
    carts: Arc<dyn CartStore>,
    locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl CartService {
    pub fn new(products: Arc<dyn ProductStore>, carts: Arc<dyn CartStore>) -> Self {
        Self {
            products,
            carts,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        // Entries held only by the map belong to idle users; drop them so
        // the map does not grow with every user ever seen.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(user_id).or_default().clone()
    }

    /// The user's active cart, if any. Never creates one.
    pub async fn get_active(&self, user_id: Uuid) -> Result<Option<Cart>> {
        self.carts.find_active(user_id).await
    }

    /// Adds `quantity` units of a product, creating the cart lazily on the
    /// first add and merging into an existing line otherwise.
    pub async fn add_item(&self, user_id: Uuid, product_id: Uuid, quantity: u32) -> Result<Cart> {
        if quantity == 0 {
            return Err(Error::Invalid("Quantity must be at least 1".into()));
        }
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let product = self.require_product(product_id).await?;
        if !product.is_available {
            return Err(Error::Invalid("Product is not available".into()));
        }
        if quantity > product.stock_quantity {
            return Err(Error::Invalid("Insufficient stock".into()));
        }

        let mut cart = match self.carts.find_active(user_id).await? {
            Some(cart) => cart,
            None => Cart::new(user_id),
        };

        if let Some(existing) = cart.item(product_id) {
            if existing.quantity + quantity > product.stock_quantity {
                return Err(Error::Invalid(
                    "Cannot add more items than available in stock".into(),
                ));
            }
        }
        cart.add_item(product_id, quantity, product.price);

        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Sets a line to an absolute quantity; zero removes the line. The price
    /// snapshot is refreshed from the catalog.
    pub async fn update_item(&self, user_id: Uuid, product_id: Uuid, quantity: i64) -> Result<Cart> {
        if quantity < 0 {
            return Err(Error::Invalid("Quantity cannot be negative".into()));
        }
        // No stock fits in more than u32, so an overflowing request can only
        // ever exceed it.
        let quantity = u32::try_from(quantity).map_err(|_| {
            Error::Invalid("Cannot add more items than available in stock".into())
        })?;
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut cart = self
            .carts
            .find_active(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Cart not found".into()))?;
        if cart.item(product_id).is_none() {
            return Err(Error::NotFound("Product not found in cart".into()));
        }

        let product = self.require_product(product_id).await?;
        if quantity > product.stock_quantity {
            return Err(Error::Invalid(
                "Cannot add more items than available in stock".into(),
            ));
        }

        cart.set_quantity(product_id, quantity, product.price);
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Removes a line. Absent lines are a no-op; a missing cart is an error.
    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<Cart> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut cart = self
            .carts
            .find_active(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Cart not found".into()))?;
        cart.remove_item(product_id);
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Empties the cart. Returns None when there was no cart to clear.
    pub async fn clear(&self, user_id: Uuid) -> Result<Option<Cart>> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let Some(mut cart) = self.carts.find_active(user_id).await? else {
            return Ok(None);
        };
        cart.clear();
        self.carts.save(&cart).await?;
        Ok(Some(cart))
    }

    /// Transitions the active cart to abandoned.
    pub async fn abandon(&self, user_id: Uuid) -> Result<()> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut cart = self
            .carts
            .find_active(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("No active cart found".into()))?;
        cart.abandon();
        self.carts.save(&cart).await?;
        tracing::info!(user_id = %user_id, cart_id = %cart.id, "cart abandoned");
        Ok(())
    }

    /// Marks the active cart completed after checkout. Best-effort; callers
    /// treat failure as non-fatal.
    pub async fn complete(&self, user_id: Uuid) -> Result<()> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if let Some(mut cart) = self.carts.find_active(user_id).await? {
            cart.complete();
            self.carts.save(&cart).await?;
        }
        Ok(())
    }

    async fn require_product(&self, product_id: Uuid) -> Result<Product> {
        self.products
            .find(product_id)
            .await?
            .ok_or_else(|| Error::NotFound("Product not found".into()))
    }
}
