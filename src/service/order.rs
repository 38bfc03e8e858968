//! Order operations: creation through inventory reservation, reads gated by
//! ownership, and the admin-only status/payment transitions.

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::domain::{Order, OrderStatus, PaymentStatus, ShippingAddress};
use crate::error::{Error, Result};
use crate::events::{DomainEvent, EventBus};
use crate::pricing::PricingConfig;
use crate::store::{OrderStore, StockLine};

use super::{CartService, InventoryReservation, Principal};

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub lines: Vec<StockLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub payment_id: Option<String>,
    pub order_notes: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    inventory: InventoryReservation,
    carts: CartService,
    pricing: PricingConfig,
    events: EventBus,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        inventory: InventoryReservation,
        carts: CartService,
        pricing: PricingConfig,
        events: EventBus,
    ) -> Self {
        Self { orders, inventory, carts, pricing, events }
    }

    /// Creates a PENDING order, reserving stock for every line atomically
    /// and pricing it from the subtotal captured at reservation.
    pub async fn create(&self, principal: Principal, request: CreateOrder) -> Result<Order> {
        if request.lines.is_empty() {
            return Err(Error::Invalid("Products are required".into()));
        }
        if request.payment_method.trim().is_empty() {
            return Err(Error::Invalid(
                "Shipping address and payment method are required".into(),
            ));
        }
        request.shipping_address.validate()?;

        let reserved = self.inventory.reserve(&request.lines).await?;
        let totals = self.pricing.quote(reserved.subtotal);
        let order = Order::new(
            principal.id,
            reserved.items,
            request.shipping_address,
            request.payment_method,
            request.payment_id,
            request.order_notes,
            totals,
        );

        if let Err(err) = self.orders.insert(&order).await {
            // Persistence failed after the decrement committed; put the
            // stock back before surfacing the error.
            let lines: Vec<StockLine> = order
                .items
                .iter()
                .map(|i| StockLine { product_id: i.product_id, quantity: i.quantity })
                .collect();
            if let Err(release_err) = self.inventory.release(&lines).await {
                tracing::error!(error = ?release_err, order_id = %order.id, "failed to restock after insert failure");
            }
            return Err(err);
        }

        // Checkout consumes the cart; a failure here does not undo the order.
        if let Err(err) = self.carts.complete(principal.id).await {
            tracing::warn!(error = ?err, user_id = %principal.id, "failed to complete cart after checkout");
        }

        tracing::info!(order_id = %order.id, order_number = %order.order_number, "order created");
        self.events
            .publish(DomainEvent::OrderCreated {
                order_id: order.id,
                user_id: order.user_id,
                total_amount: order.total_amount,
            })
            .await;
        Ok(order)
    }

    /// Fetches one order; only its owner or an admin may see it.
    pub async fn get_by_id(&self, principal: Principal, order_id: Uuid) -> Result<Order> {
        let order = self.require_order(order_id).await?;
        if order.user_id != principal.id && !principal.is_admin {
            return Err(Error::Forbidden(
                "You don't have permission to view this order".into(),
            ));
        }
        Ok(order)
    }

    pub async fn list_for_user(&self, principal: Principal) -> Result<Vec<Order>> {
        self.orders.list_for_user(principal.id).await
    }

    pub async fn list_all(&self, principal: Principal) -> Result<Vec<Order>> {
        if !principal.is_admin {
            return Err(Error::Forbidden(
                "You don't have permission to view all orders".into(),
            ));
        }
        self.orders.list_all().await
    }

    /// Admin-only status transition. Moving into CANCELLED restores stock
    /// for every line item in the same storage transaction as the status
    /// write, so a retried cancellation can never restock twice.
    pub async fn update_status(
        &self,
        principal: Principal,
        order_id: Uuid,
        new_status: &str,
    ) -> Result<Order> {
        if !principal.is_admin {
            return Err(Error::Forbidden(
                "You don't have permission to update order status".into(),
            ));
        }
        let order = self.require_order(order_id).await?;
        let new_status: OrderStatus = new_status.parse()?;

        let previous = order.order_status;
        if !previous.can_transition_to(new_status) {
            return Err(Error::Invalid(format!(
                "Cannot transition order from {previous} to {new_status}"
            )));
        }

        if new_status == OrderStatus::Cancelled {
            let lines: Vec<StockLine> = order
                .items
                .iter()
                .map(|i| StockLine { product_id: i.product_id, quantity: i.quantity })
                .collect();
            self.orders.cancel(order_id, &lines).await?;
        } else {
            self.orders.update_status(order_id, new_status).await?;
        }
        tracing::info!(order_id = %order_id, from = %previous, to = %new_status, "order status updated");
        self.events
            .publish(DomainEvent::OrderStatusChanged {
                order_id,
                from: previous,
                to: new_status,
            })
            .await;

        self.require_order(order_id).await
    }

    /// Admin-only payment status update with an optional gateway payment id.
    pub async fn update_payment_status(
        &self,
        principal: Principal,
        order_id: Uuid,
        new_status: &str,
        payment_id: Option<String>,
    ) -> Result<Order> {
        if !principal.is_admin {
            return Err(Error::Forbidden(
                "You don't have permission to update payment status".into(),
            ));
        }
        self.require_order(order_id).await?;
        let new_status: PaymentStatus = new_status.parse()?;

        self.orders
            .update_payment(order_id, new_status, payment_id)
            .await?;
        self.events
            .publish(DomainEvent::PaymentStatusChanged { order_id, status: new_status })
            .await;

        self.require_order(order_id).await
    }

    async fn require_order(&self, order_id: Uuid) -> Result<Order> {
        self.orders
            .find(order_id)
            .await?
            .ok_or_else(|| Error::NotFound("Order not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Product;
    use crate::store::{MemoryStore, ProductStore};
    use rust_decimal::Decimal;

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            country: "US".into(),
            pincode: "62704".into(),
        }
    }

    fn user() -> Principal {
        Principal { id: Uuid::new_v4(), is_admin: false }
    }

    fn admin() -> Principal {
        Principal { id: Uuid::new_v4(), is_admin: true }
    }

    async fn setup() -> (OrderService, MemoryStore) {
        let store = MemoryStore::new();
        let products: Arc<dyn ProductStore> = Arc::new(store.clone());
        let inventory = InventoryReservation::new(products.clone());
        let carts = CartService::new(products, Arc::new(store.clone()));
        let service = OrderService::new(
            Arc::new(store.clone()),
            inventory,
            carts,
            PricingConfig::default(),
            EventBus::default(),
        );
        (service, store)
    }

    async fn seed(store: &MemoryStore, price: i64, stock: u32) -> Uuid {
        let product = Product::new("Widget", Decimal::new(price, 0), stock);
        let id = product.id;
        ProductStore::insert(store, &product).await.unwrap();
        id
    }

    fn request(lines: Vec<StockLine>) -> CreateOrder {
        CreateOrder {
            lines,
            shipping_address: address(),
            payment_method: "card".into(),
            payment_id: None,
            order_notes: None,
        }
    }

    #[tokio::test]
    async fn create_prices_and_decrements() {
        let (service, store) = setup().await;
        let pid = seed(&store, 200, 10).await;

        let order = service
            .create(user(), request(vec![StockLine { product_id: pid, quantity: 3 }]))
            .await
            .unwrap();

        assert_eq!(order.order_status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total_amount, Decimal::new(600, 0));
        assert_eq!(order.tax, Decimal::new(60, 0));
        // 600 is under the free-shipping threshold.
        assert_eq!(order.shipping_charges, Decimal::new(100, 0));
        assert_eq!(store.stock_of(pid), Some(7));
    }

    #[tokio::test]
    async fn create_with_insufficient_second_line_rolls_back_first() {
        let (service, store) = setup().await;
        let a = seed(&store, 10, 10).await;
        let b = seed(&store, 10, 1).await;
        let principal = user();

        let err = service
            .create(
                principal,
                request(vec![
                    StockLine { product_id: a, quantity: 2 },
                    StockLine { product_id: b, quantity: 5 },
                ]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Invalid(_)));
        assert_eq!(store.stock_of(a), Some(10));
        assert_eq!(store.stock_of(b), Some(1));
        assert!(service.list_for_user(principal).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_requires_lines_and_payment_method() {
        let (service, store) = setup().await;
        let pid = seed(&store, 10, 10).await;

        let err = service.create(user(), request(vec![])).await.unwrap_err();
        assert!(matches!(err, Error::Invalid(msg) if msg == "Products are required"));

        let mut req = request(vec![StockLine { product_id: pid, quantity: 1 }]);
        req.payment_method = "  ".into();
        let err = service.create(user(), req).await.unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));

        let mut req = request(vec![StockLine { product_id: pid, quantity: 1 }]);
        req.shipping_address.city = String::new();
        let err = service.create(user(), req).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        // Nothing above decremented stock.
        assert_eq!(store.stock_of(pid), Some(10));
    }

    #[tokio::test]
    async fn cancel_restores_stock_exactly_once() {
        let (service, store) = setup().await;
        let pid = seed(&store, 50, 10).await;

        let order = service
            .create(user(), request(vec![StockLine { product_id: pid, quantity: 4 }]))
            .await
            .unwrap();
        assert_eq!(store.stock_of(pid), Some(6));

        let cancelled = service
            .update_status(admin(), order.id, "CANCELLED")
            .await
            .unwrap();
        assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
        assert_eq!(store.stock_of(pid), Some(10));

        // A second cancellation is an undefined transition and must not
        // restock again.
        let err = service
            .update_status(admin(), order.id, "CANCELLED")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
        assert_eq!(store.stock_of(pid), Some(10));
    }

    #[tokio::test]
    async fn forward_transitions_do_not_touch_stock() {
        let (service, store) = setup().await;
        let pid = seed(&store, 50, 10).await;
        let order = service
            .create(user(), request(vec![StockLine { product_id: pid, quantity: 2 }]))
            .await
            .unwrap();

        for status in ["PROCESSING", "SHIPPED", "DELIVERED"] {
            service.update_status(admin(), order.id, status).await.unwrap();
            assert_eq!(store.stock_of(pid), Some(8));
        }
        // DELIVERED is terminal.
        assert!(matches!(
            service.update_status(admin(), order.id, "CANCELLED").await,
            Err(Error::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn skipping_forward_is_invalid() {
        let (service, store) = setup().await;
        let pid = seed(&store, 50, 10).await;
        let order = service
            .create(user(), request(vec![StockLine { product_id: pid, quantity: 1 }]))
            .await
            .unwrap();

        let err = service
            .update_status(admin(), order.id, "SHIPPED")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[tokio::test]
    async fn status_updates_are_admin_only() {
        let (service, store) = setup().await;
        let pid = seed(&store, 50, 10).await;
        let owner = user();
        let order = service
            .create(owner, request(vec![StockLine { product_id: pid, quantity: 1 }]))
            .await
            .unwrap();

        // Even the owner is refused.
        assert!(matches!(
            service.update_status(owner, order.id, "PROCESSING").await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            service
                .update_payment_status(owner, order.id, "COMPLETED", None)
                .await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            service.list_all(owner).await,
            Err(Error::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn unknown_status_strings_are_invalid() {
        let (service, store) = setup().await;
        let pid = seed(&store, 50, 10).await;
        let order = service
            .create(user(), request(vec![StockLine { product_id: pid, quantity: 1 }]))
            .await
            .unwrap();

        assert!(matches!(
            service.update_status(admin(), order.id, "SHIPPING").await,
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            service
                .update_payment_status(admin(), order.id, "PAID", None)
                .await,
            Err(Error::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn missing_order_wins_over_bad_status() {
        let (service, _store) = setup().await;

        // The order lookup runs first, so an unknown id answers NotFound
        // even when the status string is also garbage.
        assert!(matches!(
            service.update_status(admin(), Uuid::new_v4(), "BOGUS").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service
                .update_payment_status(admin(), Uuid::new_v4(), "BOGUS", None)
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn payment_update_sets_status_and_id() {
        let (service, store) = setup().await;
        let pid = seed(&store, 50, 10).await;
        let order = service
            .create(user(), request(vec![StockLine { product_id: pid, quantity: 1 }]))
            .await
            .unwrap();

        let updated = service
            .update_payment_status(admin(), order.id, "COMPLETED", Some("pay_123".into()))
            .await
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Completed);
        assert_eq!(updated.payment_id.as_deref(), Some("pay_123"));

        // Omitting the id keeps the stored one.
        let updated = service
            .update_payment_status(admin(), order.id, "REFUNDED", None)
            .await
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Refunded);
        assert_eq!(updated.payment_id.as_deref(), Some("pay_123"));
    }

    #[tokio::test]
    async fn get_by_id_enforces_ownership() {
        let (service, store) = setup().await;
        let pid = seed(&store, 50, 10).await;
        let owner = user();
        let order = service
            .create(owner, request(vec![StockLine { product_id: pid, quantity: 1 }]))
            .await
            .unwrap();

        assert!(service.get_by_id(owner, order.id).await.is_ok());
        assert!(service.get_by_id(admin(), order.id).await.is_ok());
        assert!(matches!(
            service.get_by_id(user(), order.id).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            service.get_by_id(owner, Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn checkout_completes_the_active_cart() {
        let (service, store) = setup().await;
        let pid = seed(&store, 50, 10).await;
        let owner = user();

        let carts = CartService::new(Arc::new(store.clone()), Arc::new(store.clone()));
        carts.add_item(owner.id, pid, 2).await.unwrap();

        service
            .create(owner, request(vec![StockLine { product_id: pid, quantity: 2 }]))
            .await
            .unwrap();
        assert!(carts.get_active(owner.id).await.unwrap().is_none());
    }
}
