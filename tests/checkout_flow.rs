//! End-to-end cart-to-order flows over the in-memory store.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use shopcore::domain::{OrderStatus, Product, ShippingAddress};
use shopcore::error::Error;
use shopcore::events::EventBus;
use shopcore::pricing::PricingConfig;
use shopcore::service::order::CreateOrder;
use shopcore::service::{CartService, InventoryReservation, OrderService, Principal};
use shopcore::store::{MemoryStore, ProductStore, StockLine};

struct Harness {
    carts: CartService,
    orders: OrderService,
    store: MemoryStore,
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    let products: Arc<dyn ProductStore> = Arc::new(store.clone());
    let carts = CartService::new(products.clone(), Arc::new(store.clone()));
    let inventory = InventoryReservation::new(products);
    let orders = OrderService::new(
        Arc::new(store.clone()),
        inventory,
        carts.clone(),
        PricingConfig::default(),
        EventBus::default(),
    );
    Harness { carts, orders, store }
}

async fn seed(store: &MemoryStore, name: &str, price: i64, stock: u32) -> Uuid {
    let product = Product::new(name, Decimal::new(price, 0), stock);
    let id = product.id;
    store.insert(&product).await.unwrap();
    id
}

fn customer() -> Principal {
    Principal { id: Uuid::new_v4(), is_admin: false }
}

fn admin() -> Principal {
    Principal { id: Uuid::new_v4(), is_admin: true }
}

fn order_request(lines: Vec<StockLine>) -> CreateOrder {
    CreateOrder {
        lines,
        shipping_address: ShippingAddress {
            street: "221B Baker Street".into(),
            city: "London".into(),
            state: "Greater London".into(),
            country: "UK".into(),
            pincode: "NW1 6XE".into(),
        },
        payment_method: "card".into(),
        payment_id: None,
        order_notes: None,
    }
}

#[tokio::test]
async fn cart_to_order_round_trip() {
    let h = harness();
    let user = customer();
    let pid = seed(&h.store, "Hat", 400, 5).await;

    // stock=5, add 3: quantity 3, total 3 * price.
    let cart = h.carts.add_item(user.id, pid, 3).await.unwrap();
    assert_eq!(cart.item(pid).unwrap().quantity, 3);
    assert_eq!(cart.total_amount(), Decimal::new(1200, 0));

    // Updating to 6 with stock 5 fails and leaves the cart untouched.
    let err = h.carts.update_item(user.id, pid, 6).await.unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
    let cart = h.carts.get_active(user.id).await.unwrap().unwrap();
    assert_eq!(cart.item(pid).unwrap().quantity, 3);

    // Checkout the cart's lines.
    let lines: Vec<StockLine> = cart
        .items()
        .iter()
        .map(|i| StockLine { product_id: i.product_id, quantity: i.quantity })
        .collect();
    let order = h.orders.create(user, order_request(lines)).await.unwrap();

    assert_eq!(order.total_amount, Decimal::new(1200, 0));
    assert_eq!(order.tax, Decimal::new(120, 0));
    // Subtotal above 1000 ships free.
    assert_eq!(order.shipping_charges, Decimal::ZERO);
    assert_eq!(h.store.stock_of(pid), Some(2));

    // Checkout consumed the cart.
    assert!(h.carts.get_active(user.id).await.unwrap().is_none());

    // The snapshot keeps its price even if the catalog moves.
    let mut product = h.store.find(pid).await.unwrap().unwrap();
    product.price = Decimal::new(999, 0);
    h.store.insert(&product).await.unwrap();
    let fetched = h.orders.get_by_id(user, order.id).await.unwrap();
    assert_eq!(fetched.items[0].unit_price, Decimal::new(400, 0));
}

#[tokio::test]
async fn partial_insufficiency_rolls_back_whole_order() {
    let h = harness();
    let user = customer();
    let a = seed(&h.store, "A", 100, 10).await;
    let b = seed(&h.store, "B", 100, 1).await;

    let err = h
        .orders
        .create(
            user,
            order_request(vec![
                StockLine { product_id: a, quantity: 2 },
                StockLine { product_id: b, quantity: 2 },
            ]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Invalid(_)));
    assert_eq!(h.store.stock_of(a), Some(10));
    assert_eq!(h.store.stock_of(b), Some(1));
    assert!(h.orders.list_for_user(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_restores_stock_once() {
    let h = harness();
    let user = customer();
    let pid = seed(&h.store, "Coat", 250, 8).await;

    let order = h
        .orders
        .create(user, order_request(vec![StockLine { product_id: pid, quantity: 5 }]))
        .await
        .unwrap();
    assert_eq!(h.store.stock_of(pid), Some(3));

    let cancelled = h.orders.update_status(admin(), order.id, "CANCELLED").await.unwrap();
    assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
    assert_eq!(h.store.stock_of(pid), Some(8));

    assert!(h.orders.update_status(admin(), order.id, "CANCELLED").await.is_err());
    assert_eq!(h.store.stock_of(pid), Some(8));
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let h = harness();
    let pid = seed(&h.store, "Limited", 50, 5).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let orders = h.orders.clone();
        handles.push(tokio::spawn(async move {
            orders
                .create(
                    customer(),
                    order_request(vec![StockLine { product_id: pid, quantity: 1 }]),
                )
                .await
                .is_ok()
        }));
    }

    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            placed += 1;
        }
    }
    assert_eq!(placed, 5);
    assert_eq!(h.store.stock_of(pid), Some(0));
    assert_eq!(h.orders.list_all(admin()).await.unwrap().len(), 5);
}

#[tokio::test]
async fn non_admin_cannot_drive_the_state_machine() {
    let h = harness();
    let owner = customer();
    let pid = seed(&h.store, "Shoes", 80, 4).await;
    let order = h
        .orders
        .create(owner, order_request(vec![StockLine { product_id: pid, quantity: 1 }]))
        .await
        .unwrap();

    assert!(matches!(
        h.orders.update_status(owner, order.id, "PROCESSING").await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        h.orders.update_payment_status(owner, order.id, "COMPLETED", None).await,
        Err(Error::Forbidden(_))
    ));
    // Another customer cannot even read it.
    assert!(matches!(
        h.orders.get_by_id(customer(), order.id).await,
        Err(Error::Forbidden(_))
    ));
}
