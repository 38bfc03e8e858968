//! HTTP surface. Handlers parse and validate the wire contracts, call the
//! services, and wrap results in the uniform envelope; no business rules
//! live here.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Cart, Order, ShippingAddress};
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::pricing::PricingConfig;
use crate::response::ApiResponse;
use crate::service::{CartService, InventoryReservation, OrderService, Principal};
use crate::store::{CartStore, OrderStore, ProductStore, StockLine};

#[derive(Clone)]
pub struct AppState {
    pub carts: CartService,
    pub orders: OrderService,
}

impl AppState {
    pub fn new(
        products: Arc<dyn ProductStore>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        pricing: PricingConfig,
        events: EventBus,
    ) -> Self {
        let cart_service = CartService::new(products.clone(), carts);
        let inventory = InventoryReservation::new(products);
        let order_service =
            OrderService::new(orders, inventory, cart_service.clone(), pricing, events);
        Self { carts: cart_service, orders: order_service }
    }
}

/// Principal forwarded by the auth gateway via `x-user-id` / `x-user-role`.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(Error::Unauthorized)?;
        let is_admin = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .map(|role| role.eq_ignore_ascii_case("admin"))
            .unwrap_or(false);
        Ok(Principal { id, is_admin })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/cart", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/items", post(add_to_cart).patch(update_cart_item))
        .route("/api/v1/cart/items/:product_id", delete(remove_from_cart))
        .route("/api/v1/cart/abandon", post(abandon_cart))
        .route("/api/v1/orders", post(create_order).get(list_my_orders))
        .route("/api/v1/orders/:order_id", get(get_order))
        .route("/api/v1/orders/:order_id/status", patch(update_order_status))
        .route("/api/v1/orders/:order_id/payment", patch(update_payment_status))
        .route("/api/v1/admin/orders", get(list_all_orders))
}

async fn get_cart(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ApiResponse<serde_json::Value>> {
    match state.carts.get_active(principal.id).await? {
        Some(cart) => Ok(ApiResponse::ok(json!(cart), "Cart retrieved successfully")),
        None => Ok(ApiResponse::ok(
            json!({ "items": [], "totalAmount": 0 }),
            "Cart is empty",
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddToCartRequest {
    product_id: Uuid,
    quantity: Option<u32>,
}

async fn add_to_cart(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<AddToCartRequest>,
) -> Result<ApiResponse<Cart>> {
    let cart = state
        .carts
        .add_item(principal.id, req.product_id, req.quantity.unwrap_or(1))
        .await?;
    Ok(ApiResponse::ok(cart, "Product added to cart successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCartItemRequest {
    product_id: Uuid,
    quantity: i64,
}

async fn update_cart_item(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<UpdateCartItemRequest>,
) -> Result<ApiResponse<Cart>> {
    let cart = state
        .carts
        .update_item(principal.id, req.product_id, req.quantity)
        .await?;
    Ok(ApiResponse::ok(cart, "Cart updated successfully"))
}

async fn remove_from_cart(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<Uuid>,
) -> Result<ApiResponse<Cart>> {
    let cart = state.carts.remove_item(principal.id, product_id).await?;
    Ok(ApiResponse::ok(cart, "Product removed from cart successfully"))
}

async fn clear_cart(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ApiResponse<serde_json::Value>> {
    match state.carts.clear(principal.id).await? {
        Some(_) => Ok(ApiResponse::ok(
            json!({ "items": [], "totalAmount": 0 }),
            "Cart cleared successfully",
        )),
        None => Ok(ApiResponse::ok(json!(null), "Cart is already empty")),
    }
}

async fn abandon_cart(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ApiResponse<serde_json::Value>> {
    state.carts.abandon(principal.id).await?;
    Ok(ApiResponse::ok(json!(null), "Cart marked as abandoned"))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Products are required"))]
    products: Vec<OrderLineRequest>,
    shipping_address: ShippingAddress,
    #[validate(length(min = 1, message = "Payment method is required"))]
    payment_method: String,
    payment_id: Option<String>,
    order_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderLineRequest {
    product_id: Uuid,
    quantity: u32,
}

async fn create_order(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<CreateOrderRequest>,
) -> Result<ApiResponse<Order>> {
    req.validate()?;
    let lines: Vec<StockLine> = req
        .products
        .iter()
        .map(|l| StockLine { product_id: l.product_id, quantity: l.quantity })
        .collect();
    let order = state
        .orders
        .create(
            principal,
            crate::service::order::CreateOrder {
                lines,
                shipping_address: req.shipping_address,
                payment_method: req.payment_method,
                payment_id: req.payment_id,
                order_notes: req.order_notes,
            },
        )
        .await?;
    Ok(ApiResponse::created(order, "Order created successfully"))
}

async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<ApiResponse<Order>> {
    let order = state.orders.get_by_id(principal, order_id).await?;
    Ok(ApiResponse::ok(order, "Order retrieved successfully"))
}

async fn list_my_orders(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ApiResponse<Vec<Order>>> {
    let orders = state.orders.list_for_user(principal).await?;
    Ok(ApiResponse::ok(orders, "Orders retrieved successfully"))
}

async fn list_all_orders(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ApiResponse<Vec<Order>>> {
    let orders = state.orders.list_all(principal).await?;
    Ok(ApiResponse::ok(orders, "All orders retrieved successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOrderStatusRequest {
    order_status: String,
}

async fn update_order_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<ApiResponse<Order>> {
    let order = state
        .orders
        .update_status(principal, order_id, &req.order_status)
        .await?;
    Ok(ApiResponse::ok(order, "Order status updated successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePaymentStatusRequest {
    payment_status: String,
    payment_id: Option<String>,
}

async fn update_payment_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdatePaymentStatusRequest>,
) -> Result<ApiResponse<Order>> {
    let order = state
        .orders
        .update_payment_status(principal, order_id, &req.payment_status, req.payment_id)
        .await?;
    Ok(ApiResponse::ok(order, "Payment status updated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            country: "US".into(),
            pincode: "62704".into(),
        }
    }

    #[test]
    fn create_order_request_requires_at_least_one_product() {
        let empty = CreateOrderRequest {
            products: vec![],
            shipping_address: address(),
            payment_method: "card".into(),
            payment_id: None,
            order_notes: None,
        };
        assert!(empty.validate().is_err());

        let one_line = CreateOrderRequest {
            products: vec![OrderLineRequest { product_id: Uuid::new_v4(), quantity: 1 }],
            shipping_address: address(),
            payment_method: "card".into(),
            payment_id: None,
            order_notes: None,
        };
        assert!(one_line.validate().is_ok());
    }

    #[test]
    fn create_order_request_requires_payment_method() {
        let req = CreateOrderRequest {
            products: vec![OrderLineRequest { product_id: Uuid::new_v4(), quantity: 1 }],
            shipping_address: address(),
            payment_method: String::new(),
            payment_id: None,
            order_notes: None,
        };
        assert!(req.validate().is_err());
    }
}
