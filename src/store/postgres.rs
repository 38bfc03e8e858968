//! Postgres store. Reservation batches run inside a single transaction of
//! conditional decrements, so a partial failure rolls every decrement back.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{
    Cart, CartItem, CartStatus, Order, OrderItem, OrderStatus, PaymentStatus, Product,
    ShippingAddress, SizeStock,
};
use crate::error::{Error, Result};

use super::{CartStore, OrderStore, ProductStore, ReservedLine, StockLine};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Canonical lock order for batch stock updates. Every transaction that
/// touches multiple product rows walks them in ascending id, so two
/// concurrent batches can never hold each other's rows.
fn lock_order(lines: &[StockLine]) -> Vec<StockLine> {
    let mut lines = lines.to_vec();
    lines.sort_by_key(|l| l.product_id);
    lines
}

fn product_from_row(row: &PgRow) -> Result<Product> {
    let sizes: serde_json::Value = row.try_get("sizes")?;
    let sizes: Vec<SizeStock> =
        serde_json::from_value(sizes).map_err(|e| Error::Internal(anyhow!(e)))?;
    let stock: i32 = row.try_get("stock_quantity")?;
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        stock_quantity: stock.max(0) as u32,
        sizes,
        is_available: row.try_get("is_available")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn cart_status_from_str(s: &str) -> Result<CartStatus> {
    match s {
        "active" => Ok(CartStatus::Active),
        "completed" => Ok(CartStatus::Completed),
        "abandoned" => Ok(CartStatus::Abandoned),
        other => Err(Error::Internal(anyhow!("corrupt cart status: {other}"))),
    }
}

fn cart_status_to_str(status: CartStatus) -> &'static str {
    match status {
        CartStatus::Active => "active",
        CartStatus::Completed => "completed",
        CartStatus::Abandoned => "abandoned",
    }
}

fn order_from_row(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let order_status: String = row.try_get("order_status")?;
    let payment_status: String = row.try_get("payment_status")?;
    Ok(Order {
        id: row.try_get("id")?,
        order_number: row.try_get("order_number")?,
        user_id: row.try_get("user_id")?,
        items,
        shipping_address: ShippingAddress {
            street: row.try_get("ship_street")?,
            city: row.try_get("ship_city")?,
            state: row.try_get("ship_state")?,
            country: row.try_get("ship_country")?,
            pincode: row.try_get("ship_pincode")?,
        },
        order_status: order_status
            .parse()
            .map_err(|_| Error::Internal(anyhow!("corrupt order status: {order_status}")))?,
        payment_status: payment_status
            .parse()
            .map_err(|_| Error::Internal(anyhow!("corrupt payment status: {payment_status}")))?,
        payment_method: row.try_get("payment_method")?,
        payment_id: row.try_get("payment_id")?,
        total_amount: row.try_get("total_amount")?,
        tax: row.try_get("tax")?,
        shipping_charges: row.try_get("shipping_charges")?,
        order_notes: row.try_get("order_notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ProductStore for PgStore {
    async fn insert(&self, product: &Product) -> Result<()> {
        let sizes = serde_json::to_value(&product.sizes).map_err(|e| Error::Internal(anyhow!(e)))?;
        sqlx::query(
            "INSERT INTO products (id, name, description, price, stock_quantity, sizes, is_available, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock_quantity as i32)
        .bind(sizes)
        .bind(product.is_available)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn reserve(&self, lines: &[StockLine]) -> Result<Vec<ReservedLine>> {
        let mut tx = self.pool.begin().await?;
        let mut reserved = Vec::with_capacity(lines.len());

        for line in lock_order(lines) {
            // Conditional decrement: only succeeds while enough stock is
            // left, which also serializes racing reservations row-by-row.
            let row = sqlx::query(
                "UPDATE products
                 SET stock_quantity = stock_quantity - $2, updated_at = NOW()
                 WHERE id = $1 AND stock_quantity >= $2
                 RETURNING name, price",
            )
            .bind(line.product_id)
            .bind(line.quantity as i32)
            .fetch_optional(&mut *tx)
            .await?;

            match row {
                Some(row) => reserved.push(ReservedLine {
                    product_id: line.product_id,
                    product_name: row.try_get("name")?,
                    quantity: line.quantity,
                    unit_price: row.try_get("price")?,
                }),
                None => {
                    // Dropping the transaction rolls back earlier decrements.
                    let name: Option<String> =
                        sqlx::query_scalar("SELECT name FROM products WHERE id = $1")
                            .bind(line.product_id)
                            .fetch_optional(&mut *tx)
                            .await?;
                    return Err(match name {
                        Some(name) => {
                            Error::Invalid(format!("Insufficient stock for product: {name}"))
                        }
                        None => Error::NotFound(format!(
                            "Product not found with id: {}",
                            line.product_id
                        )),
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(reserved)
    }

    async fn release(&self, lines: &[StockLine]) -> Result<()> {
        for line in lines {
            // Missing rows simply match nothing; restock never raises.
            sqlx::query(
                "UPDATE products
                 SET stock_quantity = stock_quantity + $2, updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(line.product_id)
            .bind(line.quantity as i32)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn find_active(&self, user_id: Uuid) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT * FROM carts WHERE user_id = $1 AND status = 'active'")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };

        let cart_id: Uuid = row.try_get("id")?;
        let item_rows =
            sqlx::query("SELECT product_id, quantity, unit_price FROM cart_items WHERE cart_id = $1 ORDER BY position")
                .bind(cart_id)
                .fetch_all(&self.pool)
                .await?;
        let mut items = Vec::with_capacity(item_rows.len());
        for item in &item_rows {
            let quantity: i32 = item.try_get("quantity")?;
            items.push(CartItem {
                product_id: item.try_get("product_id")?,
                quantity: quantity.max(0) as u32,
                unit_price: item.try_get("unit_price")?,
            });
        }

        let status: String = row.try_get("status")?;
        Ok(Some(Cart::restore(
            cart_id,
            row.try_get("user_id")?,
            cart_status_from_str(&status)?,
            items,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        )))
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO carts (id, user_id, status, total_amount, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE
             SET status = $3, total_amount = $4, updated_at = $6",
        )
        .bind(cart.id)
        .bind(cart.user_id)
        .bind(cart_status_to_str(cart.status))
        .bind(cart.total_amount())
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *tx)
        .await;
        if let Err(err) = result {
            // The partial unique index on (user_id) WHERE status = 'active'
            // enforces one active cart per user.
            if is_unique_violation(&err) {
                return Err(Error::Conflict("User already has an active cart".into()));
            }
            return Err(err.into());
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;
        for (position, item) in cart.items().iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_items (cart_id, product_id, quantity, unit_price, position)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(cart.id)
            .bind(item.product_id)
            .bind(item.quantity as i32)
            .bind(item.unit_price)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

impl PgStore {
    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT product_id, quantity, unit_price FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let quantity: i32 = row.try_get("quantity")?;
            items.push(OrderItem {
                product_id: row.try_get("product_id")?,
                quantity: quantity.max(0) as u32,
                unit_price: row.try_get("unit_price")?,
            });
        }
        Ok(items)
    }

    async fn orders_from_rows(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: Uuid = row.try_get("id")?;
            let items = self.order_items(id).await?;
            orders.push(order_from_row(row, items)?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, order_number, user_id,
                 ship_street, ship_city, ship_state, ship_country, ship_pincode,
                 order_status, payment_status, payment_method, payment_id,
                 total_amount, tax, shipping_charges, order_notes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(&order.shipping_address.street)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.state)
        .bind(&order.shipping_address.country)
        .bind(&order.shipping_address.pincode)
        .bind(order.order_status.to_string())
        .bind(order.payment_status.to_string())
        .bind(&order.payment_method)
        .bind(&order.payment_id)
        .bind(order.total_amount)
        .bind(order.tax)
        .bind(order.shipping_charges)
        .bind(&order.order_notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price, position)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity as i32)
            .bind(item.unit_price)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let items = self.order_items(id).await?;
        Ok(Some(order_from_row(&row, items)?))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.orders_from_rows(rows).await
    }

    async fn list_all(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        self.orders_from_rows(rows).await
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<()> {
        let result =
            sqlx::query("UPDATE orders SET order_status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Order not found".into()));
        }
        Ok(())
    }

    async fn cancel(&self, id: Uuid, restock: &[StockLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("UPDATE orders SET order_status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(OrderStatus::Cancelled.to_string())
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Order not found".into()));
        }

        for line in lock_order(restock) {
            sqlx::query(
                "UPDATE products
                 SET stock_quantity = stock_quantity + $2, updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(line.product_id)
            .bind(line.quantity as i32)
            .execute(&mut *tx)
            .await?;
        }

        // Status write and restock land together or not at all.
        tx.commit().await?;
        Ok(())
    }

    async fn update_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_id: Option<String>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders
             SET payment_status = $2, payment_id = COALESCE($3, payment_id), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.to_string())
        .bind(payment_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Order not found".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_order_sorts_by_product_id() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let lines = [
            StockLine { product_id: c, quantity: 1 },
            StockLine { product_id: a, quantity: 2 },
            StockLine { product_id: b, quantity: 3 },
        ];
        let ordered: Vec<Uuid> = lock_order(&lines).iter().map(|l| l.product_id).collect();
        assert_eq!(ordered, vec![a, b, c]);
    }
}
