use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    model::{OrderStatus, PaymentMethod, PaymentStatus},
    repo_types::{Order, OrderCustomer, OrderItem, OrderStats},
};

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.total_amount, o.payment_method, o.payment_status, \
     o.order_status, o.hostel_block, o.room_number, o.phone_number, o.payment_note, \
     o.pickup_message, o.created_at, o.updated_at";

pub const LOW_STOCK_THRESHOLD: i32 = 5;

#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub hostel_block: &'a str,
    pub room_number: &'a str,
    pub phone_number: &'a str,
    pub payment_note: Option<&'a str>,
}

pub async fn insert_order_tx(
    tx: &mut Transaction<'_, Postgres>,
    o: &NewOrder<'_>,
) -> anyhow::Result<Order> {
    let row = sqlx::query_as::<_, Order>(&format!(
        r#"
        INSERT INTO orders AS o
            (user_id, total_amount, payment_method, payment_status, order_status,
             hostel_block, room_number, phone_number, payment_note)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(o.user_id)
    .bind(o.total_amount)
    .bind(o.payment_method.as_str())
    .bind(PaymentStatus::Pending.as_str())
    .bind(OrderStatus::Placed.as_str())
    .bind(o.hostel_block)
    .bind(o.room_number)
    .bind(o.phone_number)
    .bind(o.payment_note)
    .fetch_one(&mut **tx)
    .await
    .context("insert order")?;
    Ok(row)
}

pub async fn insert_item_tx(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (order_id, product_id, quantity, unit_price, total_price)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price)
    .bind(total_price)
    .execute(&mut **tx)
    .await
    .context("insert order item")?;
    Ok(())
}

pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Order>> {
    let rows = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.user_id = $1 ORDER BY o.created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("list user orders")?;
    Ok(rows)
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<(Order, OrderCustomer)>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        #[sqlx(flatten)]
        order: Order,
        #[sqlx(flatten)]
        customer: OrderCustomer,
    }

    let rows = sqlx::query_as::<_, Row>(&format!(
        r#"
        SELECT {ORDER_COLUMNS}, u.email, u.first_name, u.last_name
          FROM orders o
          JOIN users u ON u.id = o.user_id
         ORDER BY o.created_at DESC
        "#
    ))
    .fetch_all(db)
    .await
    .context("list all orders")?;
    Ok(rows.into_iter().map(|r| (r.order, r.customer)).collect())
}

/// Items of the given orders, by product name within each order.
pub async fn items_for_orders(db: &PgPool, order_ids: &[Uuid]) -> anyhow::Result<Vec<OrderItem>> {
    items_query(order_ids).fetch_all(db).await.context("list order items")
}

pub async fn items_for_order_tx(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> anyhow::Result<Vec<OrderItem>> {
    let ids = [order_id];
    items_query(&ids)
        .fetch_all(&mut **tx)
        .await
        .context("list order items")
}

fn items_query(
    order_ids: &[Uuid],
) -> sqlx::query::QueryAs<'_, Postgres, OrderItem, sqlx::postgres::PgArguments> {
    sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT i.id, i.order_id, i.product_id, p.name AS product_name,
               i.quantity, i.unit_price, i.total_price
          FROM order_items i
          JOIN products p ON p.id = i.product_id
         WHERE i.order_id = ANY($1)
         ORDER BY i.order_id, p.name
        "#,
    )
    .bind(order_ids)
}

/// Lock an order row for a status change.
pub async fn find_for_update_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> anyhow::Result<Option<Order>> {
    let row = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .context("lock order")?;
    Ok(row)
}

pub async fn update_status_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    status: OrderStatus,
    payment_status: PaymentStatus,
) -> anyhow::Result<Order> {
    let row = sqlx::query_as::<_, Order>(&format!(
        r#"
        UPDATE orders AS o
           SET order_status = $2, payment_status = $3, updated_at = now()
         WHERE o.id = $1
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status.as_str())
    .bind(payment_status.as_str())
    .fetch_one(&mut **tx)
    .await
    .context("update order status")?;
    Ok(row)
}

pub async fn set_pickup_message(
    db: &PgPool,
    id: Uuid,
    message: Option<&str>,
) -> anyhow::Result<Option<Order>> {
    let row = sqlx::query_as::<_, Order>(&format!(
        r#"
        UPDATE orders AS o
           SET pickup_message = $2, updated_at = now()
         WHERE o.id = $1
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(message)
    .fetch_optional(db)
    .await
    .context("set pickup message")?;
    Ok(row)
}

pub async fn stats(db: &PgPool) -> anyhow::Result<OrderStats> {
    let row = sqlx::query_as::<_, OrderStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM orders) AS total_orders,
            (SELECT COUNT(*) FROM orders
              WHERE order_status NOT IN ('delivered', 'cancelled')) AS open_orders,
            (SELECT COALESCE(SUM(total_amount), 0) FROM orders
              WHERE order_status <> 'cancelled') AS revenue,
            (SELECT COUNT(*) FROM products WHERE is_active) AS active_products,
            (SELECT COUNT(*) FROM products
              WHERE is_active AND stock <= $1) AS low_stock_products
        "#,
    )
    .bind(LOW_STOCK_THRESHOLD)
    .fetch_one(db)
    .await
    .context("order stats")?;
    Ok(row)
}
