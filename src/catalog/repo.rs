use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{Category, Product, ProductWithCategory};

pub const FALLBACK_CATEGORY_SLUG: &str = "uncategorized";

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.price, p.stock, p.category_id, \
     p.image_url, p.is_active, p.allow_cash, p.allow_upi, p.created_at, p.updated_at";

const CATEGORY_COLUMNS: &str = "c.id, c.name, c.icon, c.slug, c.created_at";

// ---- Categories ----

pub async fn list_categories(db: &PgPool) -> anyhow::Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories c ORDER BY c.name ASC"
    ))
    .fetch_all(db)
    .await
    .context("list categories")?;
    Ok(rows)
}

pub async fn insert_category(
    db: &PgPool,
    name: &str,
    icon: &str,
    slug: &str,
) -> anyhow::Result<Category> {
    let row = sqlx::query_as::<_, Category>(&format!(
        r#"
        INSERT INTO categories AS c (name, icon, slug)
        VALUES ($1, $2, $3)
        RETURNING {CATEGORY_COLUMNS}
        "#
    ))
    .bind(name)
    .bind(icon)
    .bind(slug)
    .fetch_one(db)
    .await
    .context("insert category")?;
    Ok(row)
}

pub async fn find_category_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> anyhow::Result<Option<Category>> {
    let row = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .context("find category")?;
    Ok(row)
}

/// Fetch the fallback category, creating it when missing.
pub async fn ensure_fallback_category_tx(
    tx: &mut Transaction<'_, Postgres>,
) -> anyhow::Result<Category> {
    let row = sqlx::query_as::<_, Category>(&format!(
        r#"
        INSERT INTO categories AS c (name, icon, slug)
        VALUES ('Uncategorized', '📦', $1)
        ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
        RETURNING {CATEGORY_COLUMNS}
        "#
    ))
    .bind(FALLBACK_CATEGORY_SLUG)
    .fetch_one(&mut **tx)
    .await
    .context("ensure fallback category")?;
    Ok(row)
}

/// Point every product of `from` at `to`; returns the number of products moved.
pub async fn reassign_products_tx(
    tx: &mut Transaction<'_, Postgres>,
    from: Uuid,
    to: Uuid,
) -> anyhow::Result<u64> {
    let res = sqlx::query(
        "UPDATE products SET category_id = $2, updated_at = now() WHERE category_id = $1",
    )
    .bind(from)
    .bind(to)
    .execute(&mut **tx)
    .await
    .context("reassign products")?;
    Ok(res.rows_affected())
}

pub async fn delete_category_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await
        .context("delete category")?;
    Ok(res.rows_affected() > 0)
}

// ---- Products ----

fn product_select() -> String {
    format!(
        r#"
        SELECT {PRODUCT_COLUMNS},
               c.name AS category_name, c.icon AS category_icon, c.slug AS category_slug
          FROM products p
          JOIN categories c ON c.id = p.category_id
        "#
    )
}

/// Active products, optionally limited to one category slug.
pub async fn list_active_products(
    db: &PgPool,
    category_slug: Option<&str>,
) -> anyhow::Result<Vec<ProductWithCategory>> {
    let rows = sqlx::query_as::<_, ProductWithCategory>(&format!(
        r#"{}
         WHERE p.is_active
           AND ($1::text IS NULL OR c.slug = $1)
         ORDER BY p.name ASC
        "#,
        product_select()
    ))
    .bind(category_slug)
    .fetch_all(db)
    .await
    .context("list active products")?;
    Ok(rows)
}

/// Every product, including deactivated ones.
pub async fn list_all_products(db: &PgPool) -> anyhow::Result<Vec<ProductWithCategory>> {
    let rows = sqlx::query_as::<_, ProductWithCategory>(&format!(
        "{} ORDER BY p.is_active DESC, p.name ASC",
        product_select()
    ))
    .fetch_all(db)
    .await
    .context("list all products")?;
    Ok(rows)
}

pub async fn find_active_product(
    db: &PgPool,
    id: Uuid,
) -> anyhow::Result<Option<ProductWithCategory>> {
    let row = sqlx::query_as::<_, ProductWithCategory>(&format!(
        "{} WHERE p.id = $1 AND p.is_active",
        product_select()
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("find product")?;
    Ok(row)
}

/// Products referenced by a checkout, read inside the order transaction.
pub async fn products_by_ids_tx(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[Uuid],
) -> anyhow::Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(&mut **tx)
    .await
    .context("load cart products")?;
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Uuid,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub allow_cash: bool,
    pub allow_upi: bool,
}

pub async fn insert_product(db: &PgPool, p: &NewProduct) -> anyhow::Result<Product> {
    let row = sqlx::query_as::<_, Product>(&format!(
        r#"
        INSERT INTO products AS p
            (name, description, price, stock, category_id, image_url, is_active, allow_cash, allow_upi)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {PRODUCT_COLUMNS}
        "#
    ))
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.price)
    .bind(p.stock)
    .bind(p.category_id)
    .bind(&p.image_url)
    .bind(p.is_active)
    .bind(p.allow_cash)
    .bind(p.allow_upi)
    .fetch_one(db)
    .await
    .context("insert product")?;
    Ok(row)
}

/// Partial update; `None` keeps the stored value. An empty description or
/// image URL clears the column.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
    pub allow_cash: Option<bool>,
    pub allow_upi: Option<bool>,
}

pub async fn update_product(
    db: &PgPool,
    id: Uuid,
    c: &ProductChanges,
) -> anyhow::Result<Option<Product>> {
    let row = sqlx::query_as::<_, Product>(&format!(
        r#"
        UPDATE products AS p SET
            name        = COALESCE($2, p.name),
            description = CASE WHEN $3::text IS NULL THEN p.description ELSE NULLIF($3, '') END,
            price       = COALESCE($4, p.price),
            stock       = COALESCE($5, p.stock),
            category_id = COALESCE($6, p.category_id),
            image_url   = CASE WHEN $7::text IS NULL THEN p.image_url ELSE NULLIF($7, '') END,
            is_active   = COALESCE($8, p.is_active),
            allow_cash  = COALESCE($9, p.allow_cash),
            allow_upi   = COALESCE($10, p.allow_upi),
            updated_at  = now()
        WHERE p.id = $1
        RETURNING {PRODUCT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&c.name)
    .bind(&c.description)
    .bind(c.price)
    .bind(c.stock)
    .bind(c.category_id)
    .bind(&c.image_url)
    .bind(c.is_active)
    .bind(c.allow_cash)
    .bind(c.allow_upi)
    .fetch_optional(db)
    .await
    .context("update product")?;
    Ok(row)
}

pub async fn set_stock(db: &PgPool, id: Uuid, stock: i32) -> anyhow::Result<Option<Product>> {
    let row = sqlx::query_as::<_, Product>(&format!(
        r#"
        UPDATE products AS p SET stock = $2, updated_at = now()
        WHERE p.id = $1
        RETURNING {PRODUCT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(stock)
    .fetch_optional(db)
    .await
    .context("set stock")?;
    Ok(row)
}

pub async fn deactivate_product(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("UPDATE products SET is_active = false, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("deactivate product")?;
    Ok(res.rows_affected() > 0)
}

pub async fn order_item_count(db: &PgPool, product_id: Uuid) -> anyhow::Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM order_items WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(db)
            .await
            .context("count order items")?;
    Ok(count)
}

pub async fn delete_product(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete product")?;
    Ok(res.rows_affected() > 0)
}

/// Take `quantity` units out of stock unless that would go negative.
/// Returns false when the guard did not match.
pub async fn decrement_stock_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    quantity: i32,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE products
           SET stock = stock - $2, updated_at = now()
         WHERE id = $1 AND stock >= $2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .execute(&mut **tx)
    .await
    .context("decrement stock")?;
    Ok(res.rows_affected() == 1)
}

pub async fn restock_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(quantity)
        .execute(&mut **tx)
        .await
        .context("restock product")?;
    Ok(())
}
