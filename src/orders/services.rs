use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    cart::Cart,
    dto::{AdminOrderView, OrderView, PlaceOrderRequest},
    model::{transition_effects, OrderStatus, PaymentMethod},
    repo::{self, NewOrder},
    repo_types::{Order, OrderItem},
};
use crate::{
    catalog::{repo as catalog_repo, repo_types::Product},
    error::{AppError, FieldError},
    settings::repo as settings_repo,
    validation::{is_valid_phone, normalize_phone},
};

const MAX_NOTE_LEN: usize = 200;
const MAX_ADDRESS_LEN: usize = 50;
const MAX_PICKUP_MESSAGE_LEN: usize = 500;

/// Largest amount a NUMERIC(10, 2) column holds.
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_99, 2)
}

/// Business-rule rejections of a checkout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("{0}")]
    StoreClosed(String),
    #[error("{name} is no longer available")]
    Unavailable { name: String },
    #[error("Insufficient stock for {name}")]
    InsufficientStock { name: String },
    #[error("{name} cannot be paid with {method}")]
    PaymentNotAllowed { name: String, method: &'static str },
    #[error("Order total exceeds the maximum of {max}")]
    TotalTooLarge { max: Decimal },
}

impl From<CheckoutError> for AppError {
    fn from(e: CheckoutError) -> Self {
        AppError::Rejected(e.to_string())
    }
}

/// A checkout request that passed payload validation.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub cart: Cart,
    pub payment_method: PaymentMethod,
    pub hostel_block: String,
    pub room_number: String,
    pub phone_number: String,
    pub payment_note: Option<String>,
}

pub fn validate_request(req: &PlaceOrderRequest) -> Result<Checkout, Vec<FieldError>> {
    let mut errors = Vec::new();

    let cart = Cart::from_lines(&req.items).map_err(|e| errors.extend(e)).ok();

    let payment_method = req.payment_method.parse::<PaymentMethod>().ok();
    if payment_method.is_none() {
        errors.push(FieldError::new("paymentMethod", "must be cash or upi"));
    }

    let hostel_block = req.delivery_address.hostel_block.trim().to_string();
    let room_number = req.delivery_address.room_number.trim().to_string();
    for (field, value) in [
        ("deliveryAddress.hostelBlock", &hostel_block),
        ("deliveryAddress.roomNumber", &room_number),
    ] {
        if value.is_empty() {
            errors.push(FieldError::new(field, "is required"));
        } else if value.chars().count() > MAX_ADDRESS_LEN {
            errors.push(FieldError::new(
                field,
                format!("must be at most {} characters", MAX_ADDRESS_LEN),
            ));
        }
    }

    if !is_valid_phone(&req.phone_number) {
        errors.push(FieldError::new("phoneNumber", "must be 10 to 13 digits"));
    }

    let payment_note = req
        .payment_note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from);
    if payment_note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
        errors.push(FieldError::new(
            "paymentNote",
            format!("must be at most {} characters", MAX_NOTE_LEN),
        ));
    }

    match (cart, payment_method) {
        (Some(cart), Some(payment_method)) if errors.is_empty() => Ok(Checkout {
            cart,
            payment_method,
            hostel_block,
            room_number,
            phone_number: normalize_phone(&req.phone_number),
            payment_note,
        }),
        _ => Err(errors),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total: Decimal,
}

/// Two decimal places, half away from zero.
pub fn money(d: Decimal) -> Decimal {
    let mut d = d.round_dp(2);
    d.rescale(2);
    d
}

/// Check every cart line against the current product rows and price it.
/// Nothing is written; the caller persists the result.
pub fn price_cart(
    cart: &Cart,
    products: &[Product],
    method: PaymentMethod,
) -> Result<PricedCart, CheckoutError> {
    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut lines = Vec::with_capacity(cart.line_count());
    let mut total = Decimal::ZERO;
    for (product_id, quantity) in cart.lines() {
        let product = match by_id.get(&product_id) {
            Some(p) if p.is_active => *p,
            Some(p) => {
                return Err(CheckoutError::Unavailable {
                    name: p.name.clone(),
                })
            }
            None => {
                return Err(CheckoutError::Unavailable {
                    name: "A product in your cart".into(),
                })
            }
        };
        if product.stock < quantity {
            return Err(CheckoutError::InsufficientStock {
                name: product.name.clone(),
            });
        }
        let allowed = match method {
            PaymentMethod::Cash => product.allow_cash,
            PaymentMethod::Upi => product.allow_upi,
        };
        if !allowed {
            return Err(CheckoutError::PaymentNotAllowed {
                name: product.name.clone(),
                method: method.label(),
            });
        }

        let unit_price = money(product.price);
        let total_price = money(unit_price * Decimal::from(quantity));
        total += total_price;
        if total > max_amount() {
            return Err(CheckoutError::TotalTooLarge { max: max_amount() });
        }
        lines.push(PricedLine {
            product_id,
            name: product.name.clone(),
            quantity,
            unit_price,
            total_price,
        });
    }

    Ok(PricedCart {
        lines,
        total: money(total),
    })
}

/// Validate, price and persist an order, taking the items out of stock.
/// Any failure rolls the whole transaction back.
pub async fn place_order(
    db: &PgPool,
    user_id: Uuid,
    req: PlaceOrderRequest,
) -> Result<OrderView, AppError> {
    let mut tx = db.begin().await?;
    let settings = settings_repo::get_tx(&mut tx).await?;
    let now = OffsetDateTime::now_utc();
    if !settings.is_accepting_orders(now) {
        return Err(CheckoutError::StoreClosed(settings.closed_message(now)).into());
    }

    let checkout = validate_request(&req).map_err(AppError::Validation)?;

    let products = catalog_repo::products_by_ids_tx(&mut tx, &checkout.cart.product_ids()).await?;
    let priced = price_cart(&checkout.cart, &products, checkout.payment_method).map_err(|e| {
        warn!(%user_id, reason = %e, "checkout rejected");
        e
    })?;

    let order = repo::insert_order_tx(
        &mut tx,
        &NewOrder {
            user_id,
            total_amount: priced.total,
            payment_method: checkout.payment_method,
            hostel_block: &checkout.hostel_block,
            room_number: &checkout.room_number,
            phone_number: &checkout.phone_number,
            payment_note: checkout.payment_note.as_deref(),
        },
    )
    .await?;

    for line in &priced.lines {
        repo::insert_item_tx(
            &mut tx,
            order.id,
            line.product_id,
            line.quantity,
            line.unit_price,
            line.total_price,
        )
        .await?;
    }

    for line in &priced.lines {
        if !catalog_repo::decrement_stock_tx(&mut tx, line.product_id, line.quantity).await? {
            warn!(%user_id, product_id = %line.product_id, "stock changed during checkout");
            return Err(CheckoutError::InsufficientStock {
                name: line.name.clone(),
            }
            .into());
        }
    }

    let items = repo::items_for_order_tx(&mut tx, order.id).await?;
    tx.commit().await?;

    info!(
        order_id = %order.id,
        %user_id,
        total = %order.total_amount,
        items = priced.lines.len(),
        units = checkout.cart.total_units(),
        "order placed"
    );
    Ok(OrderView {
        order,
        order_items: items,
    })
}

fn group_items(items: Vec<OrderItem>) -> HashMap<Uuid, Vec<OrderItem>> {
    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }
    grouped
}

pub async fn list_user_orders(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<OrderView>> {
    let orders = repo::list_for_user(db, user_id).await?;
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items = group_items(repo::items_for_orders(db, &ids).await?);
    Ok(orders
        .into_iter()
        .map(|order| OrderView {
            order_items: items.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

pub async fn list_all_orders(db: &PgPool) -> anyhow::Result<Vec<AdminOrderView>> {
    let orders = repo::list_all(db).await?;
    let ids: Vec<Uuid> = orders.iter().map(|(o, _)| o.id).collect();
    let mut items = group_items(repo::items_for_orders(db, &ids).await?);
    Ok(orders
        .into_iter()
        .map(|(order, user)| AdminOrderView {
            order_items: items.remove(&order.id).unwrap_or_default(),
            order,
            user,
        })
        .collect())
}

/// Move an order along its status graph. Cancelling puts the items back in stock.
pub async fn change_status(
    db: &PgPool,
    order_id: Uuid,
    next: OrderStatus,
) -> Result<OrderView, AppError> {
    let mut tx = db.begin().await?;
    let current = repo::find_for_update_tx(&mut tx, order_id)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    if current.order_status == next {
        let items = repo::items_for_order_tx(&mut tx, order_id).await?;
        tx.commit().await?;
        return Ok(OrderView {
            order: current,
            order_items: items,
        });
    }
    if current.order_status.is_terminal() {
        return Err(AppError::Rejected(format!(
            "Order is already {}",
            current.order_status
        )));
    }
    if !current.order_status.can_transition_to(next) {
        return Err(AppError::Rejected(format!(
            "Cannot change order status from {} to {}",
            current.order_status, next
        )));
    }

    let effects = transition_effects(next, current.payment_method, current.payment_status);
    let items = repo::items_for_order_tx(&mut tx, order_id).await?;
    if effects.restock {
        for item in &items {
            catalog_repo::restock_tx(&mut tx, item.product_id, item.quantity).await?;
        }
    }
    let order = repo::update_status_tx(&mut tx, order_id, next, effects.payment_status).await?;
    tx.commit().await?;

    info!(%order_id, from = %current.order_status, to = %next, "order status changed");
    Ok(OrderView {
        order,
        order_items: items,
    })
}

pub async fn set_pickup_message(
    db: &PgPool,
    order_id: Uuid,
    message: Option<String>,
) -> Result<Order, AppError> {
    let message = message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from);
    if message
        .as_ref()
        .is_some_and(|m| m.chars().count() > MAX_PICKUP_MESSAGE_LEN)
    {
        return Err(AppError::Validation(vec![FieldError::new(
            "message",
            format!("must be at most {} characters", MAX_PICKUP_MESSAGE_LEN),
        )]));
    }
    repo::set_pickup_message(db, order_id, message.as_deref())
        .await?
        .ok_or(AppError::NotFound("Order"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{cart::CartLine, dto::DeliveryAddress};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use time::macros::datetime;

    fn product(name: &str, price: &str, stock: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            price: Decimal::from_str(price).unwrap(),
            stock,
            category_id: Uuid::new_v4(),
            image_url: None,
            is_active: true,
            allow_cash: true,
            allow_upi: true,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    fn cart(lines: &[(Uuid, i64)]) -> Cart {
        let lines: Vec<CartLine> = lines
            .iter()
            .map(|(id, q)| CartLine {
                product_id: *id,
                quantity: *q,
            })
            .collect();
        Cart::from_lines(&lines).unwrap()
    }

    fn request(items: Vec<CartLine>, method: &str, phone: &str) -> PlaceOrderRequest {
        PlaceOrderRequest {
            items,
            delivery_address: DeliveryAddress {
                hostel_block: " KP-7 ".into(),
                room_number: "214".into(),
            },
            payment_method: method.into(),
            phone_number: phone.into(),
            payment_note: None,
        }
    }

    #[test]
    fn two_units_at_fifty_total_one_hundred() {
        let p1 = product("Maggi", "50.00", 5);
        let priced = price_cart(&cart(&[(p1.id, 2)]), &[p1.clone()], PaymentMethod::Cash).unwrap();
        assert_eq!(priced.total.to_string(), "100.00");
        assert_eq!(priced.lines[0].unit_price.to_string(), "50.00");
        assert_eq!(priced.lines[0].total_price.to_string(), "100.00");
        assert_eq!(
            serde_json::to_value(priced.total).unwrap(),
            serde_json::json!("100.00")
        );
    }

    #[test]
    fn total_is_sum_of_lines() {
        let a = product("Chips", "20", 10);
        let b = product("Cold Coffee", "45.50", 10);
        let c = product("Samosa", "12.25", 10);
        let priced = price_cart(
            &cart(&[(a.id, 3), (b.id, 1), (c.id, 4)]),
            &[a, b, c],
            PaymentMethod::Upi,
        )
        .unwrap();
        let sum: Decimal = priced.lines.iter().map(|l| l.total_price).sum();
        assert_eq!(priced.total, sum);
        assert_eq!(priced.total.to_string(), "154.50");
    }

    #[test]
    fn quantity_above_stock_is_rejected_by_name() {
        let p2 = product("Kurkure", "10.00", 3);
        let err = price_cart(&cart(&[(p2.id, 10)]), &[p2], PaymentMethod::Cash).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient stock for Kurkure");
    }

    #[test]
    fn disallowed_payment_method_is_rejected_by_name() {
        let mut p = product("Pizza", "120.00", 4);
        p.allow_cash = false;
        let err = price_cart(&cart(&[(p.id, 1)]), &[p.clone()], PaymentMethod::Cash).unwrap_err();
        assert_eq!(err.to_string(), "Pizza cannot be paid with cash");
        assert!(price_cart(&cart(&[(p.id, 1)]), &[p], PaymentMethod::Upi).is_ok());
    }

    #[test]
    fn inactive_or_missing_products_are_unavailable() {
        let mut p = product("Old Bar", "15.00", 9);
        p.is_active = false;
        let err = price_cart(&cart(&[(p.id, 1)]), &[p], PaymentMethod::Cash).unwrap_err();
        assert_eq!(err.to_string(), "Old Bar is no longer available");

        let err = price_cart(&cart(&[(Uuid::new_v4(), 1)]), &[], PaymentMethod::Cash).unwrap_err();
        assert!(matches!(err, CheckoutError::Unavailable { .. }));
    }

    #[test]
    fn total_beyond_column_range_is_rejected() {
        let p = product("Gold Bar", "99999999.99", 500);
        let err = price_cart(&cart(&[(p.id, 100)]), &[p.clone()], PaymentMethod::Cash).unwrap_err();
        assert!(matches!(err, CheckoutError::TotalTooLarge { .. }));
        assert_eq!(
            err.to_string(),
            "Order total exceeds the maximum of 99999999.99"
        );

        let priced = price_cart(&cart(&[(p.id, 1)]), &[p], PaymentMethod::Cash).unwrap();
        assert_eq!(priced.total, max_amount());
    }

    #[test]
    fn rejection_maps_to_bad_request() {
        let err: AppError = CheckoutError::InsufficientStock {
            name: "Kurkure".into(),
        }
        .into();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn validate_request_normalises_fields() {
        let id = Uuid::new_v4();
        let mut req = request(
            vec![CartLine {
                product_id: id,
                quantity: 2,
            }],
            "UPI",
            "+91 98765 43210",
        );
        req.payment_note = Some("  ".into());
        let checkout = validate_request(&req).unwrap();
        assert_eq!(checkout.payment_method, PaymentMethod::Upi);
        assert_eq!(checkout.hostel_block, "KP-7");
        assert_eq!(checkout.phone_number, "+919876543210");
        assert!(checkout.payment_note.is_none());
    }

    #[test]
    fn validate_request_collects_every_field_error() {
        let mut req = request(Vec::new(), "card", "123");
        req.delivery_address.room_number = "  ".into();
        let errors = validate_request(&req).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "items",
                "paymentMethod",
                "deliveryAddress.roomNumber",
                "phoneNumber"
            ]
        );
    }

    #[test]
    fn text_limits_count_characters_not_bytes() {
        let id = Uuid::new_v4();
        let mut req = request(
            vec![CartLine {
                product_id: id,
                quantity: 1,
            }],
            "cash",
            "9876543210",
        );
        req.delivery_address.hostel_block = "क".repeat(MAX_ADDRESS_LEN);
        req.payment_note = Some("₹".repeat(MAX_NOTE_LEN));
        let checkout = validate_request(&req).unwrap();
        assert_eq!(checkout.payment_note.map(|n| n.chars().count()), Some(MAX_NOTE_LEN));

        req.payment_note = Some("₹".repeat(MAX_NOTE_LEN + 1));
        let errors = validate_request(&req).unwrap_err();
        assert_eq!(errors[0].field, "paymentNote");
    }

    #[test]
    fn money_pads_to_two_places() {
        assert_eq!(money(Decimal::from(7)).to_string(), "7.00");
        assert_eq!(money(Decimal::from_str("3.14159").unwrap()).to_string(), "3.14");
    }
}
