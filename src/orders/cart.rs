use std::collections::BTreeMap;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::FieldError;

pub const MAX_LINE_QUANTITY: i64 = 100;

/// One `{productId, quantity}` entry as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Checkout cart: product id -> total quantity, at least one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    lines: BTreeMap<Uuid, i32>,
}

impl Cart {
    /// Normalise submitted lines, merging repeated products.
    pub fn from_lines(lines: &[CartLine]) -> Result<Self, Vec<FieldError>> {
        if lines.is_empty() {
            return Err(vec![FieldError::new(
                "items",
                "Order must contain at least one item",
            )]);
        }

        let mut errors = Vec::new();
        let mut merged: BTreeMap<Uuid, i64> = BTreeMap::new();
        for (i, line) in lines.iter().enumerate() {
            if line.quantity < 1 {
                errors.push(FieldError::new(
                    format!("items[{}].quantity", i),
                    "must be at least 1",
                ));
                continue;
            }
            let total = merged.entry(line.product_id).or_default();
            *total = total.saturating_add(line.quantity);
        }

        for (product_id, qty) in &merged {
            if *qty > MAX_LINE_QUANTITY {
                errors.push(FieldError::new(
                    "items",
                    format!(
                        "quantity for product {} must be at most {}",
                        product_id, MAX_LINE_QUANTITY
                    ),
                ));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            lines: merged.into_iter().map(|(id, q)| (id, q as i32)).collect(),
        })
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.lines.keys().copied().collect()
    }

    pub fn lines(&self) -> impl Iterator<Item = (Uuid, i32)> + '_ {
        self.lines.iter().map(|(id, q)| (*id, *q))
    }

    /// Number of distinct products.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_units(&self) -> i64 {
        self.lines.values().map(|q| *q as i64).sum()
    }
}
