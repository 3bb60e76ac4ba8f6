use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::repo::{NewProduct, ProductChanges};
use crate::error::FieldError;
use crate::orders::services::max_amount;
use crate::validation::{is_valid_slug, slugify};

const MAX_NAME_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_STOCK: i32 = 100_000;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Uuid,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub allow_cash: bool,
    #[serde(default = "default_true")]
    pub allow_upi: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProductRequest {
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

fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.is_empty() {
        errors.push(FieldError::new("name", "is required"));
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.push(FieldError::new(
            "name",
            format!("must be at most {} characters", MAX_NAME_LEN),
        ));
    }
}

fn check_price(price: Decimal, errors: &mut Vec<FieldError>) {
    if price <= Decimal::ZERO {
        errors.push(FieldError::new("price", "must be greater than 0"));
    } else if price > max_amount() {
        errors.push(FieldError::new("price", "is too large"));
    } else if price.scale() > 2 && price.round_dp(2) != price {
        errors.push(FieldError::new("price", "must have at most 2 decimal places"));
    }
}

fn check_stock(stock: i32, errors: &mut Vec<FieldError>) {
    if !(0..=MAX_STOCK).contains(&stock) {
        errors.push(FieldError::new(
            "stock",
            format!("must be between 0 and {}", MAX_STOCK),
        ));
    }
}

fn check_description(description: Option<&str>, errors: &mut Vec<FieldError>) {
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        errors.push(FieldError::new(
            "description",
            format!("must be at most {} characters", MAX_DESCRIPTION_LEN),
        ));
    }
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string())
}

impl CreateProductRequest {
    pub fn into_new_product(self) -> Result<NewProduct, Vec<FieldError>> {
        let name = self.name.trim().to_string();
        let description = trimmed(self.description).filter(|d| !d.is_empty());
        let image_url = trimmed(self.image_url).filter(|u| !u.is_empty());

        let mut errors = Vec::new();
        check_name(&name, &mut errors);
        check_price(self.price, &mut errors);
        check_stock(self.stock, &mut errors);
        check_description(description.as_deref(), &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewProduct {
            name,
            description,
            price: self.price.round_dp(2),
            stock: self.stock,
            category_id: self.category_id,
            image_url,
            is_active: self.is_active,
            allow_cash: self.allow_cash,
            allow_upi: self.allow_upi,
        })
    }
}

impl UpdateProductRequest {
    pub fn into_changes(self) -> Result<ProductChanges, Vec<FieldError>> {
        let name = trimmed(self.name);
        let description = trimmed(self.description);

        let mut errors = Vec::new();
        if let Some(name) = name.as_deref() {
            check_name(name, &mut errors);
        }
        if let Some(price) = self.price {
            check_price(price, &mut errors);
        }
        if let Some(stock) = self.stock {
            check_stock(stock, &mut errors);
        }
        check_description(description.as_deref(), &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ProductChanges {
            name,
            description,
            price: self.price.map(|p| p.round_dp(2)),
            stock: self.stock,
            category_id: self.category_id,
            image_url: trimmed(self.image_url),
            is_active: self.is_active,
            allow_cash: self.allow_cash,
            allow_upi: self.allow_upi,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StockUpdate {
    pub stock: i32,
}

impl StockUpdate {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        check_stock(self.stock, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteProductQuery {
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub icon: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Validated category fields.
#[derive(Debug, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub icon: String,
    pub slug: String,
}

impl CreateCategoryRequest {
    pub fn validate(self) -> Result<NewCategory, Vec<FieldError>> {
        let name = self.name.trim().to_string();
        let icon = self.icon.trim().to_string();
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => slugify(&name),
        };

        let mut errors = Vec::new();
        check_name(&name, &mut errors);
        if icon.is_empty() {
            errors.push(FieldError::new("icon", "is required"));
        }
        if !is_valid_slug(&slug) {
            errors.push(FieldError::new(
                "slug",
                "must contain only lowercase letters, digits and dashes",
            ));
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(NewCategory { name, icon, slug })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDeleted {
    pub deleted_id: Uuid,
    pub fallback_category_id: Uuid,
    pub reassigned_products: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminFlagUpdate {
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: String,
    pub url: String,
}
