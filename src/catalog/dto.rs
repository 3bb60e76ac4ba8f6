use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{Product, ProductWithCategory};

#[derive(Debug, Serialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category: CategorySummary,
}

impl From<ProductWithCategory> for ProductView {
    fn from(row: ProductWithCategory) -> Self {
        let category = CategorySummary {
            id: row.product.category_id,
            name: row.category_name,
            icon: row.category_icon,
            slug: row.category_slug,
        };
        Self {
            product: row.product,
            category,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    /// Category slug; `all` or absent lists everything.
    pub category: Option<String>,
}

impl ProductFilter {
    pub fn category_slug(&self) -> Option<&str> {
        match self.category.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(slug) => Some(slug),
        }
    }
}
