use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::dto::{CategoryDeleted, NewCategory};
use crate::{
    catalog::{
        repo::{self as catalog_repo, NewProduct, ProductChanges, FALLBACK_CATEGORY_SLUG},
        repo_types::{Category, Product},
    },
    error::{db_error_code, AppError, FieldError, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION},
};

fn unknown_category(e: anyhow::Error) -> AppError {
    if db_error_code(&e).as_deref() == Some(FOREIGN_KEY_VIOLATION) {
        AppError::Validation(vec![FieldError::new("categoryId", "does not exist")])
    } else {
        AppError::Internal(e)
    }
}

pub async fn create_product(db: &PgPool, p: NewProduct) -> Result<Product, AppError> {
    let product = catalog_repo::insert_product(db, &p)
        .await
        .map_err(unknown_category)?;
    info!(product_id = %product.id, name = %product.name, "product created");
    Ok(product)
}

pub async fn update_product(
    db: &PgPool,
    id: Uuid,
    changes: ProductChanges,
) -> Result<Product, AppError> {
    catalog_repo::update_product(db, id, &changes)
        .await
        .map_err(unknown_category)?
        .ok_or(AppError::NotFound("Product"))
}

/// Hide a product from the storefront, or remove it for good when
/// `permanent` is set and no order ever referenced it.
pub async fn delete_product(db: &PgPool, id: Uuid, permanent: bool) -> Result<(), AppError> {
    if !permanent {
        if !catalog_repo::deactivate_product(db, id).await? {
            return Err(AppError::NotFound("Product"));
        }
        info!(product_id = %id, "product deactivated");
        return Ok(());
    }

    if catalog_repo::order_item_count(db, id).await? > 0 {
        return Err(AppError::Conflict(
            "Product appears in existing orders; deactivate it instead".into(),
        ));
    }
    match catalog_repo::delete_product(db, id).await {
        Ok(true) => {
            info!(product_id = %id, "product deleted");
            Ok(())
        }
        Ok(false) => Err(AppError::NotFound("Product")),
        // an order raced in between the count and the delete
        Err(e) if db_error_code(&e).as_deref() == Some(FOREIGN_KEY_VIOLATION) => Err(
            AppError::Conflict("Product appears in existing orders; deactivate it instead".into()),
        ),
        Err(e) => Err(e.into()),
    }
}

pub async fn create_category(db: &PgPool, c: NewCategory) -> Result<Category, AppError> {
    match catalog_repo::insert_category(db, &c.name, &c.icon, &c.slug).await {
        Ok(category) => {
            info!(category_id = %category.id, slug = %category.slug, "category created");
            Ok(category)
        }
        Err(e) if db_error_code(&e).as_deref() == Some(UNIQUE_VIOLATION) => Err(
            AppError::Conflict(format!("A category with slug '{}' already exists", c.slug)),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Delete a category after moving its products to the fallback category.
pub async fn delete_category(db: &PgPool, id: Uuid) -> Result<CategoryDeleted, AppError> {
    let mut tx = db.begin().await?;
    let category = catalog_repo::find_category_tx(&mut tx, id)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    if category.slug == FALLBACK_CATEGORY_SLUG {
        return Err(AppError::BadRequest(
            "The fallback category cannot be deleted".into(),
        ));
    }

    let fallback = catalog_repo::ensure_fallback_category_tx(&mut tx).await?;
    let moved = catalog_repo::reassign_products_tx(&mut tx, id, fallback.id).await?;
    catalog_repo::delete_category_tx(&mut tx, id).await?;
    tx.commit().await?;

    info!(category_id = %id, moved, "category deleted");
    Ok(CategoryDeleted {
        deleted_id: id,
        fallback_category_id: fallback.id,
        reassigned_products: moved,
    })
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use rust_decimal::Decimal;

    fn maggi(category_id: Uuid) -> NewProduct {
        NewProduct {
            name: "Maggi".into(),
            description: None,
            price: Decimal::new(5000, 2),
            stock: 10,
            category_id,
            image_url: None,
            is_active: true,
            allow_cash: true,
            allow_upi: true,
        }
    }

    fn snacks() -> NewCategory {
        NewCategory {
            name: "Snacks".into(),
            icon: "🍪".into(),
            slug: "snacks".into(),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn deleting_a_category_moves_products_to_fallback(db: PgPool) {
        let cat = create_category(&db, snacks()).await.unwrap();
        let product = create_product(&db, maggi(cat.id)).await.unwrap();

        let out = delete_category(&db, cat.id).await.unwrap();
        assert_eq!(out.reassigned_products, 1);

        let moved = catalog_repo::find_active_product(&db, product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.category_slug, FALLBACK_CATEGORY_SLUG);
        assert_eq!(moved.product.category_id, out.fallback_category_id);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn duplicate_slug_is_a_conflict(db: PgPool) {
        create_category(&db, snacks()).await.unwrap();
        let err = create_category(&db, snacks()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn unknown_category_is_a_validation_error(db: PgPool) {
        let err = create_product(&db, maggi(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn soft_delete_hides_the_product(db: PgPool) {
        let cat = create_category(&db, snacks()).await.unwrap();
        let product = create_product(&db, maggi(cat.id)).await.unwrap();

        delete_product(&db, product.id, false).await.unwrap();
        assert!(catalog_repo::find_active_product(&db, product.id)
            .await
            .unwrap()
            .is_none());

        delete_product(&db, product.id, true).await.unwrap();
        let err = delete_product(&db, product.id, true).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Product")));
    }
}
