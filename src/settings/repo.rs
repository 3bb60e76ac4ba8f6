use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};

use super::{dto::SettingsPatch, repo_types::Settings};

const SETTINGS_COLUMNS: &str =
    "pickup_point, contact_phone, upi_id, upi_qr_url, accepting_orders, resume_at, updated_at";

pub async fn get(db: &PgPool) -> anyhow::Result<Settings> {
    let row = sqlx::query_as::<_, Settings>(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM settings WHERE id = 1"
    ))
    .fetch_one(db)
    .await
    .context("load settings")?;
    Ok(row)
}

pub async fn get_tx(tx: &mut Transaction<'_, Postgres>) -> anyhow::Result<Settings> {
    let row = sqlx::query_as::<_, Settings>(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM settings WHERE id = 1"
    ))
    .fetch_one(&mut **tx)
    .await
    .context("load settings")?;
    Ok(row)
}

/// Apply a partial update. Setting `acceptingOrders` without `resumeAt`
/// drops any scheduled resume time. A resume time that has already passed
/// is folded into the flag so later edits keep the store open.
pub async fn update(db: &PgPool, patch: &SettingsPatch) -> anyhow::Result<Settings> {
    let (touch_resume, resume_at) = match patch.resume_at {
        Some(v) => (true, v),
        None => (false, None),
    };
    let row = sqlx::query_as::<_, Settings>(&format!(
        r#"
        UPDATE settings SET
            pickup_point     = COALESCE($1, pickup_point),
            contact_phone    = COALESCE($2, contact_phone),
            upi_id           = COALESCE($3, upi_id),
            upi_qr_url       = CASE WHEN $4::text IS NULL THEN upi_qr_url ELSE NULLIF($4, '') END,
            accepting_orders = CASE
                WHEN $5::boolean IS NOT NULL THEN $5::boolean
                WHEN NOT $6 AND resume_at > updated_at AND resume_at <= now() THEN true
                ELSE accepting_orders
            END,
            resume_at        = CASE
                WHEN $6 THEN $7::timestamptz
                WHEN $5::boolean IS NOT NULL THEN NULL
                WHEN resume_at <= now() THEN NULL
                ELSE resume_at
            END,
            updated_at       = now()
        WHERE id = 1
        RETURNING {SETTINGS_COLUMNS}
        "#
    ))
    .bind(&patch.pickup_point)
    .bind(&patch.contact_phone)
    .bind(&patch.upi_id)
    .bind(&patch.upi_qr_url)
    .bind(patch.accepting_orders)
    .bind(touch_resume)
    .bind(resume_at)
    .fetch_one(db)
    .await
    .context("update settings")?;
    Ok(row)
}

/// Run with `DATABASE_URL` set: `cargo test -- --ignored`.
#[cfg(test)]
mod db_tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    async fn pause_with_passed_resume(pool: &PgPool) {
        sqlx::query(
            r#"
            UPDATE settings SET
                accepting_orders = false,
                resume_at = now() - interval '1 hour',
                updated_at = now() - interval '2 hours'
            WHERE id = 1
            "#,
        )
        .execute(pool)
        .await
        .unwrap();
    }

    #[ignore = "requires DATABASE_URL"]
    #[sqlx::test(migrations = "./migrations")]
    async fn pausing_again_after_resume_time_closes_the_store(pool: PgPool) {
        pause_with_passed_resume(&pool).await;
        let now = OffsetDateTime::now_utc();
        assert!(get(&pool).await.unwrap().is_accepting_orders(now));

        let patch = SettingsPatch {
            accepting_orders: Some(false),
            ..Default::default()
        };
        let settings = update(&pool, &patch).await.unwrap();
        assert!(!settings.accepting_orders);
        assert_eq!(settings.resume_at, None);
        assert!(!settings.is_accepting_orders(OffsetDateTime::now_utc()));
    }

    #[ignore = "requires DATABASE_URL"]
    #[sqlx::test(migrations = "./migrations")]
    async fn unrelated_edit_after_resume_time_keeps_store_open(pool: PgPool) {
        pause_with_passed_resume(&pool).await;

        let patch = SettingsPatch {
            pickup_point: Some("Gate 3".into()),
            ..Default::default()
        };
        let settings = update(&pool, &patch).await.unwrap();
        assert!(settings.accepting_orders);
        assert_eq!(settings.resume_at, None);
        assert!(settings.is_accepting_orders(OffsetDateTime::now_utc()));
    }

    #[ignore = "requires DATABASE_URL"]
    #[sqlx::test(migrations = "./migrations")]
    async fn scheduled_resume_survives_unrelated_edit(pool: PgPool) {
        let resume = OffsetDateTime::now_utc() + Duration::hours(2);
        let pause = SettingsPatch {
            accepting_orders: Some(false),
            resume_at: Some(Some(resume)),
            ..Default::default()
        };
        update(&pool, &pause).await.unwrap();

        let edit = SettingsPatch {
            contact_phone: Some("9876543210".into()),
            ..Default::default()
        };
        let settings = update(&pool, &edit).await.unwrap();
        assert!(!settings.accepting_orders);
        assert!(settings.resume_at.is_some());
        assert!(!settings.is_accepting_orders(OffsetDateTime::now_utc()));
        assert!(settings.is_accepting_orders(resume));
    }
}
