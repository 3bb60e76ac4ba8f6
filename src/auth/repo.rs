use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{UpsertUser, User};

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, profile_image_url, is_admin, created_at, updated_at";

impl User {
    /// Insert a user or refresh the profile of an existing one, matched by email.
    /// The admin flag is only ever raised here, never cleared.
    pub async fn upsert(db: &PgPool, u: &UpsertUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, first_name, last_name, profile_image_url, is_admin)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
               SET first_name = EXCLUDED.first_name,
                   last_name = EXCLUDED.last_name,
                   profile_image_url = EXCLUDED.profile_image_url,
                   is_admin = users.is_admin OR EXCLUDED.is_admin,
                   updated_at = now()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(u.email.to_lowercase())
        .bind(&u.first_name)
        .bind(&u.last_name)
        .bind(&u.profile_image_url)
        .bind(u.grant_admin)
        .fetch_one(db)
        .await
        .context("upsert user")?;
        Ok(user)
    }

    pub async fn set_admin(db: &PgPool, id: Uuid, is_admin: bool) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_admin = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(is_admin)
        .fetch_optional(db)
        .await
        .context("set admin flag")?;
        Ok(user)
    }
}

// ---- Sessions ----

pub async fn insert_session(
    db: &PgPool,
    token_hash: &str,
    user_id: Uuid,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (token_hash, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await
    .context("insert session")?;
    Ok(())
}

/// Resolve an unexpired session to its user.
pub async fn find_session_user(db: &PgPool, token_hash: &str) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.email, u.first_name, u.last_name, u.profile_image_url,
               u.is_admin, u.created_at, u.updated_at
          FROM sessions s
          JOIN users u ON u.id = s.user_id
         WHERE s.token_hash = $1
           AND s.expires_at > now()
        "#,
    )
    .bind(token_hash)
    .fetch_optional(db)
    .await
    .context("find session")?;
    Ok(user)
}

pub async fn delete_session(db: &PgPool, token_hash: &str) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
        .bind(token_hash)
        .execute(db)
        .await
        .context("delete session")?;
    Ok(res.rows_affected() > 0)
}

pub async fn purge_expired_sessions(db: &PgPool) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
        .execute(db)
        .await
        .context("purge expired sessions")?;
    Ok(res.rows_affected())
}
