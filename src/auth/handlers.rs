use axum::{
    extract::{FromRef, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{CallbackQuery, MessageResponse, PublicUser},
        extractors::AuthUser,
        policy::{DomainPolicy, LoginDecision},
        repo::{delete_session, insert_session, purge_expired_sessions},
        repo_types::{UpsertUser, User},
        services::{
            clear_cookie, hash_token, new_token, read_cookie, set_cookie, StateKeys, NONCE_COOKIE,
        },
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(start_login))
        .route("/auth/google/callback", get(callback))
        .route("/auth/logout", post(logout))
        .route("/auth/user", get(current_user))
}

#[instrument(skip(state))]
pub async fn start_login(State(state): State<AppState>) -> AppResult<Response> {
    let nonce = new_token();
    let keys = StateKeys::from_ref(&state);
    let state_token = keys.sign(&nonce)?;
    let location = state.identity.authorize_url(&state_token);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        set_cookie(
            NONCE_COOKIE,
            &nonce,
            keys.ttl.as_secs() as i64,
            state.config.session.secure_cookie,
        ),
    );
    Ok((headers, Redirect::to(&location)).into_response())
}

#[instrument(skip(state, headers, query))]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let frontend = state.config.frontend_url.clone();
    let secure = state.config.session.secure_cookie;
    let failed = |reason: &str| {
        warn!(reason, "oauth login failed");
        let mut h = HeaderMap::new();
        h.insert(header::SET_COOKIE, clear_cookie(NONCE_COOKIE, secure));
        (h, Redirect::to(&format!("{}/?error=auth_failed", frontend))).into_response()
    };

    if let Some(err) = query.error.as_deref() {
        return failed(err);
    }
    let (Some(code), Some(state_token)) = (query.code.as_deref(), query.state.as_deref()) else {
        return failed("missing code or state");
    };
    let Some(nonce) = read_cookie(&headers, NONCE_COOKIE) else {
        return failed("missing nonce cookie");
    };
    if StateKeys::from_ref(&state).verify(state_token, &nonce).is_err() {
        return failed("invalid state");
    }

    let profile = match state.identity.exchange_code(code).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = ?e, "code exchange failed");
            return failed("code exchange failed");
        }
    };

    let policy = DomainPolicy::from_config(&state.config.google);
    let grant_admin = match policy.check(&profile.email, profile.email_verified) {
        LoginDecision::Allowed { grant_admin } => grant_admin,
        decision => {
            warn!(email = %profile.email, ?decision, "login refused by domain policy");
            let mut h = HeaderMap::new();
            h.insert(header::SET_COOKIE, clear_cookie(NONCE_COOKIE, secure));
            return (h, Redirect::to(&format!("{}/domain-error", frontend))).into_response();
        }
    };

    let user = match User::upsert(
        &state.db,
        &UpsertUser {
            email: profile.email.trim().to_lowercase(),
            first_name: profile.given_name,
            last_name: profile.family_name,
            profile_image_url: profile.picture,
            grant_admin,
        },
    )
    .await
    {
        Ok(u) => u,
        Err(e) => {
            error!(error = ?e, "upsert user failed");
            return failed("upsert user failed");
        }
    };

    if let Err(e) = purge_expired_sessions(&state.db).await {
        warn!(error = ?e, "purging expired sessions failed");
    }

    let token = new_token();
    let ttl_secs = state.config.session.ttl_hours * 3600;
    let expires_at = OffsetDateTime::now_utc() + TimeDuration::seconds(ttl_secs);
    if let Err(e) = insert_session(&state.db, &hash_token(&token), user.id, expires_at).await {
        error!(error = ?e, "create session failed");
        return failed("create session failed");
    }

    info!(user_id = %user.id, email = %user.email, admin = user.is_admin, "user logged in");
    let mut h = HeaderMap::new();
    h.append(
        header::SET_COOKIE,
        set_cookie(&state.config.session.cookie_name, &token, ttl_secs, secure),
    );
    h.append(header::SET_COOKIE, clear_cookie(NONCE_COOKIE, secure));
    (h, Redirect::to(&format!("{}/", frontend))).into_response()
}

#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<(HeaderMap, Json<MessageResponse>)> {
    let cookie_name = &state.config.session.cookie_name;
    if let Some(token) = read_cookie(&headers, cookie_name) {
        if delete_session(&state.db, &hash_token(&token)).await? {
            info!("session ended");
        }
    }

    let mut h = HeaderMap::new();
    h.insert(
        header::SET_COOKIE,
        clear_cookie(cookie_name, state.config.session.secure_cookie),
    );
    Ok((
        h,
        Json(MessageResponse {
            message: "Logged out successfully".into(),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn current_user(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(user.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn start_login_redirects_to_provider_with_nonce_cookie() {
        let app = auth_routes().with_state(AppState::fake());
        let res = app
            .oneshot(Request::get("/auth/google").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let location = res.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://fake-idp.local/authorize?state="));
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(NONCE_COOKIE));
    }

    #[tokio::test]
    async fn callback_with_bad_state_redirects_to_error() {
        let app = auth_routes().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::get("/auth/google/callback?code=c&state=forged")
                    .header(header::COOKIE, format!("{}=n1", NONCE_COOKIE))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let location = res.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.ends_with("/?error=auth_failed"));
    }

    #[tokio::test]
    async fn callback_for_foreign_domain_redirects_to_domain_error_without_session() {
        let state = AppState::fake();
        let nonce = "nonce-xyz";
        let token = StateKeys::from_ref(&state).sign(nonce).unwrap();
        let app = auth_routes().with_state(state.clone());

        // the fake provider reports the code as the email address
        let res = app
            .oneshot(
                Request::get(format!(
                    "/auth/google/callback?code=intruder@gmail.com&state={}",
                    token
                ))
                .header(header::COOKIE, format!("{}={}", NONCE_COOKIE, nonce))
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let location = res.headers()[header::LOCATION].to_str().unwrap();
        assert_eq!(location, format!("{}/domain-error", state.config.frontend_url));
        let sets_session = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with(&state.config.session.cookie_name));
        assert!(!sets_session);
    }

    #[tokio::test]
    async fn current_user_requires_session() {
        let app = auth_routes().with_state(AppState::fake());
        let res = app
            .oneshot(Request::get("/auth/user").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn public_user_serializes_camel_case() {
        let user = PublicUser {
            id: uuid::Uuid::new_v4(),
            email: "test@kiit.ac.in".to_string(),
            first_name: Some("Test".into()),
            last_name: None,
            profile_image_url: None,
            is_admin: false,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["email"], "test@kiit.ac.in");
        assert_eq!(json["firstName"], "Test");
        assert_eq!(json["isAdmin"], false);
    }
}
