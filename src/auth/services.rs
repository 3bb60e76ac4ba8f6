pub(crate) use crate::auth::dto::{StateClaims, StateKeys};
use crate::state::AppState;
use axum::{
    extract::FromRef,
    http::{header, HeaderMap, HeaderValue},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

const STATE_TTL_SECS: u64 = 10 * 60;
const STATE_ISSUER: &str = "snackit-oauth";

pub const NONCE_COOKIE: &str = "snackit.oauth_nonce";

impl FromRef<AppState> for StateKeys {
    fn from_ref(state: &AppState) -> Self {
        StateKeys::new(&state.config.session.secret)
    }
}

impl StateKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: STATE_ISSUER.into(),
            ttl: Duration::from_secs(STATE_TTL_SECS),
        }
    }

    pub fn sign(&self, nonce: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = StateClaims {
            nonce: nonce.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!("oauth state signed");
        Ok(token)
    }

    /// Verify a state token and check it was issued for `nonce`.
    pub fn verify(&self, token: &str, nonce: &str) -> anyhow::Result<StateClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<StateClaims>(token, &self.decoding, &validation)?;
        if data.claims.nonce != nonce {
            anyhow::bail!("state nonce mismatch");
        }
        Ok(data.claims)
    }
}

/// Random url-safe token (hex encoded 32 bytes).
pub fn new_token() -> String {
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Sessions are stored by the SHA-256 of their cookie token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Value of cookie `name` from the request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

pub fn set_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    // name and value are ascii: hex tokens and fixed cookie names
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn clear_cookie(name: &str, secure: bool) -> HeaderValue {
    set_cookie(name, "", 0, secure)
}
