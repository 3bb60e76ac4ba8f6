use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Profile returned by the identity provider after a successful code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start the login.
    fn authorize_url(&self, state: &str) -> String;
    /// Exchange an authorization code for the user's profile.
    async fn exchange_code(&self, code: &str) -> anyhow::Result<ProviderProfile>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    authorize_base: Url,
}

impl GoogleOAuth {
    pub fn new(cfg: &GoogleConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("snackit")
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            redirect_url: cfg.redirect_url.clone(),
            authorize_base: authorize_base(
                &cfg.client_id,
                &cfg.redirect_url,
                &cfg.allowed_domain,
            )?,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuth {
    fn authorize_url(&self, state: &str) -> String {
        let mut url = self.authorize_base.clone();
        url.query_pairs_mut().append_pair("state", state);
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<ProviderProfile> {
        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("google token request")?
            .error_for_status()
            .context("google token response")?
            .json()
            .await
            .context("decode google token response")?;

        let profile: ProviderProfile = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("google userinfo request")?
            .error_for_status()
            .context("google userinfo response")?
            .json()
            .await
            .context("decode google userinfo")?;

        debug!(email = %profile.email, verified = profile.email_verified, "google profile fetched");
        Ok(profile)
    }
}

/// Consent URL with every parameter except the per-login `state`.
fn authorize_base(client_id: &str, redirect_url: &str, hosted_domain: &str) -> anyhow::Result<Url> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_url),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("hd", hosted_domain),
            ("prompt", "select_account"),
        ],
    )
    .context("build google authorize url")
}
