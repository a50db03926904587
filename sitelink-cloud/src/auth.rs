use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;

use crate::config::CloudConfig;
use crate::error::{CloudError, Result};
use crate::models::{ErrorBody, LoginRequest, LoginResponse};

/// Lifetime assumed when the backend does not send one.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Upper bound on any token lifetime.
const MAX_TOKEN_LIFETIME_SECS: u64 = 366 * 24 * 3600;

/// A bearer token and when it stops being valid.
#[derive(Debug, Clone)]
struct AuthSession {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Holds the backend credentials and the current bearer token.
///
/// The token is replaced as a whole by [`login`](Self::login) and read by
/// the other methods; callers never lock around it.
pub struct Authenticator {
    http: reqwest::Client,
    login_url: String,
    username: String,
    password: String,
    session: RwLock<Option<AuthSession>>,
}

impl Authenticator {
    pub fn new(http: reqwest::Client, config: &CloudConfig) -> Self {
        Self {
            http,
            login_url: config.url(&config.login_path),
            username: config.username.clone(),
            password: config.password.clone(),
            session: RwLock::new(None),
        }
    }

    /// Exchange the credentials for a new token.
    pub async fn login(&self) -> Result<()> {
        let request = LoginRequest {
            username: &self.username,
            password: &self.password,
        };

        let response = self.http.post(&self.login_url).json(&request).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = ErrorBody::parse(&body)
                .unwrap_or_else(|| format!("status {}", status.as_u16()));
            tracing::warn!(user = %self.username, status = status.as_u16(), "Login rejected");
            return Err(CloudError::AuthFailed(message));
        }

        let login: LoginResponse = serde_json::from_slice(&body)
            .map_err(|e| CloudError::Decode(format!("login response: {}", e)))?;
        if login.token.is_empty() {
            return Err(CloudError::AuthFailed("backend returned an empty token".into()));
        }

        let lifetime = login
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
            .min(MAX_TOKEN_LIFETIME_SECS);
        let expires_at = Utc::now() + ChronoDuration::seconds(lifetime as i64);

        *self.session.write() = Some(AuthSession {
            token: login.token,
            expires_at,
        });

        tracing::info!(user = %self.username, expires_at = %expires_at, "Logged in to backend");
        Ok(())
    }

    /// True when a token exists and has not expired.
    pub fn is_authenticated(&self) -> bool {
        self.session
            .read()
            .as_ref()
            .is_some_and(|s| Utc::now() < s.expires_at)
    }

    /// `Authorization` header value for the current token.
    pub fn get_auth_header(&self) -> Result<String> {
        match self.session.read().as_ref() {
            None => Err(CloudError::NoToken),
            Some(s) if Utc::now() >= s.expires_at => Err(CloudError::TokenExpired),
            Some(s) => Ok(format!("Bearer {}", s.token)),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.session.read().as_ref().map(|s| s.expires_at)
    }

    /// Drop the current token.
    pub fn logout(&self) {
        *self.session.write() = None;
    }
}
