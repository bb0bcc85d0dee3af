use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{Error, Result};

/// Parsed token-endpoint response.
///
/// Providers return a much wider payload (api version, scoped domains, display
/// name, ...); only the fields the pipeline acts on are kept, and they are
/// immutable once parsed.
#[derive(Debug, Clone)]
pub struct AuthToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    scope: Option<String>,
}

impl AuthToken {
    /// Leeway subtracted from the advertised expiry so a token is replaced
    /// shortly before the upstream starts rejecting it.
    const EXPIRY_SKEW_SECS: i64 = 30;

    /// Parses a login response body. `access_token` is required; expiry is
    /// taken from an absolute `expires_at` (unix seconds) when present,
    /// falling back to a relative `expires_in`.
    pub fn from_login_response(endpoint: &str, body: &Value) -> Result<Self> {
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if access_token.is_empty() {
            return Err(Error::Authentication {
                endpoint: endpoint.to_string(),
                status: None,
                detail: "login response carried no access_token".to_string(),
            });
        }

        let expires_at = body
            .get("expires_at")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                body.get("expires_in")
                    .and_then(Value::as_i64)
                    .map(|secs| Utc::now() + Duration::seconds(secs))
            });

        Ok(Self {
            access_token,
            refresh_token: body
                .get("refresh_token")
                .and_then(Value::as_str)
                .map(str::to_string),
            expires_at,
            scope: body.get("scope").and_then(Value::as_str).map(str::to_string),
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// A token without an advertised expiry is treated as live until the
    /// session is explicitly invalidated.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now + Duration::seconds(Self::EXPIRY_SKEW_SECS) >= at,
            None => false,
        }
    }
}

/// One upstream identity's login shape.
///
/// The session lifecycle is shared between the telephony provider and the
/// internal API; only the token endpoint and the form payload differ, so each
/// client plugs those in here rather than re-implementing the exchange.
pub trait LoginProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Absolute token-endpoint URL.
    fn login_url(&self) -> String;

    /// Form-encoded login payload.
    fn login_form(&self) -> Vec<(&'static str, String)>;

    /// Distinguishes credential sets, so a cached session is never served
    /// for credentials other than the ones that produced it.
    fn fingerprint(&self) -> String;

    fn parse_token(&self, endpoint: &str, body: &Value) -> Result<AuthToken> {
        AuthToken::from_login_response(endpoint, body)
    }
}

/// An authenticated transport: the token plus an HTTP client whose default
/// headers carry the bearer authorization, so every subsequent request to
/// that identity goes out pre-authorized.
pub struct Session {
    token: AuthToken,
    fingerprint: String,
    http: reqwest::Client,
}

impl Session {
    fn new(token: AuthToken, fingerprint: String, endpoint: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", token.access_token());
        let value = HeaderValue::from_str(&bearer).map_err(|e| Error::Authentication {
            endpoint: endpoint.to_string(),
            status: None,
            detail: format!("access token is not a valid header value: {e}"),
        })?;
        headers.insert(AUTHORIZATION, value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Authentication {
                endpoint: endpoint.to_string(),
                status: None,
                detail: format!("failed to build authorized client: {e}"),
            })?;

        Ok(Self {
            token,
            fingerprint,
            http,
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Owns the one live session per upstream identity.
///
/// Created lazily on first use, read-shared across concurrently processed
/// events, and replaced wholesale on refresh or invalidation.
pub struct SessionManager {
    http: reqwest::Client,
    cached: RwLock<Option<Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            cached: RwLock::new(None),
        }
    }

    /// Returns the cached session when it is bound to the same credentials
    /// and its token has not expired; otherwise performs exactly one login
    /// exchange and caches the result.
    pub async fn ensure_session(&self, provider: &dyn LoginProvider) -> Result<Arc<Session>> {
        {
            let cached = self.cached.read().await;
            if let Some(session) = cached.as_ref() {
                if Self::is_live(session, provider) {
                    return Ok(Arc::clone(session));
                }
            }
        }

        let mut slot = self.cached.write().await;
        // Another event may have logged in while we waited for the lock.
        if let Some(session) = slot.as_ref() {
            if Self::is_live(session, provider) {
                return Ok(Arc::clone(session));
            }
        }

        let session = Arc::new(self.login(provider).await?);
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Drops the cached session, forcing a fresh login on next use. Called
    /// after an upstream authentication failure.
    pub async fn invalidate(&self) {
        let mut slot = self.cached.write().await;
        *slot = None;
    }

    fn is_live(session: &Session, provider: &dyn LoginProvider) -> bool {
        session.fingerprint() == provider.fingerprint() && !session.token().is_expired(Utc::now())
    }

    async fn login(&self, provider: &dyn LoginProvider) -> Result<Session> {
        let endpoint = provider.login_url();
        info!(provider = provider.name(), endpoint = %endpoint, "performing login exchange");

        let response = self
            .http
            .post(&endpoint)
            .form(&provider.login_form())
            .send()
            .await
            .map_err(|e| Error::Authentication {
                endpoint: endpoint.clone(),
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Authentication {
                endpoint,
                status: Some(status.as_u16()),
                detail: format!("login exchange rejected with status {status}"),
            });
        }

        let body: Value = response.json().await.map_err(|e| Error::Authentication {
            endpoint: endpoint.clone(),
            status: Some(status.as_u16()),
            detail: format!("login response was not valid json: {e}"),
        })?;

        let token = provider.parse_token(&endpoint, &body)?;
        Session::new(token, provider.fingerprint(), &endpoint)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
