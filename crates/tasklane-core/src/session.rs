//! Session gate: the single answer to "is the user logged in" and the
//! place where outgoing requests get their `Authorization` header.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ApiError, StoreError, ValidationError};

/// Where the session token lives. Reads must not block on I/O that can
/// stall indefinitely.
pub trait TokenStore: Send + Sync {
    fn get_token(&self) -> Result<Option<String>, StoreError>;
    fn set_token(&self, token: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_token(&self) -> Result<Option<String>, StoreError> {
        let guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn set_token(&self, token: &str) -> Result<(), StoreError> {
        let mut guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        Ok(())
    }
}

/// Snapshot of the authentication state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    key: String,
}

#[derive(Clone)]
pub struct SessionGate {
    store: Arc<dyn TokenStore>,
}

impl fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGate")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl SessionGate {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Current token. Storage failures count as "no token".
    pub fn token(&self) -> Option<String> {
        match self.store.get_token() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(err) => {
                warn!(error = %err, "failed to read session token; treating as logged out");
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn session(&self) -> Session {
        Session {
            token: self.token(),
        }
    }

    /// Sets `Authorization: Token <token>` when a token is stored, replacing
    /// any existing value. Without a token the request passes through.
    pub fn attach_auth(&self, request: reqwest::Request) -> reqwest::Request {
        match self.token() {
            Some(token) => attach_token(request, &token),
            None => request,
        }
    }

    /// Reads the token once and attaches it, or `None` when logged out.
    pub fn authorize(&self, request: reqwest::Request) -> Option<reqwest::Request> {
        self.token().map(|token| attach_token(request, &token))
    }

    /// Exchanges credentials for a token at `auth/login/`.
    ///
    /// On any failure nothing is stored and the gate stays as it was.
    #[tracing::instrument(skip(self, http, base_url, password))]
    pub async fn login(
        &self,
        http: &reqwest::Client,
        base_url: &Url,
        username: &str,
        password: &str,
    ) -> Result<Session, ApiError> {
        if username.trim().is_empty() {
            return Err(ValidationError::EmptyField("username").into());
        }
        if password.is_empty() {
            return Err(ValidationError::EmptyField("password").into());
        }

        let url = base_url.join("auth/login/")?;
        debug!(url = %url, "sending login request");

        let resp = http
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "login rejected");
            return Err(ApiError::LoginRejected { status });
        }

        let body = resp.bytes().await?;
        let parsed: LoginResponse = serde_json::from_slice(&body).map_err(|source| {
            ApiError::Decode {
                resource: "login",
                source,
            }
        })?;
        if parsed.key.trim().is_empty() {
            return Err(ApiError::LoginRejected { status });
        }

        self.store.set_token(parsed.key.trim())?;
        info!("logged in");
        Ok(self.session())
    }

    /// Forgets the token. Calling it while logged out is a no-op.
    #[tracing::instrument(skip(self))]
    pub fn logout(&self) -> Result<(), StoreError> {
        self.store.clear()?;
        info!("logged out");
        Ok(())
    }
}

fn attach_token(mut request: reqwest::Request, token: &str) -> reqwest::Request {
    match HeaderValue::from_str(&format!("Token {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(err) => {
            warn!(error = %err, "stored token is not a valid header value; sending without it");
        }
    }
    request
}
