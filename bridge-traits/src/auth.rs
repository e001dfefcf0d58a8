//! Authentication Engine Abstractions
//!
//! The authentication engine is the host-provided client that performs the
//! actual protocol work: interactive and silent token acquisition, token
//! caching, popup/iframe/redirect handling. The core never talks to an
//! identity provider itself; it only wraps this capability surface.
//!
//! In a browser host this is typically a thin adapter over the JavaScript
//! authentication library. Tests substitute a fake implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Token type reported by the engine for the `id_token` flow.
pub const ID_TOKEN_TYPE: &str = "id_token";

/// Token type reported by the engine for access token flows.
pub const ACCESS_TOKEN_TYPE: &str = "access_token";

/// Parameters forwarded to the engine for a single operation.
///
/// The core does not interpret these beyond logging the requested scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Scopes to request a token for
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Login hint (usually the user's UPN)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
    /// Opaque application state round-tripped by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Prompt behavior (`login`, `select_account`, `consent`, `none`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Extra query parameters passed through to the authorize endpoint
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra_query_parameters: HashMap<String, String>,
}

impl AuthRequest {
    /// Create a request for the given scopes.
    pub fn with_scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Account information attached to a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Stable account identifier
    pub account_identifier: String,
    /// Username (UPN or email)
    #[serde(default)]
    pub user_name: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Successful engine response.
///
/// `token_type` is the discriminator used to tell a login (`id_token`) apart
/// from an access token acquisition when both arrive through the same
/// redirect callback.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Token type discriminator (`id_token`, `access_token`)
    pub token_type: String,
    /// Raw id token, if one was issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Raw access token, if one was issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Scopes granted
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Expiration of the access token (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<chrono::DateTime<chrono::Utc>>,
    /// Account the token belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
    /// Opaque application state round-tripped through the flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_state: Option<String>,
}

impl AuthResponse {
    /// Create a response carrying only a token type.
    pub fn new(token_type: impl Into<String>) -> Self {
        Self {
            token_type: token_type.into(),
            id_token: None,
            access_token: None,
            scopes: Vec::new(),
            expires_on: None,
            account: None,
            account_state: None,
        }
    }

    /// Attach the opaque account state.
    pub fn with_account_state(mut self, state: impl Into<String>) -> Self {
        self.account_state = Some(state.into());
        self
    }

    /// Attach the granted scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` when this response is the result of a login (`id_token`).
    pub fn is_id_token(&self) -> bool {
        self.token_type == ID_TOKEN_TYPE
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token_type", &self.token_type)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scopes", &self.scopes)
            .field("expires_on", &self.expires_on)
            .field("account", &self.account)
            .field("account_state", &self.account_state)
            .finish()
    }
}

/// Error reported by the engine (or synthesized from a popup signal).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct EngineError {
    /// Machine readable error code (e.g. `user_cancelled`)
    #[serde(rename = "errorCode")]
    pub code: String,
    /// Human readable message
    #[serde(rename = "errorMessage")]
    pub message: String,
}

impl EngineError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Outcome delivered by the engine after a page-redirect round trip.
///
/// Exactly one of `error` / `response` is expected. On failure the engine may
/// still attach a response carrying the account state of the failed flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectOutcome {
    pub error: Option<EngineError>,
    pub response: Option<AuthResponse>,
}

impl RedirectOutcome {
    /// Successful redirect outcome.
    pub fn success(response: AuthResponse) -> Self {
        Self {
            error: None,
            response: Some(response),
        }
    }

    /// Failed redirect outcome, optionally carrying the flow's response shell.
    pub fn failure(error: EngineError, response: Option<AuthResponse>) -> Self {
        Self {
            error: Some(error),
            response,
        }
    }
}

/// Callback registered with the engine for redirect results.
pub type RedirectCallback = Box<dyn Fn(RedirectOutcome) + Send + Sync>;

/// Authentication engine trait
///
/// Capability surface of the external authentication client. All token and
/// protocol work happens behind this trait.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::auth::{AuthEngine, AuthRequest};
///
/// async fn sign_in(engine: &dyn AuthEngine) {
///     let request = AuthRequest::with_scopes(["openid", "profile"]);
///     match engine.login_interactive(request).await {
///         Ok(response) => println!("signed in: {}", response.token_type),
///         Err(err) => eprintln!("login failed: {}", err),
///     }
/// }
/// ```
#[async_trait]
pub trait AuthEngine: Send + Sync {
    /// Interactive login (popup)
    async fn login_interactive(
        &self,
        request: AuthRequest,
    ) -> std::result::Result<AuthResponse, EngineError>;

    /// Silent single sign-on using an existing identity provider session
    async fn sso_silent(
        &self,
        request: AuthRequest,
    ) -> std::result::Result<AuthResponse, EngineError>;

    /// Silent token acquisition (cache or hidden iframe)
    async fn acquire_token_silent(
        &self,
        request: AuthRequest,
    ) -> std::result::Result<AuthResponse, EngineError>;

    /// Interactive token acquisition (popup)
    async fn acquire_token_popup(
        &self,
        request: AuthRequest,
    ) -> std::result::Result<AuthResponse, EngineError>;

    /// Register the callback that receives redirect results.
    ///
    /// The engine invokes it once the page returns from a redirect flow.
    fn register_redirect_callback(&self, callback: RedirectCallback);

    /// Whether an authenticated account currently exists in session state.
    fn has_account(&self) -> bool;

    /// Redirect URI the application is registered with.
    fn redirect_uri(&self) -> String;

    /// Drop cached tokens matching the given access token.
    fn clear_cache_for_scope(&self, access_token: &str);
}
