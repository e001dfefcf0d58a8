//! # Core Configuration Module
//!
//! Provides configuration management for the auth lifecycle core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the authentication engine and the protected resource
//! settings. It enforces fail-fast validation so a misconfigured host is caught
//! at startup rather than on the first outgoing request.
//!
//! ## Required Dependencies
//!
//! - `AuthEngine` - the external authentication client
//! - `client_id` - the application (client) identifier, used as the default scope
//!
//! ## Protected Resources
//!
//! Two resource maps are recognized:
//!
//! - `resource_map` - the current map of resource patterns to scopes
//! - `legacy_resource_map` - deprecated; when present and non-empty it replaces
//!   `resource_map` entirely (the two are never merged)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, ProtectedResourceMap};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .engine(Arc::new(MyEngine))
//!     .client_id("abc-123")
//!     .protect_resource("https://graph.example.com/*", ["User.Read"])
//!     .build()?;
//! ```
//!
//! Hosts that keep their settings as JSON can deserialize an [`AuthSettings`]
//! and hand it to [`CoreConfigBuilder::settings`]:
//!
//! ```rust
//! use core_runtime::config::AuthSettings;
//!
//! let settings: AuthSettings = serde_json::from_str(r#"{
//!     "clientId": "abc-123",
//!     "protectedResourceMap": [
//!         ["https://graph.example.com/*", ["User.Read"]]
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(settings.client_id, "abc-123");
//! assert_eq!(settings.protected_resource_map.len(), 1);
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::AuthEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Upper bound for the event buffer.
const MAX_EVENT_BUFFER_SIZE: usize = 100_000;

// ============================================================================
// Protected Resource Map
// ============================================================================

/// Insertion-ordered mapping from resource patterns to scope lists.
///
/// Iteration order is significant: when several patterns match an endpoint the
/// first one wins. Re-inserting an existing pattern replaces its scopes but
/// keeps its original position.
///
/// Serializes as an array of `[pattern, [scopes...]]` pairs.
///
/// # Examples
///
/// ```
/// use core_runtime::config::ProtectedResourceMap;
///
/// let mut map = ProtectedResourceMap::new();
/// map.insert("https://graph.example.com/*", ["User.Read"]);
/// map.insert("/api/", ["api://backend/access"]);
///
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get("/api/"), Some(&["api://backend/access".to_string()][..]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, Vec<String>)>", into = "Vec<(String, Vec<String>)>")]
pub struct ProtectedResourceMap {
    entries: Vec<(String, Vec<String>)>,
}

impl ProtectedResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the scopes for `pattern`.
    ///
    /// Returns the previous scopes if the pattern was already present.
    pub fn insert<P, I, S>(&mut self, pattern: P, scopes: I) -> Option<Vec<String>>
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern = pattern.into();
        let scopes: Vec<String> = scopes.into_iter().map(Into::into).collect();

        match self.entries.iter_mut().find(|(key, _)| *key == pattern) {
            Some((_, existing)) => Some(std::mem::replace(existing, scopes)),
            None => {
                self.entries.push((pattern, scopes));
                None
            }
        }
    }

    /// Scopes configured for exactly this pattern.
    pub fn get(&self, pattern: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(key, _)| key == pattern)
            .map(|(_, scopes)| scopes.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(pattern, scopes)| (pattern.as_str(), scopes.as_slice()))
    }

    /// Patterns in insertion order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(pattern, _)| pattern.as_str())
    }
}

impl<P, I, S> FromIterator<(P, I)> for ProtectedResourceMap
where
    P: Into<String>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (P, I)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (pattern, scopes) in iter {
            map.insert(pattern, scopes);
        }
        map
    }
}

/// Duplicate patterns collapse as with [`ProtectedResourceMap::insert`].
impl From<Vec<(String, Vec<String>)>> for ProtectedResourceMap {
    fn from(entries: Vec<(String, Vec<String>)>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<ProtectedResourceMap> for Vec<(String, Vec<String>)> {
    fn from(map: ProtectedResourceMap) -> Self {
        map.entries
    }
}

// ============================================================================
// Serializable settings
// ============================================================================

/// Host-facing (JSON) form of the non-capability options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    /// Application (client) identifier
    pub client_id: String,
    /// Resource patterns and the scopes they require
    #[serde(default)]
    pub protected_resource_map: ProtectedResourceMap,
    /// Deprecated resource map; wins over `protected_resource_map` when non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_protected_resource_map: Option<ProtectedResourceMap>,
    /// Deprecated and ignored; glob patterns in the resource map replace it
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unprotected_resources: Vec<String>,
    /// Allow endpoints (potential PII) to appear in log output
    #[serde(default)]
    pub pii_logging_enabled: bool,
    /// Event bus buffer size
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

// ============================================================================
// Core configuration
// ============================================================================

/// Core configuration for the auth lifecycle core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// External authentication engine (required)
    pub engine: Arc<dyn AuthEngine>,

    /// Application (client) identifier (required)
    pub client_id: String,

    /// Resource patterns and their scopes
    pub resource_map: ProtectedResourceMap,

    /// Deprecated resource map, authoritative when non-empty
    pub legacy_resource_map: Option<ProtectedResourceMap>,

    /// Deprecated and ignored
    pub unprotected_resources: Vec<String>,

    /// Allow endpoints to appear in log output
    pub pii_logging_enabled: bool,

    /// Event bus buffer size
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("engine", &"AuthEngine { ... }")
            .field("client_id", &self.client_id)
            .field("resource_map", &self.resource_map)
            .field("legacy_resource_map", &self.legacy_resource_map)
            .field("unprotected_resources", &self.unprotected_resources)
            .field("pii_logging_enabled", &self.pii_logging_enabled)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Client id is not blank
    /// - Event buffer size is within (0, 100_000]
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("Client id cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

fn engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AuthEngine".to_string(),
        message: "AuthEngine implementation is required for login and token acquisition. \
                 Web: inject an adapter over the browser authentication library. \
                 Tests: inject a fake engine."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    engine: Option<Arc<dyn AuthEngine>>,
    client_id: Option<String>,
    resource_map: ProtectedResourceMap,
    legacy_resource_map: Option<ProtectedResourceMap>,
    unprotected_resources: Vec<String>,
    pii_logging_enabled: bool,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the authentication engine.
    pub fn engine(mut self, engine: Arc<dyn AuthEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the application (client) identifier.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Replaces the protected resource map.
    pub fn resource_map(mut self, map: ProtectedResourceMap) -> Self {
        self.resource_map = map;
        self
    }

    /// Adds (or replaces) one protected resource pattern.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .protect_resource("https://graph.example.com/*", ["User.Read"])
    ///     .protect_resource("/api/", ["api://backend/access"]);
    /// ```
    pub fn protect_resource<P, I, S>(mut self, pattern: P, scopes: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_map.insert(pattern, scopes);
        self
    }

    /// Sets the deprecated resource map.
    pub fn legacy_resource_map(mut self, map: ProtectedResourceMap) -> Self {
        self.legacy_resource_map = Some(map);
        self
    }

    /// Sets the deprecated (ignored) unprotected resource list.
    pub fn unprotected_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unprotected_resources = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Allows endpoints to appear in log output.
    pub fn pii_logging_enabled(mut self, enabled: bool) -> Self {
        self.pii_logging_enabled = enabled;
        self
    }

    /// Sets the event bus buffer size.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Applies host settings loaded from JSON.
    ///
    /// Values already set on the builder are overwritten.
    pub fn settings(mut self, settings: AuthSettings) -> Self {
        self.client_id = Some(settings.client_id);
        self.resource_map = settings.protected_resource_map;
        self.legacy_resource_map = settings.legacy_protected_resource_map;
        self.unprotected_resources = settings.unprotected_resources;
        self.pii_logging_enabled = settings.pii_logging_enabled;
        self.event_buffer_size = Some(settings.event_buffer_size);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` if no engine was provided
    /// - `Error::Config` if the client id is missing or blank, or the event
    ///   buffer size is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let engine = self.engine.ok_or_else(engine_missing_error)?;

        let client_id = self.client_id.ok_or_else(|| {
            Error::Config("Client id is required. Use .client_id() to set it.".to_string())
        })?;

        let config = CoreConfig {
            engine,
            client_id,
            resource_map: self.resource_map,
            legacy_resource_map: self.legacy_resource_map,
            unprotected_resources: self.unprotected_resources,
            pii_logging_enabled: self.pii_logging_enabled,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        // An empty pattern matches every endpoint; accepted, but worth flagging.
        let has_empty_pattern = config
            .resource_map
            .patterns()
            .chain(config.legacy_resource_map.iter().flat_map(|m| m.patterns()))
            .any(str::is_empty);
        if has_empty_pattern {
            warn!("Protected resource map contains an empty pattern; it matches every endpoint");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::auth::{AuthRequest, AuthResponse, EngineError, RedirectCallback};

    struct NoopEngine;

    #[async_trait]
    impl AuthEngine for NoopEngine {
        async fn login_interactive(
            &self,
            _request: AuthRequest,
        ) -> std::result::Result<AuthResponse, EngineError> {
            Err(EngineError::new("not_implemented", "noop"))
        }

        async fn sso_silent(
            &self,
            _request: AuthRequest,
        ) -> std::result::Result<AuthResponse, EngineError> {
            Err(EngineError::new("not_implemented", "noop"))
        }

        async fn acquire_token_silent(
            &self,
            _request: AuthRequest,
        ) -> std::result::Result<AuthResponse, EngineError> {
            Err(EngineError::new("not_implemented", "noop"))
        }

        async fn acquire_token_popup(
            &self,
            _request: AuthRequest,
        ) -> std::result::Result<AuthResponse, EngineError> {
            Err(EngineError::new("not_implemented", "noop"))
        }

        fn register_redirect_callback(&self, _callback: RedirectCallback) {}

        fn has_account(&self) -> bool {
            false
        }

        fn redirect_uri(&self) -> String {
            "https://app.example.com/".to_string()
        }

        fn clear_cache_for_scope(&self, _access_token: &str) {}
    }

    #[test]
    fn test_builder_requires_engine() {
        let result = CoreConfig::builder().client_id("abc-123").build();

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("AuthEngine"));
        assert!(err_msg.contains("Capability missing"));
    }

    #[test]
    fn test_builder_requires_client_id() {
        let result = CoreConfig::builder().engine(Arc::new(NoopEngine)).build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Client id is required"));
    }

    #[test]
    fn test_validate_rejects_blank_client_id() {
        let result = CoreConfig::builder()
            .engine(Arc::new(NoopEngine))
            .client_id("   ")
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let result = CoreConfig::builder()
            .engine(Arc::new(NoopEngine))
            .client_id("abc-123")
            .event_buffer_size(0)
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("greater than 0"));
    }

    #[test]
    fn test_validate_rejects_excessive_buffer() {
        let result = CoreConfig::builder()
            .engine(Arc::new(NoopEngine))
            .client_id("abc-123")
            .event_buffer_size(MAX_EVENT_BUFFER_SIZE + 1)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let config = CoreConfig::builder()
            .engine(Arc::new(NoopEngine))
            .client_id("abc-123")
            .build()
            .unwrap();

        assert_eq!(config.client_id, "abc-123");
        assert!(config.resource_map.is_empty());
        assert!(config.legacy_resource_map.is_none());
        assert!(!config.pii_logging_enabled);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_builder_accepts_empty_pattern() {
        let config = CoreConfig::builder()
            .engine(Arc::new(NoopEngine))
            .client_id("abc-123")
            .protect_resource("", ["everything"])
            .build()
            .unwrap();

        assert_eq!(config.resource_map.get(""), Some(&["everything".to_string()][..]));
    }

    #[test]
    fn test_resource_map_preserves_insertion_order() {
        let map: ProtectedResourceMap = vec![
            ("https://b.example.com", vec!["b"]),
            ("https://a.example.com", vec!["a"]),
            ("https://c.example.com", vec!["c"]),
        ]
        .into_iter()
        .collect();

        let patterns: Vec<&str> = map.patterns().collect();
        assert_eq!(
            patterns,
            vec![
                "https://b.example.com",
                "https://a.example.com",
                "https://c.example.com"
            ]
        );
    }

    #[test]
    fn test_resource_map_reinsert_keeps_position() {
        let mut map = ProtectedResourceMap::new();
        map.insert("first", ["one"]);
        map.insert("second", ["two"]);

        let previous = map.insert("first", ["uno", "eins"]);

        assert_eq!(previous, Some(vec!["one".to_string()]));
        assert_eq!(map.len(), 2);
        let (pattern, scopes) = map.iter().next().unwrap();
        assert_eq!(pattern, "first");
        assert_eq!(scopes, &["uno".to_string(), "eins".to_string()][..]);
    }

    #[test]
    fn test_resource_map_serializes_as_pairs() {
        let map: ProtectedResourceMap = vec![("https://graph.example.com/*", vec!["User.Read"])]
            .into_iter()
            .collect();

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"[["https://graph.example.com/*",["User.Read"]]]"#);

        let back: ProtectedResourceMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_resource_map_json_duplicates_collapse() {
        let map: ProtectedResourceMap = serde_json::from_str(
            r#"[
                ["api.example.com", ["old"]],
                ["/assets", ["static"]],
                ["api.example.com", ["new"]]
            ]"#,
        )
        .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("api.example.com"), Some(&["new".to_string()][..]));
        assert_eq!(
            map.patterns().collect::<Vec<_>>(),
            vec!["api.example.com", "/assets"]
        );
    }

    #[test]
    fn test_settings_from_json_applied_to_builder() {
        let settings: AuthSettings = serde_json::from_str(
            r#"{
                "clientId": "abc-123",
                "protectedResourceMap": [["/api/", ["api://backend/access"]]],
                "legacyProtectedResourceMap": [["https://legacy.example.com", ["legacy"]]],
                "unprotectedResources": ["/assets"],
                "piiLoggingEnabled": true
            }"#,
        )
        .unwrap();
        assert_eq!(settings.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);

        let config = CoreConfig::builder()
            .engine(Arc::new(NoopEngine))
            .settings(settings)
            .build()
            .unwrap();

        assert_eq!(config.client_id, "abc-123");
        assert_eq!(config.resource_map.len(), 1);
        assert_eq!(config.legacy_resource_map.map(|m| m.len()), Some(1));
        assert_eq!(config.unprotected_resources, vec!["/assets".to_string()]);
        assert!(config.pii_logging_enabled);
    }

    #[test]
    fn test_config_debug_hides_engine() {
        let config = CoreConfig::builder()
            .engine(Arc::new(NoopEngine))
            .client_id("abc-123")
            .build()
            .unwrap();

        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("AuthEngine { ... }"));
        assert!(debug_str.contains("abc-123"));
    }
}
