//! # Protected Resource Resolution
//!
//! Maps an outgoing endpoint to the scopes a token must carry before the
//! request is sent.
//!
//! ## Matching
//!
//! Entries are consulted in configuration order. An entry matches when the
//! endpoint contains its pattern as a substring, or when the pattern, read as a
//! glob, matches the whole endpoint.
//!
//! Glob semantics:
//! - a single wildcard never crosses a `/`
//! - wildcards do not match a leading `.` in a path segment
//! - `{a,b}` alternatives are expanded before compiling, nesting allowed;
//!   numeric ranges such as `{1..3}` are not expanded
//!
//! The first matching entry wins. When several entries match, a warning is
//! logged and the first one is still used.
//!
//! ## Fallbacks
//!
//! With no match, an endpoint containing no `http://` or `https://` belongs to
//! the application itself and resolves to the client id as its only scope. Any
//! other endpoint resolves the same way only when its host text equals the
//! redirect URI's host text. Host text is what follows the leading scheme, up
//! to the first `/`, compared verbatim (so `:443` is significant).

use glob::{MatchOptions, Pattern};
use tracing::{debug, info, warn};

use core_runtime::config::{CoreConfig, ProtectedResourceMap};

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Which configured map the store was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMapSource {
    Current,
    Legacy,
}

#[derive(Debug, Clone)]
struct ResourceEntry {
    pattern: String,
    globs: Vec<Pattern>,
    scopes: Vec<String>,
}

impl ResourceEntry {
    fn new(pattern: &str, scopes: &[String]) -> Self {
        let globs = expand_braces(pattern)
            .iter()
            .filter_map(|expanded| match Pattern::new(expanded) {
                Ok(glob) => Some(glob),
                Err(e) => {
                    debug!(error = %e, "Resource pattern is not a valid glob; substring matching only");
                    None
                }
            })
            .collect();

        Self {
            pattern: pattern.to_string(),
            globs,
            scopes: scopes.to_vec(),
        }
    }

    fn matches(&self, endpoint: &str) -> bool {
        endpoint.contains(self.pattern.as_str())
            || self
                .globs
                .iter()
                .any(|glob| glob.matches_with(endpoint, GLOB_OPTIONS))
    }
}

/// Expands `{a,b}` alternatives, left to right.
///
/// A brace group without a top-level comma is kept literally.
fn expand_braces(pattern: &str) -> Vec<String> {
    let mut depth = 0usize;
    let mut open = None;

    for (index, c) in pattern.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    open = Some(index);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if let (0, Some(start)) = (depth, open) {
                    let body = &pattern[start + 1..index];
                    let alternatives = split_alternatives(body);
                    if alternatives.len() > 1 {
                        let prefix = &pattern[..start];
                        let suffix = &pattern[index + 1..];
                        return alternatives
                            .iter()
                            .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
                            .collect();
                    }
                    open = None;
                }
            }
            _ => {}
        }
    }

    vec![pattern.to_string()]
}

fn split_alternatives(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (index, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// Effective pattern-to-scopes table.
///
/// Built once from configuration. The legacy map is authoritative whenever it
/// is present and non-empty; otherwise the current map is used.
#[derive(Debug, Clone)]
pub struct ResourceMapStore {
    entries: Vec<ResourceEntry>,
    source: ResourceMapSource,
}

impl ResourceMapStore {
    /// Picks the map in effect. An empty legacy map counts as absent.
    ///
    /// Deprecation notices are logged here, once per store, not per resolution.
    pub fn new(current: &ProtectedResourceMap, legacy: Option<&ProtectedResourceMap>) -> Self {
        let (map, source) = match legacy {
            Some(legacy) if !legacy.is_empty() => {
                info!("Legacy protected resource map is deprecated; migrate to the resource map");
                (legacy, ResourceMapSource::Legacy)
            }
            _ => (current, ResourceMapSource::Current),
        };

        let entries = map
            .iter()
            .map(|(pattern, scopes)| ResourceEntry::new(pattern, scopes))
            .collect();

        Self { entries, source }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        if !config.unprotected_resources.is_empty() {
            info!("Unprotected resources are deprecated and ignored");
        }
        Self::new(&config.resource_map, config.legacy_resource_map.as_ref())
    }

    pub fn source(&self) -> ResourceMapSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Patterns matching `endpoint`, in configuration order.
    pub fn matching_patterns<'a>(&'a self, endpoint: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.matching_entries(endpoint).map(|entry| entry.pattern.as_str())
    }

    fn matching_entries<'a>(&'a self, endpoint: &'a str) -> impl Iterator<Item = &'a ResourceEntry> + 'a {
        self.entries.iter().filter(move |entry| entry.matches(endpoint))
    }
}

/// Result of resolving one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeResolution {
    /// A configured entry matched.
    Mapped {
        pattern: String,
        scopes: Vec<String>,
        match_count: usize,
    },
    /// The endpoint belongs to the application; the client id is the scope.
    Application(String),
    /// No token is needed.
    Unprotected,
}

impl ScopeResolution {
    pub fn is_protected(&self) -> bool {
        !matches!(self, ScopeResolution::Unprotected)
    }

    pub fn into_scopes(self) -> Option<Vec<String>> {
        match self {
            ScopeResolution::Mapped { scopes, .. } => Some(scopes),
            ScopeResolution::Application(client_id) => Some(vec![client_id]),
            ScopeResolution::Unprotected => None,
        }
    }
}

/// Stateless resolver over a [`ResourceMapStore`].
#[derive(Debug, Clone)]
pub struct ProtectedResourceResolver {
    store: ResourceMapStore,
    client_id: String,
    pii_logging_enabled: bool,
}

impl ProtectedResourceResolver {
    pub fn new(store: ResourceMapStore, client_id: impl Into<String>) -> Self {
        Self {
            store,
            client_id: client_id.into(),
            pii_logging_enabled: false,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(ResourceMapStore::from_config(config), config.client_id.clone())
            .with_pii_logging(config.pii_logging_enabled)
    }

    /// Allow endpoints to appear in log output.
    pub fn with_pii_logging(mut self, enabled: bool) -> Self {
        self.pii_logging_enabled = enabled;
        self
    }

    pub fn store(&self) -> &ResourceMapStore {
        &self.store
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Scopes required for `endpoint`, or `None` when it is unprotected.
    pub fn resolve_scopes(&self, endpoint: &str, redirect_uri: &str) -> Option<Vec<String>> {
        self.resolve(endpoint, redirect_uri).into_scopes()
    }

    pub fn resolve(&self, endpoint: &str, redirect_uri: &str) -> ScopeResolution {
        let mut matches = self.store.matching_entries(endpoint);

        if let Some(first) = matches.next() {
            let match_count = 1 + matches.count();
            if match_count > 1 {
                if self.pii_logging_enabled {
                    warn!(
                        endpoint = %endpoint,
                        match_count,
                        "Multiple protected resource patterns match the endpoint; using the first"
                    );
                } else {
                    warn!(
                        match_count,
                        "Multiple protected resource patterns match an endpoint; using the first"
                    );
                }
            }

            return ScopeResolution::Mapped {
                pattern: first.pattern.clone(),
                scopes: first.scopes.clone(),
                match_count,
            };
        }

        if !is_absolute(endpoint) || host_of(endpoint) == host_of(redirect_uri) {
            ScopeResolution::Application(self.client_id.clone())
        } else {
            ScopeResolution::Unprotected
        }
    }
}

/// An endpoint is absolute when it mentions an http(s) scheme anywhere.
fn is_absolute(endpoint: &str) -> bool {
    endpoint.contains("http://") || endpoint.contains("https://")
}

/// Host text of a URI: the leading scheme stripped, up to the first `/`.
fn host_of(uri: &str) -> &str {
    let rest = uri
        .strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"))
        .unwrap_or(uri);
    rest.split('/').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: &str = "abc-123";
    const REDIRECT_URI: &str = "https://app.example.com/auth";

    fn map(entries: &[(&str, &[&str])]) -> ProtectedResourceMap {
        entries
            .iter()
            .map(|(pattern, scopes)| (*pattern, scopes.iter().copied()))
            .collect()
    }

    fn resolver(current: ProtectedResourceMap) -> ProtectedResourceResolver {
        ProtectedResourceResolver::new(ResourceMapStore::new(&current, None), CLIENT_ID)
    }

    #[test]
    fn test_glob_entry_matches() {
        let resolver = resolver(map(&[(
            "https://graph.example.com/*",
            &["user.read"],
        )]));

        assert_eq!(
            resolver.resolve_scopes("https://graph.example.com/me", REDIRECT_URI),
            Some(vec!["user.read".to_string()])
        );
    }

    #[test]
    fn test_single_wildcard_does_not_cross_separator() {
        let store = ResourceMapStore::new(&map(&[("https://api.example.com/*", &["a"])]), None);

        let nested: Vec<_> = store
            .matching_patterns("https://api.example.com/v1/items")
            .collect();
        assert!(nested.is_empty());

        let direct: Vec<_> = store
            .matching_patterns("https://api.example.com/items")
            .collect();
        assert_eq!(direct, vec!["https://api.example.com/*"]);
    }

    #[test]
    fn test_substring_entry_matches() {
        let resolver = resolver(map(&[("api.example.com", &["api.read"])]));

        assert_eq!(
            resolver.resolve_scopes("https://api.example.com/v1/items", REDIRECT_URI),
            Some(vec!["api.read".to_string()])
        );
    }

    #[test]
    fn test_relative_endpoint_uses_client_id() {
        let resolver = resolver(ProtectedResourceMap::new());

        assert_eq!(
            resolver.resolve_scopes("/api/profile", REDIRECT_URI),
            Some(vec![CLIENT_ID.to_string()])
        );
    }

    #[test]
    fn test_foreign_host_is_unprotected() {
        let resolver = resolver(ProtectedResourceMap::new());

        assert_eq!(
            resolver.resolve_scopes("https://other.example.org/data", REDIRECT_URI),
            None
        );
        assert_eq!(
            resolver.resolve("https://other.example.org/data", REDIRECT_URI),
            ScopeResolution::Unprotected
        );
    }

    #[test]
    fn test_same_host_uses_client_id() {
        let resolver = resolver(ProtectedResourceMap::new());

        assert_eq!(
            resolver.resolve_scopes("https://app.example.com/api/x", REDIRECT_URI),
            Some(vec![CLIENT_ID.to_string()])
        );
    }

    #[test]
    fn test_port_is_part_of_host_comparison() {
        let resolver = resolver(ProtectedResourceMap::new());

        assert_eq!(
            resolver.resolve_scopes("https://app.example.com:8443/api", REDIRECT_URI),
            None
        );
        assert_eq!(
            resolver.resolve_scopes(
                "http://localhost:3000/api",
                "http://localhost:3000/callback"
            ),
            Some(vec![CLIENT_ID.to_string()])
        );
    }

    #[test]
    fn test_default_port_is_not_normalized() {
        let resolver = resolver(ProtectedResourceMap::new());

        assert_eq!(
            resolver.resolve_scopes("https://app.example.com:443/api", REDIRECT_URI),
            None
        );
    }

    #[test]
    fn test_embedded_scheme_makes_endpoint_absolute() {
        let resolver = resolver(ProtectedResourceMap::new());

        assert_eq!(
            resolver.resolve_scopes("/proxy?target=https://evil.example.org/x", REDIRECT_URI),
            None
        );
    }

    #[test]
    fn test_redirect_uri_without_scheme() {
        let resolver = resolver(ProtectedResourceMap::new());

        assert_eq!(
            resolver.resolve_scopes("https://app.example.com/api", "not a url"),
            None
        );
        assert_eq!(
            resolver.resolve_scopes("/api/profile", "not a url"),
            Some(vec![CLIENT_ID.to_string()])
        );
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://app.example.com/auth"), "app.example.com");
        assert_eq!(host_of("http://localhost:3000"), "localhost:3000");
        assert_eq!(host_of("/proxy?target=https://x"), "");
        assert_eq!(host_of("app.example.com/path"), "app.example.com");
    }

    #[test]
    fn test_wildcard_skips_leading_dot_segment() {
        let resolver = resolver(map(&[("https://api.example.com/*", &["a"])]));

        assert_eq!(
            resolver.resolve_scopes("https://api.example.com/.well-known", REDIRECT_URI),
            None
        );
        assert_eq!(
            resolver.resolve_scopes("https://api.example.com/items", REDIRECT_URI),
            Some(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_brace_alternatives_are_expanded() {
        let resolver = resolver(map(&[(
            "https://{graph,files}.example.com/*",
            &["user.read"],
        )]));

        assert_eq!(
            resolver.resolve_scopes("https://graph.example.com/me", REDIRECT_URI),
            Some(vec!["user.read".to_string()])
        );
        assert_eq!(
            resolver.resolve_scopes("https://files.example.com/drive", REDIRECT_URI),
            Some(vec!["user.read".to_string()])
        );
        assert_eq!(
            resolver.resolve_scopes("https://mail.example.com/inbox", REDIRECT_URI),
            None
        );
    }

    #[test]
    fn test_expand_braces() {
        assert_eq!(expand_braces("a{b,c{d,e}}f"), vec!["abf", "acdf", "acef"]);
        assert_eq!(expand_braces("{x,y}-{1,2}"), vec!["x-1", "x-2", "y-1", "y-2"]);
        assert_eq!(expand_braces("literal{a}"), vec!["literal{a}"]);
        assert_eq!(expand_braces("no-braces"), vec!["no-braces"]);
    }

    #[test]
    fn test_legacy_map_takes_precedence() {
        let current = map(&[("https://api.example.com/*", &["current.scope"])]);
        let legacy = map(&[("https://api.example.com/*", &["legacy.scope"])]);
        let store = ResourceMapStore::new(&current, Some(&legacy));
        assert_eq!(store.source(), ResourceMapSource::Legacy);

        let resolver = ProtectedResourceResolver::new(store, CLIENT_ID);
        assert_eq!(
            resolver.resolve_scopes("https://api.example.com/items", REDIRECT_URI),
            Some(vec!["legacy.scope".to_string()])
        );
    }

    #[test]
    fn test_empty_legacy_map_is_ignored() {
        let current = map(&[("https://api.example.com/*", &["current.scope"])]);
        let store = ResourceMapStore::new(&current, Some(&ProtectedResourceMap::new()));

        assert_eq!(store.source(), ResourceMapSource::Current);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_first_match_wins_when_ambiguous() {
        let resolver = resolver(map(&[
            ("https://api.example.com/*", &["first"]),
            ("api.example.com", &["second"]),
        ]));

        let resolution = resolver.resolve("https://api.example.com/items", REDIRECT_URI);
        assert_eq!(
            resolution,
            ScopeResolution::Mapped {
                pattern: "https://api.example.com/*".to_string(),
                scopes: vec!["first".to_string()],
                match_count: 2,
            }
        );
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let resolver = resolver(map(&[("", &["catch.all"])]));

        assert_eq!(
            resolver.resolve_scopes("https://anything.example.net/x", REDIRECT_URI),
            Some(vec!["catch.all".to_string()])
        );
        assert_eq!(
            resolver.resolve_scopes("/relative", REDIRECT_URI),
            Some(vec!["catch.all".to_string()])
        );
    }

    #[test]
    fn test_invalid_glob_still_matches_as_substring() {
        let resolver = resolver(map(&[("api.example.com/[v1", &["api.read"])]));
        assert!(resolver.store().entries[0].globs.is_empty());

        assert_eq!(
            resolver.resolve_scopes("https://api.example.com/[v1/items", REDIRECT_URI),
            Some(vec!["api.read".to_string()])
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = resolver(map(&[("https://graph.example.com/*", &["user.read"])]));

        let first = resolver.resolve_scopes("https://graph.example.com/me", REDIRECT_URI);
        let second = resolver.resolve_scopes("https://graph.example.com/me", REDIRECT_URI);
        assert_eq!(first, second);
    }
}
