//! # Auth Lifecycle Correlator
//!
//! Wraps the authentication engine and turns every outcome into exactly one
//! lifecycle event on the [`EventBus`].
//!
//! ## Outcome sources
//!
//! - **Wrapped operations**: interactive login, silent SSO, silent and popup
//!   token acquisition. Each settlement publishes one success or failure event
//!   and hands the engine's result back unchanged.
//! - **Redirect callback**: outcomes of redirect-based flows, classified by token
//!   type (success) or by whether an account is already signed in (failure).
//! - **Popup signals**: a popup closed by the user cancels whichever flow is in
//!   progress, login first.
//!
//! Failures are published before the caller observes the rejection.
//!
//! ## Usage
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .engine(engine)
//!     .client_id("abc-123")
//!     .protect_resource("https://graph.example.com/*", ["user.read"])
//!     .build()?;
//!
//! let correlator = AuthCorrelator::from_config(config)?;
//! let mut events = correlator.subscribe();
//!
//! let scopes = correlator.resolve_scopes("https://graph.example.com/me");
//! let token = correlator
//!     .acquire_token_silent(AuthRequest::with_scopes(scopes.unwrap_or_default()))
//!     .await;
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use bridge_traits::auth::{AuthEngine, AuthRequest, AuthResponse, EngineError, RedirectOutcome};
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, AuthFlow, EventBus, EventStream, Receiver};
use core_runtime::logging::redact_if_sensitive;

use crate::error::Result;
use crate::flow::{FlowKind, FlowTracker};
use crate::popup::{decode_popup_closed, PopupSignal, PopupSignalReceiver};
use crate::resource::ProtectedResourceResolver;
use crate::types::{AuthOperation, RedirectHandler};

type EngineResult = std::result::Result<AuthResponse, EngineError>;

/// Classifies a redirect outcome into the event it produces.
///
/// - An error is a token failure when an account is already signed in,
///   otherwise a login failure.
/// - A response carrying an id token is a login success; any other token type
///   is a token success.
/// - An outcome with neither yields `None`.
pub fn classify_redirect(outcome: &RedirectOutcome, has_account: bool) -> Option<AuthEvent> {
    if let Some(error) = &outcome.error {
        let flow = if has_account {
            AuthFlow::AcquireToken
        } else {
            AuthFlow::Login
        };
        return Some(flow.failure(error.clone()));
    }

    let response = outcome.response.as_ref()?;
    let flow = if response.is_id_token() {
        AuthFlow::Login
    } else {
        AuthFlow::AcquireToken
    };
    Some(flow.success(response.clone()))
}

/// Event publishing and flag bookkeeping shared with the redirect callback and
/// the popup listener.
#[derive(Debug, Clone)]
struct Lifecycle {
    event_bus: EventBus,
    flows: FlowTracker,
}

impl Lifecycle {
    fn publish(&self, event: AuthEvent) {
        let kind = event.kind();
        match self.event_bus.emit(event) {
            Ok(receivers) => debug!(event = %kind, receivers, "Published auth event"),
            Err(_) => debug!(event = %kind, "Published auth event with no subscribers"),
        }
    }

    fn on_redirect(&self, handler: &RedirectHandler, outcome: RedirectOutcome, has_account: bool) {
        let Some(event) = classify_redirect(&outcome, has_account) else {
            debug!("Redirect outcome has neither error nor response; ignoring");
            return;
        };

        let flow = event.flow();
        if event.is_failure() {
            info!(flow = %flow, "Redirect flow failed");
        } else {
            info!(flow = %flow, "Redirect flow succeeded");
        }
        self.publish(event);

        handler.dispatch(outcome.error, outcome.response);
    }

    fn on_popup_signal(&self, signal: PopupSignal) -> Option<FlowKind> {
        match signal {
            PopupSignal::Closed(detail) => self.on_popup_closed(&detail),
            PopupSignal::HashChanged => {
                debug!("Popup hash changed");
                None
            }
        }
    }

    fn on_popup_closed(&self, detail: &str) -> Option<FlowKind> {
        let error = decode_popup_closed(detail);

        let Some(kind) = self.flows.take_cancelled() else {
            debug!(code = %error.code, "Popup closed with no flow in progress");
            return None;
        };

        info!(flow = %kind, code = %error.code, "Popup closed while flow in progress");
        self.publish(AuthFlow::from(kind).failure(error));
        Some(kind)
    }
}

/// Login hint with the address redacted, for log output.
fn login_hint_for_log(request: &AuthRequest) -> Option<String> {
    request
        .login_hint
        .as_deref()
        .map(|hint| redact_if_sensitive("login_hint", hint))
}

fn log_failure(flow: AuthFlow, error: &EngineError, scopes: &[String]) {
    match flow {
        AuthFlow::Login | AuthFlow::Sso => {
            error!(code = %error.code, "Error during login:\n{}", error.message);
        }
        AuthFlow::AcquireToken => {
            error!(
                code = %error.code,
                "Error when acquiring token for scopes: {}\n{}",
                scopes.join(" "),
                error.message
            );
        }
    }
}

/// Auth lifecycle correlator.
///
/// Owns the engine handle, the protected resource resolver and the in-progress
/// flags. Cheap operations (`resolve_scopes`, flag queries) never touch the
/// engine beyond reading its redirect URI.
pub struct AuthCorrelator {
    engine: Arc<dyn AuthEngine>,
    resolver: ProtectedResourceResolver,
    lifecycle: Lifecycle,
}

impl AuthCorrelator {
    /// Creates a correlator publishing to `event_bus`.
    ///
    /// `config` is expected to come from [`CoreConfig::builder`], which has
    /// already validated it.
    pub fn new(config: CoreConfig, event_bus: EventBus) -> Self {
        Self::with_flow_tracker(config, event_bus, FlowTracker::new())
    }

    /// Like [`AuthCorrelator::new`], sharing an existing flag set.
    ///
    /// Lets an engine adapter mark flows it starts on its own.
    pub fn with_flow_tracker(config: CoreConfig, event_bus: EventBus, flows: FlowTracker) -> Self {
        let resolver = ProtectedResourceResolver::from_config(&config);

        info!(
            client_id = %config.client_id,
            resources = resolver.store().len(),
            "Auth correlator initialized"
        );

        Self {
            engine: config.engine,
            resolver,
            lifecycle: Lifecycle { event_bus, flows },
        }
    }

    /// Validates `config` and creates a correlator with its own event bus.
    pub fn from_config(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let event_bus = EventBus::new(config.event_buffer_size);
        Ok(Self::new(config, event_bus))
    }

    pub fn engine(&self) -> &Arc<dyn AuthEngine> {
        &self.engine
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.lifecycle.event_bus
    }

    pub fn subscribe(&self) -> Receiver<AuthEvent> {
        self.lifecycle.event_bus.subscribe()
    }

    pub fn events(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn flows(&self) -> &FlowTracker {
        &self.lifecycle.flows
    }

    pub fn resolver(&self) -> &ProtectedResourceResolver {
        &self.resolver
    }

    /// Scopes required for `endpoint`, or `None` when it is unprotected.
    ///
    /// Same-host comparison uses the engine's current redirect URI.
    pub fn resolve_scopes(&self, endpoint: &str) -> Option<Vec<String>> {
        self.resolver
            .resolve_scopes(endpoint, &self.engine.redirect_uri())
    }

    #[instrument(skip(self, request), fields(scopes = ?request.scopes))]
    pub async fn login_interactive(&self, request: AuthRequest) -> EngineResult {
        self.run(AuthOperation::LoginInteractive, request).await
    }

    #[instrument(skip(self, request), fields(scopes = ?request.scopes))]
    pub async fn sso_silent(&self, request: AuthRequest) -> EngineResult {
        self.run(AuthOperation::SsoSilent, request).await
    }

    #[instrument(skip(self, request), fields(scopes = ?request.scopes))]
    pub async fn acquire_token_silent(&self, request: AuthRequest) -> EngineResult {
        self.run(AuthOperation::AcquireTokenSilent, request).await
    }

    #[instrument(skip(self, request), fields(scopes = ?request.scopes))]
    pub async fn acquire_token_popup(&self, request: AuthRequest) -> EngineResult {
        self.run(AuthOperation::AcquireTokenPopup, request).await
    }

    async fn run(&self, operation: AuthOperation, request: AuthRequest) -> EngineResult {
        let tracked = operation.tracked_flow();
        if let Some(kind) = tracked {
            self.lifecycle.flows.set_in_progress(kind);
        }

        let scopes = request.scopes.clone();
        debug!(
            operation = %operation,
            login_hint = ?login_hint_for_log(&request),
            "Delegating to auth engine"
        );

        let result = match operation {
            AuthOperation::LoginInteractive => self.engine.login_interactive(request).await,
            AuthOperation::SsoSilent => self.engine.sso_silent(request).await,
            AuthOperation::AcquireTokenSilent => self.engine.acquire_token_silent(request).await,
            AuthOperation::AcquireTokenPopup => self.engine.acquire_token_popup(request).await,
        };

        if let Some(kind) = tracked {
            self.lifecycle.flows.clear(kind);
        }

        let flow = operation.flow();
        match result {
            Ok(response) => {
                info!(operation = %operation, "Auth operation succeeded");
                self.lifecycle.publish(flow.success(response.clone()));
                Ok(response)
            }
            Err(e) => {
                log_failure(flow, &e, &scopes);
                self.lifecycle.publish(flow.failure(e.clone()));
                Err(e)
            }
        }
    }

    /// Registers `handler` for redirect outcomes with the engine.
    ///
    /// Each outcome publishes its classified event before `handler` runs. The
    /// registration holds a weak engine handle, so it never keeps the engine
    /// alive; once the engine is gone, errors classify as login failures.
    pub fn handle_redirect_callback(&self, handler: RedirectHandler) {
        let lifecycle = self.lifecycle.clone();
        let engine: Weak<dyn AuthEngine> = Arc::downgrade(&self.engine);

        debug!(handler = ?handler, "Registering redirect callback");
        self.engine
            .register_redirect_callback(Box::new(move |outcome: RedirectOutcome| {
                let has_account = engine
                    .upgrade()
                    .map_or(false, |engine| engine.has_account());
                lifecycle.on_redirect(&handler, outcome, has_account);
            }));
    }

    /// Applies one popup signal. Returns the flow that was cancelled, if any.
    pub fn handle_popup_signal(&self, signal: PopupSignal) -> Option<FlowKind> {
        self.lifecycle.on_popup_signal(signal)
    }

    /// Applies a popup-closed detail of the form `<code>|<message>`.
    pub fn handle_popup_closed(&self, detail: &str) -> Option<FlowKind> {
        self.lifecycle.on_popup_closed(detail)
    }

    /// Spawns a task applying every signal from `signals` until the port is
    /// dropped. Must be called from within a tokio runtime.
    pub fn listen_popup_signals(&self, mut signals: PopupSignalReceiver) -> JoinHandle<()> {
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                lifecycle.on_popup_signal(signal);
            }
            debug!("Popup signal port closed");
        })
    }

    /// Removes cached tokens for `access_token` from the engine.
    pub fn clear_cache_for_scope(&self, access_token: &str) {
        self.engine.clear_cache_for_scope(access_token);
    }
}

impl fmt::Debug for AuthCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCorrelator")
            .field("engine", &"AuthEngine { ... }")
            .field("resolver", &self.resolver)
            .field("flows", &self.lifecycle.flows)
            .field("event_bus", &self.lifecycle.event_bus)
            .finish()
    }
}
