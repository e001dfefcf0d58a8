//! # Event Bus System
//!
//! Notification channel for auth lifecycle events, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: [`AuthEvent`], one variant per classified outcome
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐    emit     ┌───────────┐   subscribe   ┌────────────┐
//! │ Auth correlator  ├────────────>│ EventBus  ├──────────────>│ Subscriber │
//! └──────────────────┘             │ (broadcast│               └────────────┘
//! ┌──────────────────┐    emit     │  channel) │   subscribe   ┌────────────┐
//! │ Popup signal port├────────────>│           ├──────────────>│ Subscriber │
//! └──────────────────┘             └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use bridge_traits::auth::{AuthResponse, ID_TOKEN_TYPE};
//! use core_runtime::events::{AuthEvent, AuthEventKind, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(AuthEvent::LoginSuccess(AuthResponse::new(ID_TOKEN_TYPE)))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.kind(), AuthEventKind::LoginSuccess);
//! assert_eq!(event.kind().name(), "msal:loginSuccess");
//! # }
//! ```
//!
//! ## Event Types
//!
//! | Kind                  | Broadcast name             | Payload          |
//! |-----------------------|----------------------------|------------------|
//! | `LoginSuccess`        | `msal:loginSuccess`        | `AuthResponse`   |
//! | `LoginFailure`        | `msal:loginFailure`        | `EngineError`    |
//! | `SsoSuccess`          | `msal:ssoSuccess`          | `AuthResponse`   |
//! | `SsoFailure`          | `msal:ssoFailure`          | `EngineError`    |
//! | `AcquireTokenSuccess` | `msal:acquireTokenSuccess` | `AuthResponse`   |
//! | `AcquireTokenFailure` | `msal:acquireTokenFailure` | `EngineError`    |
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishing never blocks. Publishing with no subscribers returns an error the
//! publisher is free to ignore (fire-and-forget).

use bridge_traits::auth::{AuthResponse, EngineError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Auth Events
// ============================================================================

/// A classified authentication outcome.
///
/// Serializes as `{ "type": "msal:loginSuccess", "payload": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum AuthEvent {
    /// Login completed (interactive login or an `id_token` redirect result)
    #[serde(rename = "msal:loginSuccess")]
    LoginSuccess(AuthResponse),
    /// Login failed or was cancelled
    #[serde(rename = "msal:loginFailure")]
    LoginFailure(EngineError),
    /// Silent SSO completed
    #[serde(rename = "msal:ssoSuccess")]
    SsoSuccess(AuthResponse),
    /// Silent SSO failed
    #[serde(rename = "msal:ssoFailure")]
    SsoFailure(EngineError),
    /// Access token acquired
    #[serde(rename = "msal:acquireTokenSuccess")]
    AcquireTokenSuccess(AuthResponse),
    /// Access token acquisition failed or was cancelled
    #[serde(rename = "msal:acquireTokenFailure")]
    AcquireTokenFailure(EngineError),
}

impl AuthEvent {
    /// Returns the kind discriminator of this event.
    pub fn kind(&self) -> AuthEventKind {
        match self {
            AuthEvent::LoginSuccess(_) => AuthEventKind::LoginSuccess,
            AuthEvent::LoginFailure(_) => AuthEventKind::LoginFailure,
            AuthEvent::SsoSuccess(_) => AuthEventKind::SsoSuccess,
            AuthEvent::SsoFailure(_) => AuthEventKind::SsoFailure,
            AuthEvent::AcquireTokenSuccess(_) => AuthEventKind::AcquireTokenSuccess,
            AuthEvent::AcquireTokenFailure(_) => AuthEventKind::AcquireTokenFailure,
        }
    }

    /// Returns the flow this event belongs to.
    pub fn flow(&self) -> AuthFlow {
        self.kind().flow()
    }

    /// Response payload of a success event.
    pub fn response(&self) -> Option<&AuthResponse> {
        match self {
            AuthEvent::LoginSuccess(r)
            | AuthEvent::SsoSuccess(r)
            | AuthEvent::AcquireTokenSuccess(r) => Some(r),
            _ => None,
        }
    }

    /// Error payload of a failure event.
    pub fn error(&self) -> Option<&EngineError> {
        match self {
            AuthEvent::LoginFailure(e)
            | AuthEvent::SsoFailure(e)
            | AuthEvent::AcquireTokenFailure(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` for the three failure variants.
    pub fn is_failure(&self) -> bool {
        self.error().is_some()
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            AuthEvent::LoginSuccess(_) => "Login succeeded",
            AuthEvent::LoginFailure(_) => "Login failed",
            AuthEvent::SsoSuccess(_) => "Silent SSO succeeded",
            AuthEvent::SsoFailure(_) => "Silent SSO failed",
            AuthEvent::AcquireTokenSuccess(_) => "Token acquired",
            AuthEvent::AcquireTokenFailure(_) => "Token acquisition failed",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        if self.is_failure() {
            EventSeverity::Error
        } else {
            EventSeverity::Info
        }
    }
}

/// Kind discriminator of an [`AuthEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthEventKind {
    LoginSuccess,
    LoginFailure,
    SsoSuccess,
    SsoFailure,
    AcquireTokenSuccess,
    AcquireTokenFailure,
}

impl AuthEventKind {
    /// Broadcast name used by browser hosts.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEventKind::LoginSuccess => "msal:loginSuccess",
            AuthEventKind::LoginFailure => "msal:loginFailure",
            AuthEventKind::SsoSuccess => "msal:ssoSuccess",
            AuthEventKind::SsoFailure => "msal:ssoFailure",
            AuthEventKind::AcquireTokenSuccess => "msal:acquireTokenSuccess",
            AuthEventKind::AcquireTokenFailure => "msal:acquireTokenFailure",
        }
    }

    /// Flow the kind belongs to.
    pub fn flow(&self) -> AuthFlow {
        match self {
            AuthEventKind::LoginSuccess | AuthEventKind::LoginFailure => AuthFlow::Login,
            AuthEventKind::SsoSuccess | AuthEventKind::SsoFailure => AuthFlow::Sso,
            AuthEventKind::AcquireTokenSuccess | AuthEventKind::AcquireTokenFailure => {
                AuthFlow::AcquireToken
            }
        }
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Success/failure event pair of one kind of auth operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthFlow {
    /// `LoginSuccess` / `LoginFailure`
    Login,
    /// `SsoSuccess` / `SsoFailure`
    Sso,
    /// `AcquireTokenSuccess` / `AcquireTokenFailure`
    AcquireToken,
}

impl AuthFlow {
    /// Builds the success event of this pair.
    pub fn success(self, response: AuthResponse) -> AuthEvent {
        match self {
            AuthFlow::Login => AuthEvent::LoginSuccess(response),
            AuthFlow::Sso => AuthEvent::SsoSuccess(response),
            AuthFlow::AcquireToken => AuthEvent::AcquireTokenSuccess(response),
        }
    }

    /// Builds the failure event of this pair.
    pub fn failure(self, error: EngineError) -> AuthEvent {
        match self {
            AuthFlow::Login => AuthEvent::LoginFailure(error),
            AuthFlow::Sso => AuthEvent::SsoFailure(error),
            AuthFlow::AcquireToken => AuthEvent::AcquireTokenFailure(error),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFlow::Login => "login",
            AuthFlow::Sso => "sso",
            AuthFlow::AcquireToken => "acquire_token",
        }
    }
}

impl fmt::Display for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to auth events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking, order-preserving sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AuthEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 (see `tokio::sync::broadcast::channel`);
    /// `CoreConfig` rejects a zero buffer size before it gets here.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: AuthEvent) -> Result<usize, SendError<AuthEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use core_runtime::events::EventBus;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let event_bus = EventBus::new(100);
    /// let mut subscriber = event_bus.subscribe();
    ///
    /// tokio::spawn(async move {
    ///     while let Ok(event) = subscriber.recv().await {
    ///         println!("{}: {:?}", event.kind(), event);
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&AuthEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{AuthFlow, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let login_events = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.flow() == AuthFlow::Login);
/// ```
pub struct EventStream {
    receiver: Receiver<AuthEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<AuthEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AuthEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &AuthEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<AuthEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<AuthEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
