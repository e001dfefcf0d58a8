//! # Host Bridge Traits
//!
//! Capability traits that the host application implements for the core.
//!
//! ## Overview
//!
//! This crate defines the contract between the auth lifecycle core and the
//! host environment. Each trait represents a capability the core requires but
//! does not own:
//!
//! - [`AuthEngine`](auth::AuthEngine) - the external authentication client
//!   (login, SSO, token acquisition, redirect delivery, session state)
//! - [`LoggerSink`](logging::LoggerSink) - forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core refuses to start without an engine:
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .client_id("abc-123")
//!     .build()?; // Error::CapabilityMissing { capability: "AuthEngine", .. }
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.

pub mod auth;
pub mod error;
pub mod logging;

pub use error::BridgeError;

// Re-export commonly used types
pub use auth::{
    Account, AuthEngine, AuthRequest, AuthResponse, EngineError, RedirectCallback,
    RedirectOutcome, ACCESS_TOKEN_TYPE, ID_TOKEN_TYPE,
};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
