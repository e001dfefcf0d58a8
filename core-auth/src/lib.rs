//! # Authentication Module
//!
//! Auth lifecycle core sitting between an application and an external
//! authentication engine.
//!
//! ## Overview
//!
//! The engine owns tokens, accounts and the protocol itself. This crate adds
//! two things on top of it:
//!
//! - **Protected resource resolution**: which scopes an outgoing endpoint needs,
//!   if any ([`ProtectedResourceResolver`]).
//! - **Lifecycle correlation**: every engine outcome, whether from a wrapped
//!   call, a redirect round trip or a closed popup, becomes exactly one event
//!   on the event bus ([`AuthCorrelator`]).
//!
//! ## Features
//!
//! - Glob and substring matching of endpoints against an ordered resource map
//! - Same-host fallback to the application's own client id
//! - Redirect outcome classification with combined or split handlers
//! - Popup cancellation driven by in-progress flow flags

pub mod correlator;
pub mod error;
pub mod flow;
pub mod popup;
pub mod resource;
pub mod types;

pub use correlator::{classify_redirect, AuthCorrelator};
pub use error::{AuthError, Result};
pub use flow::{FlowKind, FlowTracker};
pub use popup::{
    decode_popup_closed, popup_signal_channel, PopupSignal, PopupSignalPort, PopupSignalReceiver,
};
pub use resource::{
    ProtectedResourceResolver, ResourceMapSource, ResourceMapStore, ScopeResolution,
};
pub use types::{AuthOperation, RedirectHandler};
