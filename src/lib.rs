//! Workspace facade crate.
//!
//! Re-exports the individual workspace crates so host applications can depend
//! on `authflow` alone instead of wiring each crate individually.

pub use bridge_traits;
pub use core_auth;
pub use core_runtime;

pub mod prelude {
    pub use bridge_traits::auth::{
        Account, AuthEngine, AuthRequest, AuthResponse, EngineError, RedirectCallback,
        RedirectOutcome,
    };
    pub use core_auth::{
        popup_signal_channel, AuthCorrelator, FlowKind, PopupSignal, PopupSignalPort,
        RedirectHandler,
    };
    pub use core_runtime::config::{CoreConfig, ProtectedResourceMap};
    pub use core_runtime::events::{AuthEvent, AuthEventKind, AuthFlow, EventBus};
    pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
}
