//! In-progress flow tracking.
//!
//! Two independent flags record whether an interactive login or an interactive
//! token acquisition is currently waiting on the engine. They are consulted
//! when a popup is closed out of band, the only moment the core has no engine
//! settlement to classify.
//!
//! The flags are not mutually exclusive: a login and a token acquisition can
//! both be in progress. Cancellation resolves that with a fixed priority,
//! login first.
//!
//! Each flag is a plain boolean. Two overlapping flows of the same kind share
//! one flag, and the first to settle clears it for both.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use core_runtime::events::AuthFlow;

/// Kind of flow that can be interrupted by a popup closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    Login,
    AcquireToken,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Login => "login",
            FlowKind::AcquireToken => "acquire_token",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FlowKind> for AuthFlow {
    fn from(kind: FlowKind) -> Self {
        match kind {
            FlowKind::Login => AuthFlow::Login,
            FlowKind::AcquireToken => AuthFlow::AcquireToken,
        }
    }
}

#[derive(Debug, Default)]
struct FlowFlags {
    login: AtomicBool,
    acquire_token: AtomicBool,
}

impl FlowFlags {
    fn flag(&self, kind: FlowKind) -> &AtomicBool {
        match kind {
            FlowKind::Login => &self.login,
            FlowKind::AcquireToken => &self.acquire_token,
        }
    }
}

/// Shared handle to the in-progress flags.
///
/// Cloning yields another handle to the same flags, so the engine adapter, the
/// correlator and the popup listener all observe one state.
#[derive(Debug, Clone, Default)]
pub struct FlowTracker {
    flags: Arc<FlowFlags>,
}

impl FlowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a flow as waiting on the engine.
    pub fn set_in_progress(&self, kind: FlowKind) {
        self.flags.flag(kind).store(true, Ordering::SeqCst);
    }

    /// Clear a flow's flag. Clearing an idle flow is a no-op.
    pub fn clear(&self, kind: FlowKind) {
        self.flags.flag(kind).store(false, Ordering::SeqCst);
    }

    pub fn is_in_progress(&self, kind: FlowKind) -> bool {
        self.flags.flag(kind).load(Ordering::SeqCst)
    }

    pub fn login_in_progress(&self) -> bool {
        self.is_in_progress(FlowKind::Login)
    }

    pub fn acquire_token_in_progress(&self) -> bool {
        self.is_in_progress(FlowKind::AcquireToken)
    }

    /// Picks the flow a cancellation applies to and clears its flag.
    ///
    /// Login is checked before token acquisition; at most one flag is cleared.
    /// Returns `None` when nothing was in progress.
    pub fn take_cancelled(&self) -> Option<FlowKind> {
        [FlowKind::Login, FlowKind::AcquireToken]
            .into_iter()
            .find(|kind| self.flags.flag(*kind).swap(false, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_cleared() {
        let flows = FlowTracker::new();
        assert!(!flows.login_in_progress());
        assert!(!flows.acquire_token_in_progress());
    }

    #[test]
    fn test_flags_are_independent() {
        let flows = FlowTracker::new();
        flows.set_in_progress(FlowKind::AcquireToken);

        assert!(!flows.login_in_progress());
        assert!(flows.acquire_token_in_progress());

        flows.clear(FlowKind::Login);
        assert!(flows.acquire_token_in_progress());
    }

    #[test]
    fn test_clones_share_state() {
        let flows = FlowTracker::new();
        let other = flows.clone();

        other.set_in_progress(FlowKind::Login);
        assert!(flows.login_in_progress());

        flows.clear(FlowKind::Login);
        assert!(!other.login_in_progress());
    }

    #[test]
    fn test_take_cancelled_prefers_login() {
        let flows = FlowTracker::new();
        flows.set_in_progress(FlowKind::Login);
        flows.set_in_progress(FlowKind::AcquireToken);

        assert_eq!(flows.take_cancelled(), Some(FlowKind::Login));
        assert!(!flows.login_in_progress());
        assert!(flows.acquire_token_in_progress());

        assert_eq!(flows.take_cancelled(), Some(FlowKind::AcquireToken));
        assert!(!flows.acquire_token_in_progress());
    }

    #[test]
    fn test_take_cancelled_when_idle() {
        let flows = FlowTracker::new();
        assert_eq!(flows.take_cancelled(), None);
    }

    #[test]
    fn test_flow_kind_maps_to_event_pair() {
        assert_eq!(AuthFlow::from(FlowKind::Login), AuthFlow::Login);
        assert_eq!(AuthFlow::from(FlowKind::AcquireToken), AuthFlow::AcquireToken);
    }
}
