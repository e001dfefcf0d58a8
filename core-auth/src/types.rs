use std::fmt;

use bridge_traits::auth::{AuthResponse, EngineError};
use core_runtime::events::AuthFlow;

use crate::flow::FlowKind;

/// Engine operations wrapped by the correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthOperation {
    LoginInteractive,
    SsoSilent,
    AcquireTokenSilent,
    AcquireTokenPopup,
}

impl AuthOperation {
    /// Event pair published when the operation settles.
    pub fn flow(&self) -> AuthFlow {
        match self {
            AuthOperation::LoginInteractive => AuthFlow::Login,
            AuthOperation::SsoSilent => AuthFlow::Sso,
            AuthOperation::AcquireTokenSilent | AuthOperation::AcquireTokenPopup => {
                AuthFlow::AcquireToken
            }
        }
    }

    /// In-progress flag held while the operation is pending.
    ///
    /// Only operations that can open a popup are tracked; silent operations
    /// never touch the flags.
    pub fn tracked_flow(&self) -> Option<FlowKind> {
        match self {
            AuthOperation::LoginInteractive => Some(FlowKind::Login),
            AuthOperation::AcquireTokenPopup => Some(FlowKind::AcquireToken),
            AuthOperation::SsoSilent | AuthOperation::AcquireTokenSilent => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthOperation::LoginInteractive => "login_interactive",
            AuthOperation::SsoSilent => "sso_silent",
            AuthOperation::AcquireTokenSilent => "acquire_token_silent",
            AuthOperation::AcquireTokenPopup => "acquire_token_popup",
        }
    }
}

impl fmt::Display for AuthOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type CombinedCallback = Box<dyn Fn(Option<EngineError>, Option<AuthResponse>) + Send + Sync>;
pub type TokenCallback = Box<dyn Fn(AuthResponse) + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(EngineError, Option<String>) + Send + Sync>;

/// Application handler for the outcome of a redirect-based flow.
///
/// Exactly one handler shape is supplied per registration, so the two styles
/// can never both fire.
pub enum RedirectHandler {
    /// Receives `(error, response)` with whichever side is present.
    Combined(CombinedCallback),
    /// Separate success and failure handlers. The failure handler also receives
    /// the account state carried by the response, when there is one.
    Split {
        on_token: TokenCallback,
        on_error: ErrorCallback,
    },
}

impl RedirectHandler {
    pub fn combined<F>(callback: F) -> Self
    where
        F: Fn(Option<EngineError>, Option<AuthResponse>) + Send + Sync + 'static,
    {
        RedirectHandler::Combined(Box::new(callback))
    }

    pub fn split<T, E>(on_token: T, on_error: E) -> Self
    where
        T: Fn(AuthResponse) + Send + Sync + 'static,
        E: Fn(EngineError, Option<String>) + Send + Sync + 'static,
    {
        RedirectHandler::Split {
            on_token: Box::new(on_token),
            on_error: Box::new(on_error),
        }
    }

    /// Forwards an outcome to the application.
    ///
    /// An error takes precedence over a response. An outcome with neither is
    /// dropped.
    pub(crate) fn dispatch(&self, error: Option<EngineError>, response: Option<AuthResponse>) {
        match self {
            RedirectHandler::Combined(callback) => {
                if error.is_some() || response.is_some() {
                    callback(error, response);
                }
            }
            RedirectHandler::Split { on_token, on_error } => match (error, response) {
                (Some(error), response) => {
                    on_error(error, response.and_then(|r| r.account_state));
                }
                (None, Some(response)) => on_token(response),
                (None, None) => {}
            },
        }
    }
}

impl fmt::Debug for RedirectHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectHandler::Combined(_) => f.write_str("RedirectHandler::Combined"),
            RedirectHandler::Split { .. } => f.write_str("RedirectHandler::Split"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::auth::ID_TOKEN_TYPE;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_operation_flows() {
        assert_eq!(AuthOperation::LoginInteractive.flow(), AuthFlow::Login);
        assert_eq!(AuthOperation::SsoSilent.flow(), AuthFlow::Sso);
        assert_eq!(AuthOperation::AcquireTokenSilent.flow(), AuthFlow::AcquireToken);
        assert_eq!(AuthOperation::AcquireTokenPopup.flow(), AuthFlow::AcquireToken);
    }

    #[test]
    fn test_only_popup_capable_operations_are_tracked() {
        assert_eq!(
            AuthOperation::LoginInteractive.tracked_flow(),
            Some(FlowKind::Login)
        );
        assert_eq!(
            AuthOperation::AcquireTokenPopup.tracked_flow(),
            Some(FlowKind::AcquireToken)
        );
        assert_eq!(AuthOperation::SsoSilent.tracked_flow(), None);
        assert_eq!(AuthOperation::AcquireTokenSilent.tracked_flow(), None);
    }

    #[test]
    fn test_split_error_receives_account_state() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_error = seen.clone();
        let handler = RedirectHandler::split(
            |_| panic!("token handler must not run"),
            move |error, state| seen_error.lock().unwrap().push((error.code, state)),
        );

        let response = AuthResponse::new(ID_TOKEN_TYPE).with_account_state("s-1");
        handler.dispatch(
            Some(EngineError::new("interaction_required", "Sign in again")),
            Some(response),
        );

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[("interaction_required".to_string(), Some("s-1".to_string()))]
        );
    }

    #[test]
    fn test_combined_ignores_empty_outcome() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let handler = RedirectHandler::combined(move |_, _| *counter.lock().unwrap() += 1);

        handler.dispatch(None, None);
        assert_eq!(*calls.lock().unwrap(), 0);

        handler.dispatch(None, Some(AuthResponse::new(ID_TOKEN_TYPE)));
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
