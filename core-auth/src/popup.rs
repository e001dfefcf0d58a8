//! Popup window signals.
//!
//! The host reports popup window events through a [`PopupSignalPort`]. A closed
//! popup carries a detail string encoded as `<code>|<message>`.

use tokio::sync::mpsc;

use bridge_traits::auth::EngineError;

use crate::error::{AuthError, Result};

/// Event raised by the host's popup window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupSignal {
    /// Popup closed before the flow completed. Holds the encoded detail.
    Closed(String),
    /// Popup location hash changed. Informational only.
    HashChanged,
}

impl PopupSignal {
    pub fn closed(detail: impl Into<String>) -> Self {
        PopupSignal::Closed(detail.into())
    }
}

/// Decodes a popup-closed detail of the form `<code>|<message>`.
///
/// A detail without a separator yields an empty message. Only the first two
/// segments are used.
pub fn decode_popup_closed(detail: &str) -> EngineError {
    let mut parts = detail.split('|');
    let code = parts.next().unwrap_or_default();
    let message = parts.next().unwrap_or_default();
    EngineError::new(code, message)
}

pub type PopupSignalReceiver = mpsc::UnboundedReceiver<PopupSignal>;

/// Sending half of the popup signal channel, handed to the host.
#[derive(Debug, Clone)]
pub struct PopupSignalPort {
    sender: mpsc::UnboundedSender<PopupSignal>,
}

impl PopupSignalPort {
    pub fn send(&self, signal: PopupSignal) -> Result<()> {
        self.sender
            .send(signal)
            .map_err(|_| AuthError::SignalPortClosed)
    }

    pub fn notify_closed(&self, detail: impl Into<String>) -> Result<()> {
        self.send(PopupSignal::closed(detail))
    }

    pub fn notify_hash_changed(&self) -> Result<()> {
        self.send(PopupSignal::HashChanged)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Creates a connected port and receiver.
pub fn popup_signal_channel() -> (PopupSignalPort, PopupSignalReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (PopupSignalPort { sender }, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_code_and_message() {
        let error = decode_popup_closed("user_cancelled|User cancelled the flow");
        assert_eq!(error.code, "user_cancelled");
        assert_eq!(error.message, "User cancelled the flow");
    }

    #[test]
    fn test_decode_without_separator() {
        let error = decode_popup_closed("popup_closed");
        assert_eq!(error.code, "popup_closed");
        assert_eq!(error.message, "");
    }

    #[test]
    fn test_decode_ignores_extra_segments() {
        let error = decode_popup_closed("a|b|c");
        assert_eq!(error.code, "a");
        assert_eq!(error.message, "b");
    }

    #[tokio::test]
    async fn test_port_delivers_in_order() {
        let (port, mut receiver) = popup_signal_channel();

        port.notify_hash_changed().unwrap();
        port.notify_closed("user_cancelled|x").unwrap();

        assert_eq!(receiver.recv().await, Some(PopupSignal::HashChanged));
        assert_eq!(
            receiver.recv().await,
            Some(PopupSignal::Closed("user_cancelled|x".to_string()))
        );
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (port, receiver) = popup_signal_channel();
        drop(receiver);

        assert!(port.is_closed());
        assert!(matches!(
            port.notify_closed("x|y"),
            Err(AuthError::SignalPortClosed)
        ));
    }
}
