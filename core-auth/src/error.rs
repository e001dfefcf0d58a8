use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    #[error("Popup signal listener is no longer running")]
    SignalPortClosed,
}

pub type Result<T> = std::result::Result<T, AuthError>;
