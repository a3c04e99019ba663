//! Customized unified error type.

use std::error;
use std::fmt;
use std::io;
use std::net;

/// Library-wide error type, carrying a descriptive message string.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RingChatError(pub String);

impl RingChatError {
    /// Constructs an error from anything printable.
    pub fn msg(m: impl ToString) -> Self {
        RingChatError(m.to_string())
    }
}

impl fmt::Display for RingChatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl error::Error for RingChatError {}

// helper for conversions from common error types
macro_rules! impl_from_error {
    ($error:ty) => {
        impl From<$error> for RingChatError {
            fn from(e: $error) -> Self {
                RingChatError(e.to_string())
            }
        }
    };
}

impl_from_error!(io::Error);
impl_from_error!(net::AddrParseError);
impl_from_error!(serde_json::Error);
impl_from_error!(toml::de::Error);
impl_from_error!(tokio::task::JoinError);

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RingChatError {
    fn from(e: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RingChatError(e.to_string())
    }
}

impl<T> From<tokio::sync::watch::error::SendError<T>> for RingChatError {
    fn from(e: tokio::sync::watch::error::SendError<T>) -> Self {
        RingChatError(e.to_string())
    }
}
