//! Logging initializer and prefixed printing macros.

use std::sync::RwLock;

use lazy_static::lazy_static;

lazy_static! {
    /// Short identity string of this process, prepended to every log line.
    /// Set once during node/stub setup.
    pub static ref ME: RwLock<String> = RwLock::new("-".into());
}

/// Sets the identity string shown in log lines.
pub fn set_me(me: impl ToString) {
    if let Ok(mut guard) = ME.write() {
        *guard = me.to_string();
    }
}

/// Initializes the global logger with `env_logger`, filter level taken from
/// the `RUST_LOG` environment variable (defaulting to `info`).
pub fn logger_init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .try_init();
}

/// Log TRACE message with identity prefix.
#[macro_export]
macro_rules! pf_trace {
    ($($fmt:tt)*) => {
        log::trace!(
            "({}) {}",
            $crate::ME.read().map(|me| me.clone()).unwrap_or_default(),
            format_args!($($fmt)*)
        )
    };
}

/// Log DEBUG message with identity prefix.
#[macro_export]
macro_rules! pf_debug {
    ($($fmt:tt)*) => {
        log::debug!(
            "({}) {}",
            $crate::ME.read().map(|me| me.clone()).unwrap_or_default(),
            format_args!($($fmt)*)
        )
    };
}

/// Log INFO message with identity prefix.
#[macro_export]
macro_rules! pf_info {
    ($($fmt:tt)*) => {
        log::info!(
            "({}) {}",
            $crate::ME.read().map(|me| me.clone()).unwrap_or_default(),
            format_args!($($fmt)*)
        )
    };
}

/// Log WARN message with identity prefix.
#[macro_export]
macro_rules! pf_warn {
    ($($fmt:tt)*) => {
        log::warn!(
            "({}) {}",
            $crate::ME.read().map(|me| me.clone()).unwrap_or_default(),
            format_args!($($fmt)*)
        )
    };
}

/// Log ERROR message with identity prefix.
#[macro_export]
macro_rules! pf_error {
    ($($fmt:tt)*) => {
        log::error!(
            "({}) {}",
            $crate::ME.read().map(|me| me.clone()).unwrap_or_default(),
            format_args!($($fmt)*)
        )
    };
}

/// Log an error message, then make a `RingChatError` out of it wrapped in
/// `Err` for easy returning.
#[macro_export]
macro_rules! logged_err {
    ($($fmt:tt)*) => {{
        $crate::pf_error!($($fmt)*);
        Err($crate::RingChatError::msg(format!($($fmt)*)))
    }};
}
