//! Helper utilities, functions, and macros.

#[macro_use]
mod print;

#[macro_use]
mod config;

mod error;
mod safeudp;

pub use error::RingChatError;
pub use print::{logger_init, set_me, ME};
pub use safeudp::udp_bind_reusable;
