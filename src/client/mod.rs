//! Chat client protocol core. The presentation shell lives in the client
//! executable; this module owns discovery, session, and message exchange.

mod endpoint;

pub use endpoint::{ChatClientStub, ClientConfig, ClientEvent};
