//! Event handlers.
//!
//! Each handler is a plain async function over `(payload, config, capabilities)`
//! so it can run without a live container.

mod activate;
mod fetch;
mod install;
mod message;
mod push;
mod sync;

pub use activate::{handle_activate, ActivationReport};
pub use fetch::{handle_fetch, is_passthrough, offline_placeholder, FetchOutcome, FetchState};
pub use install::handle_install;
pub use message::{handle_message, MessageOutcome};
pub use push::{handle_push, resolve_push_message};
pub use sync::{handle_sync, SyncOutcome};
