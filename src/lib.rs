//! tabstore: the session store of a tabbed browser.
//!
//! Captures per-tab state, persists it with debounced atomic writes and
//! restores it after a restart or crash. This library crate exposes all
//! modules for use by the host bridge binary and integration tests.

pub mod clock;
pub mod engine;
pub mod logging;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
