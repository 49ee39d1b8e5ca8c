// tabstore shared type definitions
// Each submodule defines types used across the session store.

pub mod errors;
pub mod events;
pub mod restore;
pub mod session;
pub mod settings;
pub mod tab;
