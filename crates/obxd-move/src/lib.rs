//! # obxd-move
//!
//! Move host integration for the OB-Xd control bridge.
//!
//! The Move host loads a shared library, calls `move_plugin_init_v2` with its
//! service table and receives a `plugin_api_v2` function table back. This
//! crate provides that table for any [`Descriptor`], forwards `log` records
//! to the host's log callback and keeps panics from crossing the C ABI.
//!
//! ```rust,ignore
//! obxd_move::export_move_plugin!(ObxdMove);
//! ```

pub mod bridge;
mod export;
pub mod host;
pub mod logger;

pub use bridge::{Descriptor, InstanceHandle};
pub use host::{HostApiV1, PluginApiV2};

// Re-export the core crate for descriptor implementations.
pub use obxd_core;
