// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling `[watch]` include/exclude glob patterns.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - (Optionally) content hashing to avoid triggering runs when watched
//!   files haven't actually changed.
//!
//! It does **not** know about filtering or scheduling; it only turns
//! filesystem changes into engine events (run requests and inventory
//! reloads).

pub mod hash;
pub mod patterns;
pub mod watcher;

pub use hash::{compute_file_hash, ChangeHashCache};
pub use patterns::WatchProfile;
pub use watcher::{spawn_watcher, WatcherHandle};
