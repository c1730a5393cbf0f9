//! Workspace placeholder crate.
//!
//! This crate exposes the `desktop-shims` feature that maps onto the individual
//! workspace crates. Host applications can depend on `person-album-sync` and get
//! the service façade plus the desktop bridges without wiring each crate.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
