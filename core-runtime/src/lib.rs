//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the sync crates:
//! - Logging and tracing setup
//! - Configuration loading and validation
//! - Event bus for sync progress
//!
//! ## Overview
//!
//! Nothing in here talks to the photo service. The configuration types describe
//! what to sync, the logging module decides how it is reported, and the event bus
//! lets a host observe rule progress without parsing logs.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
