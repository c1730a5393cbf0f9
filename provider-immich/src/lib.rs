//! # Immich Provider
//!
//! Implements the media bridge traits against the Immich REST API.
//!
//! ## Overview
//!
//! This crate provides:
//! - Person-filtered metadata search (`POST /api/search/metadata`)
//! - Bulk album membership updates (`PUT /api/albums/{id}/assets`)
//! - Wire types for both endpoints
//!
//! Authentication uses the `x-api-key` header; one connector is created per
//! configured API key.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::ImmichConnector;
pub use error::{ImmichError, Result};
