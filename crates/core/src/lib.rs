//! Shoper AI Search Core - Shared types library.
//!
//! This crate provides the domain types used by the Shoper AI Search
//! components:
//! - `server` - HTTP service (Shoper API proxy, search, admin API)
//! - `cli` - Command-line tools for migrations and reindexing
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Shop URLs, admin-menu links, and application settings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
