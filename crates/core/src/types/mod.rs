//! Core types for Shoper AI Search.
//!
//! This module provides type-safe wrappers for the app's domain concepts.

pub mod link;
pub mod settings;
pub mod shop;

pub use link::{AdminLink, AdminLinkUpdate, LinkId, LinkValidationError, NewAdminLink, OpenType};
pub use settings::{AdminSettings, SettingsPatch, SettingsValidationError, SUPPORTED_MODELS};
pub use shop::{ShopUrl, ShopUrlError};
