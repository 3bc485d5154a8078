//! Background services.

pub mod token_refresh;

pub use token_refresh::{refresh_once, restore_token, spawn_token_refresh};
