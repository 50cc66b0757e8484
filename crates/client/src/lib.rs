//! Renomarket marketplace client.
//!
//! Typed access to the Renomarket REST backend plus the session services a
//! front end is built on:
//!
//! - [`api`]: REST client with transparent, single-flight token refresh
//! - [`services`]: authentication, cart and messaging sessions
//! - [`catalog`]: catalog reads with an offline fixture fallback
//! - [`guard`]: which routes need a session
//! - [`Marketplace`]: all of the above wired together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod services;
pub mod state;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use state::Marketplace;
