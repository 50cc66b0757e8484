//! Renomarket Core - Shared types library.
//!
//! This crate provides common types used across all Renomarket components:
//! - `client` - REST client and session services for the marketplace backend
//! - `cli` - Command-line front end built on the client
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for backend IDs, money, emails, and account kinds

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
