//! Core types for Renomarket.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod account;
pub mod email;
pub mod id;
pub mod price;

pub use account::{AccountKindError, UserType};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::Money;
