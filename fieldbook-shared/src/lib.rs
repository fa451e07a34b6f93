//! # FieldBook Shared Library
//!
//! This crate contains shared types, utilities, and business logic used by
//! the FieldBook API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and state machines (users, fields, bookings, payments)
//! - `auth`: Token signing, password hashing, and the revocable session store
//! - `gateway`: Payment gateway abstraction (Stripe-backed and mock implementations)
//! - `db`: PostgreSQL pool and migration runner
//! - `redis`: Redis client for refresh tokens and the access-token blacklist

pub mod auth;
pub mod db;
pub mod gateway;
pub mod models;
pub mod redis;

/// Current version of the FieldBook shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
