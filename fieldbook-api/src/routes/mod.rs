/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, login, refresh, logout)
/// - `fields`: Field browsing and admin management
/// - `bookings`: Booking creation, listing, and cancellation
/// - `payments`: Checkout, webhook reconciliation, and payment listing

pub mod health;
pub mod auth;
pub mod bookings;
pub mod fields;
pub mod payments;
