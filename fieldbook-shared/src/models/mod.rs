/// Database models
///
/// This module contains all persisted entities and their database operations:
///
/// - `user`: User accounts with roles
/// - `field`: Bookable fields (the physical resource)
/// - `booking`: Reservations with the pending/confirmed/cancelled state machine
/// - `payment`: Payment attempts tied to bookings

pub mod booking;
pub mod field;
pub mod payment;
pub mod user;

pub use booking::{Booking, BookingError, BookingStatus, CreateBooking};
pub use field::{CreateField, Field, FieldFilter, UpdateField};
pub use payment::{CreatePayment, Payment, PaymentStatus};
pub use user::{CreateUser, User, UserRole};
