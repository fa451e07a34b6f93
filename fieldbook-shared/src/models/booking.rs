/// Booking model, interval conflict checking, and the booking state machine
///
/// A booking reserves one field for a half-open time interval
/// `[start_time, end_time)`. Two intervals conflict iff
/// `s1 < e2 AND s2 < e1`; touching endpoints do not conflict.
///
/// # State Machine
///
/// ```text
/// pending → confirmed    (reconciled succeeded payment, idempotent)
/// pending → cancelled    (owner cancellation)
/// confirmed → cancelled  (owner cancellation, refund-gated)
/// ```
///
/// `cancelled` is terminal.
///
/// # Conflict safety
///
/// Creation runs check-then-insert inside one transaction that first takes a
/// per-field advisory lock, so concurrent overlapping requests for the same
/// field serialize and exactly one wins. The `booking_no_overlap` exclusion
/// constraint in the schema backs this up at the storage layer; a violation
/// surfaces as `BookingError::SlotTaken` rather than a database error.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE booking_status AS ENUM ('pending', 'confirmed', 'cancelled');
///
/// CREATE TABLE bookings (
///     id UUID PRIMARY KEY,
///     field_id UUID NOT NULL REFERENCES fields(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     start_time TIMESTAMPTZ NOT NULL,
///     end_time TIMESTAMPTZ NOT NULL,
///     status booking_status NOT NULL DEFAULT 'pending',
///     notes TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT booking_interval_valid CHECK (start_time < end_time),
///     CONSTRAINT booking_no_overlap EXCLUDE USING gist (
///         field_id WITH =,
///         tstzrange(start_time, end_time) WITH &&
///     ) WHERE (status <> 'cancelled')
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Booking errors
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// start_time is not strictly before end_time
    #[error("Invalid interval: start must be before end")]
    InvalidInterval,

    /// start_time is in the past
    #[error("Booking start must not be in the past")]
    StartInPast,

    /// Referenced field does not exist
    #[error("Field not found")]
    FieldNotFound,

    /// The interval overlaps an existing non-cancelled booking
    #[error("Field is already booked for this time slot")]
    SlotTaken,

    /// Cancellation of an already-cancelled booking
    #[error("Booking already cancelled")]
    AlreadyCancelled,

    /// Underlying database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Booking state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Created, awaiting payment
    Pending,

    /// Payment succeeded
    Confirmed,

    /// Cancelled by the owner (terminal)
    Cancelled,
}

impl BookingStatus {
    /// Gets status as string (matches the database enum labels)
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Checks if the state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled)
    }

    /// Checks if transition to target state is valid
    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        match (self, target) {
            (BookingStatus::Pending, BookingStatus::Confirmed) => true,
            (BookingStatus::Pending, BookingStatus::Cancelled) => true,
            (BookingStatus::Confirmed, BookingStatus::Cancelled) => true,
            _ => false,
        }
    }
}

/// Booking model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    /// Unique booking ID
    pub id: Uuid,

    /// Reserved field
    pub field_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Interval start (inclusive)
    pub start_time: DateTime<Utc>,

    /// Interval end (exclusive)
    pub end_time: DateTime<Utc>,

    /// Current state
    pub status: BookingStatus,

    /// Optional freeform notes
    pub notes: Option<String>,

    /// When the booking was created
    pub created_at: DateTime<Utc>,

    /// When the booking was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a booking
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub field_id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Half-open interval overlap: `[s1, e1)` conflicts with `[s2, e2)` iff
/// `s1 < e2 AND s2 < e1`. Touching endpoints do not conflict.
pub fn intervals_overlap(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

/// Validates a requested interval against creation policy
///
/// The interval must be non-empty and must not start before `now`.
pub fn validate_interval(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), BookingError> {
    if start >= end {
        return Err(BookingError::InvalidInterval);
    }
    if start < now {
        return Err(BookingError::StartInPast);
    }
    Ok(())
}

impl Booking {
    /// Creates a booking after checking for interval conflicts
    ///
    /// Check and insert execute inside a single transaction that first takes
    /// `pg_advisory_xact_lock` keyed on the field ID, serializing creation
    /// per field. Under concurrent overlapping requests exactly one caller
    /// succeeds; the rest get [`BookingError::SlotTaken`].
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidInterval`] / [`BookingError::StartInPast`]
    ///   for out-of-policy intervals (checked before touching the store)
    /// - [`BookingError::FieldNotFound`] if the field does not exist
    /// - [`BookingError::SlotTaken`] if the interval overlaps a
    ///   non-cancelled booking on the same field
    pub async fn create_checked(pool: &PgPool, data: CreateBooking) -> Result<Self, BookingError> {
        validate_interval(data.start_time, data.end_time, Utc::now())?;

        let mut tx = pool.begin().await?;

        // Serialize check-then-insert per field. Released at commit/rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(data.field_id)
            .execute(&mut *tx)
            .await?;

        let field_exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM fields WHERE id = $1)")
                .bind(data.field_id)
                .fetch_one(&mut *tx)
                .await?;
        if !field_exists.0 {
            return Err(BookingError::FieldNotFound);
        }

        let (conflict,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM bookings
                WHERE field_id = $1
                  AND status <> 'cancelled'
                  AND start_time < $3
                  AND end_time > $2
            )
            "#,
        )
        .bind(data.field_id)
        .bind(data.start_time)
        .bind(data.end_time)
        .fetch_one(&mut *tx)
        .await?;
        if conflict {
            return Err(BookingError::SlotTaken);
        }

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (id, field_id, user_id, start_time, end_time, status, notes)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING id, field_id, user_id, start_time, end_time, status, notes,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.field_id)
        .bind(data.user_id)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(data.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_overlap_violation)?;

        tx.commit().await?;

        Ok(booking)
    }

    /// Finds a booking by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, field_id, user_id, start_time, end_time, status, notes,
                   created_at, updated_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a booking by ID, restricted to its owner
    pub async fn find_by_id_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, field_id, user_id, start_time, end_time, status, notes,
                   created_at, updated_at
            FROM bookings
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists all bookings, newest first (admin view)
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, field_id, user_id, start_time, end_time, status, notes,
                   created_at, updated_at
            FROM bookings
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Lists bookings owned by a user, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, field_id, user_id, start_time, end_time, status, notes,
                   created_at, updated_at
            FROM bookings
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Cancels a booking with no refund involvement
    ///
    /// Used when no payment ever succeeded. Refuses to touch rows already
    /// cancelled; the refund-aware path lives in the cancellation handler.
    pub async fn cancel(pool: &PgPool, id: Uuid) -> Result<(), BookingError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BookingError::AlreadyCancelled);
        }
        Ok(())
    }
}

/// Maps an exclusion-constraint violation from the insert backstop to
/// `SlotTaken`; everything else passes through.
fn map_overlap_violation(err: sqlx::Error) -> BookingError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.constraint() == Some("booking_no_overlap") {
            return BookingError::SlotTaken;
        }
    }
    BookingError::Database(err)
}
