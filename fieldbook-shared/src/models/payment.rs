/// Payment model and reconciliation updates
///
/// A payment records one attempt to pay for a booking. Several payments may
/// exist per booking over time (retries), but at most one may be active
/// (`pending` or `succeeded`) at once. Payments are never deleted.
///
/// Amounts are integer minor currency units throughout; the gateway boundary
/// uses the same convention.
///
/// # State Machine
///
/// ```text
/// pending → succeeded   (gateway completion event)
/// pending → failed      (gateway expiry/failure event)
/// succeeded → refunded  (cancellation coordinator, after gateway refund)
/// ```
///
/// Reconciliation updates are conditional on the current state so that
/// replayed gateway notifications are no-ops rather than errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Checkout session opened, awaiting the gateway
    Pending,

    /// Gateway reported completion
    Succeeded,

    /// Gateway reported expiry or failure
    Failed,

    /// Refunded during cancellation
    Refunded,
}

impl PaymentStatus {
    /// Gets status as string (matches the database enum labels)
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// An active payment blocks further checkout attempts for its booking
    pub fn is_active(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Succeeded)
    }

    /// Checks if transition to target state is valid
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        match (self, target) {
            (PaymentStatus::Pending, PaymentStatus::Succeeded) => true,
            (PaymentStatus::Pending, PaymentStatus::Failed) => true,
            (PaymentStatus::Succeeded, PaymentStatus::Refunded) => true,
            _ => false,
        }
    }
}

/// Payment model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    /// Unique payment ID
    pub id: Uuid,

    /// Booking this payment is for
    pub booking_id: Uuid,

    /// Amount in minor currency units
    pub amount_minor: i64,

    /// ISO currency code (lowercase, e.g. "usd")
    pub currency: String,

    /// Gateway session/intent identifier, used for reconciliation and refunds
    pub external_ref: String,

    /// Current state
    pub status: PaymentStatus,

    /// When the payment was created
    pub created_at: DateTime<Utc>,

    /// When the payment was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a payment record
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub booking_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub external_ref: String,
}

impl Payment {
    /// Records a new `pending` payment keyed by the gateway session reference
    pub async fn create(pool: &PgPool, data: CreatePayment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (id, booking_id, amount_minor, currency, external_ref, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id, booking_id, amount_minor, currency, external_ref, status,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.booking_id)
        .bind(data.amount_minor)
        .bind(data.currency)
        .bind(data.external_ref)
        .fetch_one(pool)
        .await
    }

    /// Finds a payment by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, booking_id, amount_minor, currency, external_ref, status,
                   created_at, updated_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a payment by its gateway reference
    pub async fn find_by_external_ref(
        pool: &PgPool,
        external_ref: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, booking_id, amount_minor, currency, external_ref, status,
                   created_at, updated_at
            FROM payments
            WHERE external_ref = $1
            "#,
        )
        .bind(external_ref)
        .fetch_optional(pool)
        .await
    }

    /// Lists all payments, newest first (admin view)
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, booking_id, amount_minor, currency, external_ref, status,
                   created_at, updated_at
            FROM payments
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Lists payments belonging to a user's bookings, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT p.id, p.booking_id, p.amount_minor, p.currency, p.external_ref, p.status,
                   p.created_at, p.updated_at
            FROM payments p
            JOIN bookings b ON b.id = p.booking_id
            WHERE b.user_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Lists payments for one booking, newest first
    pub async fn list_by_booking(
        pool: &PgPool,
        booking_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, booking_id, amount_minor, currency, external_ref, status,
                   created_at, updated_at
            FROM payments
            WHERE booking_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(booking_id)
        .fetch_all(pool)
        .await
    }

    /// Checks whether a booking has an active (`pending`/`succeeded`) payment
    pub async fn has_active(pool: &PgPool, booking_id: Uuid) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM payments
                WHERE booking_id = $1 AND status IN ('pending', 'succeeded')
            )
            "#,
        )
        .bind(booking_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Latest `succeeded` payment for a booking, if any
    ///
    /// Only this payment is eligible for refund; earlier retries that never
    /// succeeded are ignored.
    pub async fn latest_succeeded(
        pool: &PgPool,
        booking_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, booking_id, amount_minor, currency, external_ref, status,
                   created_at, updated_at
            FROM payments
            WHERE booking_id = $1 AND status = 'succeeded'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(pool)
        .await
    }

    /// Settles a completion event: payment `succeeded`, booking `confirmed`
    ///
    /// Both conditional UPDATEs run in one transaction, so the pair can
    /// never be observed half-settled. The booking confirm is keyed on the
    /// payment's *current* state rather than on its transition, which also
    /// repairs a `succeeded` payment whose booking is still `pending` (an
    /// earlier delivery interrupted before this pairing existed).
    ///
    /// Returns the booking ID when either row transitioned, None when the
    /// reference is unknown, the payment already left the settleable
    /// states, or the event is a pure replay.
    pub async fn reconcile_completion(
        pool: &PgPool,
        external_ref: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let row: Option<(Uuid, PaymentStatus)> = sqlx::query_as(
            r#"
            SELECT booking_id, status
            FROM payments
            WHERE external_ref = $1
            FOR UPDATE
            "#,
        )
        .bind(external_ref)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((booking_id, status)) = row else {
            return Ok(None);
        };
        if !matches!(status, PaymentStatus::Pending | PaymentStatus::Succeeded) {
            return Ok(None);
        }

        let payment_rows = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'succeeded', updated_at = NOW()
            WHERE external_ref = $1 AND status = 'pending'
            "#,
        )
        .bind(external_ref)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let booking_rows = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'confirmed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(booking_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if payment_rows + booking_rows > 0 {
            Ok(Some(booking_id))
        } else {
            Ok(None)
        }
    }

    /// Moves a `pending` payment to `failed` by gateway reference
    ///
    /// Returns true if a row actually transitioned. The booking stays
    /// `pending` and remains eligible for a new checkout attempt.
    pub async fn mark_failed_by_ref(
        pool: &PgPool,
        external_ref: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', updated_at = NOW()
            WHERE external_ref = $1 AND status = 'pending'
            "#,
        )
        .bind(external_ref)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Voids any still-`pending` payments for a booking
    ///
    /// Run during cancellation so an open checkout session cannot later
    /// reconcile a `succeeded` payment onto a `cancelled` booking. Returns
    /// the number of payments voided.
    pub async fn void_pending_by_booking(
        pool: &PgPool,
        booking_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', updated_at = NOW()
            WHERE booking_id = $1 AND status = 'pending'
            "#,
        )
        .bind(booking_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Atomically marks a payment `refunded` and its booking `cancelled`
    ///
    /// This is the local commit of the cancellation coordinator: it runs
    /// only after the gateway confirmed the refund, in one transaction, so
    /// the pair can never be observed half-cancelled.
    pub async fn finalize_refund(
        pool: &PgPool,
        payment_id: Uuid,
        booking_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'refunded', updated_at = NOW()
            WHERE id = $1 AND status = 'succeeded'
            "#,
        )
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(booking_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(PaymentStatus::Pending.is_active());
        assert!(PaymentStatus::Succeeded.is_active());
        assert!(!PaymentStatus::Failed.is_active());
        assert!(!PaymentStatus::Refunded.is_active());
    }

    #[test]
    fn test_status_transitions() {
        use PaymentStatus::*;

        assert!(Pending.can_transition_to(Succeeded));
        assert!(Pending.can_transition_to(Failed));
        assert!(Succeeded.can_transition_to(Refunded));

        assert!(!Failed.can_transition_to(Succeeded));
        assert!(!Refunded.can_transition_to(Succeeded));
        assert!(!Pending.can_transition_to(Refunded));
    }
}
