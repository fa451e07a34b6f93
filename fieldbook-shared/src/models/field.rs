/// Field model: the bookable physical resource
///
/// Fields are created and mutated only by admins. Prices are stored in
/// integer minor currency units (e.g. cents); this convention is applied
/// uniformly everywhere an amount crosses a boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A bookable field
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Field {
    /// Unique field ID
    pub id: Uuid,

    /// Field name
    pub name: String,

    /// Human-readable location
    pub location: String,

    /// Price per booking in minor currency units
    pub price_minor: i64,

    /// When the field was created
    pub created_at: DateTime<Utc>,

    /// When the field was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a field
#[derive(Debug, Clone, Deserialize)]
pub struct CreateField {
    pub name: String,
    pub location: String,
    pub price_minor: i64,
}

/// Input for updating a field (only non-None fields are changed)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateField {
    pub name: Option<String>,
    pub location: Option<String>,
    pub price_minor: Option<i64>,
}

/// Optional listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldFilter {
    /// Case-insensitive substring match on location
    pub location: Option<String>,

    /// Minimum price in minor units (inclusive)
    pub min_price: Option<i64>,

    /// Maximum price in minor units (inclusive)
    pub max_price: Option<i64>,
}

impl Field {
    /// Creates a new field
    pub async fn create(pool: &PgPool, data: CreateField) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Field>(
            r#"
            INSERT INTO fields (id, name, location, price_minor)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, location, price_minor, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.name)
        .bind(data.location)
        .bind(data.price_minor)
        .fetch_one(pool)
        .await
    }

    /// Finds a field by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Field>(
            r#"
            SELECT id, name, location, price_minor, created_at, updated_at
            FROM fields
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists fields matching the given filters
    ///
    /// All filters are optional; omitted filters match everything.
    pub async fn list(pool: &PgPool, filter: FieldFilter) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Field>(
            r#"
            SELECT id, name, location, price_minor, created_at, updated_at
            FROM fields
            WHERE ($1::text IS NULL OR location ILIKE '%' || $1 || '%')
              AND ($2::bigint IS NULL OR price_minor >= $2)
              AND ($3::bigint IS NULL OR price_minor <= $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.location)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .fetch_all(pool)
        .await
    }

    /// Updates a field, returning the updated row if it exists
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateField,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Field>(
            r#"
            UPDATE fields
            SET name = COALESCE($2, name),
                location = COALESCE($3, location),
                price_minor = COALESCE($4, price_minor),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, location, price_minor, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.location)
        .bind(data.price_minor)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a field by ID, returning true if a row was removed
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM fields WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_default_matches_everything() {
        let filter = FieldFilter::default();
        assert!(filter.location.is_none());
        assert!(filter.min_price.is_none());
        assert!(filter.max_price.is_none());
    }
}
