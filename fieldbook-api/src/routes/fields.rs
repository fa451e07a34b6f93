/// Field endpoints
///
/// Browsing fields is public; creating, updating, and deleting them is
/// restricted to admins.
///
/// # Endpoints
///
/// - `GET    /v1/fields` - List fields with optional filters
/// - `GET    /v1/fields/:id` - Get a single field
/// - `POST   /v1/fields` - Create field (admin)
/// - `PUT    /v1/fields/:id` - Update field (admin)
/// - `DELETE /v1/fields/:id` - Delete field (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use fieldbook_shared::{
    auth::AuthContext,
    models::{CreateField, Field, FieldFilter, UpdateField},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Create field request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFieldRequest {
    /// Field name
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// Human-readable location
    #[validate(length(min = 1, max = 255, message = "Location must be 1-255 characters"))]
    pub location: String,

    /// Price per booking in minor currency units
    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price_minor: i64,
}

/// Update field request (only provided fields are changed)
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFieldRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Location must be 1-255 characters"))]
    pub location: Option<String>,

    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price_minor: Option<i64>,
}

fn validation_errors(e: validator::ValidationErrors) -> ApiError {
    let errors: Vec<ValidationErrorDetail> = e
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();
    ApiError::ValidationError(errors)
}

/// List fields with optional filters
///
/// # Endpoint
///
/// ```text
/// GET /v1/fields?location=riverside&min_price=1000&max_price=5000
/// ```
pub async fn list_fields(
    State(state): State<AppState>,
    Query(filter): Query<FieldFilter>,
) -> ApiResult<Json<Vec<Field>>> {
    let fields = Field::list(&state.db, filter).await?;
    Ok(Json(fields))
}

/// Get a single field
pub async fn get_field(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Field>> {
    let field = Field::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Field not found".to_string()))?;
    Ok(Json(field))
}

/// Create a field (admin only)
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_field(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateFieldRequest>,
) -> ApiResult<Json<Field>> {
    ctx.require_admin()?;
    req.validate().map_err(validation_errors)?;

    let field = Field::create(
        &state.db,
        CreateField {
            name: req.name,
            location: req.location,
            price_minor: req.price_minor,
        },
    )
    .await?;

    Ok(Json(field))
}

/// Update a field (admin only)
pub async fn update_field(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateFieldRequest>,
) -> ApiResult<Json<Field>> {
    ctx.require_admin()?;
    req.validate().map_err(validation_errors)?;

    let field = Field::update(
        &state.db,
        id,
        UpdateField {
            name: req.name,
            location: req.location,
            price_minor: req.price_minor,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Field not found".to_string()))?;

    Ok(Json(field))
}

/// Delete a field (admin only)
///
/// Deleting a field cascades to its bookings at the storage layer.
pub async fn delete_field(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    ctx.require_admin()?;

    let deleted = Field::delete(&state.db, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Field not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "Field deleted" })))
}
