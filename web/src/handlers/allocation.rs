//! Identifier allocation endpoints.
//!
//! ```text
//! POST /api/ids/booking    { "scopeCode": "OP002" }  → OP002/00000001
//! POST /api/ids/driver     { "scopeCode": "OP001" }  → OP001/DR0011
//! POST /api/ids/admin      {} or empty body          → AD001
//! POST /api/ids/passenger  {} or empty body          → CU001
//! ```
//!
//! Input is validated before any transaction begins, so a rejected request never
//! touches a counter.

use crate::error::AppError;
use crate::middleware::RequestId;
use crate::state::AppState;
use axum::{body::Bytes, extract::State, Json};
use seqalloc_core::error::ValidationError;
use seqalloc_core::identifier::{AllocationTarget, FormattedIdentifier, IdentifierKind};
use serde::{Deserialize, Serialize};

/// Request body of every allocation endpoint.
///
/// `scopeCode` is optional here so that a missing value is reported as a validation
/// error naming the field rather than as a decoding failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AllocationRequest {
    /// Operator or tenant code for booking and driver ids.
    #[serde(default)]
    pub scope_code: Option<String>,
}

impl AllocationRequest {
    /// Decode a request body. An empty body is the same as `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedRequest`] if the body is not a valid request.
    pub fn from_body(body: &[u8]) -> Result<Self, ValidationError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ValidationError::MalformedRequest(e.to_string()))
    }
}

/// Response for scoped identifiers.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedIdResponse {
    /// Always `true`.
    pub success: bool,
    /// The formatted identifier.
    pub id: String,
    /// The scope code the identifier belongs to.
    pub scope_code: String,
    /// The allocated counter value.
    pub sequence_number: u64,
}

/// Response for global identifiers.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalIdResponse {
    /// Always `true`.
    pub success: bool,
    /// The formatted identifier.
    pub id: String,
    /// The allocated counter value.
    pub sequence_number: u64,
}

/// `POST /api/ids/booking`
///
/// # Errors
///
/// See [`AppError`]'s conversion from allocation errors.
pub async fn allocate_booking_id(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Bytes,
) -> Result<Json<ScopedIdResponse>, AppError> {
    let id = allocate(&state, &request_id, IdentifierKind::Booking, &body).await?;
    Ok(Json(scoped_response(id)))
}

/// `POST /api/ids/driver`
///
/// # Errors
///
/// See [`AppError`]'s conversion from allocation errors.
pub async fn allocate_driver_id(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Bytes,
) -> Result<Json<ScopedIdResponse>, AppError> {
    let id = allocate(&state, &request_id, IdentifierKind::Driver, &body).await?;
    Ok(Json(scoped_response(id)))
}

/// `POST /api/ids/admin`
///
/// # Errors
///
/// See [`AppError`]'s conversion from allocation errors.
pub async fn allocate_admin_id(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Bytes,
) -> Result<Json<GlobalIdResponse>, AppError> {
    let id = allocate(&state, &request_id, IdentifierKind::Admin, &body).await?;
    Ok(Json(global_response(id)))
}

/// `POST /api/ids/passenger`
///
/// # Errors
///
/// See [`AppError`]'s conversion from allocation errors.
pub async fn allocate_passenger_id(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Bytes,
) -> Result<Json<GlobalIdResponse>, AppError> {
    let id = allocate(&state, &request_id, IdentifierKind::Passenger, &body).await?;
    Ok(Json(global_response(id)))
}

async fn allocate(
    state: &AppState,
    request_id: &RequestId,
    kind: IdentifierKind,
    body: &[u8],
) -> Result<FormattedIdentifier, AppError> {
    let request = AllocationRequest::from_body(body)?;
    let target = AllocationTarget::new(kind, request.scope_code.as_deref())?;

    let id = state.allocator.allocate_identifier(&target).await?;

    tracing::info!(
        request_id = %request_id,
        kind = %kind,
        id = %id,
        "Identifier issued"
    );

    Ok(id)
}

fn scoped_response(id: FormattedIdentifier) -> ScopedIdResponse {
    ScopedIdResponse {
        success: true,
        scope_code: id.scope().map(ToString::to_string).unwrap_or_default(),
        sequence_number: id.sequence_number(),
        id: id.into_string(),
    }
}

fn global_response(id: FormattedIdentifier) -> GlobalIdResponse {
    GlobalIdResponse {
        success: true,
        sequence_number: id.sequence_number(),
        id: id.into_string(),
    }
}
