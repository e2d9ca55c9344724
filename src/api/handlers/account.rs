//! Per-user views: calendar, wallet, reviews.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::actor::Actor;
use crate::api::dto::{
    CalendarQuery, CalendarResponse, ReviewSummaryResponse, WalletQuery, WalletResponse,
};
use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /calendar` — Occupied days and sessions of the caller.
///
/// # Errors
///
/// Returns [`GatewayError`] when `start_date` is after `end_date`.
#[utoipa::path(
    get,
    path = "/api/v1/calendar",
    tag = "Calendar",
    summary = "Calendar of the caller",
    description = "Lists accepted, paid and completed sessions of the caller intersecting the whole days from start_date to end_date (UTC).",
    params(
        CalendarQuery,
        ("X-Actor-Id" = uuid::Uuid, Header, description = "Requesting user"),
    ),
    responses(
        (status = 200, description = "Calendar", body = CalendarResponse),
        (status = 400, description = "Invalid range", body = ErrorResponse),
    )
)]
pub async fn calendar(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(query): Query<CalendarQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let view = state
        .sessions
        .calendar(actor, query.start_date, query.end_date)
        .await?;
    Ok(Json(CalendarResponse::from(view)))
}

/// `GET /wallet` — Earnings of the caller.
///
/// # Errors
///
/// Returns [`GatewayError`] for an unknown caller or an inverted range.
#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    tag = "Wallet",
    summary = "Wallet of the caller",
    description = "Returns the caller's balance and the settlements of sessions they provided, newest first.",
    params(
        WalletQuery,
        ("X-Actor-Id" = uuid::Uuid, Header, description = "Provider"),
    ),
    responses(
        (status = 200, description = "Wallet", body = WalletResponse),
        (status = 400, description = "Invalid range", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn wallet(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(query): Query<WalletQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let wallet = state
        .settlement
        .wallet(actor, query.start_date, query.end_date)
        .await?;
    Ok(Json(WalletResponse::from(wallet)))
}

/// `GET /users/:id/reviews` — Reviews about a user.
///
/// # Errors
///
/// Returns [`GatewayError`] on persistence failures.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/reviews",
    tag = "Reviews",
    summary = "Reviews about a user",
    params(("id" = uuid::Uuid, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Reviews and average rating", body = ReviewSummaryResponse),
    )
)]
pub async fn user_reviews(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let summary = state.sessions.reviews_for(UserId::from_uuid(id)).await?;
    Ok(Json(ReviewSummaryResponse::from(summary)))
}

/// Calendar, wallet and review routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/calendar", get(calendar))
        .route("/wallet", get(wallet))
        .route("/users/{id}/reviews", get(user_reviews))
}
