//! Booking session handlers: propose, get, decide, pay, review.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::actor::Actor;
use crate::api::dto::{
    CompletedSessionResponse, PaymentRequest, ProposeSessionRequest, ReviewRequest,
    SessionActionRequest, SessionResponse,
};
use crate::app_state::AppState;
use crate::domain::{ReviewSubmission, SessionId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{PaymentIntentHandle, ProposalRequest};

/// `POST /sessions` — Propose a booking session to a provider.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid input, an unavailable provider, or
/// a corrupt catalog.
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "Sessions",
    summary = "Propose a session",
    description = "Prices the selected services against the provider's catalog, checks the provider's off-day and stores a proposed session.",
    request_body = ProposeSessionRequest,
    params(("X-Actor-Id" = uuid::Uuid, Header, description = "Requesting user")),
    responses(
        (status = 201, description = "Session proposed", body = SessionResponse),
        (status = 400, description = "Invalid proposal", body = ErrorResponse),
        (status = 401, description = "Missing actor", body = ErrorResponse),
        (status = 404, description = "Provider not found", body = ErrorResponse),
        (status = 422, description = "Provider unavailable on that day", body = ErrorResponse),
    )
)]
pub async fn propose_session(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(req): Json<ProposeSessionRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let session = state
        .sessions
        .propose(ProposalRequest {
            requester: actor,
            provider: req.target_id,
            requested_date: req.requested_date,
            start_timestamp: req.start_time,
            service_ids: req.requested_services,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// `GET /sessions/:id` — Session details.
///
/// # Errors
///
/// Returns [`GatewayError`] if the session does not exist or the caller is
/// not one of its parties.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    summary = "Get session details",
    params(
        ("id" = uuid::Uuid, Path, description = "Session UUID"),
        ("X-Actor-Id" = uuid::Uuid, Header, description = "Requesting user"),
    ),
    responses(
        (status = 200, description = "Session details", body = SessionResponse),
        (status = 403, description = "Not a party of the session", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let session = state.sessions.get_session(SessionId::from_uuid(id)).await?;
    if !session.involves(actor) {
        return Err(GatewayError::Forbidden(
            "not a party of this session".to_string(),
        ));
    }
    Ok(Json(SessionResponse::from(session)))
}

/// `POST /sessions/:id/action` — Accept or reject a proposal.
///
/// # Errors
///
/// Returns [`GatewayError`] if the caller is not the provider or the
/// proposal was already decided.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/action",
    tag = "Sessions",
    summary = "Accept or reject a proposal",
    description = "Accepting fixes the end time from the given duration. A proposal can be decided only once.",
    params(
        ("id" = uuid::Uuid, Path, description = "Session UUID"),
        ("X-Actor-Id" = uuid::Uuid, Header, description = "Provider"),
    ),
    request_body = SessionActionRequest,
    responses(
        (status = 200, description = "Decision applied", body = SessionResponse),
        (status = 400, description = "Missing or zero duration", body = ErrorResponse),
        (status = 403, description = "Caller is not the provider", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Already actioned", body = ErrorResponse),
    )
)]
pub async fn resolve_session(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<SessionActionRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let decision = req.into_decision()?;
    let session = state
        .sessions
        .resolve(SessionId::from_uuid(id), actor, decision)
        .await?;
    Ok(Json(SessionResponse::from(session)))
}

/// `POST /sessions/:id/payment` — Settle an accepted session.
///
/// # Errors
///
/// Returns [`GatewayError`] when the session cannot be settled or the
/// payment processor fails.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/payment",
    tag = "Sessions",
    summary = "Pay for an accepted session",
    description = "Captures the session price through the payment processor, then marks the session paid and credits the provider.",
    params(
        ("id" = uuid::Uuid, Path, description = "Session UUID"),
        ("X-Actor-Id" = uuid::Uuid, Header, description = "Requester"),
    ),
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Payment captured", body = PaymentIntentHandle),
        (status = 400, description = "Unsupported currency", body = ErrorResponse),
        (status = 403, description = "Caller is not the requester", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Already settled or not accepted", body = ErrorResponse),
        (status = 502, description = "Payment failed", body = ErrorResponse),
    )
)]
pub async fn settle_session(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<PaymentRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let handle = state
        .settlement
        .settle(SessionId::from_uuid(id), actor, &req.currency)
        .await?;
    Ok(Json(handle))
}

/// `POST /sessions/:id/review` — Review a paid session.
///
/// # Errors
///
/// Returns [`GatewayError`] on an out-of-range rating or when the session
/// is not paid.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/review",
    tag = "Sessions",
    summary = "Review a paid session",
    description = "Stores the requester's review and completes the session.",
    params(
        ("id" = uuid::Uuid, Path, description = "Session UUID"),
        ("X-Actor-Id" = uuid::Uuid, Header, description = "Requester"),
    ),
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Review stored", body = CompletedSessionResponse),
        (status = 400, description = "Invalid rating", body = ErrorResponse),
        (status = 403, description = "Caller is not the requester", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session not paid or already reviewed", body = ErrorResponse),
    )
)]
pub async fn review_session(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let submission = ReviewSubmission::new(req.rating, req.comments)?;
    let (session, review) = state
        .sessions
        .complete(SessionId::from_uuid(id), actor, submission)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CompletedSessionResponse {
            session: SessionResponse::from(session),
            review,
        }),
    ))
}

/// Session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(propose_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/action", post(resolve_session))
        .route("/sessions/{id}/payment", post(settle_session))
        .route("/sessions/{id}/review", post(review_session))
}
