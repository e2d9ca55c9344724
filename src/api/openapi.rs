//! OpenAPI document and Swagger UI routes.

use axum::Router;
use utoipa::OpenApi;

use crate::api::dto::{
    CalendarResponse, CompletedSessionResponse, PaymentRequest, ProposeSessionRequest,
    ReviewRequest, ReviewSummaryResponse, SessionActionKind, SessionActionRequest,
    SessionResponse, WalletResponse, WalletTransactionDto,
};
use crate::api::handlers::{account, session, system};
use crate::app_state::AppState;
use crate::domain::{Currency, LineItem, Review, SessionStatus};
use crate::error::{ErrorBody, ErrorResponse};
use crate::service::PaymentIntentHandle;

/// OpenAPI 3 description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Wafina Gateway API",
        description = "Booking negotiation, settlement and reviews for the Wafina marketplace"
    ),
    paths(
        session::propose_session,
        session::get_session,
        session::resolve_session,
        session::settle_session,
        session::review_session,
        account::calendar,
        account::wallet,
        account::user_reviews,
        system::health_handler,
    ),
    components(schemas(
        ProposeSessionRequest,
        SessionActionKind,
        SessionActionRequest,
        PaymentRequest,
        ReviewRequest,
        SessionResponse,
        CompletedSessionResponse,
        CalendarResponse,
        WalletResponse,
        WalletTransactionDto,
        ReviewSummaryResponse,
        PaymentIntentHandle,
        SessionStatus,
        LineItem,
        Review,
        Currency,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Sessions", description = "Booking session lifecycle"),
        (name = "Calendar", description = "Occupied time slots"),
        (name = "Wallet", description = "Provider earnings"),
        (name = "Reviews", description = "Ratings left by requesters"),
        (name = "System", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;

/// Serves `/api-docs/openapi.json` and the interactive UI at `/swagger-ui`.
#[cfg(feature = "swagger-ui")]
pub fn routes() -> Router<AppState> {
    Router::new().merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}

/// Serves only the raw document at `/api-docs/openapi.json`.
#[cfg(not(feature = "swagger-ui"))]
pub fn routes() -> Router<AppState> {
    use axum::Json;
    use axum::routing::get;

    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
