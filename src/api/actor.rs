//! Authenticated caller identity.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::UserId;
use crate::error::GatewayError;

/// Header carrying the caller's user id, set by the identity provider in
/// front of the gateway.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The user performing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| uuid::Uuid::parse_str(raw.trim()).ok())
            .ok_or(GatewayError::Unauthorized)?;
        Ok(Self(UserId::from_uuid(id)))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Actor, GatewayError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(ACTOR_HEADER, value);
        }
        let Ok(request) = builder.body(()) else {
            panic!("valid request");
        };
        let (mut parts, ()) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn parses_uuid_header() {
        let id = uuid::Uuid::new_v4();
        let Ok(Actor(actor)) = extract(Some(&id.to_string())).await else {
            panic!("extraction failed");
        };
        assert_eq!(*actor.as_uuid(), id);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        assert!(matches!(extract(None).await, Err(GatewayError::Unauthorized)));
        assert!(matches!(
            extract(Some("not-a-uuid")).await,
            Err(GatewayError::Unauthorized)
        ));
    }
}
