//! Caller identity middleware for Axum
//!
//! Authentication happens upstream; the gateway in front of this service
//! forwards the caller as `X-User-Id` and `X-User-Role` headers.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::{Actor, ActorRole};
use crate::interfaces::http::common::ApiResponse;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Identity error types
#[derive(Debug)]
pub enum IdentityError {
    MissingUser,
    InvalidRole(String),
}

fn header<'a>(request: &'a Request<Body>, name: &str) -> Option<&'a str> {
    request
        .headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the caller from the identity headers. A missing role means `user`.
pub fn actor_from_request(request: &Request<Body>) -> Result<Actor, IdentityError> {
    let user_id = header(request, USER_ID_HEADER).ok_or(IdentityError::MissingUser)?;
    let role = match header(request, USER_ROLE_HEADER) {
        Some(raw) => raw
            .parse::<ActorRole>()
            .map_err(|_| IdentityError::InvalidRole(raw.to_string()))?,
        None => ActorRole::User,
    };
    Ok(Actor {
        user_id: user_id.to_string(),
        role,
    })
}

/// Puts the caller's [`Actor`] into request extensions.
pub async fn actor_middleware(mut request: Request<Body>, next: Next) -> Response {
    match actor_from_request(&request) {
        Ok(actor) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(e) => identity_error_response(e),
    }
}

fn identity_error_response(error: IdentityError) -> Response {
    let message = match error {
        IdentityError::MissingUser => "Missing X-User-Id header".to_string(),
        IdentityError::InvalidRole(role) => format!("Unknown role '{}'", role),
    };
    let body = ApiResponse::<()>::error_with_code(message, "unauthorized");
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn role_defaults_to_user() {
        let actor = actor_from_request(&request(&[("X-User-Id", "alice")])).unwrap();
        assert_eq!(actor, Actor::user("alice"));
    }

    #[test]
    fn operator_role_is_recognized() {
        let actor = actor_from_request(&request(&[
            ("X-User-Id", "op"),
            ("X-User-Role", "Operator"),
        ]))
        .unwrap();
        assert!(actor.is_operator());
    }

    #[test]
    fn missing_user_or_bad_role_is_rejected() {
        assert!(matches!(
            actor_from_request(&request(&[])),
            Err(IdentityError::MissingUser)
        ));
        assert!(matches!(
            actor_from_request(&request(&[("X-User-Id", "a"), ("X-User-Role", "root")])),
            Err(IdentityError::InvalidRole(_))
        ));
    }
}
