use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::http::{header, HeaderMap};

use crate::err::Error;
use crate::session::Claims;
use crate::state::AppState;

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, Error> {
    let value = headers.get(header::AUTHORIZATION).ok_or_else(|| Error::MissingToken {
        message: "No token, authorization denied.".to_string(),
    })?;
    let malformed = || Error::MalformedToken {
        message: "Invalid token format, authorization denied.".to_string(),
    };
    let value = value.to_str().map_err(|_| malformed())?;
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(malformed()),
    }
}

/// Extractor for any valid session. Student-scoped handlers must key their
/// data access on `claims.email()`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl<B: Send> FromRequest<B> for AuthUser {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let state = req
            .extensions()
            .get::<Arc<AppState>>()
            .cloned()
            .ok_or_else(|| Error::internal("MissingState", "Application state not installed"))?;
        let token = bearer_token(req.headers())?;
        let claims = state.sessions.decode(token)?;
        Ok(AuthUser(claims))
    }
}

/// Extractor that additionally requires the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

#[async_trait]
impl<B: Send> FromRequest<B> for AdminUser {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request(req).await?;
        if !claims.is_admin() {
            log::warn!("Non-admin {} attempted an admin operation", claims.email());
            return Err(Error::forbidden(
                "Access denied. Only administrators may perform this action.",
            ));
        }
        Ok(AdminUser(claims))
    }
}
