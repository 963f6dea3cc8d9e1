use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::marker::PhantomData;

use super::api::error::ErrorResponse;
use super::config::Permission;
use super::server::AppState;

/// Permission an extractor demands from the calling API key.
pub trait Grant: Send + Sync + 'static {
    const PERMISSION: Permission;
}

/// Read access to playback outputs and the stored session.
pub struct View;

/// Replacing or stopping the running session.
pub struct Manage;

impl Grant for View {
    const PERMISSION: Permission = Permission::ViewPlayback;
}

impl Grant for Manage {
    const PERMISSION: Permission = Permission::ManageSession;
}

/// API key holder that was checked for `G`'s permission.
pub struct Caller<G: Grant> {
    pub name: String,
    grant: PhantomData<G>,
}

#[derive(Debug, PartialEq)]
pub enum AuthError {
    MissingAuth,
    InvalidFormat,
    InvalidKey,
    Forbidden(Permission),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthError::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::with_message("unauthorized", "Missing Authorization header"),
            ),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::with_message("unauthorized", "Expected a Bearer API key"),
            ),
            AuthError::InvalidKey => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::with_message("unauthorized", "Invalid API key"),
            ),
            AuthError::Forbidden(permission) => (
                StatusCode::FORBIDDEN,
                ErrorResponse::with_message("forbidden", &format!("API key lacks {}", permission)),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Token of an `Authorization: Bearer <key>` header. The scheme is matched
/// case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidFormat)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidFormat);
    }
    Ok(token)
}

impl<G: Grant> FromRequestParts<AppState> for Caller<G> {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let api_key = state
            .config
            .find_api_key(token)
            .ok_or(AuthError::InvalidKey)?;

        if !api_key.permissions.contains(&G::PERMISSION) {
            log::debug!("{} lacks {} for {}", api_key.name, G::PERMISSION, parts.uri);
            return Err(AuthError::Forbidden(G::PERMISSION));
        }

        Ok(Caller {
            name: api_key.name.clone(),
            grant: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Ok("abc"));
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_rejected() {
        assert_eq!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingAuth));
        assert_eq!(
            bearer_token(&headers("Basic dXNlcg==")),
            Err(AuthError::InvalidFormat)
        );
        assert_eq!(bearer_token(&headers("Bearer ")), Err(AuthError::InvalidFormat));
        assert_eq!(bearer_token(&headers("abc")), Err(AuthError::InvalidFormat));
    }
}
