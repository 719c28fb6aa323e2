use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{claims::TokenKind, cookies, repo_types::PublicUser};
use crate::{error::AuthError, state::AppState};

/// The authenticated caller, resolved from the store on every request.
///
/// Handlers that take this extractor only run once a valid access token has
/// been presented and its user still exists.
#[derive(Debug, Clone)]
pub struct AuthUser(pub PublicUser);

/// Access token from the `accessToken` cookie, falling back to `Authorization: Bearer`.
pub(crate) fn access_token_from(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    cookies::read(&jar, cookies::ACCESS_COOKIE).or_else(|| {
        parts
            .headers
            .typed_get::<Authorization<Bearer>>()
            .map(|Authorization(bearer)| bearer.token().to_owned())
            .filter(|t| !t.is_empty())
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = access_token_from(parts).ok_or_else(|| {
            debug!("no access token on request");
            AuthError::unauthorized("Unauthorized request")
        })?;

        let claims = state.keys.verify(&token, TokenKind::Access)?;

        let user = state.users.find_by_id(claims.sub).await?.ok_or_else(|| {
            warn!(user_id = %claims.sub, "access token for missing user");
            AuthError::unauthorized("Invalid access token")
        })?;

        let user = AuthUser(user.into());
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// JSON body whose rejections are reported as `400 {status, message}`.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            debug!(error = %e, "json body rejected");
            AuthError::from(e)
        })?;
        Ok(ApiJson(value))
    }
}

/// Like [`ApiJson`], but an empty body yields `None`.
///
/// A non-empty body must still parse; the content type is not checked.
#[derive(Debug, Clone)]
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<S, T> FromRequest<S> for OptionalJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            debug!(error = %e, "request body unreadable");
            AuthError::bad_request(e.body_text())
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }

        let Json(value) = Json::<T>::from_bytes(&bytes).map_err(|e| {
            debug!(error = %e, "json body rejected");
            AuthError::from(e)
        })?;
        Ok(OptionalJson(Some(value)))
    }
}
