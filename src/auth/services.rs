use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::TokenKind,
        dto::{RegisterRequest, UpdateAccountRequest},
        jwt::TokenPair,
        password::hash_password,
        repo_types::{NewUser, PublicUser, User},
    },
    error::{AuthError, AuthResult},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Trimmed, lowercased and non-empty, or `None`.
fn normalize_opt(value: Option<&str>) -> Option<String> {
    value.map(normalize).filter(|v| !v.is_empty())
}

/// Signs a new pair and makes its refresh token the only valid one for the user.
async fn issue_session(state: &AppState, user_id: Uuid) -> AuthResult<TokenPair> {
    let pair = state.keys.issue_pair(user_id)?;
    if !state
        .users
        .set_refresh_token(user_id, Some(&pair.refresh_token))
        .await?
    {
        return Err(AuthError::not_found("User does not exist"));
    }
    Ok(pair)
}

#[instrument(skip(state, req), fields(username = %req.username))]
pub async fn register(state: &AppState, req: RegisterRequest) -> AuthResult<PublicUser> {
    let full_name = req.full_name.trim().to_string();
    let email = normalize(&req.email);
    let username = normalize(&req.username);

    if full_name.is_empty() || email.is_empty() || username.is_empty() || req.password.trim().is_empty()
    {
        return Err(AuthError::bad_request("All fields are required"));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::bad_request("Invalid email"));
    }
    let avatar = req
        .avatar
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AuthError::bad_request("Avatar file is required"))?;

    if state
        .users
        .find_by_username_or_email(Some(&username), Some(&email))
        .await?
        .is_some()
    {
        warn!(%username, %email, "username or email already registered");
        return Err(AuthError::conflict("User with email or username already exists"));
    }

    let password_hash = hash_password(&req.password)?;
    // The store re-checks uniqueness, covering a concurrent registration.
    let user = state
        .users
        .create(NewUser {
            username,
            email,
            full_name,
            avatar,
            cover_image: req.cover_image.unwrap_or_default().trim().to_string(),
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

#[instrument(skip(state, password))]
pub async fn login(
    state: &AppState,
    username: Option<&str>,
    email: Option<&str>,
    password: &str,
) -> AuthResult<(TokenPair, PublicUser)> {
    let username = normalize_opt(username);
    let email = normalize_opt(email);
    if username.is_none() && email.is_none() {
        return Err(AuthError::bad_request("username or email is required"));
    }

    let user = state
        .users
        .find_by_username_or_email(username.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| {
            warn!(?username, ?email, "login unknown user");
            AuthError::not_found("User does not exist")
        })?;

    if !user.compare_password(password)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::unauthorized("Invalid user credentials"));
    }

    let pair = issue_session(state, user.id).await?;

    info!(user_id = %user.id, "user logged in");
    Ok((pair, user.into()))
}

#[instrument(skip(state))]
pub async fn logout(state: &AppState, user_id: Uuid) -> AuthResult<()> {
    if !state.users.set_refresh_token(user_id, None).await? {
        return Err(AuthError::not_found("User does not exist"));
    }
    info!(%user_id, "user logged out");
    Ok(())
}

#[instrument(skip(state, presented))]
pub async fn refresh(state: &AppState, presented: Option<&str>) -> AuthResult<TokenPair> {
    let presented = presented
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::unauthorized("Unauthorized request"))?;

    let claims = state.keys.verify(presented, TokenKind::Refresh)?;

    let user: User = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AuthError::unauthorized("Invalid refresh token"))?;

    // Logout and rotation revoke a token only through this comparison.
    if user.refresh_token.as_deref() != Some(presented) {
        warn!(user_id = %user.id, "stale or revoked refresh token presented");
        return Err(AuthError::unauthorized("Refresh token is expired or used"));
    }

    let pair = issue_session(state, user.id).await?;
    info!(user_id = %user.id, "session refreshed");
    Ok(pair)
}

#[instrument(skip(state, old_password, new_password))]
pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    old_password: &str,
    new_password: &str,
) -> AuthResult<()> {
    if old_password.is_empty() || new_password.trim().is_empty() {
        return Err(AuthError::bad_request("oldPassword and newPassword are required"));
    }

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AuthError::not_found("User does not exist"))?;

    if !user.compare_password(old_password)? {
        warn!(%user_id, "change password with wrong old password");
        return Err(AuthError::unauthorized("Invalid old password"));
    }

    let hash = hash_password(new_password)?;
    if !state.users.set_password_hash(user_id, &hash).await? {
        return Err(AuthError::not_found("User does not exist"));
    }

    // The current refresh token stays valid.
    info!(%user_id, "password changed");
    Ok(())
}

#[instrument(skip(state, req))]
pub async fn update_account(
    state: &AppState,
    user_id: Uuid,
    req: UpdateAccountRequest,
) -> AuthResult<PublicUser> {
    let full_name = req.full_name.trim();
    let email = normalize(&req.email);
    if full_name.is_empty() || email.is_empty() {
        return Err(AuthError::bad_request("All fields are required"));
    }
    if !is_valid_email(&email) {
        return Err(AuthError::bad_request("Invalid email"));
    }

    let user = state
        .users
        .update_account(user_id, full_name, &email)
        .await?
        .ok_or_else(|| AuthError::not_found("User does not exist"))?;

    info!(%user_id, "account details updated");
    Ok(user.into())
}
