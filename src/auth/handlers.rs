use axum::{
    extract::State,
    routing::{get, patch, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::{
    auth::{
        cookies,
        dto::{
            ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RegisterRequest,
            TokenPairResponse, UpdateAccountRequest,
        },
        extractors::{ApiJson, AuthUser, OptionalJson},
        repo_types::PublicUser,
        services,
    },
    error::AuthResult,
    response::{ApiResponse, Empty},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh-token", post(refresh_token))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users/logout", post(logout))
        .route("/users/change-password", post(change_password))
        .route("/users/current-user", get(current_user))
        .route("/users/update-account", patch(update_account))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AuthResult<ApiResponse<PublicUser>> {
    let user = services::register(&state, payload).await?;
    Ok(ApiResponse::created(user, "User registered successfully"))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AuthResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let (pair, user) = services::login(
        &state,
        payload.username.as_deref(),
        payload.email.as_deref(),
        &payload.password,
    )
    .await?;

    let jar = cookies::set_session(jar, &pair, state.config.cookie_secure);
    Ok((
        jar,
        ApiResponse::ok(
            LoginResponse {
                user,
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

#[instrument(skip(state, jar, user), fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> AuthResult<(CookieJar, ApiResponse<Empty>)> {
    services::logout(&state, user.id).await?;
    Ok((
        cookies::clear_session(jar, state.config.cookie_secure),
        ApiResponse::ok(Empty::default(), "User logged out"),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    OptionalJson(payload): OptionalJson<RefreshRequest>,
) -> AuthResult<(CookieJar, ApiResponse<TokenPairResponse>)> {
    let presented = cookies::read(&jar, cookies::REFRESH_COOKIE)
        .or_else(|| payload.and_then(|body| body.refresh_token));

    let pair = services::refresh(&state, presented.as_deref()).await?;

    let jar = cookies::set_session(jar, &pair, state.config.cookie_secure);
    Ok((
        jar,
        ApiResponse::ok(
            TokenPairResponse {
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "Access token refreshed",
        ),
    ))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> AuthResult<ApiResponse<Empty>> {
    services::change_password(&state, user.id, &payload.old_password, &payload.new_password)
        .await?;
    Ok(ApiResponse::ok(Empty::default(), "Password changed successfully"))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn current_user(AuthUser(user): AuthUser) -> ApiResponse<PublicUser> {
    ApiResponse::ok(user, "Current user fetched successfully")
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<UpdateAccountRequest>,
) -> AuthResult<ApiResponse<PublicUser>> {
    let updated = services::update_account(&state, user.id, payload).await?;
    Ok(ApiResponse::ok(updated, "Account details updated successfully"))
}
