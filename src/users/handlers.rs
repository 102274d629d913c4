use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::{
    dto::{ProfileResponse, UserListItem},
    services,
    validator::{self, UserValidator},
};
use crate::{
    app::unknown_route,
    auth::{dto::AccessTokenResponse, guard::AuthUser},
    error::AppError,
    extractors::{ClientIp, RequestFields},
    response::ApiResponse,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/user",
            post(create)
                .get(read)
                .put(update)
                .delete(delete)
                .fallback(unknown_route),
        )
        .route("/api/list", get(list).fallback(unknown_route))
}

#[instrument(skip_all, fields(ip = %ip))]
pub async fn create(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    fields: RequestFields,
) -> Result<ApiResponse<AccessTokenResponse>, AppError> {
    let profile = UserValidator::new(&state.db)
        .validate_user_input(&fields)
        .await?;

    let user = services::register(&state.db, &state.tokens, profile, ip).await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(ApiResponse(AccessTokenResponse {
        access_token: user.access_token,
    }))
}

#[instrument(skip_all, fields(user_id = auth.user.id))]
pub async fn read(auth: AuthUser) -> ApiResponse<ProfileResponse> {
    ApiResponse(ProfileResponse::from(auth.user))
}

#[instrument(skip_all, fields(user_id = auth.user.id))]
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<Value>, AppError> {
    let AuthUser { mut user, fields } = auth;

    let changes = UserValidator::new(&state.db)
        .validate_optional_user_input(&fields, user.id)
        .await?;
    services::apply_changes(&mut user, changes)?;
    services::save(&state.db, &user).await?;

    info!("user updated");
    Ok(ApiResponse::empty())
}

#[instrument(skip_all, fields(user_id = auth.user.id))]
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<Value>, AppError> {
    services::remove(&state.db, auth.user.id).await?;

    info!("user deleted");
    Ok(ApiResponse::empty())
}

#[instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    fields: RequestFields,
) -> Result<ApiResponse<Vec<UserListItem>>, AppError> {
    let filter = validator::validate_filter(&fields)?;
    let items = services::filter_users(&state.db, filter, OffsetDateTime::now_utc()).await?;
    Ok(ApiResponse(items))
}
