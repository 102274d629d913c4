use axum::{extract::State, routing::post, Router};
use tracing::{info, instrument, warn};

use crate::{
    app::unknown_route,
    auth::{dto::AccessTokenResponse, password::verify_password},
    error::AppError,
    extractors::RequestFields,
    response::ApiResponse,
    state::AppState,
    users::{repo_types::User, validator::validate_auth_request},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/api/auth", post(login).fallback(unknown_route))
}

/// Checks credentials and rotates the stored access token. Any token issued
/// before this call stops resolving.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    fields: RequestFields,
) -> Result<ApiResponse<AccessTokenResponse>, AppError> {
    let credentials = validate_auth_request(&fields)?;

    let user = match User::find_by_email(&state.db, &credentials.email).await? {
        Some(user) => user,
        None => {
            warn!(email = %credentials.email, "login unknown email");
            return Err(AppError::not_found(format!(
                "Can not find user with email: {}",
                credentials.email
            )));
        }
    };

    if !verify_password(&credentials.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::AuthenticationFailed(
            "Invalid email or password!".into(),
        ));
    }

    let access_token = state.tokens.issue_for_email(&user.email)?;
    User::update_access_token(&state.db, user.id, &access_token).await?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(ApiResponse(AccessTokenResponse { access_token }))
}
