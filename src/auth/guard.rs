use axum::{
    async_trait,
    extract::{FromRequest, Request},
};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use super::token::TokenCodec;
use crate::{error::AppError, extractors::RequestFields, state::AppState, users::repo_types::User};

pub const ACCESS_TOKEN_FIELD: &str = "access_token";

fn unknown_token() -> AppError {
    AppError::not_found("Can not find user with given token!")
}

/// Resolves a presented access token to the user currently holding it.
pub struct AuthGuard<'a> {
    db: &'a SqlitePool,
    tokens: &'a TokenCodec,
}

impl<'a> AuthGuard<'a> {
    pub fn new(db: &'a SqlitePool, tokens: &'a TokenCodec) -> Self {
        Self { db, tokens }
    }

    pub async fn authenticate(&self, fields: &RequestFields) -> Result<User, AppError> {
        let token = fields
            .get(ACCESS_TOKEN_FIELD)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthenticated)?;
        self.resolve(token).await
    }

    /// The stored token must equal `token` exactly, and its `email` claim must
    /// name the user it is stored on.
    pub async fn resolve(&self, token: &str) -> Result<User, AppError> {
        let Some(user) = User::find_by_access_token(self.db, token).await? else {
            warn!("no user holds the presented token");
            return Err(unknown_token());
        };

        match self.tokens.email_claim(token) {
            Ok(Some(email)) if email == user.email => {
                debug!(user_id = user.id, "token resolved");
                Ok(user)
            }
            Ok(_) => {
                warn!(user_id = user.id, "token email claim does not match its owner");
                Err(unknown_token())
            }
            Err(e) if e.is_format_error() => {
                warn!(user_id = user.id, error = %e, "stored token is malformed");
                Err(unknown_token())
            }
            Err(e) => {
                warn!(user_id = user.id, error = %e, "stored token fails verification");
                Err(unknown_token())
            }
        }
    }
}

/// Request fields of a guarded request together with the resolved user.
pub struct AuthUser {
    pub user: User,
    pub fields: RequestFields,
}

#[async_trait]
impl FromRequest<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let fields = RequestFields::from_request(req, state).await?;
        let user = AuthGuard::new(&state.db, &state.tokens)
            .authenticate(&fields)
            .await?;
        Ok(AuthUser { user, fields })
    }
}
