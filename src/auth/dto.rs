use serde::Serialize;

/// Returned by registration and login.
#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}
