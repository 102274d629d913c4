use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Envelope wrapped around every response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub result: bool,
    pub message: Option<String>,
    pub data: T,
}

/// Successful response: `{"result": true, "message": null, "data": ...}`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize>(pub T);

impl ApiResponse<Value> {
    /// `data` is rendered as `{}`.
    pub fn empty() -> Self {
        Self(Value::Object(Default::default()))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            result: true,
            message: None,
            data: self.0,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

pub fn failure(status: StatusCode, message: String) -> Response {
    let body = Envelope {
        result: false,
        message: Some(message),
        data: Value::Object(Default::default()),
    };
    (status, Json(body)).into_response()
}
