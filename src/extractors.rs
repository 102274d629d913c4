use std::{collections::HashMap, convert::Infallible, net::SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Query, Request},
    http::{header, request::Parts},
    Form, Json,
};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AppError;

/// Flat request fields: query string merged with a form or JSON body.
/// Body values win over query values with the same name.
#[derive(Debug, Clone, Default)]
pub struct RequestFields(HashMap<String, String>);

impl RequestFields {
    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn malformed() -> AppError {
    AppError::validation("Malformed request body!")
}

fn scalar_to_string(name: &str, value: Value) -> Result<Option<String>, AppError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(AppError::validation(format!(
            "Field <{name}> must be a scalar value!"
        ))),
    }
}

#[async_trait]
impl<S> FromRequest<S> for RequestFields
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Query(mut fields) = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map_err(|e| {
                warn!(error = %e, "malformed query string");
                AppError::validation("Malformed query string!")
            })?;

        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(body) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| {
                    warn!(error = %e, "malformed json body");
                    malformed()
                })?;
            for (name, value) in body {
                if let Some(value) = scalar_to_string(&name, value)? {
                    fields.insert(name, value);
                }
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(body) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| {
                    warn!(error = %e, "malformed form body");
                    malformed()
                })?;
            fields.extend(body);
        }

        Ok(Self(fields))
    }
}

/// Client address: `Client-IP` header, then `X-Forwarded-For`, then the socket peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        let ip = header("client-ip")
            .or_else(|| header("x-forwarded-for"))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_default();

        Ok(ClientIp(ip))
    }
}
