//! Outbound HTTP gateway to the Landify REST backend.
//!
//! Components talk to the backend through the [`Api`] trait. [`Gateway`] is
//! the `reqwest` implementation: it attaches `X-Api-Key` to every request
//! and `X-User-Phone` whenever the session holds a phone number. Requests
//! are never retried. Non-2xx responses come back as
//! [`GatewayError::Status`] with the body verbatim.

pub mod endpoints;
pub mod geography;
pub mod storage;

pub use geography::{GeoLevel, Place, fetch_places, normalize_places};
pub use storage::{FileAttachment, HttpObjectStorage, ObjectStorage};

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::config::LandifyConfig;
use crate::error::GatewayError;
use crate::session::SessionContext;

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const USER_PHONE_HEADER: &str = "X-User-Phone";

/// A request to the backend, relative to the configured base address.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

/// Backend access used by every component.
#[async_trait]
pub trait Api: Send + Sync {
    /// Send a request and decode the JSON response. Empty bodies decode to `null`.
    async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError>;
}

/// `reqwest`-backed [`Api`].
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    session: Arc<SessionContext>,
}

impl Gateway {
    pub fn new(config: &LandifyConfig, session: Arc<SessionContext>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Api for Gateway {
    async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        let ApiRequest {
            method,
            path,
            query,
            body,
        } = request;

        let mut builder = self
            .client
            .request(method.clone(), self.url(&path))
            .header(API_KEY_HEADER, self.api_key.expose_secret());

        if let Some(phone) = self.session.phone_number().await {
            builder = builder.header(USER_PHONE_HEADER, phone);
        }
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(ref body) = body {
            builder = builder.json(body);
        }

        debug!(%method, path = %path, "Sending request");

        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::Transport {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| GatewayError::Transport {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            debug!(status = status.as_u16(), path = %path, "Request failed");
            return Err(GatewayError::Status {
                path,
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| GatewayError::InvalidResponse {
            path,
            reason: e.to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builders() {
        let req = ApiRequest::post("/users/send-otp", json!({"mobile": "9876543210"}));
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.body.as_ref().unwrap()["mobile"], "9876543210");

        let req = ApiRequest::get("/geography").with_query("state_id", "36");
        assert_eq!(req.query, vec![("state_id".to_string(), "36".to_string())]);
        assert!(req.body.is_none());
    }

    #[test]
    fn url_joins_base_and_path() {
        let config = LandifyConfig::new("https://api.landify.in/", "k");
        let session = SessionContext::new(Arc::new(crate::session::MemoryStore::new()));
        let gateway = Gateway::new(&config, session);
        assert_eq!(gateway.url("/users/send-otp"), "https://api.landify.in/users/send-otp");
    }
}
