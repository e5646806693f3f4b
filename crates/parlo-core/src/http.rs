use std::sync::{RwLock, Weak};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use reqwest::StatusCode;

use crate::config::ClientConfig;
use crate::errors::ParloError;

/// Invoked when an authenticated request comes back 401. The gateway awaits
/// the handler so session teardown is observed strictly before the caller
/// sees the failure.
#[async_trait]
pub trait UnauthorizedHandler: Send + Sync {
    async fn on_unauthorized(&self);
}

/// Single configured REST client for the backend API.
///
/// Attaches the bearer credential to every request while one is present and
/// reacts to authorization failures by invalidating the local session. Never
/// retries and never refreshes tokens itself.
pub struct ApiGateway {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
    on_unauthorized: RwLock<Option<Weak<dyn UnauthorizedHandler>>>,
}

impl ApiGateway {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_base_url.clone(),
            token: RwLock::new(None),
            on_unauthorized: RwLock::new(None),
        }
    }

    /// Register the session teardown hook. Held weakly; the session store
    /// owns the gateway, not the other way around.
    pub fn set_unauthorized_handler(&self, handler: Weak<dyn UnauthorizedHandler>) {
        *self.on_unauthorized.write().unwrap() = Some(handler);
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap() = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ParloError> {
        self.execute(self.client.get(self.url(path))).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ParloError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.client.post(self.url(path)).json(body)).await
    }

    /// POST with an empty body (e.g. `/users/{id}/call`).
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ParloError> {
        self.execute(self.client.post(self.url(path))).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ParloError> {
        let token = self.token();
        let had_token = token.is_some();
        let mut builder = builder.header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ParloError::Transport(e.to_string()))?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED && had_token {
            // Token expired or revoked server-side. Tear down before the
            // caller can observe the failure, so it never races the handler.
            self.handle_unauthorized().await;
            return Err(ParloError::Expired);
        }

        if !status.is_success() {
            let message = Self::error_message(resp, status).await;
            return Err(ParloError::Api {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| ParloError::Decode(e.to_string()))
    }

    async fn handle_unauthorized(&self) {
        tracing::warn!("401 with a token present; invalidating session");
        self.set_token(None);
        let handler = self
            .on_unauthorized
            .read()
            .unwrap()
            .as_ref()
            .and_then(Weak::upgrade);
        if let Some(handler) = handler {
            handler.on_unauthorized().await;
        }
    }

    async fn error_message(resp: reqwest::Response, status: StatusCode) -> String {
        resp.text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<serde_json::Value>(&body).ok())
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use serde_json::{Value, json};

    async fn spawn_server(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn gateway(base_url: &str) -> ApiGateway {
        ApiGateway::new(&ClientConfig::new(base_url, "/tmp/parlo-test"))
    }

    #[tokio::test]
    async fn bearer_header_is_attached_when_token_present() {
        let app = axum::Router::new().route(
            "/user",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(json!({ "auth": auth }))
            }),
        );
        let base = spawn_server(app).await;
        let gw = gateway(&base);
        gw.set_token(Some("tok123".into()));

        let resp: Value = gw.get_json("/user").await.unwrap();
        assert_eq!(resp["auth"], "Bearer tok123");
    }

    #[tokio::test]
    async fn no_bearer_header_without_token() {
        let app = axum::Router::new().route(
            "/user",
            get(|headers: HeaderMap| async move {
                Json(json!({ "has_auth": headers.contains_key("authorization") }))
            }),
        );
        let base = spawn_server(app).await;
        let gw = gateway(&base);

        let resp: Value = gw.get_json("/user").await.unwrap();
        assert_eq!(resp["has_auth"], false);
    }

    struct RecordingHandler {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl UnauthorizedHandler for RecordingHandler {
        async fn on_unauthorized(&self) {
            self.log.lock().unwrap().push("teardown");
        }
    }

    #[tokio::test]
    async fn unauthorized_with_token_tears_down_before_error_is_observed() {
        let app = axum::Router::new().route(
            "/rooms",
            get(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(json!({ "message": "Unauthenticated." })),
                )
            }),
        );
        let base = spawn_server(app).await;
        let gw = gateway(&base);
        gw.set_token(Some("stale".into()));

        let log = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<dyn UnauthorizedHandler> =
            Arc::new(RecordingHandler { log: log.clone() });
        gw.set_unauthorized_handler(Arc::downgrade(&handler));

        let err = gw.get_json::<Value>("/rooms").await.unwrap_err();
        log.lock().unwrap().push("error-observed");

        assert!(matches!(err, ParloError::Expired));
        assert_eq!(*log.lock().unwrap(), vec!["teardown", "error-observed"]);
        assert_eq!(gw.token(), None);
    }

    #[tokio::test]
    async fn unauthorized_without_token_is_a_plain_api_error() {
        let app = axum::Router::new().route(
            "/user",
            get(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(json!({ "message": "Unauthenticated." })),
                )
            }),
        );
        let base = spawn_server(app).await;
        let gw = gateway(&base);

        let err = gw.get_json::<Value>("/user").await.unwrap_err();
        match err {
            ParloError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthenticated.");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_message_is_surfaced_from_error_body() {
        let app = axum::Router::new().route(
            "/login",
            post(|| async {
                (
                    axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "message": "Invalid credentials" })),
                )
            }),
        );
        let base = spawn_server(app).await;
        let gw = gateway(&base);

        let err = gw
            .post_json::<_, Value>("/login", &json!({ "email": "a@b.com", "password": "x" }))
            .await
            .unwrap_err();
        match err {
            ParloError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        let gw = gateway("http://127.0.0.1:1");
        let err = gw.get_json::<Value>("/user").await.unwrap_err();
        assert!(matches!(err, ParloError::Transport(_)));
    }
}
