use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::ParloError;
use crate::events::{EventEmitter, ParloEvent};
use crate::http::{ApiGateway, UnauthorizedHandler};
use crate::nav::{Navigator, Route};
use crate::storage::{AUTH_TOKEN_KEY, CredentialStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Client-side record of the authenticated user and their bearer credential.
///
/// `is_authenticated` is true iff `token` is present. `user` is populated
/// lazily after token validation, never before.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: User,
    // /login responds with `access_token`, /register with `token`.
    #[serde(alias = "access_token")]
    token: String,
}

/// Owns session state; the only writer of it.
///
/// Login, registration, logout and startup recovery run as serialized
/// actions: a single-flight mutex queues overlapping invocations, and a
/// session epoch discards results that settle after a logout.
pub struct SessionStore {
    gateway: Arc<ApiGateway>,
    storage: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    emitter: EventEmitter,
    state: Mutex<SessionState>,
    auth_action: Mutex<()>,
    epoch: AtomicU64,
}

impl SessionStore {
    pub fn new(
        gateway: Arc<ApiGateway>,
        storage: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            gateway,
            storage,
            navigator,
            emitter,
            state: Mutex::new(SessionState::default()),
            auth_action: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.is_authenticated
    }

    /// Move a stored credential into memory. Idempotent; a no-op when a
    /// token is already loaded. The token is provisional until `check_auth`
    /// verifies it against `/user`.
    pub async fn load_token(&self) -> Result<(), ParloError> {
        if self.state.lock().await.token.is_some() {
            return Ok(());
        }
        // An empty blob counts as no credential.
        let value = self.storage.get(AUTH_TOKEN_KEY).await?.filter(|v| !v.is_empty());
        {
            let mut state = self.state.lock().await;
            state.is_authenticated = value.is_some();
            state.token = value.clone();
        }
        self.gateway.set_token(value);
        self.emit_session().await;
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), ParloError> {
        let _flight = self.auth_action.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.begin_action().await;

        let body = serde_json::json!({ "email": email, "password": password });
        let result = self.gateway.post_json::<_, AuthResponse>("/login", &body).await;
        self.settle_auth(result, epoch, "Login failed").await
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<(), ParloError> {
        if let Err(e) = validate_registration(&request) {
            let message = e.surface("Registration failed");
            tracing::warn!("registration rejected locally: {message}");
            let mut state = self.state.lock().await;
            state.last_error = Some(message);
            drop(state);
            self.emit_session().await;
            return Err(e);
        }

        let _flight = self.auth_action.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.begin_action().await;

        let result = self.gateway.post_json::<_, AuthResponse>("/register", &request).await;
        self.settle_auth(result, epoch, "Registration failed").await
    }

    /// Clear the session. Safe to call when already logged out.
    ///
    /// State is cleared before the persisted credential is removed, so an
    /// observer never sees a live session with deleted storage behind it.
    pub async fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock().await;
            state.user = None;
            state.token = None;
            state.is_authenticated = false;
            state.loading = false;
        }
        self.gateway.set_token(None);
        self.emit_session().await;

        if let Err(e) = self.storage.remove(AUTH_TOKEN_KEY).await {
            tracing::warn!("failed to remove stored credential: {e}");
        }
        self.navigator.navigate(Route::Login);
    }

    /// Startup session recovery.
    ///
    /// Loads the stored token when memory is empty, then verifies it against
    /// `/user`. A rejected token tears the session down.
    pub async fn check_auth(&self) {
        let (has_token, has_user) = {
            let state = self.state.lock().await;
            (state.token.is_some(), state.user.is_some())
        };
        if !has_token && !has_user {
            if let Err(e) = self.load_token().await {
                tracing::warn!("failed to read stored credential: {e}");
            }
        }

        let (has_token, has_user) = {
            let state = self.state.lock().await;
            (state.token.is_some(), state.user.is_some())
        };
        if has_token && !has_user {
            match self.gateway.get_json::<User>("/user").await {
                Ok(user) => {
                    {
                        let mut state = self.state.lock().await;
                        state.user = Some(user);
                        state.is_authenticated = true;
                    }
                    self.emit_session().await;
                }
                Err(e) => {
                    tracing::error!("failed to fetch user on auth check: {e}");
                    self.logout().await;
                }
            }
        } else if !has_token {
            {
                let mut state = self.state.lock().await;
                state.is_authenticated = false;
            }
            self.emit_session().await;
        }
    }

    async fn settle_auth(
        &self,
        result: Result<AuthResponse, ParloError>,
        epoch: u64,
        fallback: &str,
    ) -> Result<(), ParloError> {
        match result {
            Ok(resp) => {
                if self.epoch.load(Ordering::SeqCst) != epoch {
                    // Logged out while the request was in flight; a settled
                    // credential must not resurrect the torn-down session.
                    tracing::info!("auth action settled after logout; discarding result");
                    self.finish_action(None).await;
                    return Err(ParloError::Expired);
                }

                let token = resp.token.clone();
                {
                    let mut state = self.state.lock().await;
                    state.user = Some(resp.user);
                    state.token = Some(token.clone());
                    state.is_authenticated = true;
                }
                self.gateway.set_token(Some(token.clone()));
                if let Err(e) = self.storage.set(AUTH_TOKEN_KEY, &token).await {
                    tracing::warn!("failed to persist credential: {e}");
                }
                self.finish_action(None).await;
                self.navigator.navigate(Route::Dashboard);
                Ok(())
            }
            Err(e) => {
                let message = e.surface(fallback);
                tracing::error!("auth action failed: {e}");
                self.finish_action(Some(message)).await;
                Err(e)
            }
        }
    }

    async fn begin_action(&self) {
        {
            let mut state = self.state.lock().await;
            state.loading = true;
            state.last_error = None;
        }
        self.emit_session().await;
    }

    async fn finish_action(&self, error: Option<String>) {
        {
            let mut state = self.state.lock().await;
            state.loading = false;
            state.last_error = error;
        }
        self.emit_session().await;
    }

    async fn emit_session(&self) {
        let state = self.state.lock().await.clone();
        self.emitter.emit(ParloEvent::SessionChanged(state));
    }
}

#[async_trait]
impl UnauthorizedHandler for SessionStore {
    async fn on_unauthorized(&self) {
        self.logout().await;
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<(), ParloError> {
    if request.name.trim().is_empty() {
        return Err(ParloError::Validation("Name is required".into()));
    }
    let email_re = regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    if !email_re.is_match(request.email.trim()) {
        return Err(ParloError::Validation("Enter a valid email address".into()));
    }
    if request.password.is_empty() {
        return Err(ParloError::Validation("Password is required".into()));
    }
    if request.password != request.password_confirmation {
        return Err(ParloError::Validation("Passwords do not match".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, password: &str, confirmation: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            password_confirmation: confirmation.into(),
        }
    }

    #[test]
    fn registration_accepts_well_formed_input() {
        assert!(validate_registration(&request("Ann", "ann@example.com", "pw", "pw")).is_ok());
    }

    #[test]
    fn registration_rejects_blank_name() {
        assert!(matches!(
            validate_registration(&request("  ", "ann@example.com", "pw", "pw")),
            Err(ParloError::Validation(_))
        ));
    }

    #[test]
    fn registration_rejects_malformed_email() {
        for email in ["", "ann", "ann@", "@example.com", "ann@example", "a b@example.com"] {
            assert!(
                matches!(
                    validate_registration(&request("Ann", email, "pw", "pw")),
                    Err(ParloError::Validation(_))
                ),
                "email {email:?} should be rejected"
            );
        }
    }

    #[test]
    fn registration_rejects_mismatched_passwords() {
        assert!(matches!(
            validate_registration(&request("Ann", "ann@example.com", "pw", "other")),
            Err(ParloError::Validation(_))
        ));
    }

    #[test]
    fn auth_response_accepts_both_token_fields() {
        let login: AuthResponse = serde_json::from_str(
            r#"{"user":{"id":1,"name":"A","email":"a@b.com"},"access_token":"tok123"}"#,
        )
        .unwrap();
        assert_eq!(login.token, "tok123");

        let register: AuthResponse = serde_json::from_str(
            r#"{"user":{"id":1,"name":"A","email":"a@b.com"},"token":"tok456"}"#,
        )
        .unwrap();
        assert_eq!(register.token, "tok456");
    }
}
