use std::sync::Arc;

use tokio::sync::Mutex;

use crate::http::ApiGateway;
use crate::session::User;

#[derive(Debug, Clone, Default)]
pub struct UsersState {
    pub users: Vec<User>,
    pub loading: bool,
    pub last_error: Option<String>,
}

/// Directory of users that can be rung from the dashboard.
pub struct UsersStore {
    gateway: Arc<ApiGateway>,
    state: Mutex<UsersState>,
}

impl UsersStore {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(UsersState::default()),
        }
    }

    pub async fn snapshot(&self) -> UsersState {
        self.state.lock().await.clone()
    }

    pub async fn fetch_users(&self) {
        {
            let mut state = self.state.lock().await;
            state.loading = true;
            state.last_error = None;
        }
        match self.gateway.get_json::<Vec<User>>("/users").await {
            Ok(users) => {
                let mut state = self.state.lock().await;
                state.users = users;
                state.loading = false;
            }
            Err(e) => {
                tracing::error!("failed to fetch users: {e}");
                let mut state = self.state.lock().await;
                state.loading = false;
                state.last_error = Some(e.surface("Failed to fetch users"));
            }
        }
    }
}
