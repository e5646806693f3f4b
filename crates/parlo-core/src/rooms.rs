use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::ParloError;
use crate::http::ApiGateway;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Room {
    pub id: u64,
    pub name: String,
    pub is_private: bool,
    pub owner_id: u64,
}

/// Canonical `/rooms` listing shape. Anything else fails decoding and is
/// reported, never silently misread.
#[derive(Debug, Deserialize)]
struct RoomsResponse {
    public_rooms: Vec<Room>,
    user_rooms: Vec<Room>,
}

/// Credentials for connecting to the media gateway after joining a room.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinGrant {
    pub token: String,
    #[serde(rename = "livekit_host")]
    pub media_host: String,
}

/// Join credentials plus the room created for a one-to-one call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallGrant {
    pub room_id: u64,
    pub token: String,
    #[serde(rename = "livekit_host")]
    pub media_host: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRoom {
    pub name: String,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RoomsState {
    pub public_rooms: Vec<Room>,
    pub user_rooms: Vec<Room>,
    pub loading: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct JoinRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

/// Room listing, creation and joining, plus one-to-one call initiation.
///
/// Listing failures stay in `last_error`; mutations also re-raise so the
/// invoking screen can react inline.
pub struct RoomsStore {
    gateway: Arc<ApiGateway>,
    state: Mutex<RoomsState>,
    action: Mutex<()>,
}

impl RoomsStore {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(RoomsState::default()),
            action: Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> RoomsState {
        self.state.lock().await.clone()
    }

    pub async fn fetch_rooms(&self) {
        self.begin_action().await;
        match self.gateway.get_json::<RoomsResponse>("/rooms").await {
            Ok(resp) => {
                let mut state = self.state.lock().await;
                state.public_rooms = resp.public_rooms;
                state.user_rooms = resp.user_rooms;
                state.loading = false;
            }
            Err(e) => {
                tracing::error!("failed to fetch rooms: {e}");
                self.finish_action(Some(e.surface("Failed to fetch rooms"))).await;
            }
        }
    }

    pub async fn create_room(&self, room: NewRoom) -> Result<Room, ParloError> {
        let _flight = self.action.lock().await;
        self.begin_action().await;
        match self.gateway.post_json::<_, Room>("/rooms", &room).await {
            Ok(created) => {
                self.finish_action(None).await;
                // Refresh the listing; a refresh failure lands in last_error
                // without undoing the successful creation.
                self.fetch_rooms().await;
                Ok(created)
            }
            Err(e) => {
                tracing::error!("failed to create room: {e}");
                self.finish_action(Some(e.surface("Failed to create room"))).await;
                Err(e)
            }
        }
    }

    pub async fn join_room(
        &self,
        room_id: u64,
        password: Option<String>,
    ) -> Result<JoinGrant, ParloError> {
        let _flight = self.action.lock().await;
        self.begin_action().await;
        let body = JoinRequest { password };
        match self
            .gateway
            .post_json::<_, JoinGrant>(&format!("/rooms/{room_id}/join"), &body)
            .await
        {
            Ok(grant) => {
                self.finish_action(None).await;
                Ok(grant)
            }
            Err(e) => {
                tracing::error!("failed to join room {room_id}: {e}");
                self.finish_action(Some(e.surface("Failed to join room"))).await;
                Err(e)
            }
        }
    }

    /// Ring another user. The backend creates the room, issues our join
    /// credentials, and pushes a `call.incoming` signal to the callee.
    pub async fn initiate_call(&self, user_id: u64) -> Result<CallGrant, ParloError> {
        let _flight = self.action.lock().await;
        self.begin_action().await;
        match self
            .gateway
            .post_empty::<CallGrant>(&format!("/users/{user_id}/call"))
            .await
        {
            Ok(grant) => {
                self.finish_action(None).await;
                Ok(grant)
            }
            Err(e) => {
                tracing::error!("failed to initiate call to user {user_id}: {e}");
                self.finish_action(Some(e.surface("Failed to initiate call"))).await;
                Err(e)
            }
        }
    }

    async fn begin_action(&self) {
        let mut state = self.state.lock().await;
        state.loading = true;
        state.last_error = None;
    }

    async fn finish_action(&self, error: Option<String>) {
        let mut state = self.state.lock().await;
        state.loading = false;
        state.last_error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_listing_shape_decodes() {
        let resp: RoomsResponse = serde_json::from_str(
            r#"{
                "public_rooms": [{"id":1,"name":"Lobby","is_private":false,"owner_id":9}],
                "user_rooms": [{"id":2,"name":"Mine","is_private":true,"owner_id":1}]
            }"#,
        )
        .unwrap();
        assert_eq!(resp.public_rooms.len(), 1);
        assert_eq!(resp.user_rooms[0].name, "Mine");
    }

    #[test]
    fn alternate_listing_shape_is_rejected() {
        let result = serde_json::from_str::<RoomsResponse>(r#"{"data":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn join_grant_maps_media_host() {
        let grant: JoinGrant =
            serde_json::from_str(r#"{"token":"t","livekit_host":"lk.example.com"}"#).unwrap();
        assert_eq!(grant.media_host, "lk.example.com");
    }

    #[test]
    fn new_room_omits_absent_password() {
        let body = serde_json::to_value(NewRoom {
            name: "Standup".into(),
            is_private: false,
            password: None,
        })
        .unwrap();
        assert!(body.get("password").is_none());

        let body = serde_json::to_value(NewRoom {
            name: "Secret".into(),
            is_private: true,
            password: Some("hunter2".into()),
        })
        .unwrap();
        assert_eq!(body["password"], "hunter2");
    }
}
