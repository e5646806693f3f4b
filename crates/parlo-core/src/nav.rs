/// Query parameters handed to the room-setup screen when a call is accepted
/// or a room join grant is exchanged for a media connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSetupParams {
    pub token: String,
    pub media_host: String,
    pub camera_enabled: bool,
    pub mic_enabled: bool,
}

impl CallSetupParams {
    /// Render the query string the room-setup screen expects.
    pub fn query_string(&self) -> String {
        format!(
            "token={}&livekit_host={}&cameraEnabled={}&micEnabled={}",
            urlencoding::encode(&self.token),
            urlencoding::encode(&self.media_host),
            self.camera_enabled,
            self.mic_enabled,
        )
    }
}

/// Navigation destinations. The shell owns the actual transition; the core
/// only decides where to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    RoomSetup {
        room_id: u64,
        params: Option<CallSetupParams>,
    },
    CallRoom {
        room_id: u64,
    },
}

impl Route {
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Self::Dashboard | Self::RoomSetup { .. } | Self::CallRoom { .. }
        )
    }

    /// Path (plus query string) as the shell's router understands it.
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_string(),
            Self::Register => "/register".to_string(),
            Self::Dashboard => "/dashboard".to_string(),
            Self::RoomSetup { room_id, params } => match params {
                Some(p) => format!("/room-setup/{room_id}?{}", p.query_string()),
                None => format!("/room-setup/{room_id}"),
            },
            Self::CallRoom { room_id } => format!("/call-room/{room_id}"),
        }
    }
}

/// Gate a requested route on the current auth state. Unauthenticated access
/// to a gated route lands on the login screen.
pub fn resolve(route: Route, is_authenticated: bool) -> Route {
    if route.requires_auth() && !is_authenticated {
        tracing::debug!("unauthenticated access to {}, redirecting to /login", route.path());
        Route::Login
    } else {
        route
    }
}

/// Fire-and-forget navigation seam implemented by the shell's router.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths() {
        assert_eq!(Route::Login.path(), "/login");
        assert_eq!(Route::Register.path(), "/register");
        assert_eq!(Route::Dashboard.path(), "/dashboard");
        assert_eq!(Route::CallRoom { room_id: 7 }.path(), "/call-room/7");
        assert_eq!(
            Route::RoomSetup { room_id: 5, params: None }.path(),
            "/room-setup/5"
        );
    }

    #[test]
    fn room_setup_query_string() {
        let route = Route::RoomSetup {
            room_id: 5,
            params: Some(CallSetupParams {
                token: "rtok".into(),
                media_host: "lk.example.com".into(),
                camera_enabled: true,
                mic_enabled: true,
            }),
        };
        assert_eq!(
            route.path(),
            "/room-setup/5?token=rtok&livekit_host=lk.example.com&cameraEnabled=true&micEnabled=true"
        );
    }

    #[test]
    fn query_values_are_percent_encoded() {
        let params = CallSetupParams {
            token: "a+b/c=".into(),
            media_host: "lk.example.com".into(),
            camera_enabled: false,
            mic_enabled: true,
        };
        assert_eq!(
            params.query_string(),
            "token=a%2Bb%2Fc%3D&livekit_host=lk.example.com&cameraEnabled=false&micEnabled=true"
        );
    }

    #[test]
    fn gated_routes_redirect_when_anonymous() {
        assert_eq!(resolve(Route::Dashboard, false), Route::Login);
        assert_eq!(
            resolve(Route::CallRoom { room_id: 1 }, false),
            Route::Login
        );
        assert_eq!(resolve(Route::Register, false), Route::Register);
    }

    #[test]
    fn gated_routes_pass_when_authenticated() {
        assert_eq!(resolve(Route::Dashboard, true), Route::Dashboard);
        assert_eq!(
            resolve(Route::RoomSetup { room_id: 2, params: None }, true),
            Route::RoomSetup { room_id: 2, params: None }
        );
    }
}
