//! UniFFI bindings for parlo-core.
//!
//! Provides a ParloClient object that wraps the core AppContext behind a
//! blocking, FFI-safe interface. The native shell supplies navigation and
//! push delivery; the client owns a tokio runtime and bridges events back
//! through foreign callback interfaces.

use std::sync::Arc;

use parlo_core::{
    AppContext, ChannelSignalTransport, ClientConfig,
    events::{CallEndReason as CoreCallEndReason, ParloEvent as CoreParloEvent},
    signal::{IncomingCallOffer, SignalMessage},
};

uniffi::setup_scaffolding!();

// ── Namespace functions ──────────────────────────────────────────────

/// Initialize tracing/logging. Call once from the host before using
/// ParloClient. On Android, stderr goes to logcat for debuggable builds.
#[uniffi::export]
pub fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "parlo_core=debug,parlo_ffi=debug".parse().unwrap()),
            )
            .with_ansi(false)
            .init();
    });
}

// ── FFI-safe type mirrors ────────────────────────────────────────────

#[derive(Debug, Clone, uniffi::Record)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl From<parlo_core::User> for User {
    fn from(u: parlo_core::User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct SessionState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl From<parlo_core::SessionState> for SessionState {
    fn from(s: parlo_core::SessionState) -> Self {
        Self {
            user: s.user.map(User::from),
            token: s.token,
            is_authenticated: s.is_authenticated,
            loading: s.loading,
            last_error: s.last_error,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct Room {
    pub id: u64,
    pub name: String,
    pub is_private: bool,
    pub owner_id: u64,
}

impl From<parlo_core::Room> for Room {
    fn from(r: parlo_core::Room) -> Self {
        Self {
            id: r.id,
            name: r.name,
            is_private: r.is_private,
            owner_id: r.owner_id,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct RoomsState {
    pub public_rooms: Vec<Room>,
    pub user_rooms: Vec<Room>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl From<parlo_core::RoomsState> for RoomsState {
    fn from(s: parlo_core::RoomsState) -> Self {
        Self {
            public_rooms: s.public_rooms.into_iter().map(Room::from).collect(),
            user_rooms: s.user_rooms.into_iter().map(Room::from).collect(),
            loading: s.loading,
            last_error: s.last_error,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct JoinGrant {
    pub token: String,
    pub media_host: String,
}

impl From<parlo_core::JoinGrant> for JoinGrant {
    fn from(g: parlo_core::JoinGrant) -> Self {
        Self {
            token: g.token,
            media_host: g.media_host,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct CallGrant {
    pub room_id: u64,
    pub token: String,
    pub media_host: String,
}

impl From<parlo_core::CallGrant> for CallGrant {
    fn from(g: parlo_core::CallGrant) -> Self {
        Self {
            room_id: g.room_id,
            token: g.token,
            media_host: g.media_host,
        }
    }
}

/// Flattened incoming-call offer for the shell's ringing UI.
#[derive(Debug, Clone, uniffi::Record)]
pub struct IncomingCall {
    pub offer_id: String,
    pub caller_id: u64,
    pub caller_name: String,
    pub room_id: u64,
    pub room_name: String,
    pub room_is_private: bool,
    pub media_host: String,
    pub access_token: String,
}

impl From<IncomingCallOffer> for IncomingCall {
    fn from(o: IncomingCallOffer) -> Self {
        Self {
            offer_id: o.offer_id,
            caller_id: o.caller.id,
            caller_name: o.caller.name,
            room_id: o.room.id,
            room_name: o.room.name,
            room_is_private: o.room.is_private,
            media_host: o.media_host,
            access_token: o.access_token,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct Settings {
    pub display_name: Option<String>,
    pub camera_enabled_on_accept: bool,
    pub mic_enabled_on_accept: bool,
}

impl From<parlo_core::Settings> for Settings {
    fn from(s: parlo_core::Settings) -> Self {
        Self {
            display_name: s.display_name,
            camera_enabled_on_accept: s.camera_enabled_on_accept,
            mic_enabled_on_accept: s.mic_enabled_on_accept,
        }
    }
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum CallEndReason {
    Accepted,
    Declined,
    Replaced,
}

impl From<CoreCallEndReason> for CallEndReason {
    fn from(r: CoreCallEndReason) -> Self {
        match r {
            CoreCallEndReason::Accepted => Self::Accepted,
            CoreCallEndReason::Declined => Self::Declined,
            CoreCallEndReason::Replaced => Self::Replaced,
        }
    }
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum ParloEvent {
    SessionChanged { state: SessionState },
    IncomingCall { call: IncomingCall },
    IncomingCallEnded { reason: CallEndReason },
    CallFailed { message: String },
}

impl From<CoreParloEvent> for ParloEvent {
    fn from(e: CoreParloEvent) -> Self {
        match e {
            CoreParloEvent::SessionChanged(state) => Self::SessionChanged { state: state.into() },
            CoreParloEvent::IncomingCall(offer) => Self::IncomingCall { call: offer.into() },
            CoreParloEvent::IncomingCallEnded { reason } => {
                Self::IncomingCallEnded { reason: reason.into() }
            }
            CoreParloEvent::CallFailed { message } => Self::CallFailed { message },
        }
    }
}

// ── Error conversion ─────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ParloError {
    #[error("Validation error: {msg}")]
    Validation { msg: String },
    #[error("Authentication error: {msg}")]
    Auth { msg: String },
    #[error("Session expired")]
    Expired,
    #[error("Transport error: {msg}")]
    Transport { msg: String },
    #[error("Decode error: {msg}")]
    Decode { msg: String },
    #[error("API error ({status}): {msg}")]
    Api { status: u16, msg: String },
    #[error("Storage error: {msg}")]
    Storage { msg: String },
    #[error("Subscription error: {msg}")]
    Subscription { msg: String },
}

impl From<parlo_core::ParloError> for ParloError {
    fn from(e: parlo_core::ParloError) -> Self {
        tracing::error!("ParloError: {e}");
        match e {
            parlo_core::ParloError::Validation(msg) => Self::Validation { msg },
            parlo_core::ParloError::Auth(msg) => Self::Auth { msg },
            parlo_core::ParloError::Expired => Self::Expired,
            parlo_core::ParloError::Transport(msg) => Self::Transport { msg },
            parlo_core::ParloError::Decode(msg) => Self::Decode { msg },
            parlo_core::ParloError::Api { status, message } => Self::Api { status, msg: message },
            parlo_core::ParloError::Storage(msg) => Self::Storage { msg },
            parlo_core::ParloError::Subscription(msg) => Self::Subscription { msg },
        }
    }
}

// ── Foreign callback interfaces ──────────────────────────────────────

/// Receives core events on the host side.
#[uniffi::export(with_foreign)]
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: ParloEvent);
}

/// Performs route transitions. The core decides where to go; the shell's
/// router does the moving.
#[uniffi::export(with_foreign)]
pub trait NavigationDelegate: Send + Sync {
    fn navigate(&self, path: String);
}

// ── Bridges: FFI callbacks → core traits ─────────────────────────────

struct BridgeListener {
    ffi_listener: Arc<dyn EventListener>,
}

impl parlo_core::ParloEventListener for BridgeListener {
    fn on_event(&self, event: CoreParloEvent) {
        self.ffi_listener.on_event(event.into());
    }
}

struct BridgeNavigator {
    delegate: Arc<dyn NavigationDelegate>,
}

impl parlo_core::Navigator for BridgeNavigator {
    fn navigate(&self, route: parlo_core::Route) {
        self.delegate.navigate(route.path());
    }
}

// ── ParloClient: main FFI object ─────────────────────────────────────

#[derive(uniffi::Object)]
pub struct ParloClient {
    ctx: Arc<AppContext>,
    transport: Arc<ChannelSignalTransport>,
    rt: tokio::runtime::Runtime,
}

#[uniffi::export]
impl ParloClient {
    /// Build the client. `api_base_url` is the backend root; `data_dir` is
    /// the app's sandboxed data directory.
    #[uniffi::constructor]
    pub fn new(
        api_base_url: String,
        data_dir: String,
        navigation: Arc<dyn NavigationDelegate>,
    ) -> Arc<Self> {
        let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
        let config = ClientConfig::new(api_base_url, data_dir);
        let storage = parlo_core::platform_store(&config);
        let transport = Arc::new(ChannelSignalTransport::new());
        let navigator: Arc<dyn parlo_core::Navigator> =
            Arc::new(BridgeNavigator { delegate: navigation });

        let ctx = AppContext::new(config, storage, navigator, transport.clone());
        Arc::new(Self { ctx, transport, rt })
    }

    pub fn add_event_listener(&self, listener: Arc<dyn EventListener>) {
        self.ctx.add_listener(Arc::new(BridgeListener {
            ffi_listener: listener,
        }));
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Startup session recovery: load the stored credential and verify it.
    pub fn check_auth(&self) {
        self.rt.block_on(self.ctx.session().check_auth());
    }

    pub fn login(&self, email: String, password: String) -> Result<(), ParloError> {
        self.rt
            .block_on(self.ctx.session().login(&email, &password))
            .map_err(ParloError::from)
    }

    pub fn register(
        &self,
        name: String,
        email: String,
        password: String,
        password_confirmation: String,
    ) -> Result<(), ParloError> {
        self.rt
            .block_on(self.ctx.session().register(parlo_core::RegisterRequest {
                name,
                email,
                password,
                password_confirmation,
            }))
            .map_err(ParloError::from)
    }

    pub fn logout(&self) {
        self.rt.block_on(self.ctx.session().logout());
    }

    pub fn session_state(&self) -> SessionState {
        self.rt.block_on(self.ctx.session().snapshot()).into()
    }

    // ── Rooms and users ──────────────────────────────────────────────

    /// Refresh the room listing and return the resulting state. Failures
    /// land in `last_error`.
    pub fn fetch_rooms(&self) -> RoomsState {
        self.rt.block_on(async {
            self.ctx.rooms().fetch_rooms().await;
            self.ctx.rooms().snapshot().await.into()
        })
    }

    pub fn rooms_state(&self) -> RoomsState {
        self.rt.block_on(self.ctx.rooms().snapshot()).into()
    }

    pub fn create_room(
        &self,
        name: String,
        is_private: bool,
        password: Option<String>,
    ) -> Result<Room, ParloError> {
        self.rt
            .block_on(self.ctx.rooms().create_room(parlo_core::NewRoom {
                name,
                is_private,
                password,
            }))
            .map(Room::from)
            .map_err(ParloError::from)
    }

    pub fn join_room(&self, room_id: u64, password: Option<String>) -> Result<JoinGrant, ParloError> {
        self.rt
            .block_on(self.ctx.rooms().join_room(room_id, password))
            .map(JoinGrant::from)
            .map_err(ParloError::from)
    }

    /// Ring another user; the backend pushes `call.incoming` to them.
    pub fn call_user(&self, user_id: u64) -> Result<CallGrant, ParloError> {
        self.rt
            .block_on(self.ctx.rooms().initiate_call(user_id))
            .map(CallGrant::from)
            .map_err(ParloError::from)
    }

    pub fn fetch_users(&self) -> Vec<User> {
        self.rt.block_on(async {
            self.ctx.users().fetch_users().await;
            self.ctx
                .users()
                .snapshot()
                .await
                .users
                .into_iter()
                .map(User::from)
                .collect()
        })
    }

    // ── Incoming calls ───────────────────────────────────────────────

    /// Subscribe to the authenticated user's private call channel.
    pub fn start_call_listener(&self) -> Result<(), ParloError> {
        self.rt
            .block_on(self.ctx.start_call_listener())
            .map_err(ParloError::from)
    }

    pub fn stop_call_listener(&self) {
        self.rt.block_on(self.ctx.stop_call_listener());
    }

    /// Entry point for the host's broadcasting client: hand every channel
    /// message down and the core picks out what it understands.
    pub fn deliver_signal(&self, channel: String, event: String, payload_json: String) {
        let payload = match serde_json::from_str::<serde_json::Value>(&payload_json) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("dropping signal with unparseable payload on {channel}: {e}");
                return;
            }
        };
        self.transport.deliver(&channel, SignalMessage { event, payload });
    }

    pub fn is_ringing(&self) -> bool {
        self.ctx.call().is_ringing()
    }

    pub fn incoming_call(&self) -> Option<IncomingCall> {
        self.ctx.call().current_offer().map(IncomingCall::from)
    }

    pub fn accept_call(&self) -> Result<(), ParloError> {
        self.ctx.call().accept().map_err(ParloError::from)
    }

    pub fn decline_call(&self) {
        self.ctx.call().decline();
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn get_settings(&self) -> Settings {
        self.ctx.settings().get().into()
    }

    pub fn set_display_name(&self, name: Option<String>) {
        self.ctx.settings().set_display_name(name);
    }

    pub fn set_camera_enabled_on_accept(&self, enabled: bool) {
        self.ctx.settings().set_camera_enabled_on_accept(enabled);
    }

    pub fn set_mic_enabled_on_accept(&self, enabled: bool) {
        self.ctx.settings().set_mic_enabled_on_accept(enabled);
    }
}
