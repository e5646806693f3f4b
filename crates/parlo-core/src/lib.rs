//! Parlo client core.
//!
//! Business logic for the Parlo video-calling client: session and
//! authentication state, room listing and joining, and real-time
//! incoming-call handling. Pure Rust with no platform dependencies;
//! consumed by native UI shells via UniFFI bindings.
//!
//! The actual media transport is external — this crate stops at handing
//! `{room id, media host, access token}` to the shell's room-setup screen.

pub mod call;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod http;
pub mod nav;
pub mod rooms;
pub mod session;
pub mod settings;
pub mod signal;
pub mod storage;
pub mod users;

pub use call::IncomingCallCoordinator;
pub use config::ClientConfig;
pub use context::AppContext;
pub use errors::ParloError;
pub use events::{CallEndReason, EventEmitter, ParloEvent, ParloEventListener};
pub use http::{ApiGateway, UnauthorizedHandler};
pub use nav::{CallSetupParams, Navigator, Route};
pub use rooms::{CallGrant, JoinGrant, NewRoom, Room, RoomsState, RoomsStore};
pub use session::{RegisterRequest, SessionState, SessionStore, User};
pub use settings::{Settings, SettingsStore};
pub use signal::{
    CallSignalListener, ChannelSignalTransport, IncomingCallOffer, OfferSlot, SignalMessage,
    SignalTransport,
};
pub use storage::{
    AUTH_TOKEN_KEY, CredentialStore, FileCredentialStore, MemoryCredentialStore, platform_store,
};
pub use users::{UsersState, UsersStore};
