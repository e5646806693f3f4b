use std::sync::{Arc, Weak};

use crate::call::IncomingCallCoordinator;
use crate::config::ClientConfig;
use crate::errors::ParloError;
use crate::events::{EventEmitter, ParloEventListener};
use crate::http::{ApiGateway, UnauthorizedHandler};
use crate::nav::Navigator;
use crate::rooms::RoomsStore;
use crate::session::SessionStore;
use crate::settings::SettingsStore;
use crate::signal::{CallSignalListener, OfferSlot, SignalTransport};
use crate::storage::CredentialStore;
use crate::users::UsersStore;

/// Composition root owned by whatever owns the UI tree's lifetime.
///
/// All stores hang off this context — there is no ambient global state. The
/// storage, navigation and signal-transport seams are injected so shells and
/// tests decide the platform pieces.
pub struct AppContext {
    emitter: EventEmitter,
    gateway: Arc<ApiGateway>,
    session: Arc<SessionStore>,
    rooms: Arc<RoomsStore>,
    users: Arc<UsersStore>,
    settings: Arc<SettingsStore>,
    offer_slot: Arc<OfferSlot>,
    listener: Arc<CallSignalListener>,
    coordinator: Arc<IncomingCallCoordinator>,
}

impl AppContext {
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        transport: Arc<dyn SignalTransport>,
    ) -> Arc<Self> {
        let emitter = EventEmitter::new();
        let gateway = Arc::new(ApiGateway::new(&config));
        let settings = Arc::new(SettingsStore::new(&config.data_dir));

        let session = Arc::new(SessionStore::new(
            gateway.clone(),
            storage,
            navigator.clone(),
            emitter.clone(),
        ));
        // A 401 on any endpoint tears the session down through this hook.
        let teardown_handler: Arc<dyn UnauthorizedHandler> = session.clone();
        let teardown: Weak<dyn UnauthorizedHandler> = Arc::downgrade(&teardown_handler);
        gateway.set_unauthorized_handler(teardown);

        let rooms = Arc::new(RoomsStore::new(gateway.clone()));
        let users = Arc::new(UsersStore::new(gateway.clone()));

        let offer_slot = Arc::new(OfferSlot::new());
        let listener = Arc::new(CallSignalListener::new(
            transport,
            offer_slot.clone(),
            emitter.clone(),
        ));
        let coordinator = Arc::new(IncomingCallCoordinator::new(
            offer_slot.clone(),
            navigator,
            settings.clone(),
            emitter.clone(),
        ));

        Arc::new(Self {
            emitter,
            gateway,
            session,
            rooms,
            users,
            settings,
            offer_slot,
            listener,
            coordinator,
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn ParloEventListener>) {
        self.emitter.add_listener(listener);
    }

    pub fn gateway(&self) -> &Arc<ApiGateway> {
        &self.gateway
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn rooms(&self) -> &Arc<RoomsStore> {
        &self.rooms
    }

    pub fn users(&self) -> &Arc<UsersStore> {
        &self.users
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn offer_slot(&self) -> &Arc<OfferSlot> {
        &self.offer_slot
    }

    pub fn call(&self) -> &Arc<IncomingCallCoordinator> {
        &self.coordinator
    }

    /// Subscribe to call signals for the authenticated user.
    ///
    /// Guarded: without an authenticated user id this logs and fails without
    /// touching the transport.
    pub async fn start_call_listener(&self) -> Result<(), ParloError> {
        let user_id = self.session.snapshot().await.user.map(|u| u.id);
        self.listener.start(user_id).await
    }

    /// Release the signal subscription.
    pub async fn stop_call_listener(&self) {
        self.listener.stop().await;
    }
}
