use std::sync::Arc;

use tokio::sync::watch;

use crate::errors::ParloError;
use crate::events::{CallEndReason, EventEmitter, ParloEvent};
use crate::nav::{CallSetupParams, Navigator, Route};
use crate::settings::SettingsStore;
use crate::signal::{IncomingCallOffer, OfferSlot};

/// Drives the ringing flag and the accept/decline commands for a pending
/// incoming call.
///
/// Ringing is purely derived from the offer slot; this type never stores a
/// flag of its own.
pub struct IncomingCallCoordinator {
    slot: Arc<OfferSlot>,
    navigator: Arc<dyn Navigator>,
    settings: Arc<SettingsStore>,
    emitter: EventEmitter,
}

impl IncomingCallCoordinator {
    pub fn new(
        slot: Arc<OfferSlot>,
        navigator: Arc<dyn Navigator>,
        settings: Arc<SettingsStore>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            slot,
            navigator,
            settings,
            emitter,
        }
    }

    pub fn is_ringing(&self) -> bool {
        self.slot.is_ringing()
    }

    pub fn current_offer(&self) -> Option<IncomingCallOffer> {
        self.slot.current()
    }

    pub fn caller_name(&self) -> Option<String> {
        self.slot.current().map(|offer| offer.caller.name)
    }

    /// Watch offer transitions; `Some` means ringing.
    pub fn watch_offer(&self) -> watch::Receiver<Option<IncomingCallOffer>> {
        self.slot.watch()
    }

    /// Accept the pending call and move to room setup.
    ///
    /// The caller already generated our join token and sent it through the
    /// signal, so no join request is needed — we navigate straight to setup
    /// with the received credentials. The offer stays pending if anything
    /// required is missing.
    pub fn accept(&self) -> Result<(), ParloError> {
        let Some(offer) = self.slot.current() else {
            return Err(self.fail_accept("No pending call to accept"));
        };
        if offer.media_host.is_empty() {
            return Err(self.fail_accept("Incoming call is missing the media host"));
        }
        if offer.access_token.is_empty() {
            return Err(self.fail_accept("Incoming call is missing an access token"));
        }

        let settings = self.settings.get();
        self.navigator.navigate(Route::RoomSetup {
            room_id: offer.room.id,
            params: Some(CallSetupParams {
                token: offer.access_token.clone(),
                media_host: offer.media_host.clone(),
                camera_enabled: settings.camera_enabled_on_accept,
                mic_enabled: settings.mic_enabled_on_accept,
            }),
        });

        self.slot.take();
        self.emitter.emit(ParloEvent::IncomingCallEnded {
            reason: CallEndReason::Accepted,
        });
        tracing::info!("accepted call from {} into room {}", offer.caller.name, offer.room.id);
        Ok(())
    }

    /// Discard the pending call. The remote caller is not notified.
    pub fn decline(&self) {
        match self.slot.take() {
            Some(offer) => {
                tracing::info!("declined call from {}", offer.caller.name);
                self.emitter.emit(ParloEvent::IncomingCallEnded {
                    reason: CallEndReason::Declined,
                });
            }
            None => tracing::debug!("decline with no pending call"),
        }
    }

    fn fail_accept(&self, message: &str) -> ParloError {
        tracing::warn!("cannot accept call: {message}");
        self.emitter.emit(ParloEvent::CallFailed {
            message: message.to_string(),
        });
        ParloError::Validation(message.to_string())
    }
}
