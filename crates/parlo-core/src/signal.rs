use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::errors::ParloError;
use crate::events::{CallEndReason, EventEmitter, ParloEvent};

/// Event name the backend broadcasts on the callee's private channel.
pub const CALL_INCOMING_EVENT: &str = "call.incoming";

/// Per-user private channel, named by backend convention.
pub fn user_channel(user_id: u64) -> String {
    format!("App.Models.User.{user_id}")
}

/// One decoded message from the push channel.
#[derive(Debug, Clone)]
pub struct SignalMessage {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Seam to the managed broadcasting client owned by the shell.
///
/// The transport handles the wire, reconnection and backoff; the core only
/// consumes a stream of channel messages.
#[async_trait]
pub trait SignalTransport: Send + Sync {
    async fn subscribe(&self, channel: &str)
    -> Result<BoxStream<'static, SignalMessage>, ParloError>;
    async fn leave(&self, channel: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Caller {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomSummary {
    pub id: u64,
    pub name: String,
    pub is_private: bool,
}

fn new_offer_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Transient record of an inbound call awaiting accept/decline.
///
/// Decoded from the canonical `call.incoming` payload; anything that does
/// not match the schema is rejected at the decode boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingCallOffer {
    pub caller: Caller,
    pub room: RoomSummary,
    #[serde(rename = "livekit_host")]
    pub media_host: String,
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(skip_deserializing, default = "new_offer_id")]
    pub offer_id: String,
    #[serde(skip_deserializing, default = "chrono::Utc::now")]
    pub received_at: DateTime<Utc>,
}

/// Holds at most one pending offer. Ringing is derived from occupancy.
///
/// Backed by a watch channel so shells can await transitions instead of
/// polling.
pub struct OfferSlot {
    tx: watch::Sender<Option<IncomingCallOffer>>,
}

impl OfferSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish a new offer, returning the one it replaced, if any.
    /// Most recent ring wins.
    pub fn publish(&self, offer: IncomingCallOffer) -> Option<IncomingCallOffer> {
        self.tx.send_replace(Some(offer))
    }

    /// Clear the slot, returning the pending offer, if any.
    pub fn take(&self) -> Option<IncomingCallOffer> {
        self.tx.send_replace(None)
    }

    pub fn current(&self) -> Option<IncomingCallOffer> {
        self.tx.borrow().clone()
    }

    pub fn is_ringing(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn watch(&self) -> watch::Receiver<Option<IncomingCallOffer>> {
        self.tx.subscribe()
    }
}

impl Default for OfferSlot {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveSubscription {
    channel: String,
    task: tokio::task::JoinHandle<()>,
}

/// Subscribes to the authenticated user's private channel and decodes
/// `call.incoming` events into the offer slot.
pub struct CallSignalListener {
    transport: Arc<dyn SignalTransport>,
    slot: Arc<OfferSlot>,
    emitter: EventEmitter,
    active: Mutex<Option<ActiveSubscription>>,
}

impl CallSignalListener {
    pub fn new(
        transport: Arc<dyn SignalTransport>,
        slot: Arc<OfferSlot>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            transport,
            slot,
            emitter,
            active: Mutex::new(None),
        }
    }

    /// Begin listening for the given user. A no-op when already subscribed
    /// for the same user; resubscribes when the user changed.
    pub async fn start(&self, user_id: Option<u64>) -> Result<(), ParloError> {
        let Some(user_id) = user_id else {
            tracing::warn!("no authenticated user; not subscribing to call signals");
            return Err(ParloError::Subscription("no authenticated user".into()));
        };
        let channel = user_channel(user_id);

        let mut active = self.active.lock().await;
        if let Some(sub) = active.as_ref() {
            if sub.channel == channel {
                return Ok(());
            }
        }
        if let Some(prev) = active.take() {
            prev.task.abort();
            self.transport.leave(&prev.channel).await;
        }

        let stream = self.transport.subscribe(&channel).await?;
        tracing::info!("listening for call signals on {channel}");

        let slot = self.slot.clone();
        let emitter = self.emitter.clone();
        let task = tokio::spawn(Self::listen_loop(stream, slot, emitter));
        *active = Some(ActiveSubscription { channel, task });
        Ok(())
    }

    /// Release the subscription. Safe to call when not listening.
    pub async fn stop(&self) {
        if let Some(sub) = self.active.lock().await.take() {
            sub.task.abort();
            self.transport.leave(&sub.channel).await;
            tracing::info!("left call signal channel {}", sub.channel);
        }
    }

    async fn listen_loop(
        mut stream: BoxStream<'static, SignalMessage>,
        slot: Arc<OfferSlot>,
        emitter: EventEmitter,
    ) {
        while let Some(message) = stream.next().await {
            if message.event != CALL_INCOMING_EVENT {
                tracing::debug!("ignoring signal event {}", message.event);
                continue;
            }
            match serde_json::from_value::<IncomingCallOffer>(message.payload) {
                Ok(offer) => {
                    tracing::info!(
                        "incoming call from {} for room {}",
                        offer.caller.name,
                        offer.room.id
                    );
                    let replaced = slot.publish(offer.clone());
                    if let Some(replaced) = replaced {
                        tracing::warn!(
                            "pending offer {} replaced by {}",
                            replaced.offer_id,
                            offer.offer_id
                        );
                        emitter.emit(ParloEvent::IncomingCallEnded {
                            reason: CallEndReason::Replaced,
                        });
                    }
                    emitter.emit(ParloEvent::IncomingCall(offer));
                }
                Err(e) => {
                    tracing::warn!("rejecting malformed call.incoming payload: {e}");
                }
            }
        }
        tracing::info!("call signal stream ended");
    }
}

/// In-process transport: the shell's broadcasting client (or a test) hands
/// messages to `deliver`, and subscribed channels receive them in order.
#[derive(Default)]
pub struct ChannelSignalTransport {
    channels: std::sync::Mutex<HashMap<String, mpsc::UnboundedSender<SignalMessage>>>,
}

impl ChannelSignalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a message to the channel's subscriber, if any.
    pub fn deliver(&self, channel: &str, message: SignalMessage) {
        let channels = self.channels.lock().unwrap();
        match channels.get(channel) {
            Some(tx) => {
                if tx.send(message).is_err() {
                    tracing::debug!("subscriber for {channel} is gone");
                }
            }
            None => tracing::debug!("no subscriber for channel {channel}"),
        }
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.channels.lock().unwrap().contains_key(channel)
    }
}

#[async_trait]
impl SignalTransport for ChannelSignalTransport {
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<BoxStream<'static, SignalMessage>, ParloError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.lock().unwrap().insert(channel.to_string(), tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn leave(&self, channel: &str) {
        self.channels.lock().unwrap().remove(channel);
    }
}
