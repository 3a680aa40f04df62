//! Event dispatcher: routes decoded events to their handlers.
//!
//! Every connection's reader pumps raw packets into one queue, and a
//! single task drains it. Events from one connection are therefore
//! handled in the order they arrived, and a handler never runs
//! concurrently with another.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use flux_hub::{ClientHandle, HubError};
use flux_protocol::{
    Codec, EventFrame, JsonCodec, ProtocolError, Reply, WireDecode, event,
};
use flux_store::StoreError;
use flux_team::TeamError;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

/// A raw inbound packet and the client it came from.
///
/// `raw: None` is the disconnect sentinel a reader pump sends when its
/// connection ends.
#[derive(Debug)]
pub struct Packet {
    pub raw: Option<Vec<u8>>,
    pub sender: ClientHandle,
}

impl Packet {
    pub fn data(raw: Vec<u8>, sender: ClientHandle) -> Self {
        Self {
            raw: Some(raw),
            sender,
        }
    }

    pub fn disconnect(sender: ClientHandle) -> Self {
        Self { raw: None, sender }
    }
}

/// One decoded event, handed to exactly one handler.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    /// Undecoded arguments, in the sender's format.
    pub args: Vec<u8>,
    pub sender: ClientHandle,
}

impl Event {
    /// Decodes the arguments into `T`, whichever format they are in.
    pub fn args<T: WireDecode>(&self) -> Result<T, ProtocolError> {
        flux_protocol::decode(&self.args)
    }
}

/// Why a handler gave up on an event. Scoped to that event only.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("bad arguments: {0}")]
    Args(#[from] ProtocolError),

    #[error(transparent)]
    Team(#[from] TeamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hub(#[from] HubError),
}

/// What a handler returns: an optional reply for the sender.
pub type HandlerResult = Result<Option<Reply>, HandlerError>;

type Handler = Arc<dyn Fn(Event) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Name → handler table plus the loop that drives it.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes events named `name` to `handler`. A later registration for
    /// the same name replaces the earlier one.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let name = name.into();
        let handler: Handler = Arc::new(move |event| handler(event).boxed());
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::debug!(event = %name, "handler replaced");
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Drains `inbound` until every sender is gone.
    pub async fn run(self, mut inbound: mpsc::Receiver<Packet>) {
        tracing::info!(handlers = self.handlers.len(), "dispatcher started");
        while let Some(packet) = inbound.recv().await {
            self.dispatch(packet).await;
        }
        tracing::info!("dispatcher stopped");
    }

    /// Handles one packet to completion.
    pub async fn dispatch(&self, packet: Packet) {
        let Packet { raw, sender } = packet;

        let event = match raw {
            None => Event {
                name: event::USER_DISCONNECT.to_string(),
                args: Vec::new(),
                sender,
            },
            Some(raw) => match EventFrame::decode(&raw) {
                Ok(frame) => Event {
                    name: frame.name,
                    args: frame.args,
                    sender,
                },
                Err(e) => {
                    tracing::debug!(client = %sender.id(), error = %e, "undecodable packet dropped");
                    return;
                }
            },
        };

        let Some(handler) = self.handlers.get(&event.name) else {
            tracing::trace!(event = %event.name, "no handler");
            return;
        };

        let name = event.name.clone();
        let sender = event.sender.clone();
        match handler(event).await {
            Ok(Some(reply)) => reply_to(&sender, &name, &reply),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(event = %name, client = %sender.id(), error = %e, "handler failed");
            }
        }
    }
}

/// Replies always go out as JSON: only browsers make requests that
/// expect one.
fn reply_to(sender: &ClientHandle, name: &str, reply: &Reply) {
    let bytes = match JsonCodec.encode(reply) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(event = %name, error = %e, "reply encode failed");
            return;
        }
    };
    if let Err(e) = sender.try_write(bytes) {
        tracing::debug!(event = %name, error = %e, "reply not delivered");
    }
}
