//! Hub actor: an isolated Tokio task that owns one client set.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flux_protocol::{WireEncode, WireFormat};
use flux_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::{ClientHandle, HubConfig, HubError, Outbox};

/// A message encoded once per format, ready to fan out.
///
/// A format whose encoding failed is `None`; its clients are skipped.
#[derive(Debug, Clone, Default)]
struct Frames {
    json: Option<Vec<u8>>,
    delimited: Option<Vec<u8>>,
}

impl Frames {
    fn encode<T: WireEncode + ?Sized>(hub: &'static str, value: &T) -> Self {
        let encode = |format: WireFormat| match format.encode(value) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(hub, ?format, error = %e, "broadcast encode failed");
                None
            }
        };
        Self {
            json: encode(WireFormat::Json),
            delimited: encode(WireFormat::Delimited),
        }
    }

    fn for_format(&self, format: WireFormat) -> Option<&Vec<u8>> {
        match format {
            WireFormat::Json => self.json.as_ref(),
            WireFormat::Delimited => self.delimited.as_ref(),
        }
    }
}

/// Commands sent to a hub actor through its mailbox.
enum HubCommand {
    Register(ClientHandle),
    Unregister(ConnectionId),
    Broadcast(Frames),
}

/// Handle to a running hub. Cheap to clone.
#[derive(Clone)]
pub struct HubHandle {
    name: &'static str,
    format: WireFormat,
    outbox_capacity: usize,
    sender: mpsc::Sender<HubCommand>,
    count: Arc<AtomicUsize>,
}

impl HubHandle {
    /// The label this hub logs under, e.g. `"web"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The format of this hub's population.
    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Creates a client handle for a new connection of this population.
    ///
    /// The client is not registered until [`register`](Self::register).
    pub fn open_client(&self, id: ConnectionId) -> (ClientHandle, Outbox) {
        ClientHandle::new(id, self.format, self.outbox_capacity)
    }

    /// Adds a client. Registering a client twice is a no-op.
    pub async fn register(&self, client: ClientHandle) -> Result<(), HubError> {
        self.send(HubCommand::Register(client)).await
    }

    /// Removes and closes a client, if present.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister(id)).await
    }

    /// Delivers `value` to every registered client in its own format.
    ///
    /// Clients whose queue is full or closed are removed and closed. Those
    /// failures never reach the caller; the only error is a stopped hub.
    pub async fn broadcast<T: WireEncode + ?Sized>(
        &self,
        value: &T,
    ) -> Result<(), HubError> {
        let frames = Frames::encode(self.name, value);
        self.send(HubCommand::Broadcast(frames)).await
    }

    /// Number of registered clients as of the last processed command.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), HubError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| HubError::Unavailable(self.name))
    }
}

/// The internal hub state. Runs inside a Tokio task.
struct HubActor {
    name: &'static str,
    clients: HashMap<ConnectionId, ClientHandle>,
    count: Arc<AtomicUsize>,
    receiver: mpsc::Receiver<HubCommand>,
}

impl HubActor {
    async fn run(mut self) {
        tracing::info!(hub = self.name, "hub started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                HubCommand::Register(client) => self.handle_register(client),
                HubCommand::Unregister(id) => self.handle_unregister(id),
                HubCommand::Broadcast(frames) => self.handle_broadcast(&frames),
            }
        }

        for client in self.clients.values() {
            client.close();
        }
        tracing::info!(hub = self.name, "hub stopped");
    }

    fn handle_register(&mut self, client: ClientHandle) {
        let id = client.id();
        if self.clients.contains_key(&id) {
            return;
        }
        self.clients.insert(id, client);
        self.sync_count();
        tracing::debug!(hub = self.name, %id, clients = self.clients.len(), "client registered");
    }

    fn handle_unregister(&mut self, id: ConnectionId) {
        if let Some(client) = self.clients.remove(&id) {
            self.sync_count();
            client.close();
            tracing::debug!(hub = self.name, %id, clients = self.clients.len(), "client unregistered");
        }
    }

    fn handle_broadcast(&mut self, frames: &Frames) {
        let mut dead = Vec::new();
        for (id, client) in &self.clients {
            let Some(bytes) = frames.for_format(client.format()) else {
                continue;
            };
            if let Err(e) = client.try_write(bytes.clone()) {
                tracing::debug!(hub = self.name, %id, error = %e, "dropping client");
                dead.push(*id);
            }
        }

        for id in dead {
            if let Some(client) = self.clients.remove(&id) {
                self.sync_count();
                client.close();
            }
        }
    }

    fn sync_count(&self) {
        self.count.store(self.clients.len(), Ordering::SeqCst);
    }
}

/// Spawns a hub actor for one client population and returns its handle.
pub fn spawn_hub(
    name: &'static str,
    format: WireFormat,
    config: &HubConfig,
) -> HubHandle {
    let (tx, rx) = mpsc::channel(config.mailbox.max(1));
    let count = Arc::new(AtomicUsize::new(0));

    let actor = HubActor {
        name,
        clients: HashMap::new(),
        count: Arc::clone(&count),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    HubHandle {
        name,
        format,
        outbox_capacity: config.outbox_capacity,
        sender: tx,
        count,
    }
}
