//! `FluxServer` builder and server loop.
//!
//! This is the entry point for running a relay. It ties together all the
//! layers: transports → dispatcher → handlers → team engine → hubs.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use flux_hub::{HubConfig, HubHandle, spawn_hub};
use flux_protocol::WireFormat;
use flux_store::{MemoryStore, Store};
use flux_team::{TeamConfig, TeamHandle, spawn_team_engine};
use flux_transport::{TcpTransport, Transport, WebSocketTransport};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::connection::serve_connection;
use crate::dispatcher::{Dispatcher, Packet};
use crate::handlers::{self, Relay, unix_now};
use crate::{FluxError, RelayConfig};

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,no_run
/// use flux::prelude::*;
///
/// # async fn start() -> Result<(), FluxError> {
/// let server = FluxServer::builder()
///     .web_addr("0.0.0.0:8080")
///     .game_addr("0.0.0.0:8100")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FluxServerBuilder {
    config: RelayConfig,
}

impl FluxServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address browsers connect to.
    pub fn web_addr(mut self, addr: &str) -> Self {
        self.config.web_addr = addr.to_string();
        self
    }

    /// Sets the address game clients connect to.
    pub fn game_addr(mut self, addr: &str) -> Self {
        self.config.game_addr = addr.to_string();
        self
    }

    pub fn team_config(mut self, config: TeamConfig) -> Self {
        self.config.team = config;
        self
    }

    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.config.hub = config;
        self
    }

    /// Binds both listeners and starts the relay's tasks, backed by a
    /// fresh [`MemoryStore`].
    pub async fn build(self) -> Result<FluxServer<MemoryStore>, FluxError> {
        self.build_with_store(MemoryStore::new()).await
    }

    /// Like [`build`](Self::build), with a caller-supplied store.
    pub async fn build_with_store<S: Store>(
        self,
        store: S,
    ) -> Result<FluxServer<S>, FluxError> {
        let config = self.config;
        let web_transport = WebSocketTransport::bind(&config.web_addr).await?;
        let game_transport = TcpTransport::bind(&config.game_addr).await?;

        let store = Arc::new(store);
        let web = spawn_hub("web", WireFormat::Json, &config.hub);
        let game = spawn_hub("game", WireFormat::Delimited, &config.hub);
        let teams = spawn_team_engine(
            config.team.clone(),
            Arc::clone(&store),
            game.clone(),
        );

        let mut dispatcher = Dispatcher::new();
        let relay = Relay {
            store: Arc::clone(&store),
            teams: teams.clone(),
            game: game.clone(),
        };
        handlers::register(&mut dispatcher, &relay);

        let (inbound, rx) = mpsc::channel(config.dispatch_queue.max(1));
        tokio::spawn(dispatcher.run(rx));

        tracing::info!(
            web = %web_transport.local_addr()?,
            game = %game_transport.local_addr()?,
            "relay listening"
        );

        Ok(FluxServer {
            config,
            web_transport,
            game_transport,
            store,
            web,
            game,
            teams,
            inbound,
        })
    }
}

/// A relay with both listeners bound.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct FluxServer<S: Store = MemoryStore> {
    config: RelayConfig,
    web_transport: WebSocketTransport,
    game_transport: TcpTransport,
    store: Arc<S>,
    web: HubHandle,
    game: HubHandle,
    teams: TeamHandle,
    inbound: mpsc::Sender<Packet>,
}

impl FluxServer {
    /// Creates a new builder.
    pub fn builder() -> FluxServerBuilder {
        FluxServerBuilder::new()
    }
}

impl<S: Store> FluxServer<S> {
    /// The address the WebSocket listener is bound to.
    pub fn web_addr(&self) -> std::io::Result<SocketAddr> {
        self.web_transport.local_addr()
    }

    /// The address the TCP listener is bound to.
    pub fn game_addr(&self) -> std::io::Result<SocketAddr> {
        self.game_transport.local_addr()
    }

    pub fn web_hub(&self) -> &HubHandle {
        &self.web
    }

    pub fn game_hub(&self) -> &HubHandle {
        &self.game
    }

    pub fn teams(&self) -> &TeamHandle {
        &self.teams
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Runs both accept loops and the periodic passes.
    ///
    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), FluxError> {
        tracing::info!("Flux relay running");

        let team = &self.config.team;
        let teams = self.teams.clone();
        spawn_every("presence sweep", team.sweep_interval, move || {
            let teams = teams.clone();
            async move {
                teams.sweep_expired(unix_now()).await.map(|_| ())
            }
        });

        let teams = self.teams.clone();
        spawn_every("analytics", team.analytics_interval, move || {
            let teams = teams.clone();
            async move { teams.analytics().await.map(|_| ()) }
        });

        let (teams, web, game) =
            (self.teams.clone(), self.web.clone(), self.game.clone());
        spawn_every("stats", self.config.stats_interval, move || {
            let (teams, web, game) = (teams.clone(), web.clone(), game.clone());
            async move {
                let stats = teams.stats().await?;
                tracing::info!(
                    web = web.count(),
                    game = game.count(),
                    teams = stats.team_count(),
                    members = stats.member_count(),
                    "relay stats"
                );
                Ok(())
            }
        });

        tokio::join!(
            accept_loop(self.web_transport, self.web, self.inbound.clone()),
            accept_loop(self.game_transport, self.game, self.inbound),
        );
        Ok(())
    }
}

/// Pause after a failed accept, so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections forever, spawning a pump pair for each.
async fn accept_loop<T: Transport>(
    mut transport: T,
    hub: HubHandle,
    inbound: mpsc::Sender<Packet>,
) {
    loop {
        match transport.accept().await {
            Ok(conn) => {
                tokio::spawn(serve_connection(conn, hub.clone(), inbound.clone()));
            }
            Err(e) => {
                tracing::error!(hub = hub.name(), error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Runs `pass` every `period`, starting one period from now. Stops when a
/// pass fails, which only happens once the team engine is gone.
fn spawn_every<F, Fut>(name: &'static str, period: Duration, pass: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), flux_team::TeamError>> + Send + 'static,
{
    if period.is_zero() {
        tracing::warn!(pass = name, "zero interval, periodic pass disabled");
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = pass().await {
                tracing::warn!(pass = name, error = %e, "periodic pass stopped");
                break;
            }
        }
    });
}
