//! The relay's application events.
//!
//! Browsers join, send heartbeats and gestures; the game merges and
//! bursts teams. Each handler decodes its own arguments, so a bad payload
//! only costs that one event.

use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use flux_hub::HubHandle;
use flux_protocol::{
    Coords, JoinRequest, MergeRequest, Notice, Registered, Reply, TeamRef,
    TouchForward, UserRef, event,
};
use flux_store::Store;
use flux_team::{TeamHandle, users};

use crate::dispatcher::{Dispatcher, Event, HandlerResult};

/// Name given to users whose join payload is missing or unreadable.
pub const DEFAULT_USER_NAME: &str = "anonymous";

/// Browser gestures relayed to the game unchanged, as `{name, id}`.
const GESTURES: [&str; 4] = [
    event::USER_TOUCH_END,
    event::USER_BLOAT,
    event::USER_PINCH,
    event::USER_ATTACK,
];

/// Everything a handler can reach.
pub struct Relay<S: Store> {
    pub store: Arc<S>,
    pub teams: TeamHandle,
    /// Where notices for the game are broadcast.
    pub game: HubHandle,
}

impl<S: Store> Clone for Relay<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            teams: self.teams.clone(),
            game: self.game.clone(),
        }
    }
}

/// Current time in unix seconds, the unit of presence scores.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Registers every application handler on `dispatcher`.
pub fn register<S: Store>(dispatcher: &mut Dispatcher, relay: &Relay<S>) {
    route(dispatcher, event::USER_JOIN, relay, join);
    route(dispatcher, event::USER_HEARTBEAT, relay, heartbeat);
    route(dispatcher, event::USER_TOUCH, relay, touch);
    for gesture in GESTURES {
        route(dispatcher, gesture, relay, forward);
    }
    route(dispatcher, event::USER_SHOOT, relay, shoot);
    route(dispatcher, event::COLLECTOR_MERGE, relay, merge);
    route(dispatcher, event::COLLECTOR_BURST, relay, burst);
    route(dispatcher, event::USER_DISCONNECT, relay, disconnect);
}

fn route<S, F, Fut>(dispatcher: &mut Dispatcher, name: &str, relay: &Relay<S>, handler: F)
where
    S: Store,
    F: Fn(Relay<S>, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let relay = relay.clone();
    dispatcher.register(name, move |ev| handler(relay.clone(), ev));
}

/// `user:join`: register the user, seat them, and tell the game.
async fn join<S: Store>(relay: Relay<S>, ev: Event) -> HandlerResult {
    let name = match ev.args::<JoinRequest>() {
        Ok(req) if !req.name.is_empty() => req.name,
        Ok(_) => DEFAULT_USER_NAME.to_string(),
        Err(e) => {
            tracing::warn!(client = %ev.sender.id(), error = %e, "unreadable join payload, using default name");
            DEFAULT_USER_NAME.to_string()
        }
    };

    let id = users::register_user(relay.store.as_ref(), &name, unix_now()).await?;
    relay.game.broadcast(&Notice::new(event::USER_JOIN, id)).await?;
    let team_id = relay.teams.join(id, name, ev.sender.clone()).await?;

    Ok(Some(Reply::new(
        event::SERVER_CREATE_ID,
        Registered { id, team_id },
    )?))
}

async fn heartbeat<S: Store>(relay: Relay<S>, ev: Event) -> HandlerResult {
    let user: UserRef = ev.args()?;
    users::touch_presence(relay.store.as_ref(), user.id, unix_now()).await?;
    Ok(None)
}

async fn touch<S: Store>(relay: Relay<S>, ev: Event) -> HandlerResult {
    let pos: Coords = ev.args()?;
    relay.game.broadcast(&TouchForward::from(pos)).await?;
    Ok(None)
}

async fn forward<S: Store>(relay: Relay<S>, ev: Event) -> HandlerResult {
    let user: UserRef = ev.args()?;
    relay.game.broadcast(&Notice::new(ev.name, user.id)).await?;
    Ok(None)
}

async fn shoot<S: Store>(relay: Relay<S>, ev: Event) -> HandlerResult {
    let user: UserRef = ev.args()?;
    users::record_shot(relay.store.as_ref(), user.id).await?;
    Ok(None)
}

/// `collector:merge` from the game: fold `team_2` into `team_1`.
async fn merge<S: Store>(relay: Relay<S>, ev: Event) -> HandlerResult {
    let req: MergeRequest = ev.args()?;
    relay.teams.merge(req.team_1, req.team_2).await?;
    Ok(None)
}

/// `collector:burst` from the game: the team broke apart.
async fn burst<S: Store>(relay: Relay<S>, ev: Event) -> HandlerResult {
    let team: TeamRef = ev.args()?;
    relay.teams.return_to_queue(team.id).await?;
    Ok(None)
}

async fn disconnect<S: Store>(relay: Relay<S>, ev: Event) -> HandlerResult {
    if let Some(user) = relay.teams.leave(ev.sender.id()).await? {
        tracing::info!(user_id = %user, client = %ev.sender.id(), "user disconnected");
    }
    Ok(None)
}
