//! Team engine: the actor that owns the roster.
//!
//! Every roster mutation is a command processed one at a time from the
//! engine's mailbox, so placements and evictions never interleave.
//! Side effects fan out through the game hub; the only direct writes are
//! the `user:newTeam` replies to members that changed team.

use flux_hub::{ClientHandle, HubHandle};
use flux_protocol::{
    Badge, BadgeAwarded, Codec, Color, JsonCodec, Notice, Reply, TeamChanged,
    TeamCreated, TeamId, UserId, WireEncode, event,
};
use flux_store::{Store, StoreResult, keys};
use flux_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::roster::{Member, Roster, Team, User};
use crate::{PALETTE, TeamConfig, TeamError};

/// Commands sent to the engine through its mailbox.
///
/// Every variant carries a reply channel so callers, tests included, can
/// observe the outcome after the roster and store have been updated.
pub(crate) enum TeamCommand {
    Join {
        user: User,
        client: ClientHandle,
        reply: oneshot::Sender<Result<TeamId, TeamError>>,
    },
    Leave {
        client: ConnectionId,
        reply: oneshot::Sender<Option<UserId>>,
    },
    Merge {
        into: TeamId,
        from: TeamId,
        reply: oneshot::Sender<Result<(), TeamError>>,
    },
    ReturnToQueue {
        team: TeamId,
        reply: oneshot::Sender<Result<Vec<(UserId, TeamId)>, TeamError>>,
    },
    SweepExpired {
        now: i64,
        reply: oneshot::Sender<Vec<UserId>>,
    },
    Analytics {
        reply: oneshot::Sender<Vec<UserId>>,
    },
    Stats {
        reply: oneshot::Sender<TeamStats>,
    },
}

/// A snapshot of one team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSummary {
    pub id: TeamId,
    pub color: Color,
    pub members: Vec<UserId>,
}

/// A snapshot of the whole roster, in team id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamStats {
    pub teams: Vec<TeamSummary>,
}

impl TeamStats {
    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    pub fn member_count(&self) -> usize {
        self.teams.iter().map(|t| t.members.len()).sum()
    }

    pub fn team(&self, id: TeamId) -> Option<&TeamSummary> {
        self.teams.iter().find(|t| t.id == id)
    }
}

/// Handle to the running team engine. Cheap to clone.
#[derive(Clone)]
pub struct TeamHandle {
    sender: mpsc::Sender<TeamCommand>,
}

impl TeamHandle {
    /// Seats a registered user on a team and returns the team's id.
    ///
    /// Resolves after the roster and the store reflect the placement.
    pub async fn join(
        &self,
        id: UserId,
        name: impl Into<String>,
        client: ClientHandle,
    ) -> Result<TeamId, TeamError> {
        let user = User::new(id, name);
        self.ask(|reply| TeamCommand::Join { user, client, reply })
            .await?
    }

    /// Removes whichever member is reached through `client`.
    ///
    /// Returns the removed user, or `None` if the connection never
    /// joined.
    pub async fn leave(
        &self,
        client: ConnectionId,
    ) -> Result<Option<UserId>, TeamError> {
        self.ask(|reply| TeamCommand::Leave { client, reply }).await
    }

    /// Moves every member of `from` into `into`.
    pub async fn merge(
        &self,
        into: TeamId,
        from: TeamId,
    ) -> Result<(), TeamError> {
        self.ask(|reply| TeamCommand::Merge { into, from, reply })
            .await?
    }

    /// Dissolves `team` and places each of its members again.
    ///
    /// Returns each member's new team.
    pub async fn return_to_queue(
        &self,
        team: TeamId,
    ) -> Result<Vec<(UserId, TeamId)>, TeamError> {
        self.ask(|reply| TeamCommand::ReturnToQueue { team, reply })
            .await?
    }

    /// Evicts users whose last heartbeat is outside the presence window
    /// as of `now` (unix seconds).
    pub async fn sweep_expired(
        &self,
        now: i64,
    ) -> Result<Vec<UserId>, TeamError> {
        self.ask(|reply| TeamCommand::SweepExpired { now, reply })
            .await
    }

    /// Awards shot badges and resets shot counters.
    pub async fn analytics(&self) -> Result<Vec<UserId>, TeamError> {
        self.ask(|reply| TeamCommand::Analytics { reply }).await
    }

    pub async fn stats(&self) -> Result<TeamStats, TeamError> {
        self.ask(|reply| TeamCommand::Stats { reply }).await
    }

    async fn ask<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> TeamCommand,
    ) -> Result<T, TeamError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| TeamError::Unavailable)?;
        reply_rx.await.map_err(|_| TeamError::Unavailable)
    }
}

/// Logs a failed store call and converts it to an `Option`.
///
/// Store failures never roll back roster changes that already happened.
fn logged<T>(op: &'static str, result: StoreResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(op, error = %e, "store operation failed");
            None
        }
    }
}

/// The internal engine state. Runs inside a Tokio task.
struct TeamEngine<S: Store> {
    config: TeamConfig,
    roster: Roster,
    store: S,
    game: HubHandle,
    next_color: usize,
    receiver: mpsc::Receiver<TeamCommand>,
}

impl<S: Store> TeamEngine<S> {
    async fn run(mut self) {
        tracing::info!("team engine started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                TeamCommand::Join {
                    user,
                    client,
                    reply,
                } => {
                    self.release_connection(client.id()).await;
                    let result = self.place(Member { user, client }).await;
                    let _ = reply.send(result);
                }
                TeamCommand::Leave { client, reply } => {
                    let result = self.handle_leave(client).await;
                    let _ = reply.send(result);
                }
                TeamCommand::Merge { into, from, reply } => {
                    let result = self.handle_merge(into, from).await;
                    let _ = reply.send(result);
                }
                TeamCommand::ReturnToQueue { team, reply } => {
                    let result = self.handle_return_to_queue(team).await;
                    let _ = reply.send(result);
                }
                TeamCommand::SweepExpired { now, reply } => {
                    let result = self.handle_sweep(now).await;
                    let _ = reply.send(result);
                }
                TeamCommand::Analytics { reply } => {
                    let result = self.handle_analytics().await;
                    let _ = reply.send(result);
                }
                TeamCommand::Stats { reply } => {
                    let _ = reply.send(self.stats());
                }
            }
        }

        tracing::info!("team engine stopped");
    }

    // -- placement ---------------------------------------------------------

    /// Seats `member` on a new team or on the smallest existing one.
    async fn place(&mut self, mut member: Member) -> Result<TeamId, TeamError> {
        let team_id = match self.roster.smallest_team() {
            Some(id) if !self.roster.needs_new_team() => id,
            _ => self.create_team().await?,
        };

        let user_id = member.user.id;
        member.user.team_id = team_id;
        let team = self
            .roster
            .get_mut(team_id)
            .ok_or(TeamError::NotFound(team_id))?;
        team.members.push(member);
        let size = team.len();

        logged(
            "sadd",
            self.store
                .sadd(&keys::team_users(team_id), &user_id.0.to_string())
                .await,
        );
        logged(
            "set",
            self.store
                .set(&keys::user_team(user_id), &team_id.0.to_string())
                .await,
        );

        tracing::info!(%user_id, %team_id, size, "member placed");
        self.check_population(team_id).await;
        Ok(team_id)
    }

    async fn create_team(&mut self) -> Result<TeamId, TeamError> {
        let id = TeamId(self.store.incr(keys::NEXT_TEAM_ID).await? - 1);
        let color = PALETTE[self.next_color % PALETTE.len()];
        self.next_color += 1;

        self.roster.insert(Team::new(id, color));
        self.broadcast(&TeamCreated::new(id, color)).await;
        tracing::info!(team_id = %id, teams = self.roster.len(), "team created");
        Ok(id)
    }

    /// Deletes a team's set and roster entry and tells the game.
    async fn destroy_team(&mut self, id: TeamId) -> Option<Team> {
        logged("del", self.store.del(&keys::team_users(id)).await);
        let team = self.roster.remove(id)?;
        self.broadcast(&Notice::new(event::COLLECTOR_DESTROY, id))
            .await;
        tracing::info!(team_id = %id, teams = self.roster.len(), "team destroyed");
        Some(team)
    }

    // -- removal -----------------------------------------------------------

    async fn handle_leave(&mut self, client: ConnectionId) -> Option<UserId> {
        let Some((team_id, index)) = self.roster.find_connection(client) else {
            tracing::debug!(%client, "leave for unseated connection");
            return None;
        };
        self.evict(team_id, index).await
    }

    /// Evicts whoever is currently seated through `client`, so a
    /// connection never holds more than one seat.
    async fn release_connection(&mut self, client: ConnectionId) {
        if let Some((team_id, index)) = self.roster.find_connection(client) {
            tracing::warn!(%client, %team_id, "connection joined again, replacing its member");
            self.evict(team_id, index).await;
        }
    }

    /// Removes the member at `index` of `team_id` and everything durable
    /// about them.
    async fn evict(&mut self, team_id: TeamId, index: usize) -> Option<UserId> {
        let member = self.roster.take_member(team_id, index)?;
        let user = member.user;

        self.remove_user_keys(&user).await;
        logged(
            "srem",
            self.store
                .srem(&keys::team_users(team_id), &user.id.0.to_string())
                .await,
        );

        if self.roster.get(team_id).is_some_and(Team::is_empty) {
            self.destroy_team(team_id).await;
        }

        self.broadcast(&Notice::new(event::USER_DISCONNECT, user.id))
            .await;
        tracing::info!(user_id = %user.id, %team_id, "member removed");
        Some(user.id)
    }

    async fn remove_user_keys(&self, user: &User) {
        logged(
            "zrem",
            self.store
                .zrem(keys::CLIENTS, &user.id.0.to_string())
                .await,
        );
        for key in keys::user_keys(user.id) {
            logged("del", self.store.del(&key).await);
        }
        logged("del", self.store.del(&keys::name_to_user(&user.name)).await);
    }

    // -- merge and requeue -------------------------------------------------

    async fn handle_merge(
        &mut self,
        into: TeamId,
        from: TeamId,
    ) -> Result<(), TeamError> {
        if into == from {
            tracing::warn!(team_id = %into, "merge of a team with itself");
            return Err(TeamError::SameTeam(into));
        }
        for id in [into, from] {
            if self.roster.get(id).is_none() {
                tracing::warn!(team_id = %id, "merge with unknown team");
                return Err(TeamError::NotFound(id));
            }
        }

        let into_key = keys::team_users(into);
        let from_key = keys::team_users(from);
        logged(
            "sunionstore",
            self.store
                .sunionstore(&into_key, &[into_key.as_str(), from_key.as_str()])
                .await,
        );

        let absorbed = self.roster.remove(from).ok_or(TeamError::NotFound(from))?;
        logged("del", self.store.del(&from_key).await);

        let mut moved = Vec::with_capacity(absorbed.members.len());
        for mut member in absorbed.members {
            member.user.team_id = into;
            logged(
                "set",
                self.store
                    .set(&keys::user_team(member.user.id), &into.0.to_string())
                    .await,
            );
            self.notify_team_change(&member, into).await;
            moved.push(member);
        }

        let team = self.roster.get_mut(into).ok_or(TeamError::NotFound(into))?;
        team.members.extend(moved);
        let users = team.user_ids();

        tracing::info!(%into, %from, size = users.len(), "teams merged");
        for user in users {
            self.award(user, Badge::FirstMerge).await;
        }
        self.check_population(into).await;
        Ok(())
    }

    async fn handle_return_to_queue(
        &mut self,
        team: TeamId,
    ) -> Result<Vec<(UserId, TeamId)>, TeamError> {
        let Some(old) = self.destroy_team(team).await else {
            return Err(TeamError::NotFound(team));
        };

        let mut placed = Vec::with_capacity(old.members.len());
        for member in old.members {
            let user_id = member.user.id;
            let client = member.client.clone();
            match self.place(member).await {
                Ok(new_team) => {
                    self.notify_team_change_to(user_id, &client, new_team)
                        .await;
                    placed.push((user_id, new_team));
                }
                Err(e) => {
                    tracing::error!(%user_id, error = %e, "requeue failed");
                }
            }
        }
        Ok(placed)
    }

    async fn notify_team_change(&self, member: &Member, team: TeamId) {
        self.notify_team_change_to(member.user.id, &member.client, team)
            .await;
    }

    /// Tells the game about the move and the member's own client about
    /// its new team.
    async fn notify_team_change_to(
        &self,
        user: UserId,
        client: &ClientHandle,
        team: TeamId,
    ) {
        self.broadcast(&TeamChanged::new(user, team)).await;

        let bytes = match Reply::new(event::USER_NEW_TEAM, team)
            .and_then(|reply| JsonCodec.encode(&reply))
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%user, error = %e, "team change reply encode failed");
                return;
            }
        };
        if let Err(e) = client.try_write(bytes) {
            tracing::debug!(%user, error = %e, "team change reply not delivered");
        }
    }

    // -- periodic passes ---------------------------------------------------

    async fn handle_sweep(&mut self, now: i64) -> Vec<UserId> {
        let window = i64::try_from(self.config.presence_window.as_secs())
            .unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(window);

        let Some(stale) = logged(
            "zrangebyscore",
            self.store
                .zrangebyscore(keys::CLIENTS, i64::MIN, cutoff)
                .await,
        ) else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        for raw in stale {
            logged("zrem", self.store.zrem(keys::CLIENTS, &raw).await);

            let Ok(user) = raw.parse().map(UserId) else {
                tracing::warn!(member = %raw, "presence entry is not a user id");
                continue;
            };
            let team = logged("get", self.store.get(&keys::user_team(user)).await)
                .flatten()
                .and_then(|t| t.parse().ok())
                .map(TeamId);
            let Some(team) = team else {
                tracing::warn!(user_id = %user, "expired user has no team");
                continue;
            };
            let Some(index) =
                self.roster.get(team).and_then(|t| t.position_of(user))
            else {
                tracing::warn!(user_id = %user, team_id = %team, "expired user not on team");
                continue;
            };

            if let Some(id) = self.evict(team, index).await {
                evicted.push(id);
            }
        }

        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "expired users evicted");
        }
        evicted
    }

    async fn handle_analytics(&mut self) -> Vec<UserId> {
        let users: Vec<UserId> =
            self.roster.teams().flat_map(Team::user_ids).collect();

        let mut awarded = Vec::new();
        for user in users {
            let key = keys::user_shots(user);
            let Some(Some(shots)) = logged("get", self.store.get(&key).await)
            else {
                continue;
            };
            if shots.parse::<i64>().unwrap_or(0) > 2 {
                self.award(user, Badge::TriggerHappy).await;
                awarded.push(user);
            }
            logged("del", self.store.del(&key).await);
        }
        awarded
    }

    // -- badges ------------------------------------------------------------

    /// Awards the population badge to every member once `team` is large
    /// enough.
    async fn check_population(&self, team: TeamId) {
        let Some(team) = self.roster.get(team) else {
            return;
        };
        if team.len() < self.config.badge_threshold {
            return;
        }
        for user in team.user_ids() {
            self.award(user, Badge::TheOcho).await;
        }
    }

    /// Records `badge` for `user` and announces it the first time only.
    async fn award(&self, user: UserId, badge: Badge) {
        let added = logged(
            "sadd",
            self.store
                .sadd(&keys::user_badges(user), badge.as_str())
                .await,
        );
        if added == Some(true) {
            tracing::info!(user_id = %user, %badge, "badge awarded");
            self.broadcast(&BadgeAwarded::new(badge, user)).await;
        }
    }

    // -- misc --------------------------------------------------------------

    async fn broadcast<T: WireEncode + Sync + ?Sized>(&self, value: &T) {
        if let Err(e) = self.game.broadcast(value).await {
            tracing::warn!(error = %e, "game hub broadcast failed");
        }
    }

    fn stats(&self) -> TeamStats {
        TeamStats {
            teams: self
                .roster
                .teams()
                .map(|t| TeamSummary {
                    id: t.id,
                    color: t.color,
                    members: t.user_ids(),
                })
                .collect(),
        }
    }
}

/// Spawns the team engine and returns a handle to it.
///
/// `game` is the hub notices are broadcast to.
pub fn spawn_team_engine<S: Store>(
    config: TeamConfig,
    store: S,
    game: HubHandle,
) -> TeamHandle {
    let (tx, rx) = mpsc::channel(config.mailbox.max(1));

    let engine = TeamEngine {
        config,
        roster: Roster::new(),
        store,
        game,
        next_color: 0,
        receiver: rx,
    };

    tokio::spawn(engine.run());

    TeamHandle { sender: tx }
}
