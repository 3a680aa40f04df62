//! The roster: every team and every member, in memory.
//!
//! This is plain data with no I/O. The engine task owns the only
//! instance, so nothing here is synchronized.

use std::collections::BTreeMap;

use flux_hub::ClientHandle;
use flux_protocol::{Color, TeamId, UserId};
use flux_transport::ConnectionId;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub team_id: TeamId,
    pub points: i64,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            team_id: TeamId::default(),
            points: 0,
        }
    }
}

/// A user seated on a team, together with the connection that reaches it.
#[derive(Debug, Clone)]
pub struct Member {
    pub user: User,
    pub client: ClientHandle,
}

/// A team ("collector").
#[derive(Debug, Clone)]
pub struct Team {
    pub id: TeamId,
    pub color: Color,
    pub members: Vec<Member>,
}

impl Team {
    pub fn new(id: TeamId, color: Color) -> Self {
        Self {
            id,
            color,
            members: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Position of `user` in this team, if seated here.
    pub fn position_of(&self, user: UserId) -> Option<usize> {
        self.members.iter().position(|m| m.user.id == user)
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.members.iter().map(|m| m.user.id).collect()
    }
}

/// Team id → team, iterated in id order.
#[derive(Debug, Default)]
pub struct Roster {
    teams: BTreeMap<TeamId, Team>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of teams.
    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Members across all teams.
    pub fn member_count(&self) -> usize {
        self.teams.values().map(Team::len).sum()
    }

    /// `ceil(sqrt(members))`, never less than 1.
    pub fn max_teams(&self) -> usize {
        let members = self.member_count() as f64;
        (members.sqrt().ceil() as usize).max(1)
    }

    /// Whether the next placement should open a new team.
    pub fn needs_new_team(&self) -> bool {
        self.len() < self.max_teams()
    }

    /// The team with the fewest members; ties go to the lowest id.
    pub fn smallest_team(&self) -> Option<TeamId> {
        // `min_by_key` keeps the first minimum, and the map iterates in
        // id order.
        self.teams.values().min_by_key(|t| t.len()).map(|t| t.id)
    }

    pub fn get(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    pub fn get_mut(&mut self, id: TeamId) -> Option<&mut Team> {
        self.teams.get_mut(&id)
    }

    pub fn insert(&mut self, team: Team) {
        self.teams.insert(team.id, team);
    }

    pub fn remove(&mut self, id: TeamId) -> Option<Team> {
        self.teams.remove(&id)
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    /// Locates the member reached through `conn`.
    pub fn find_connection(&self, conn: ConnectionId) -> Option<(TeamId, usize)> {
        self.teams.values().find_map(|team| {
            team.members
                .iter()
                .position(|m| m.client.id() == conn)
                .map(|index| (team.id, index))
        })
    }

    /// Removes the member at `index` by swapping the last member into its
    /// slot. Order within a team is not preserved.
    pub fn take_member(&mut self, team: TeamId, index: usize) -> Option<Member> {
        let team = self.teams.get_mut(&team)?;
        if index >= team.members.len() {
            return None;
        }
        Some(team.members.swap_remove(index))
    }
}
