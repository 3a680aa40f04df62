//! Key names shared by every component that touches the store.

use std::fmt::Display;

/// Counter the next user id is drawn from.
pub const NEXT_USER_ID: &str = "global:nextUserId";

/// Counter the next team id is drawn from.
pub const NEXT_TEAM_ID: &str = "global:nextTeamId";

/// Sorted set of user ids scored by last heartbeat (unix seconds).
pub const CLIENTS: &str = "global:clients";

pub fn team_users(team: impl Display) -> String {
    format!("team:{team}:users")
}

pub fn user_team(user: impl Display) -> String {
    format!("uid:{user}:team")
}

pub fn user_points(user: impl Display) -> String {
    format!("uid:{user}:points")
}

pub fn user_badges(user: impl Display) -> String {
    format!("uid:{user}:badges")
}

pub fn user_name(user: impl Display) -> String {
    format!("uid:{user}:username")
}

pub fn user_shots(user: impl Display) -> String {
    format!("uid:{user}:shotsFired")
}

pub fn user_harvests(user: impl Display) -> String {
    format!("uid:{user}:harvests")
}

/// Reverse index from a username to its user id.
pub fn name_to_user(name: &str) -> String {
    format!("username:{name}:uid")
}

/// Every per-user key removed when a user leaves, except the reverse
/// username index, which needs the name.
pub fn user_keys(user: impl Display) -> [String; 6] {
    [
        user_points(&user),
        user_team(&user),
        user_badges(&user),
        user_name(&user),
        user_shots(&user),
        user_harvests(&user),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(team_users(3), "team:3:users");
        assert_eq!(user_team(7), "uid:7:team");
        assert_eq!(name_to_user("ada"), "username:ada:uid");
        assert_eq!(user_keys(1)[4], "uid:1:shotsFired");
    }
}
