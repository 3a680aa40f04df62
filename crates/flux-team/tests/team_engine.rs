//! Integration tests for the team engine against a live game hub and an
//! in-memory store.

use std::time::Duration;

use flux_hub::{ClientHandle, HubConfig, HubHandle, Outbox, spawn_hub};
use flux_protocol::{Color, TeamId, UserId, WireFormat};
use flux_store::{MemoryStore, Store, keys};
use flux_team::{TeamConfig, TeamHandle, spawn_team_engine, users};
use flux_transport::ConnectionId;

struct Fixture {
    teams: TeamHandle,
    store: MemoryStore,
    game_out: Outbox,
    _game: HubHandle,
}

async fn fixture(config: TeamConfig) -> Fixture {
    let game = spawn_hub("game", WireFormat::Delimited, &HubConfig::default());
    let (listener, game_out) =
        ClientHandle::new(ConnectionId::next(), WireFormat::Delimited, 1024);
    game.register(listener).await.unwrap();

    let store = MemoryStore::new();
    let teams = spawn_team_engine(config, store.clone(), game.clone());
    Fixture {
        teams,
        store,
        game_out,
        _game: game,
    }
}

/// Registers and seats a browser user; returns its id, team and outbox.
async fn join(fx: &Fixture, name: &str) -> (UserId, TeamId, ClientHandle, Outbox) {
    let id = users::register_user(&fx.store, name, 100).await.unwrap();
    let (client, outbox) =
        ClientHandle::new(ConnectionId::next(), WireFormat::Json, 64);
    let team = fx.teams.join(id, name, client.clone()).await.unwrap();
    (id, team, client, outbox)
}

/// Collects every message that arrives within a short quiet period.
async fn drain(outbox: &mut Outbox) -> Vec<String> {
    let mut seen = Vec::new();
    while let Ok(Some(bytes)) =
        tokio::time::timeout(Duration::from_millis(50), outbox.next()).await
    {
        seen.push(String::from_utf8(bytes).unwrap());
    }
    seen
}

#[tokio::test]
async fn test_team_count_tracks_square_root_of_members() {
    let fx = fixture(TeamConfig::default()).await;

    for (users, teams) in [(1, 1), (4, 2), (9, 3)] {
        while fx.teams.stats().await.unwrap().member_count() < users {
            let n = fx.teams.stats().await.unwrap().member_count();
            join(&fx, &format!("user{n}")).await;
        }
        let stats = fx.teams.stats().await.unwrap();
        assert_eq!(stats.team_count(), teams, "with {users} users");
    }

    // Balanced: no team is more than one member larger than another.
    let stats = fx.teams.stats().await.unwrap();
    let sizes: Vec<usize> = stats.teams.iter().map(|t| t.members.len()).collect();
    assert_eq!(sizes, vec![3, 3, 3]);
}

#[tokio::test]
async fn test_first_join_creates_red_team_zero() {
    let mut fx = fixture(TeamConfig::default()).await;
    let (user, team, _client, _out) = join(&fx, "ada").await;

    assert_eq!(user, UserId(0));
    assert_eq!(team, TeamId(0));
    let stats = fx.teams.stats().await.unwrap();
    assert_eq!(stats.team(TeamId(0)).unwrap().color, Color::RED);

    let game = drain(&mut fx.game_out).await;
    assert_eq!(game, vec!["/name=collector:new/id=0/r=255/g=0/b=0$"]);

    assert_eq!(
        fx.store.smembers(&keys::team_users(0)).await.unwrap(),
        vec!["0"]
    );
    assert_eq!(
        fx.store.get(&keys::user_team(0)).await.unwrap().as_deref(),
        Some("0")
    );
}

#[tokio::test]
async fn test_leave_destroys_empty_team_and_clears_keys() {
    let mut fx = fixture(TeamConfig::default()).await;
    let (user, _team, client, _out) = join(&fx, "ada").await;
    drain(&mut fx.game_out).await;

    let removed = fx.teams.leave(client.id()).await.unwrap();
    assert_eq!(removed, Some(user));

    let game = drain(&mut fx.game_out).await;
    assert_eq!(
        game,
        vec![
            "/name=collector:destroy/id=0$",
            "/name=user:disconnect/id=0$",
        ]
    );
    assert_eq!(fx.teams.stats().await.unwrap().team_count(), 0);
    assert!(fx.store.get(&keys::user_name(0)).await.unwrap().is_none());
    assert!(fx.store.get(&keys::name_to_user("ada")).await.unwrap().is_none());
    assert!(fx.store.smembers(&keys::team_users(0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_leave_keeps_other_members_seated() {
    let fx = fixture(TeamConfig::default()).await;
    let (_a, team, client_a, _oa) = join(&fx, "ada").await;
    let (b, team_b, _client_b, _ob) = join(&fx, "bob").await;
    assert_eq!(team, team_b);

    fx.teams.leave(client_a.id()).await.unwrap();

    let stats = fx.teams.stats().await.unwrap();
    assert_eq!(stats.team(team).unwrap().members, vec![b]);
}

#[tokio::test]
async fn test_leave_unknown_connection_is_noop() {
    let fx = fixture(TeamConfig::default()).await;
    join(&fx, "ada").await;

    let removed = fx.teams.leave(ConnectionId::new(u64::MAX)).await.unwrap();
    assert_eq!(removed, None);
    assert_eq!(fx.teams.stats().await.unwrap().member_count(), 1);
}

#[tokio::test]
async fn test_merge_moves_members_and_notifies_them() {
    let mut fx = fixture(TeamConfig::default()).await;
    // Three users: teams 0 and 1 exist after the third join.
    let (_a, t0, _ca, _oa) = join(&fx, "ada").await;
    let (_b, _, _cb, _ob) = join(&fx, "bob").await;
    let (c, t1, _cc, mut out_c) = join(&fx, "cyd").await;
    assert_ne!(t0, t1);
    drain(&mut fx.game_out).await;

    fx.teams.merge(t0, t1).await.unwrap();

    let stats = fx.teams.stats().await.unwrap();
    assert_eq!(stats.team_count(), 1);
    assert_eq!(stats.team(t0).unwrap().members.len(), 3);

    // The moved member hears about its new team directly.
    let direct = drain(&mut out_c).await;
    assert_eq!(direct, vec![r#"{"name":"user:newTeam","message":0}"#]);

    let game = drain(&mut fx.game_out).await;
    assert_eq!(game[0], format!("/name=user:newTeam/id={}/teamId=0$", c.0));
    assert!(game.iter().any(|m| m.contains("type=firstMerge")));

    assert_eq!(
        fx.store.smembers(&keys::team_users(t0)).await.unwrap().len(),
        3
    );
    assert!(fx.store.smembers(&keys::team_users(t1)).await.unwrap().is_empty());
    assert_eq!(
        fx.store.get(&keys::user_team(c)).await.unwrap().as_deref(),
        Some("0")
    );
    assert_eq!(
        fx.store.smembers(&keys::user_badges(c)).await.unwrap(),
        vec!["firstMerge"]
    );
}

#[tokio::test]
async fn test_merge_rejects_same_or_unknown_team() {
    let fx = fixture(TeamConfig::default()).await;
    let (_a, t0, _ca, _oa) = join(&fx, "ada").await;

    assert!(fx.teams.merge(t0, t0).await.is_err());
    assert!(fx.teams.merge(t0, TeamId(42)).await.is_err());
    assert_eq!(fx.teams.stats().await.unwrap().member_count(), 1);
}

#[tokio::test]
async fn test_population_badge_awarded_once() {
    let config = TeamConfig {
        badge_threshold: 2,
        ..TeamConfig::default()
    };
    let mut fx = fixture(config).await;
    let (a, _, _ca, _oa) = join(&fx, "ada").await;
    let (b, _, _cb, _ob) = join(&fx, "bob").await;

    let game = drain(&mut fx.game_out).await;
    let ocho: Vec<&String> =
        game.iter().filter(|m| m.contains("type=theOcho")).collect();
    assert_eq!(ocho.len(), 2);
    for user in [a, b] {
        assert_eq!(
            fx.store.smembers(&keys::user_badges(user)).await.unwrap(),
            vec!["theOcho"]
        );
    }
}

#[tokio::test]
async fn test_sweep_evicts_expired_user_once() {
    let fx = fixture(TeamConfig::default()).await;
    let (a, _, _ca, _oa) = join(&fx, "ada").await;
    let (b, _, _cb, _ob) = join(&fx, "bob").await;
    users::touch_presence(&fx.store, b, 120).await.unwrap();

    // Within the window: nothing happens.
    assert!(fx.teams.sweep_expired(105).await.unwrap().is_empty());

    assert_eq!(fx.teams.sweep_expired(115).await.unwrap(), vec![a]);
    assert!(fx.teams.sweep_expired(115).await.unwrap().is_empty());

    let stats = fx.teams.stats().await.unwrap();
    assert_eq!(stats.member_count(), 1);
    assert_eq!(stats.teams[0].members, vec![b]);
}

#[tokio::test]
async fn test_sweep_skips_presence_without_team() {
    let fx = fixture(TeamConfig::default()).await;
    // Registered but never seated.
    users::register_user(&fx.store, "ghost", 0).await.unwrap();

    assert!(fx.teams.sweep_expired(100).await.unwrap().is_empty());
    assert!(fx.store.zrangebyscore(keys::CLIENTS, 0, 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_return_to_queue_reseats_every_member() {
    let mut fx = fixture(TeamConfig::default()).await;
    let (a, t0, _ca, mut out_a) = join(&fx, "ada").await;
    let (b, _, _cb, _ob) = join(&fx, "bob").await;
    drain(&mut fx.game_out).await;

    let placed = fx.teams.return_to_queue(t0).await.unwrap();

    assert_eq!(placed.len(), 2);
    assert!(placed.iter().all(|(_, team)| *team != t0));
    let stats = fx.teams.stats().await.unwrap();
    assert!(stats.team(t0).is_none());
    assert_eq!(stats.member_count(), 2);
    let seated: Vec<UserId> = placed.iter().map(|(user, _)| *user).collect();
    assert_eq!(seated, vec![a, b]);

    let game = drain(&mut fx.game_out).await;
    assert_eq!(game[0], "/name=collector:destroy/id=0$");
    assert!(game.iter().any(|m| m.starts_with("/name=collector:new/id=1")));

    let direct = drain(&mut out_a).await;
    assert_eq!(direct, vec![r#"{"name":"user:newTeam","message":1}"#]);
}

#[tokio::test]
async fn test_analytics_awards_trigger_happy_and_resets() {
    let fx = fixture(TeamConfig::default()).await;
    let (a, _, _ca, _oa) = join(&fx, "ada").await;
    let (b, _, _cb, _ob) = join(&fx, "bob").await;
    for _ in 0..3 {
        users::record_shot(&fx.store, a).await.unwrap();
    }
    users::record_shot(&fx.store, b).await.unwrap();

    assert_eq!(fx.teams.analytics().await.unwrap(), vec![a]);
    assert!(fx.store.get(&keys::user_shots(a)).await.unwrap().is_none());
    assert!(fx.store.get(&keys::user_shots(b)).await.unwrap().is_none());
    assert_eq!(
        fx.store.smembers(&keys::user_badges(a)).await.unwrap(),
        vec!["triggerHappy"]
    );
}

#[tokio::test]
async fn test_second_join_on_same_connection_replaces_member() {
    let mut fx = fixture(TeamConfig::default()).await;
    let (first, _team, client, _outbox) = join(&fx, "ada").await;

    let second = users::register_user(&fx.store, "ada2", 100).await.unwrap();
    fx.teams.join(second, "ada2", client.clone()).await.unwrap();

    let stats = fx.teams.stats().await.unwrap();
    assert_eq!(stats.member_count(), 1);
    assert_eq!(stats.teams[0].members, vec![second]);
    assert!(fx.store.get(&keys::user_name(first)).await.unwrap().is_none());
    assert!(
        drain(&mut fx.game_out)
            .await
            .contains(&format!("/name=user:disconnect/id={first}$"))
    );

    assert_eq!(fx.teams.leave(client.id()).await.unwrap(), Some(second));
    assert_eq!(fx.teams.stats().await.unwrap().member_count(), 0);
}
