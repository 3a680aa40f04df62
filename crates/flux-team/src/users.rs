//! Durable per-user records that live outside the roster.

use flux_protocol::UserId;
use flux_store::{Store, StoreError, keys};

/// Allocates an id for `name` and writes its username indexes.
///
/// The presence record is seeded with `now` so a user that never sends a
/// heartbeat is still swept eventually.
pub async fn register_user<S: Store>(
    store: &S,
    name: &str,
    now: i64,
) -> Result<UserId, StoreError> {
    let id = UserId(store.incr(keys::NEXT_USER_ID).await? - 1);
    store.set(&keys::name_to_user(name), &id.0.to_string()).await?;
    store.set(&keys::user_name(id.0), name).await?;
    store.zadd(keys::CLIENTS, &id.0.to_string(), now).await?;
    tracing::info!(user_id = %id, name, "user registered");
    Ok(id)
}

/// Records a heartbeat for `user` at `now` (unix seconds).
pub async fn touch_presence<S: Store>(
    store: &S,
    user: UserId,
    now: i64,
) -> Result<(), StoreError> {
    store.zadd(keys::CLIENTS, &user.0.to_string(), now).await
}

/// Counts one shot toward the next analytics pass.
pub async fn record_shot<S: Store>(
    store: &S,
    user: UserId,
) -> Result<i64, StoreError> {
    store.incr(&keys::user_shots(user.0)).await
}
