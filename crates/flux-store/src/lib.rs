//! Durable state for Flux.
//!
//! The relay keeps only the live roster in memory. Everything that should
//! outlive a connection (ids, usernames, badges, presence) lives behind the
//! [`Store`] trait, which mirrors the handful of key-value operations the
//! engine needs: strings, counters, sets and one score-ordered set.
//!
//! [`MemoryStore`] is the implementation used by default and in tests.
//! A networked store is a matter of implementing [`Store`] for a client.

mod error;
pub mod keys;
mod memory;

use std::future::Future;
use std::sync::Arc;

pub use error::StoreError;
pub use memory::MemoryStore;

/// Shorthand for store results.
pub type StoreResult<T> = Result<T, StoreError>;

/// The key-value operations the relay depends on.
///
/// Semantics follow the usual key-value server conventions: missing keys
/// read as empty, `incr` starts from 0, set operations report whether
/// anything changed. Using a key as the wrong kind of value is an error.
///
/// Methods return `impl Future + Send` so that stores can be driven from
/// spawned tasks; implementations may simply write `async fn`.
pub trait Store: Send + Sync + 'static {
    /// Reads a string value.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Writes a string value, replacing whatever was there.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Deletes a key of any kind. Returns whether it existed.
    fn del(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Increments an integer value and returns the new value.
    fn incr(&self, key: &str) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Adds a set member. Returns `true` if it was not already present.
    fn sadd(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Removes a set member. Returns `true` if it was present.
    fn srem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Lists set members in sorted order.
    fn smembers(
        &self,
        key: &str,
    ) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Stores the union of `keys` at `dest` and returns its size.
    fn sunionstore(
        &self,
        dest: &str,
        keys: &[&str],
    ) -> impl Future<Output = StoreResult<usize>> + Send;

    /// Adds or re-scores a sorted-set member.
    fn zadd(
        &self,
        key: &str,
        member: &str,
        score: i64,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Removes a sorted-set member. Returns `true` if it was present.
    fn zrem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Members with `min <= score <= max`, lowest score first.
    fn zrangebyscore(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> impl Future<Output = StoreResult<Vec<String>>> + Send;
}

/// A shared store is still a store, so one instance can back the team
/// engine and the event handlers at once.
impl<S: Store> Store for Arc<S> {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = StoreResult<Option<String>>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send {
        (**self).set(key, value)
    }

    fn del(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).del(key)
    }

    fn incr(&self, key: &str) -> impl Future<Output = StoreResult<i64>> + Send {
        (**self).incr(key)
    }

    fn sadd(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).sadd(key, member)
    }

    fn srem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).srem(key, member)
    }

    fn smembers(
        &self,
        key: &str,
    ) -> impl Future<Output = StoreResult<Vec<String>>> + Send {
        (**self).smembers(key)
    }

    fn sunionstore(
        &self,
        dest: &str,
        keys: &[&str],
    ) -> impl Future<Output = StoreResult<usize>> + Send {
        (**self).sunionstore(dest, keys)
    }

    fn zadd(
        &self,
        key: &str,
        member: &str,
        score: i64,
    ) -> impl Future<Output = StoreResult<()>> + Send {
        (**self).zadd(key, member, score)
    }

    fn zrem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).zrem(key, member)
    }

    fn zrangebyscore(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> impl Future<Output = StoreResult<Vec<String>>> + Send {
        (**self).zrangebyscore(key, min, max)
    }
}
