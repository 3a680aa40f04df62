//! An in-process [`Store`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{Store, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(BTreeSet<String>),
    Sorted(HashMap<String, i64>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::Set(_) => "set",
            Self::Sorted(_) => "sorted set",
        }
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &Value) -> StoreError {
    StoreError::WrongType {
        key: key.to_owned(),
        expected,
        found: found.kind(),
    }
}

/// A [`Store`] backed by a `HashMap` behind a Tokio mutex.
///
/// Cloning is cheap and every clone sees the same data, so one store can
/// be handed to the team engine and to the handlers at the same time.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.data.lock().await.get(key) {
            None => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text.clone())),
            Some(other) => Err(wrong_type(key, "string", other)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.data
            .lock()
            .await
            .insert(key.to_owned(), Value::Text(value.to_owned()));
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        Ok(self.data.lock().await.remove(key).is_some())
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut data = self.data.lock().await;
        let next = match data.get(key) {
            None => 1,
            Some(Value::Text(text)) => text
                .parse::<i64>()
                .map_err(|_| StoreError::NotAnInteger(key.to_owned()))?
                .checked_add(1)
                .ok_or_else(|| StoreError::NotAnInteger(key.to_owned()))?,
            Some(other) => return Err(wrong_type(key, "string", other)),
        };
        data.insert(key.to_owned(), Value::Text(next.to_string()));
        tracing::trace!(key, next, "counter incremented");
        Ok(next)
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        let entry = data
            .entry(key.to_owned())
            .or_insert_with(|| Value::Set(BTreeSet::new()));
        match entry {
            Value::Set(set) => Ok(set.insert(member.to_owned())),
            other => Err(wrong_type(key, "set", other)),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        let removed = match data.get_mut(key) {
            None => return Ok(false),
            Some(Value::Set(set)) => {
                let removed = set.remove(member);
                if set.is_empty() {
                    data.remove(key);
                }
                removed
            }
            Some(other) => return Err(wrong_type(key, "set", other)),
        };
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        match self.data.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(other) => Err(wrong_type(key, "set", other)),
        }
    }

    async fn sunionstore(
        &self,
        dest: &str,
        keys: &[&str],
    ) -> StoreResult<usize> {
        let mut data = self.data.lock().await;
        let mut union = BTreeSet::new();
        for key in keys {
            match data.get(*key) {
                None => {}
                Some(Value::Set(set)) => union.extend(set.iter().cloned()),
                Some(other) => return Err(wrong_type(key, "set", other)),
            }
        }
        let size = union.len();
        if union.is_empty() {
            data.remove(dest);
        } else {
            data.insert(dest.to_owned(), Value::Set(union));
        }
        Ok(size)
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        let entry = data
            .entry(key.to_owned())
            .or_insert_with(|| Value::Sorted(HashMap::new()));
        match entry {
            Value::Sorted(scores) => {
                scores.insert(member.to_owned(), score);
                Ok(())
            }
            other => Err(wrong_type(key, "sorted set", other)),
        }
    }

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        let removed = match data.get_mut(key) {
            None => return Ok(false),
            Some(Value::Sorted(scores)) => {
                let removed = scores.remove(member).is_some();
                if scores.is_empty() {
                    data.remove(key);
                }
                removed
            }
            Some(other) => return Err(wrong_type(key, "sorted set", other)),
        };
        Ok(removed)
    }

    async fn zrangebyscore(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> StoreResult<Vec<String>> {
        let data = self.data.lock().await;
        let scores = match data.get(key) {
            None => return Ok(Vec::new()),
            Some(Value::Sorted(scores)) => scores,
            Some(other) => return Err(wrong_type(key, "sorted set", other)),
        };
        let mut hits: Vec<(i64, &String)> = scores
            .iter()
            .filter(|(_, score)| (min..=max).contains(*score))
            .map(|(member, score)| (*score, member))
            .collect();
        hits.sort();
        Ok(hits.into_iter().map(|(_, member)| member.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_incr_starts_from_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("global:nextTeamId").await.unwrap(), 1);
        assert_eq!(store.incr("global:nextTeamId").await.unwrap(), 2);
        assert_eq!(
            store.get("global:nextTeamId").await.unwrap().as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_incr_rejects_text() {
        let store = MemoryStore::new();
        store.set("name", "ada").await.unwrap();
        let err = store.incr("name").await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnInteger(_)));
    }

    #[tokio::test]
    async fn test_wrong_type_is_reported() {
        let store = MemoryStore::new();
        store.sadd("team:0:users", "1").await.unwrap();
        let err = store.get("team:0:users").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::WrongType { expected: "string", found: "set", .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_set_disappears() {
        let store = MemoryStore::new();
        store.sadd("s", "a").await.unwrap();
        assert!(store.srem("s", "a").await.unwrap());
        // The key is gone, so it no longer has a type.
        assert_eq!(store.get("s").await.unwrap(), None);
        assert_eq!(store.incr("s").await.unwrap(), 1);
    }
}
