use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::domain::{Command, Connection, Reply, Store, StoreError, Transaction};

#[derive(Debug)]
struct Value {
    data: String,
    expires_at: Option<Instant>,
}

/// Keys plus a per-key modification counter.
///
/// Counters outlive deletion so a watch sees delete-then-recreate as a change.
#[derive(Debug, Default)]
struct Keyspace {
    values: HashMap<String, Value>,
    versions: HashMap<String, u64>,
}

impl Keyspace {
    fn touch(&mut self, key: &str) {
        *self.versions.entry(key.to_owned()).or_insert(0) += 1;
    }

    fn evict_if_expired(&mut self, key: &str, now: Instant) {
        let expired = self
            .values
            .get(key)
            .and_then(|v| v.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.values.remove(key);
            self.touch(key);
        }
    }

    fn version(&mut self, key: &str, now: Instant) -> u64 {
        self.evict_if_expired(key, now);
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn get(&mut self, key: &str, now: Instant) -> Option<String> {
        self.evict_if_expired(key, now);
        self.values.get(key).map(|v| v.data.clone())
    }

    fn set(&mut self, key: &str, data: String) {
        self.values.insert(
            key.to_owned(),
            Value {
                data,
                expires_at: None,
            },
        );
        self.touch(key);
    }

    fn set_if_absent(
        &mut self,
        key: &str,
        data: String,
        ttl: Option<Duration>,
        now: Instant,
    ) -> bool {
        self.evict_if_expired(key, now);
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(
            key.to_owned(),
            Value {
                data,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        self.touch(key);
        true
    }

    fn expire(&mut self, key: &str, ttl: Duration, now: Instant) -> bool {
        self.evict_if_expired(key, now);
        let Some(value) = self.values.get_mut(key) else {
            return false;
        };
        value.expires_at = Some(now + ttl);
        self.touch(key);
        true
    }

    fn del(&mut self, key: &str, now: Instant) -> bool {
        self.evict_if_expired(key, now);
        let existed = self.values.remove(key).is_some();
        if existed {
            self.touch(key);
        }
        existed
    }

    fn apply(&mut self, command: Command, now: Instant) -> Reply {
        trace!(%command, "applying queued command");
        match command {
            Command::Set { key, value } => {
                self.set(&key, value);
                Reply::Ok
            }
            Command::SetIfAbsent { key, value, ttl } => {
                Reply::Bool(self.set_if_absent(&key, value, ttl, now))
            }
            Command::Expire { key, ttl } => Reply::Bool(self.expire(&key, ttl, now)),
            Command::Del { key } => Reply::Bool(self.del(&key, now)),
        }
    }
}

/// Injected faults: let `skip` commands through, then fail `fail` of them.
#[derive(Debug, Default)]
struct Faults {
    skip: usize,
    fail: usize,
}

#[derive(Debug, Default)]
struct Shared {
    keyspace: Mutex<Keyspace>,
    faults: Mutex<Faults>,
    open_connections: AtomicUsize,
    round_trip: Duration,
}

impl Shared {
    async fn round_trip(&self) {
        if self.round_trip.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.round_trip).await;
        }
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let mut faults = self.faults.lock();
        if faults.skip > 0 {
            faults.skip -= 1;
            return Ok(());
        }
        if faults.fail > 0 {
            faults.fail -= 1;
            return Err(StoreError::Connection("injected failure".to_string()));
        }
        Ok(())
    }
}

/// In-process store with watch/transaction semantics.
///
/// Every command costs one simulated round trip, so concurrent callers
/// interleave between commands the way they would against a networked store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each command sleeps for `round_trip` before it runs.
    pub fn with_round_trip(round_trip: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                round_trip,
                ..Shared::default()
            }),
        }
    }

    pub fn open_connections(&self) -> usize {
        self.shared.open_connections.load(Ordering::SeqCst)
    }

    /// Makes the next `count` commands (connects included) fail.
    pub fn fail_next(&self, count: usize) {
        self.fail_after(0, count);
    }

    /// Lets `skip` commands succeed, then fails the following `count`.
    pub fn fail_after(&self, skip: usize, count: usize) {
        *self.shared.faults.lock() = Faults { skip, fail: count };
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<Self::Connection, StoreError> {
        self.shared.round_trip().await;
        self.shared.take_failure()?;
        self.shared.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            shared: Arc::clone(&self.shared),
            watched: HashMap::new(),
        })
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    shared: Arc<Shared>,
    watched: HashMap<String, u64>, // key -> version seen at watch time
}

impl MemoryConnection {
    async fn command<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Keyspace, Instant) -> T,
    {
        self.shared.round_trip().await;
        self.shared.take_failure()?;
        let now = Instant::now();
        let mut keyspace = self.shared.keyspace.lock();
        Ok(op(&mut keyspace, now))
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.shared.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        self.command(|ks, now| ks.get(key, now)).await
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.command(|ks, _| ks.set(key, value.to_owned())).await
    }

    async fn set_if_absent(&mut self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.command(|ks, now| ks.set_if_absent(key, value.to_owned(), None, now))
            .await
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.command(|ks, now| ks.expire(key, ttl, now)).await
    }

    async fn del(&mut self, key: &str) -> Result<bool, StoreError> {
        self.command(|ks, now| ks.del(key, now)).await
    }

    async fn watch(&mut self, key: &str) -> Result<(), StoreError> {
        let version = self.command(|ks, now| ks.version(key, now)).await?;
        // A repeated watch keeps the earliest version.
        self.watched.entry(key.to_owned()).or_insert(version);
        Ok(())
    }

    async fn unwatch(&mut self) -> Result<(), StoreError> {
        self.command(|_, _| ()).await?;
        self.watched.clear();
        Ok(())
    }

    async fn exec(&mut self, transaction: Transaction) -> Result<Option<Vec<Reply>>, StoreError> {
        let watched = std::mem::take(&mut self.watched);
        self.command(move |ks, now| {
            let changed = watched
                .iter()
                .any(|(key, version)| ks.version(key, now) != *version);
            if changed {
                trace!("watched key changed, discarding transaction");
                return None;
            }
            Some(
                transaction
                    .into_commands()
                    .into_iter()
                    .map(|command| ks.apply(command, now))
                    .collect(),
            )
        })
        .await
    }
}
