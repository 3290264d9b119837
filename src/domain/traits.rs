use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Reply, StoreError, Transaction};

/// Shared key-value store the ledger runs against.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Connection: Connection;

    /// Opens a connection for one logical operation. Dropping it releases it.
    async fn connect(&self) -> Result<Self::Connection, StoreError>;
}

/// A single store connection. Watches are scoped to the connection.
#[async_trait]
pub trait Connection: Send {
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` and clears any TTL on `key`.
    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn set_if_absent(&mut self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Returns false when `key` does not exist.
    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn del(&mut self, key: &str) -> Result<bool, StoreError>;

    async fn watch(&mut self, key: &str) -> Result<(), StoreError>;

    async fn unwatch(&mut self) -> Result<(), StoreError>;

    /// Applies `transaction` atomically.
    ///
    /// Returns `Ok(None)` without applying anything when a key watched on this
    /// connection changed since it was watched. Watches are cleared either way.
    async fn exec(&mut self, transaction: Transaction) -> Result<Option<Vec<Reply>>, StoreError>;
}
