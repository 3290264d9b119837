use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Cmd, RedisError, Value};
use tracing::{debug, trace};

use crate::domain::{Command, Connection, Reply, Store, StoreError, Transaction};

/// Store backed by a Redis server.
///
/// Each `connect` opens its own TCP connection, so WATCH state never leaks
/// between operations.
#[derive(Debug, Clone)]
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Parses `url` (`redis://host:port`). Nothing is dialed until `connect`.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(store_error)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Store for RedisStore {
    type Connection = RedisConnection;

    async fn connect(&self) -> Result<Self::Connection, StoreError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_error)?;
        debug!("opened store connection");
        Ok(RedisConnection { conn })
    }
}

pub struct RedisConnection {
    conn: MultiplexedConnection,
}

impl RedisConnection {
    async fn query<T>(&mut self, cmd: Cmd) -> Result<T, StoreError>
    where
        T: redis::FromRedisValue + Send,
    {
        cmd.query_async(&mut self.conn).await.map_err(store_error)
    }
}

#[async_trait]
impl Connection for RedisConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        self.query(redis::cmd("GET").arg(key).clone()).await
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.query(redis::cmd("SET").arg(key).arg(value).clone())
            .await
    }

    async fn set_if_absent(&mut self, key: &str, value: &str) -> Result<bool, StoreError> {
        let reply: Option<String> = self
            .query(redis::cmd("SET").arg(key).arg(value).arg("NX").clone())
            .await?;
        Ok(reply.is_some())
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let reply: i64 = self
            .query(redis::cmd("PEXPIRE").arg(key).arg(millis(ttl)).clone())
            .await?;
        Ok(reply == 1)
    }

    async fn del(&mut self, key: &str) -> Result<bool, StoreError> {
        let removed: i64 = self.query(redis::cmd("DEL").arg(key).clone()).await?;
        Ok(removed > 0)
    }

    async fn watch(&mut self, key: &str) -> Result<(), StoreError> {
        self.query(redis::cmd("WATCH").arg(key).clone()).await
    }

    async fn unwatch(&mut self) -> Result<(), StoreError> {
        self.query(redis::cmd("UNWATCH")).await
    }

    async fn exec(&mut self, transaction: Transaction) -> Result<Option<Vec<Reply>>, StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in transaction.commands() {
            pipe.add_command(to_cmd(command));
        }

        let values: Option<Vec<Value>> = pipe
            .query_async(&mut self.conn)
            .await
            .map_err(store_error)?;
        let Some(values) = values else {
            trace!("watched key changed, transaction discarded");
            return Ok(None);
        };

        transaction
            .commands()
            .iter()
            .zip(values.iter())
            .map(|(command, value)| to_reply(command, value))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn store_error(e: RedisError) -> StoreError {
    StoreError::Connection(e.to_string())
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

fn to_cmd(command: &Command) -> Cmd {
    match command {
        Command::Set { key, value } => redis::cmd("SET").arg(key).arg(value).clone(),
        Command::SetIfAbsent { key, value, ttl } => {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value).arg("NX");
            if let Some(ttl) = ttl {
                cmd.arg("PX").arg(millis(*ttl));
            }
            cmd
        }
        Command::Expire { key, ttl } => redis::cmd("PEXPIRE").arg(key).arg(millis(*ttl)).clone(),
        Command::Del { key } => redis::cmd("DEL").arg(key).clone(),
    }
}

fn to_reply(command: &Command, value: &Value) -> Result<Reply, StoreError> {
    let reply = match command {
        Command::Set { .. } => Reply::Ok,
        Command::SetIfAbsent { .. } => {
            let written: Option<String> = redis::from_redis_value(value).map_err(store_error)?;
            Reply::Bool(written.is_some())
        }
        Command::Expire { .. } | Command::Del { .. } => {
            let count: i64 = redis::from_redis_value(value).map_err(store_error)?;
            Reply::Bool(count > 0)
        }
    };
    Ok(reply)
}
