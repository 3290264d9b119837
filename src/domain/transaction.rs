use std::time::Duration;

/// A command queued inside a store transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set {
        key: String,
        value: String,
    },
    SetIfAbsent {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Expire {
        key: String,
        ttl: Duration,
    },
    Del {
        key: String,
    },
}

/// Per-command reply returned by a committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Bool(bool),
}

impl Reply {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Reply::Bool(b) => Some(*b),
            Reply::Ok => None,
        }
    }
}

/// Commands executed atomically by `Connection::exec`.
///
/// Replies come back in queue order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.commands.push(Command::Set {
            key: key.to_owned(),
            value: value.into(),
        });
        self
    }

    pub fn set_if_absent(mut self, key: &str, value: impl Into<String>, ttl: Option<Duration>) -> Self {
        self.commands.push(Command::SetIfAbsent {
            key: key.to_owned(),
            value: value.into(),
            ttl,
        });
        self
    }

    pub fn expire(mut self, key: &str, ttl: Duration) -> Self {
        self.commands.push(Command::Expire {
            key: key.to_owned(),
            ttl,
        });
        self
    }

    pub fn del(mut self, key: &str) -> Self {
        self.commands.push(Command::Del {
            key: key.to_owned(),
        });
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Command::Set { key, value } => write!(f, "SET {key} {value}"),
            Command::SetIfAbsent { key, value, ttl } => match ttl {
                Some(ttl) => write!(f, "SET {key} {value} NX PX {}", ttl.as_millis()),
                None => write!(f, "SET {key} {value} NX"),
            },
            Command::Expire { key, ttl } => write!(f, "PEXPIRE {key} {}", ttl.as_millis()),
            Command::Del { key } => write!(f, "DEL {key}"),
        }
    }
}
