/// Account used when a request does not name one.
pub const DEFAULT_ACCOUNT: &str = "account";

/// Value stored under the lock key while a pessimistic charge holds it.
pub const LOCK_SENTINEL: &str = "LOCKED";

/// Store keys owned by a single account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKeys {
    pub balance: String, // integer balance, encoded as text
    pub lock: String,    // ephemeral mutual-exclusion marker
}

impl AccountKeys {
    pub fn new(account: &str) -> Self {
        Self {
            balance: format!("{account}/balance"),
            lock: format!("{account}/lock"),
        }
    }
}
