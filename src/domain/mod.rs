pub mod account;
pub mod balance;
pub mod charge;
pub mod error;
pub mod traits;
pub mod transaction;

pub use account::{AccountKeys, DEFAULT_ACCOUNT, LOCK_SENTINEL};
pub use balance::Balance;
pub use charge::{ChargeOutcome, ChargeResult};
pub use error::{LedgerError, StoreError};
pub use traits::{Connection, Store};
pub use transaction::{Command, Reply, Transaction};
