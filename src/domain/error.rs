#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store connection failed with: {0}")]
    Connection(String),

    #[error("Value at {key} is not an integer: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Charge amount must not be negative, got {0}")]
    NegativeCharge(i64),
}
