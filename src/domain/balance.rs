use serde::Serialize;

/// Account balance in whole units.
///
/// Stored in the key-value store as decimal integer text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Balance(pub i64);

impl Balance {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn as_units(&self) -> i64 {
        self.0
    }

    pub fn from_store_str(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        s.parse::<i64>().ok().map(Self)
    }

    pub fn to_store_string(&self) -> String {
        self.0.to_string()
    }

    pub fn covers(&self, amount: i64) -> bool {
        self.0 >= amount
    }

    /// Balance left after deducting `amount`. Callers check `covers` first.
    pub fn after_charge(&self, amount: i64) -> Self {
        Self(self.0 - amount)
    }
}

impl core::fmt::Display for Balance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
