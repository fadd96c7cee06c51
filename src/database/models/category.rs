use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One budgeting envelope. `percent` is its share of every income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub key: String,        // stable identifier used by balances and transactions
    pub name: String,
    pub icon: String,
    pub percent: Decimal,
    #[serde(default)]
    pub locked: bool,       // locked weights are left alone by rebalancing
    #[serde(default)]
    pub bloc: String,       // display group, e.g. "essentials"
}

impl Category {
    pub fn new(key: &str, name: &str, icon: &str, percent: Decimal, bloc: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
            percent,
            locked: false,
            bloc: bloc.to_string(),
        }
    }
}
