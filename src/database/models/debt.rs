use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: Uuid,
    pub name: String,
    pub principal: Decimal,
    pub remaining: Decimal,
    pub annual_rate: Decimal,       // percent, e.g. 4.5
    pub minimum_payment: Decimal,
}
