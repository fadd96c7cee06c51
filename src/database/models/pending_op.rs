use serde::{Deserialize, Serialize};

use super::Transaction;

/// Operation waiting to be replayed against the remote instance. Both
/// variants are keyed by transaction id, so replaying one twice is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PendingOp {
    CreateTransaction { transaction: Transaction },
    DeleteTransaction { id: uuid::Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Dead,   // gave up after too many attempts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOp {
    pub seq: i64,
    pub op: PendingOp,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub status: QueueStatus,
}
