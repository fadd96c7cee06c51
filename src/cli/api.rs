use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::database::models::{Category, ChatMessage, ChatSession, Debt, GamificationState, PendingOp, SavingsGoal, Transaction};
use crate::engine::{self, RankProgress};
use crate::error::FinanceError;
use crate::oracle::Oracle;
use crate::service::{FinanceService, RecordedIncome};
use crate::sync::{DrainReport, OfflineQueue, SyncTarget};

/// One row of the envelopes screen. Surplus buckets that have no matching
/// category show up with `percent: None`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeRow {
    pub key: String,
    pub name: String,
    pub icon: String,
    pub bloc: String,
    pub percent: Option<Decimal>,
    pub locked: bool,
    pub balance: Decimal,
}

#[derive(Debug, Clone)]
pub struct ProgressDto {
    pub state: GamificationState,
    pub rank: RankProgress,
    pub goals: Vec<SavingsGoal>,
    pub debts: Vec<Debt>,
}

#[derive(Clone)]
struct Remote {
    queue: OfflineQueue,
    target: Arc<dyn SyncTarget>,
}

/// What the terminal UI talks to: the local service, plus the offline queue
/// when a remote instance is configured.
#[derive(Clone)]
pub struct Client {
    service: FinanceService,
    remote: Option<Remote>,
    oracle: Option<Oracle>,
}

impl Client {
    pub fn new(service: FinanceService, oracle: Option<Oracle>) -> Self {
        Self { service, remote: None, oracle }
    }

    pub fn with_remote(mut self, queue: OfflineQueue, target: Arc<dyn SyncTarget>) -> Self {
        self.remote = Some(Remote { queue, target });
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    // The local write already happened; a queue failure must not undo it.
    async fn queue(&self, op: PendingOp) {
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.queue.enqueue(&op).await {
                warn!(error = %e, "could not queue operation for sync");
            }
        }
    }

    // ============= Envelopes =============

    pub async fn categories(&self) -> Result<Vec<Category>> {
        Ok(self.service.config().await?.categories)
    }

    pub async fn envelopes(&self) -> Result<Vec<EnvelopeRow>> {
        let config = self.service.config().await?;
        let balances = self.service.balances().await?;

        let mut rows: Vec<EnvelopeRow> = config
            .categories
            .iter()
            .map(|c| EnvelopeRow {
                key: c.key.clone(),
                name: c.name.clone(),
                icon: c.icon.clone(),
                bloc: c.bloc.clone(),
                percent: Some(c.percent),
                locked: c.locked,
                balance: balances.get(&c.key),
            })
            .collect();

        for (key, amount) in balances.iter() {
            if !rows.iter().any(|r| &r.key == key) {
                rows.push(EnvelopeRow {
                    key: key.clone(),
                    name: key.clone(),
                    icon: String::new(),
                    bloc: "surplus".into(),
                    percent: None,
                    locked: false,
                    balance: *amount,
                });
            }
        }
        Ok(rows)
    }

    /// Moves `key` by `delta` points; the other unlocked envelopes absorb it.
    pub async fn adjust_percent(&self, key: &str, delta: Decimal) -> Result<Vec<Category>> {
        let categories = self.categories().await?;
        let current = categories
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.percent)
            .ok_or_else(|| FinanceError::UnknownCategory(key.to_string()))?;
        let target = (current + delta).clamp(Decimal::ZERO, engine::allocation::HUNDRED);
        Ok(self.service.rebalance_category(key, target).await?)
    }

    // ============= Transactions =============

    pub async fn history(&self, limit: Option<i64>) -> Result<Vec<Transaction>> {
        Ok(self.service.history(limit).await?)
    }

    pub async fn record_income(&self, amount: Decimal, note: Option<String>) -> Result<RecordedIncome> {
        let recorded = self.service.record_income(amount, note).await?;
        self.queue(PendingOp::CreateTransaction { transaction: recorded.transaction.clone() }).await;
        Ok(recorded)
    }

    pub async fn record_expense(&self, category: &str, amount: Decimal, note: Option<String>) -> Result<Transaction> {
        let tx = self.service.record_expense(category, amount, note).await?;
        self.queue(PendingOp::CreateTransaction { transaction: tx.clone() }).await;
        Ok(tx)
    }

    pub async fn delete_transaction(&self, id: Uuid) -> Result<Transaction> {
        let removed = self.service.delete_transaction(id).await?;
        self.queue(PendingOp::DeleteTransaction { id }).await;
        Ok(removed)
    }

    // ============= Progress =============

    pub async fn progress(&self) -> Result<ProgressDto> {
        let state = self.service.gamification().await?;
        let rank = engine::rank_progress(state.xp);
        Ok(ProgressDto {
            state,
            rank,
            goals: self.service.goals().await?,
            debts: self.service.debts().await?,
        })
    }

    // ============= Sync =============

    pub async fn pending(&self) -> Result<Option<i64>> {
        match &self.remote {
            Some(remote) => Ok(Some(remote.queue.pending().await?)),
            None => Ok(None),
        }
    }

    /// `None` when there is no remote to sync with.
    pub async fn sync(&self) -> Result<Option<DrainReport>> {
        match &self.remote {
            Some(remote) => Ok(Some(remote.queue.drain(remote.target.as_ref()).await?)),
            None => Ok(None),
        }
    }

    // ============= Oracle =============

    /// Most recent conversation, or a fresh one when there is none.
    pub async fn open_session(&self) -> Result<Option<(ChatSession, Vec<ChatMessage>)>> {
        let Some(oracle) = &self.oracle else {
            return Ok(None);
        };
        let session = match oracle.sessions().await?.into_iter().next() {
            Some(s) => s,
            None => oracle.create_session(None).await?,
        };
        let messages = oracle.messages(session.id).await?;
        Ok(Some((session, messages)))
    }

    pub async fn ask(&self, session_id: Uuid, question: &str) -> Result<ChatMessage> {
        let oracle = self
            .oracle
            .as_ref()
            .ok_or_else(|| FinanceError::Config("oracle is not configured".into()))?;
        Ok(oracle.ask(session_id, question).await?)
    }
}
