//! Write path shared by the HTTP API, the terminal UI and queue replay.
//!
//! Every mutating call runs in one SQLite transaction: the transaction row,
//! the touched balances and the recomputed gamification state are committed
//! together or not at all.

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::db::{connection, migrate, queries};
use crate::database::models::{
    BudgetConfig, Category, Debt, GamificationState, PendingOp, SavingsGoal, Transaction, TransactionKind,
};
use crate::engine::{self, Balances, SurplusSplit};
use crate::error::{FinanceError, Result};
use crate::export::{ExportDocument, EXPORT_VERSION};

/// Current time at the precision the database keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedIncome {
    pub transaction: Transaction,
    pub surplus: Option<SurplusSplit>,
}

/// Everything the Oracle needs to know about the budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSnapshot {
    pub config: BudgetConfig,
    pub balances: Balances,
    pub gamification: GamificationState,
    pub goals: Vec<SavingsGoal>,
    pub debts: Vec<Debt>,
}

#[derive(Clone)]
pub struct FinanceService {
    pool: Pool<Sqlite>,
}

impl FinanceService {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Connects, migrates and seeds the default configuration on first run.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = connection::get_db_pool(database_url).await?;
        migrate::run_migrations(&pool).await?;

        let service = Self::new(pool);
        let mut conn = service.pool.acquire().await?;
        if queries::load_config(&mut conn).await?.is_none() {
            queries::save_config(&mut conn, &BudgetConfig::default()).await?;
            info!("seeded default budget configuration");
        }
        Ok(service)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /*==========Configuration=========== */

    pub async fn config(&self) -> Result<BudgetConfig> {
        let mut conn = self.pool.acquire().await?;
        load_config_or_default(&mut conn).await
    }

    pub async fn replace_config(&self, config: BudgetConfig) -> Result<BudgetConfig> {
        engine::validate_categories(&config.categories)?;
        config.surplus_rule.validate()?;

        let mut conn = self.pool.acquire().await?;
        queries::save_config(&mut conn, &config).await?;
        info!(categories = config.categories.len(), "budget configuration replaced");
        Ok(config)
    }

    pub async fn rebalance_category(&self, key: &str, percent: Decimal) -> Result<Vec<Category>> {
        let mut tx = self.pool.begin().await?;
        let mut config = load_config_or_default(&mut tx).await?;
        config.categories = engine::rebalance(&config.categories, key, percent)?;
        queries::save_config(&mut tx, &config).await?;
        tx.commit().await?;

        info!(key, %percent, "category rebalanced");
        Ok(config.categories)
    }

    /*==========Ledger=========== */

    pub async fn balances(&self) -> Result<Balances> {
        let mut conn = self.pool.acquire().await?;
        Ok(queries::load_balances(&mut conn).await?)
    }

    pub async fn history(&self, limit: Option<i64>) -> Result<Vec<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        let rows = queries::list_transactions(&mut conn, limit).await?;
        debug!(count = rows.len(), "loaded history");
        Ok(rows)
    }

    pub async fn record_income(&self, amount: Decimal, note: Option<String>) -> Result<RecordedIncome> {
        let amount = engine::normalize_amount(amount)?;

        // config read and insert share one transaction
        let mut tx = self.pool.begin().await?;
        let config = load_config_or_default(&mut tx).await?;
        let plan = engine::plan_income(&config, amount)?;

        let transaction = Transaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Income,
            amount,
            category: None,
            timestamp: now(),
            note: clean_note(note),
            allocations: plan.allocations,
        };
        write_transaction(&mut tx, &transaction).await?;
        tx.commit().await?;
        info!(id = %transaction.id, %amount, surplus = plan.surplus.is_some(), "income recorded");

        Ok(RecordedIncome {
            transaction,
            surplus: plan.surplus,
        })
    }

    /// The stored amount is the cent-rounded one, the same value the envelope is debited by.
    pub async fn record_expense(&self, category: &str, amount: Decimal, note: Option<String>) -> Result<Transaction> {
        let amount = engine::normalize_amount(amount)?;

        let mut tx = self.pool.begin().await?;
        let config = load_config_or_default(&mut tx).await?;
        let allocation = engine::debit_expense(&config.categories, category, amount)?;

        let transaction = Transaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Expense,
            amount,
            category: Some(category.to_string()),
            timestamp: now(),
            note: clean_note(note),
            allocations: vec![allocation],
        };
        write_transaction(&mut tx, &transaction).await?;
        tx.commit().await?;
        info!(id = %transaction.id, category, %amount, "expense recorded");
        Ok(transaction)
    }

    /// Removes a transaction and reverses exactly the allocations it recorded.
    pub async fn delete_transaction(&self, id: Uuid) -> Result<Transaction> {
        let mut tx = self.pool.begin().await?;
        let transaction = queries::get_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| FinanceError::not_found("transaction", id))?;

        queries::delete_transaction(&mut tx, id).await?;
        let mut balances = queries::load_balances(&mut tx).await?;
        balances.reverse(&transaction)?;
        store_touched_balances(&mut tx, &balances, &transaction).await?;
        refresh_gamification(&mut tx).await?;
        tx.commit().await?;

        info!(%id, kind = transaction.kind.as_str(), "transaction deleted");
        Ok(transaction)
    }

    /// Applies an operation replayed from another instance's offline queue.
    /// Returns `false` when it had already been applied.
    pub async fn apply_remote(&self, op: PendingOp) -> Result<bool> {
        match op {
            PendingOp::CreateTransaction { transaction } => {
                let mut tx = self.pool.begin().await?;
                if queries::get_transaction(&mut tx, transaction.id).await?.is_some() {
                    debug!(id = %transaction.id, "transaction already applied");
                    return Ok(false);
                }
                let config = load_config_or_default(&mut tx).await?;
                engine::check_transaction(&config.categories, &transaction)?;
                write_transaction(&mut tx, &transaction).await?;
                tx.commit().await?;

                info!(id = %transaction.id, kind = transaction.kind.as_str(), "remote transaction applied");
                Ok(true)
            }
            PendingOp::DeleteTransaction { id } => match self.delete_transaction(id).await {
                Ok(_) => Ok(true),
                Err(FinanceError::NotFound { .. }) => Ok(false),
                Err(e) => Err(e),
            },
        }
    }

    /// Recomputed on read so the streak reflects today's date.
    pub async fn gamification(&self) -> Result<GamificationState> {
        let mut conn = self.pool.acquire().await?;
        let stored = queries::load_gamification(&mut conn).await?;
        let history = queries::list_transactions(&mut conn, None).await?;
        Ok(GamificationState::recompute(&history, &stored.unlocked_badges, today()))
    }

    /*==========Goals=========== */

    pub async fn create_goal(&self, name: &str, target: Decimal, deadline: Option<NaiveDate>) -> Result<SavingsGoal> {
        let goal = SavingsGoal {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            target,
            current: Decimal::ZERO,
            deadline,
        };
        goal.validate()?;

        let mut conn = self.pool.acquire().await?;
        queries::insert_goal(&mut conn, &goal).await?;
        info!(id = %goal.id, name = %goal.name, "savings goal created");
        Ok(goal)
    }

    pub async fn goals(&self) -> Result<Vec<SavingsGoal>> {
        let mut conn = self.pool.acquire().await?;
        Ok(queries::list_goals(&mut conn).await?)
    }

    pub async fn contribute_goal(&self, id: Uuid, amount: Decimal) -> Result<SavingsGoal> {
        let mut tx = self.pool.begin().await?;
        let mut goal = queries::get_goal(&mut tx, id)
            .await?
            .ok_or_else(|| FinanceError::not_found("goal", id))?;
        goal.contribute(amount)?;
        queries::update_goal_amount(&mut tx, id, goal.current).await?;
        tx.commit().await?;

        info!(%id, %amount, progress = goal.progress_percent(), "goal contribution");
        Ok(goal)
    }

    pub async fn delete_goal(&self, id: Uuid) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if !queries::delete_goal(&mut conn, id).await? {
            return Err(FinanceError::not_found("goal", id));
        }
        Ok(())
    }

    /*==========Debts=========== */

    pub async fn create_debt(
        &self,
        name: &str,
        principal: Decimal,
        annual_rate: Decimal,
        minimum_payment: Decimal,
    ) -> Result<Debt> {
        let debt = Debt {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            principal,
            remaining: principal,
            annual_rate,
            minimum_payment,
        };
        debt.validate()?;

        let mut conn = self.pool.acquire().await?;
        queries::insert_debt(&mut conn, &debt).await?;
        info!(id = %debt.id, name = %debt.name, "debt created");
        Ok(debt)
    }

    pub async fn debts(&self) -> Result<Vec<Debt>> {
        let mut conn = self.pool.acquire().await?;
        Ok(queries::list_debts(&mut conn).await?)
    }

    /// Returns the updated debt and the amount actually applied.
    pub async fn pay_debt(&self, id: Uuid, amount: Decimal) -> Result<(Debt, Decimal)> {
        let mut tx = self.pool.begin().await?;
        let mut debt = queries::get_debt(&mut tx, id)
            .await?
            .ok_or_else(|| FinanceError::not_found("debt", id))?;
        let applied = debt.pay(amount)?;
        queries::update_debt_remaining(&mut tx, id, debt.remaining).await?;
        tx.commit().await?;

        info!(%id, %applied, remaining = %debt.remaining, "debt payment");
        Ok((debt, applied))
    }

    pub async fn delete_debt(&self, id: Uuid) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if !queries::delete_debt(&mut conn, id).await? {
            return Err(FinanceError::not_found("debt", id));
        }
        Ok(())
    }

    /*==========Snapshot / export=========== */

    pub async fn snapshot(&self) -> Result<BudgetSnapshot> {
        Ok(BudgetSnapshot {
            config: self.config().await?,
            balances: self.balances().await?,
            gamification: self.gamification().await?,
            goals: self.goals().await?,
            debts: self.debts().await?,
        })
    }

    pub async fn export(&self) -> Result<ExportDocument> {
        let config = self.config().await?;
        let gamification = self.gamification().await?;
        let mut history = self.history(None).await?;
        history.reverse();

        Ok(ExportDocument {
            version: EXPORT_VERSION,
            export_date: now(),
            categories: config.categories,
            balances: self.balances().await?,
            history,
            xp: gamification.xp,
            streak: gamification.streak,
            unlocked_badges: gamification.unlocked_badges,
            savings_goal: self.goals().await?.into_iter().next(),
        })
    }

    /// Replaces categories, balances, history, gamification and the primary
    /// savings goal with the document's content, all in one transaction.
    pub async fn import(&self, doc: ExportDocument) -> Result<()> {
        doc.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut config = load_config_or_default(&mut tx).await?;
        config.categories = doc.categories.clone();
        queries::save_config(&mut tx, &config).await?;

        queries::clear_transactions(&mut tx).await?;
        for transaction in &doc.history {
            queries::insert_transaction(&mut tx, transaction).await?;
        }
        queries::replace_balances(&mut tx, &doc.balances).await?;
        queries::save_gamification(&mut tx, &doc.gamification()).await?;

        if let Some(goal) = &doc.savings_goal {
            if let Some(primary) = queries::list_goals(&mut tx).await?.into_iter().next() {
                queries::delete_goal(&mut tx, primary.id).await?;
            }
            queries::delete_goal(&mut tx, goal.id).await?;
            queries::insert_goal(&mut tx, goal).await?;
        }
        tx.commit().await?;

        info!(transactions = doc.history.len(), "budget imported");
        Ok(())
    }
}

fn clean_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

async fn load_config_or_default(conn: &mut SqliteConnection) -> Result<BudgetConfig> {
    Ok(queries::load_config(conn).await?.unwrap_or_default())
}

/// Inserts the row and moves the balances it allocates to, inside the caller's transaction.
async fn write_transaction(conn: &mut SqliteConnection, transaction: &Transaction) -> Result<()> {
    queries::insert_transaction(conn, transaction).await?;
    let mut balances = queries::load_balances(conn).await?;
    balances.apply(transaction)?;
    store_touched_balances(conn, &balances, transaction).await?;
    refresh_gamification(conn).await
}

async fn store_touched_balances(conn: &mut SqliteConnection, balances: &Balances, transaction: &Transaction) -> Result<()> {
    for allocation in &transaction.allocations {
        queries::set_balance(conn, &allocation.category, balances.get(&allocation.category)).await?;
    }
    Ok(())
}

async fn refresh_gamification(conn: &mut SqliteConnection) -> Result<()> {
    let previous = queries::load_gamification(conn).await?;
    let history = queries::list_transactions(conn, None).await?;
    let state = GamificationState::recompute(&history, &previous.unlocked_badges, today());
    queries::save_gamification(conn, &state).await?;
    Ok(())
}
