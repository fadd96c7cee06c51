use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::database::models::{
    BudgetConfig, ChatMessage, ChatRole, ChatSession, Debt, GamificationState, PendingOp,
    QueueStatus, QueuedOp, SavingsGoal, Streak, Transaction, TransactionKind,
};
use crate::engine::Balances;

/*
SQL for every table. Functions take a plain connection so the same query
can run on a pooled connection or inside a transaction (`&mut *tx`).
Money is stored as TEXT and parsed back into Decimal; timestamps are RFC 3339.
*/

/*==========Column codecs=========== */

fn decode_err(what: &str, e: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(format!("Invalid {what}: {e}").into())
}

fn get_decimal(row: &SqliteRow, col: &str) -> Result<Decimal, sqlx::Error> {
    let text: String = row.try_get(col)?;
    Decimal::from_str(&text).map_err(|e| decode_err(col, e))
}

fn get_uuid(row: &SqliteRow, col: &str) -> Result<Uuid, sqlx::Error> {
    let text: String = row.try_get(col)?;
    Uuid::parse_str(&text).map_err(|e| decode_err(col, e))
}

fn get_timestamp(row: &SqliteRow, col: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let text: String = row.try_get(col)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| decode_err(col, e))
}

fn get_date(row: &SqliteRow, col: &str) -> Result<Option<NaiveDate>, sqlx::Error> {
    let text: Option<String> = row.try_get(col)?;
    text.map(|t| NaiveDate::parse_from_str(&t, "%Y-%m-%d").map_err(|e| decode_err(col, e)))
        .transpose()
}

fn get_json<T: serde::de::DeserializeOwned>(row: &SqliteRow, col: &str) -> Result<T, sqlx::Error> {
    let text: String = row.try_get(col)?;
    serde_json::from_str(&text).map_err(|e| decode_err(col, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Protocol(format!("JSON encode failed: {e}")))
}

pub fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn iso(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/*==========Budget config=========== */

pub async fn load_config(conn: &mut SqliteConnection) -> Result<Option<BudgetConfig>, sqlx::Error> {
    let row = sqlx::query("SELECT document FROM budget_config WHERE id = 1")
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|r| get_json(&r, "document")).transpose()
}

// The whole document is replaced; there is no partial update.
pub async fn save_config(conn: &mut SqliteConnection, config: &BudgetConfig) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO budget_config (id, document, updated_at)
        VALUES (1, ?, ?)
        ON CONFLICT (id) DO UPDATE SET document = excluded.document, updated_at = excluded.updated_at
        "#,
    )
    .bind(to_json(config)?)
    .bind(ts(&Utc::now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/*==========Balances=========== */

pub async fn load_balances(conn: &mut SqliteConnection) -> Result<Balances, sqlx::Error> {
    let rows = sqlx::query("SELECT category_key, amount FROM balances ORDER BY category_key")
        .fetch_all(&mut *conn)
        .await?;

    let mut balances = Balances::new();
    for row in rows {
        let key: String = row.try_get("category_key")?;
        balances.0.insert(key, get_decimal(&row, "amount")?);
    }
    Ok(balances)
}

pub async fn set_balance(conn: &mut SqliteConnection, key: &str, amount: Decimal) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO balances (category_key, amount)
        VALUES (?, ?)
        ON CONFLICT (category_key) DO UPDATE SET amount = excluded.amount
        "#,
    )
    .bind(key)
    .bind(amount.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn replace_balances(conn: &mut SqliteConnection, balances: &Balances) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM balances").execute(&mut *conn).await?;
    for (key, amount) in balances.iter() {
        set_balance(conn, key, *amount).await?;
    }
    Ok(())
}

/*==========Transactions=========== */

fn map_transaction_row(row: &SqliteRow) -> Result<Transaction, sqlx::Error> {
    let kind_text: String = row.try_get("kind")?;
    let kind = TransactionKind::parse(&kind_text).ok_or_else(|| decode_err("kind", &kind_text))?;

    Ok(Transaction {
        id: get_uuid(row, "transaction_id")?,
        kind,
        amount: get_decimal(row, "amount")?,
        category: row.try_get("category_key")?,
        timestamp: get_timestamp(row, "occurred_at")?,
        note: row.try_get("note")?,
        allocations: get_json(row, "allocations")?,
    })
}

pub async fn insert_transaction(conn: &mut SqliteConnection, tx: &Transaction) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            transaction_id, kind, amount, category_key, note, allocations, occurred_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tx.id.to_string())
    .bind(tx.kind.as_str())
    .bind(tx.amount.to_string())
    .bind(tx.category.as_deref())
    .bind(tx.note.as_deref())
    .bind(to_json(&tx.allocations)?)
    .bind(ts(&tx.timestamp))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_transaction(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query("SELECT * FROM transactions WHERE transaction_id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| map_transaction_row(&row))
        .transpose()
}

pub async fn delete_transaction(conn: &mut SqliteConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM transactions WHERE transaction_id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Newest first.
pub async fn list_transactions(conn: &mut SqliteConnection, limit: Option<i64>) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT *
        FROM transactions
        ORDER BY occurred_at DESC, transaction_id DESC
        LIMIT COALESCE(?, -1)
        "#,
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(map_transaction_row)
    .collect()
}

pub async fn clear_transactions(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM transactions").execute(&mut *conn).await?;
    Ok(())
}

/*==========Gamification=========== */

pub async fn load_gamification(conn: &mut SqliteConnection) -> Result<GamificationState, sqlx::Error> {
    let Some(row) = sqlx::query("SELECT * FROM gamification WHERE id = 1")
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(GamificationState::default());
    };

    let xp: i64 = row.try_get("xp")?;
    let current: i64 = row.try_get("streak_current")?;
    let best: i64 = row.try_get("streak_best")?;
    Ok(GamificationState {
        xp: u64::try_from(xp).map_err(|e| decode_err("xp", e))?,
        streak: Streak {
            current: u32::try_from(current).map_err(|e| decode_err("streak_current", e))?,
            best: u32::try_from(best).map_err(|e| decode_err("streak_best", e))?,
            last_date: get_date(&row, "streak_last_date")?,
        },
        unlocked_badges: get_json(&row, "unlocked_badges")?,
    })
}

pub async fn save_gamification(conn: &mut SqliteConnection, state: &GamificationState) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO gamification (id, xp, streak_current, streak_best, streak_last_date, unlocked_badges)
        VALUES (1, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            xp = excluded.xp,
            streak_current = excluded.streak_current,
            streak_best = excluded.streak_best,
            streak_last_date = excluded.streak_last_date,
            unlocked_badges = excluded.unlocked_badges
        "#,
    )
    .bind(i64::try_from(state.xp).unwrap_or(i64::MAX))
    .bind(i64::from(state.streak.current))
    .bind(i64::from(state.streak.best))
    .bind(state.streak.last_date.as_ref().map(iso))
    .bind(to_json(&state.unlocked_badges)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/*==========Savings goals=========== */

fn map_goal_row(row: &SqliteRow) -> Result<SavingsGoal, sqlx::Error> {
    Ok(SavingsGoal {
        id: get_uuid(row, "goal_id")?,
        name: row.try_get("goal_name")?,
        target: get_decimal(row, "target_amount")?,
        current: get_decimal(row, "current_amount")?,
        deadline: get_date(row, "deadline")?,
    })
}

pub async fn insert_goal(conn: &mut SqliteConnection, goal: &SavingsGoal) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO saving_goals (goal_id, goal_name, target_amount, current_amount, deadline, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(goal.id.to_string())
    .bind(&goal.name)
    .bind(goal.target.to_string())
    .bind(goal.current.to_string())
    .bind(goal.deadline.as_ref().map(iso))
    .bind(ts(&Utc::now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_goal(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<SavingsGoal>, sqlx::Error> {
    sqlx::query("SELECT * FROM saving_goals WHERE goal_id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| map_goal_row(&row))
        .transpose()
}

/// Oldest first; the first goal is the "primary" one used by exports.
pub async fn list_goals(conn: &mut SqliteConnection) -> Result<Vec<SavingsGoal>, sqlx::Error> {
    sqlx::query("SELECT * FROM saving_goals ORDER BY created_at ASC, goal_id ASC")
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(map_goal_row)
        .collect()
}

pub async fn update_goal_amount(conn: &mut SqliteConnection, id: Uuid, current: Decimal) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE saving_goals SET current_amount = ? WHERE goal_id = ?")
        .bind(current.to_string())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_goal(conn: &mut SqliteConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM saving_goals WHERE goal_id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/*==========Debts=========== */

fn map_debt_row(row: &SqliteRow) -> Result<Debt, sqlx::Error> {
    Ok(Debt {
        id: get_uuid(row, "debt_id")?,
        name: row.try_get("debt_name")?,
        principal: get_decimal(row, "principal")?,
        remaining: get_decimal(row, "remaining")?,
        annual_rate: get_decimal(row, "annual_rate")?,
        minimum_payment: get_decimal(row, "minimum_payment")?,
    })
}

pub async fn insert_debt(conn: &mut SqliteConnection, debt: &Debt) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO debts (debt_id, debt_name, principal, remaining, annual_rate, minimum_payment, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(debt.id.to_string())
    .bind(&debt.name)
    .bind(debt.principal.to_string())
    .bind(debt.remaining.to_string())
    .bind(debt.annual_rate.to_string())
    .bind(debt.minimum_payment.to_string())
    .bind(ts(&Utc::now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_debt(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Debt>, sqlx::Error> {
    sqlx::query("SELECT * FROM debts WHERE debt_id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| map_debt_row(&row))
        .transpose()
}

pub async fn list_debts(conn: &mut SqliteConnection) -> Result<Vec<Debt>, sqlx::Error> {
    sqlx::query("SELECT * FROM debts ORDER BY created_at ASC, debt_id ASC")
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(map_debt_row)
        .collect()
}

pub async fn update_debt_remaining(conn: &mut SqliteConnection, id: Uuid, remaining: Decimal) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE debts SET remaining = ? WHERE debt_id = ?")
        .bind(remaining.to_string())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_debt(conn: &mut SqliteConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM debts WHERE debt_id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/*==========Oracle chat=========== */

fn map_session_row(row: &SqliteRow) -> Result<ChatSession, sqlx::Error> {
    Ok(ChatSession {
        id: get_uuid(row, "session_id")?,
        title: row.try_get("title")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

pub async fn create_session(conn: &mut SqliteConnection, session: &ChatSession) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO chat_sessions (session_id, title, created_at) VALUES (?, ?, ?)")
        .bind(session.id.to_string())
        .bind(&session.title)
        .bind(ts(&session.created_at))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn get_session(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<ChatSession>, sqlx::Error> {
    sqlx::query("SELECT * FROM chat_sessions WHERE session_id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| map_session_row(&row))
        .transpose()
}

/// Most recent first.
pub async fn list_sessions(conn: &mut SqliteConnection) -> Result<Vec<ChatSession>, sqlx::Error> {
    sqlx::query("SELECT * FROM chat_sessions ORDER BY created_at DESC")
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(map_session_row)
        .collect()
}

pub async fn delete_session(conn: &mut SqliteConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    let result = sqlx::query("DELETE FROM chat_sessions WHERE session_id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_message(conn: &mut SqliteConnection, message: &ChatMessage) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO chat_messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?)")
        .bind(message.session_id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(ts(&message.created_at))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// The last `limit` messages of a session, in chronological order.
pub async fn recent_messages(conn: &mut SqliteConnection, session_id: Uuid, limit: Option<i64>) -> Result<Vec<ChatMessage>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM (
            SELECT * FROM chat_messages
            WHERE session_id = ?
            ORDER BY message_id DESC
            LIMIT COALESCE(?, -1)
        )
        ORDER BY message_id ASC
        "#,
    )
    .bind(session_id.to_string())
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let role: String = row.try_get("role")?;
            Ok(ChatMessage {
                session_id: get_uuid(row, "session_id")?,
                role: ChatRole::parse(&role).ok_or_else(|| decode_err("role", &role))?,
                content: row.try_get("content")?,
                created_at: get_timestamp(row, "created_at")?,
            })
        })
        .collect()
}

/*==========Offline queue=========== */

fn map_queued_row(row: &SqliteRow) -> Result<QueuedOp, sqlx::Error> {
    let attempts: i64 = row.try_get("attempts")?;
    let status: String = row.try_get("status")?;
    Ok(QueuedOp {
        seq: row.try_get("seq")?,
        op: get_json::<PendingOp>(row, "payload")?,
        attempts: u32::try_from(attempts).map_err(|e| decode_err("attempts", e))?,
        last_error: row.try_get("last_error")?,
        status: match status.as_str() {
            "dead" => QueueStatus::Dead,
            _ => QueueStatus::Pending,
        },
    })
}

pub async fn enqueue_op(conn: &mut SqliteConnection, op: &PendingOp) -> Result<i64, sqlx::Error> {
    let seq: i64 = sqlx::query_scalar(
        "INSERT INTO pending_ops (payload, created_at) VALUES (?, ?) RETURNING seq",
    )
    .bind(to_json(op)?)
    .bind(ts(&Utc::now()))
    .fetch_one(&mut *conn)
    .await?;
    Ok(seq)
}

/// Oldest entry still waiting to be sent.
pub async fn next_pending_op(conn: &mut SqliteConnection) -> Result<Option<QueuedOp>, sqlx::Error> {
    sqlx::query("SELECT * FROM pending_ops WHERE status = 'pending' ORDER BY seq ASC LIMIT 1")
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| map_queued_row(&row))
        .transpose()
}

pub async fn list_ops(conn: &mut SqliteConnection) -> Result<Vec<QueuedOp>, sqlx::Error> {
    sqlx::query("SELECT * FROM pending_ops ORDER BY seq ASC")
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(map_queued_row)
        .collect()
}

pub async fn remove_op(conn: &mut SqliteConnection, seq: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pending_ops WHERE seq = ?")
        .bind(seq)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn record_op_failure(
    conn: &mut SqliteConnection,
    seq: i64,
    attempts: u32,
    error: &str,
    status: QueueStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE pending_ops SET attempts = ?, last_error = ?, status = ? WHERE seq = ?")
        .bind(i64::from(attempts))
        .bind(error)
        .bind(match status {
            QueueStatus::Pending => "pending",
            QueueStatus::Dead => "dead",
        })
        .bind(seq)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn count_pending_ops(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM pending_ops WHERE status = 'pending'")
        .fetch_one(&mut *conn)
        .await
}
