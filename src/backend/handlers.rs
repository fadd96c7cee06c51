use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::backend::AppState;
use crate::database::models::{BudgetConfig, Debt, GamificationState};
use crate::engine::{self, PayoffPlan, RankProgress};
use crate::error::{FinanceError, Result};
use crate::export::ExportDocument;
use crate::oracle::Oracle;
use crate::sync::{SyncRequest, SyncResponse};

#[derive(Debug, Deserialize, Serialize)]
pub struct PercentReq {
    pub percent: Decimal,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IncomeReq {
    pub amount: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExpenseReq {
    pub category: String,
    pub amount: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AmountReq {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateGoalReq {
    pub name: String,
    pub target: Decimal,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDebtReq {
    pub name: String,
    pub principal: Decimal,
    #[serde(default)]
    pub annual_rate: Decimal,
    #[serde(default)]
    pub minimum_payment: Decimal,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateSessionReq {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AskReq {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct GamificationView {
    #[serde(flatten)]
    pub state: GamificationState,
    pub progress: RankProgress,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtView {
    #[serde(flatten)]
    pub debt: Debt,
    pub monthly_interest: Decimal,
    /// Payoff at the minimum payment, if it ever pays off.
    pub payoff: Option<PayoffPlan>,
}

impl From<Debt> for DebtView {
    fn from(debt: Debt) -> Self {
        Self {
            monthly_interest: debt.monthly_interest(),
            payoff: debt.payoff_plan(debt.minimum_payment),
            debt,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub debt: DebtView,
    pub applied: Decimal,
}

fn oracle(state: &AppState) -> Result<&Oracle> {
    state
        .oracle
        .as_ref()
        .ok_or_else(|| FinanceError::Config("oracle is not configured".into()))
}

/*==========Config=========== */

pub async fn get_config(State(state): State<AppState>) -> Result<Json<BudgetConfig>> {
    Ok(Json(state.service.config().await?))
}

pub async fn put_config(
    State(state): State<AppState>,
    Json(payload): Json<BudgetConfig>,
) -> Result<Json<BudgetConfig>> {
    Ok(Json(state.service.replace_config(payload).await?))
}

pub async fn set_category_percent(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<PercentReq>,
) -> Result<impl IntoResponse> {
    let categories = state.service.rebalance_category(&key, payload.percent).await?;
    Ok(Json(categories))
}

/*==========Ledger=========== */

pub async fn get_balances(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.service.balances().await?))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.service.history(q.limit).await?))
}

pub async fn create_income(
    State(state): State<AppState>,
    Json(payload): Json<IncomeReq>,
) -> Result<impl IntoResponse> {
    let recorded = state.service.record_income(payload.amount, payload.note).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

pub async fn create_expense(
    State(state): State<AppState>,
    Json(payload): Json<ExpenseReq>,
) -> Result<impl IntoResponse> {
    let tx = state
        .service
        .record_expense(&payload.category, payload.amount, payload.note)
        .await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.service.delete_transaction(id).await?))
}

/// Shows how an income would be split, without recording anything.
pub async fn surplus_preview(
    State(state): State<AppState>,
    Json(payload): Json<AmountReq>,
) -> Result<impl IntoResponse> {
    let config = state.service.config().await?;
    Ok(Json(engine::plan_income(&config, payload.amount)?))
}

pub async fn get_gamification(State(state): State<AppState>) -> Result<Json<GamificationView>> {
    let game = state.service.gamification().await?;
    let progress = engine::rank_progress(game.xp);
    Ok(Json(GamificationView { state: game, progress }))
}

/*==========Goals=========== */

pub async fn list_goals(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.service.goals().await?))
}

pub async fn create_goal(
    State(state): State<AppState>,
    Json(payload): Json<CreateGoalReq>,
) -> Result<impl IntoResponse> {
    let goal = state
        .service
        .create_goal(&payload.name, payload.target, payload.deadline)
        .await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn contribute_goal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AmountReq>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.service.contribute_goal(id, payload.amount).await?))
}

pub async fn delete_goal(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.service.delete_goal(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/*==========Debts=========== */

pub async fn list_debts(State(state): State<AppState>) -> Result<Json<Vec<DebtView>>> {
    let debts = state.service.debts().await?;
    Ok(Json(debts.into_iter().map(DebtView::from).collect()))
}

pub async fn create_debt(
    State(state): State<AppState>,
    Json(payload): Json<CreateDebtReq>,
) -> Result<impl IntoResponse> {
    let debt = state
        .service
        .create_debt(&payload.name, payload.principal, payload.annual_rate, payload.minimum_payment)
        .await?;
    Ok((StatusCode::CREATED, Json(DebtView::from(debt))))
}

pub async fn pay_debt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AmountReq>,
) -> Result<Json<PaymentView>> {
    let (debt, applied) = state.service.pay_debt(id, payload.amount).await?;
    Ok(Json(PaymentView {
        debt: debt.into(),
        applied,
    }))
}

pub async fn delete_debt(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.service.delete_debt(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/*==========Export / import / sync=========== */

pub async fn export(State(state): State<AppState>) -> Result<Json<ExportDocument>> {
    Ok(Json(state.service.export().await?))
}

// Raw body so that malformed files get the same "invalid import" answer.
pub async fn import(State(state): State<AppState>, body: String) -> Result<StatusCode> {
    let doc = ExportDocument::parse(&body)?;
    state.service.import(doc).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Applies operations replayed from another instance's offline queue, in
/// order. Already-applied operations are counted as skipped.
pub async fn sync_handler(
    State(state): State<AppState>,
    Json(payload): Json<SyncRequest>,
) -> Result<Json<SyncResponse>> {
    info!("Received sync request, processing {} operations", payload.ops.len());

    let mut response = SyncResponse::default();
    for op in payload.ops {
        if state.service.apply_remote(op).await? {
            response.applied += 1;
        } else {
            response.skipped += 1;
        }
    }

    info!(applied = response.applied, skipped = response.skipped, "sync complete");
    Ok(Json(response))
}

/*==========Oracle=========== */

pub async fn list_sessions(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(oracle(&state)?.sessions().await?))
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionReq>,
) -> Result<impl IntoResponse> {
    let session = oracle(&state)?.create_session(payload.title.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn session_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(oracle(&state)?.messages(id).await?))
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    oracle(&state)?.delete_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn ask_oracle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AskReq>,
) -> Result<impl IntoResponse> {
    Ok(Json(oracle(&state)?.ask(id, &payload.question).await?))
}
