use axum::{
    routing::{delete, get, post, put},
    Router,
};
use crate::backend::{handlers, AppState};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/config", get(handlers::get_config).put(handlers::put_config))
        .route("/api/categories/:key/percent", put(handlers::set_category_percent))
        .route("/api/balances", get(handlers::get_balances))
        .route("/api/transactions", get(handlers::list_transactions))
        .route("/api/transactions/income", post(handlers::create_income))
        .route("/api/transactions/expense", post(handlers::create_expense))
        .route("/api/transactions/:id", delete(handlers::delete_transaction))
        .route("/api/surplus/preview", post(handlers::surplus_preview))
        .route("/api/gamification", get(handlers::get_gamification))
        .route("/api/goals", get(handlers::list_goals).post(handlers::create_goal))
        .route("/api/goals/:id", delete(handlers::delete_goal))
        .route("/api/goals/:id/contribute", post(handlers::contribute_goal))
        .route("/api/debts", get(handlers::list_debts).post(handlers::create_debt))
        .route("/api/debts/:id", delete(handlers::delete_debt))
        .route("/api/debts/:id/payments", post(handlers::pay_debt))
        .route("/api/export", get(handlers::export))
        .route("/api/import", post(handlers::import))
        .route("/api/sync", post(handlers::sync_handler))
        .route("/api/oracle/sessions", get(handlers::list_sessions).post(handlers::create_session))
        .route("/api/oracle/sessions/:id", delete(handlers::delete_session))
        .route("/api/oracle/sessions/:id/messages", get(handlers::session_messages))
        .route("/api/oracle/sessions/:id/ask", post(handlers::ask_oracle))
}
