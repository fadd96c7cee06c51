use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use shadoron_finance::backend::{self, AppState};
use shadoron_finance::database::models::{PendingOp, Transaction, TransactionKind};
use shadoron_finance::service::now;
use shadoron_finance::FinanceService;

async fn app() -> Router {
    let service = FinanceService::open("sqlite::memory:").await.unwrap();
    backend::app(AppState { service, oracle: None })
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

fn dec(v: &Value) -> Decimal {
    serde_json::from_value(v.clone()).unwrap()
}

#[tokio::test]
async fn health_check() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Backend is running"));
}

#[tokio::test]
async fn income_expense_and_delete_move_balances() {
    let app = app().await;

    let (status, income) = call(&app, "POST", "/api/transactions/income", Some(json!({"amount": "200", "note": "pay"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(income["transaction"]["type"], "income");
    assert!(income["surplus"].is_null());

    let (status, expense) = call(
        &app,
        "POST",
        "/api/transactions/expense",
        Some(json!({"category": "food", "amount": "12.50"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, balances) = call(&app, "GET", "/api/balances", None).await;
    assert_eq!(dec(&balances["housing"]), Decimal::from(70));
    assert_eq!(dec(&balances["food"]), Decimal::new(1750, 2));

    let id = expense["id"].as_str().unwrap();
    let (status, _) = call(&app, "DELETE", &format!("/api/transactions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, balances) = call(&app, "GET", "/api/balances", None).await;
    assert_eq!(dec(&balances["food"]), Decimal::from(30));

    let (_, history) = call(&app, "GET", "/api/transactions?limit=10", None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (_, game) = call(&app, "GET", "/api/gamification", None).await;
    assert_eq!(game["xp"], 17);
    assert_eq!(game["progress"]["rank"]["name"], "Novice");
}

#[tokio::test]
async fn validation_errors_map_to_status_codes() {
    let app = app().await;

    let (status, body) = call(&app, "POST", "/api/transactions/income", Some(json!({"amount": "-5"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = call(
        &app,
        "POST",
        "/api/transactions/expense",
        Some(json!({"category": "yachts", "amount": "5"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "DELETE", &format!("/api/transactions/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn locked_categories_cannot_be_rebalanced() {
    let app = app().await;
    let (_, mut config) = call(&app, "GET", "/api/config", None).await;
    config["categories"][0]["locked"] = json!(true);
    let (status, _) = call(&app, "PUT", "/api/config", Some(config)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "PUT", "/api/categories/housing/percent", Some(json!({"percent": "20"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, cats) = call(&app, "PUT", "/api/categories/leisure/percent", Some(json!({"percent": "20"}))).await;
    assert_eq!(status, StatusCode::OK);
    let total: Decimal = cats.as_array().unwrap().iter().map(|c| dec(&c["percent"])).sum();
    assert_eq!(total, Decimal::ONE_HUNDRED);
    assert_eq!(dec(&cats[0]["percent"]), Decimal::from(35));
}

#[tokio::test]
async fn surplus_preview_routes_income_above_base() {
    let app = app().await;
    let (_, mut config) = call(&app, "GET", "/api/config", None).await;
    config["surplusRule"]["enabled"] = json!(true);
    config["surplusRule"]["base"] = json!("1000");
    call(&app, "PUT", "/api/config", Some(config)).await;

    let (status, plan) = call(&app, "POST", "/api/surplus/preview", Some(json!({"amount": "1500"}))).await;
    assert_eq!(status, StatusCode::OK);
    let surplus = &plan["surplus"];
    assert_eq!(dec(&surplus["equipment"]), Decimal::from(150));
    assert_eq!(dec(&surplus["business"]), Decimal::from(150));
    assert_eq!(dec(&surplus["savings"]), Decimal::from(200));
}

#[tokio::test]
async fn goals_and_debts() {
    let app = app().await;

    let (status, goal) = call(&app, "POST", "/api/goals", Some(json!({"name": "Bike", "target": "400"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = goal["id"].as_str().unwrap();
    let (_, goal) = call(&app, "POST", &format!("/api/goals/{id}/contribute"), Some(json!({"amount": "100"}))).await;
    assert_eq!(dec(&goal["current"]), Decimal::from(100));

    let (status, debt) = call(
        &app,
        "POST",
        "/api/debts",
        Some(json!({"name": "Card", "principal": "1000", "annualRate": "12", "minimumPayment": "100"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(dec(&debt["monthlyInterest"]), Decimal::from(10));
    assert_eq!(debt["payoff"]["months"], 11);

    let id = debt["id"].as_str().unwrap();
    let (_, payment) = call(&app, "POST", &format!("/api/debts/{id}/payments"), Some(json!({"amount": "5000"}))).await;
    assert_eq!(dec(&payment["applied"]), Decimal::from(1000));
    assert_eq!(dec(&payment["debt"]["remaining"]), Decimal::ZERO);

    let (status, _) = call(&app, "DELETE", &format!("/api/debts/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn export_import_round_trip_and_bad_imports() {
    let app = app().await;
    call(&app, "POST", "/api/transactions/income", Some(json!({"amount": "100"}))).await;
    let (status, doc) = call(&app, "GET", "/api/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["version"], 1);

    let fresh = self::app().await;
    let (status, _) = call(&fresh, "POST", "/api/import", Some(doc.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, balances) = call(&fresh, "GET", "/api/balances", None).await;
    assert_eq!(balances, doc["balances"]);

    let (status, body) = call(&fresh, "POST", "/api/import", Some(json!({"version": 9}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("import"));
}

#[tokio::test]
async fn sync_endpoint_is_idempotent() {
    let app = app().await;
    let tx = Transaction {
        id: Uuid::new_v4(),
        kind: TransactionKind::Expense,
        amount: Decimal::from(5),
        category: Some("food".into()),
        timestamp: now(),
        note: None,
        allocations: vec![shadoron_finance::database::models::Allocation {
            category: "food".into(),
            amount: Decimal::from(-5),
        }],
    };
    let ops = vec![PendingOp::CreateTransaction { transaction: tx.clone() }];

    let (status, first) = call(&app, "POST", "/api/sync", Some(json!({ "ops": ops }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, json!({"applied": 1, "skipped": 0}));

    let (_, second) = call(&app, "POST", "/api/sync", Some(json!({ "ops": ops }))).await;
    assert_eq!(second, json!({"applied": 0, "skipped": 1}));

    let delete = vec![PendingOp::DeleteTransaction { id: tx.id }, PendingOp::DeleteTransaction { id: tx.id }];
    let (_, third) = call(&app, "POST", "/api/sync", Some(json!({ "ops": delete }))).await;
    assert_eq!(third, json!({"applied": 1, "skipped": 1}));
}

#[tokio::test]
async fn oversized_amounts_are_rejected_not_panicking() {
    let app = app().await;
    let huge = "9999999999999999999999999999";

    let (status, body) = call(&app, "POST", "/api/transactions/income", Some(json!({ "amount": huge }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid amount"));

    let (status, _) = call(&app, "POST", "/api/transactions/expense", Some(json!({"category": "food", "amount": huge}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", "/api/surplus/preview", Some(json!({ "amount": huge }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // the server is still up and nothing was booked
    let (status, history) = call(&app, "GET", "/api/transactions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn sync_rejects_tampered_and_unknown_operations() {
    let app = app().await;
    let tampered = Transaction {
        id: Uuid::new_v4(),
        kind: TransactionKind::Expense,
        amount: Decimal::from(5),
        category: Some("food".into()),
        timestamp: now(),
        note: None,
        allocations: vec![shadoron_finance::database::models::Allocation {
            category: "food".into(),
            amount: Decimal::from(500),
        }],
    };
    let ops = vec![PendingOp::CreateTransaction { transaction: tampered }];
    let (status, _) = call(&app, "POST", "/api/sync", Some(json!({ "ops": ops }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, balances) = call(&app, "GET", "/api/balances", None).await;
    assert!(balances.get("food").is_none());

    let goal_op = json!({"ops": [{"op": "contribute_goal", "goal_id": Uuid::new_v4(), "amount": "10"}]});
    let (status, _) = call(&app, "POST", "/api/sync", Some(goal_op)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn oracle_routes_report_missing_configuration() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/api/oracle/sessions", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("oracle"));
}

#[tokio::test]
async fn data_survives_reopening_a_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("budget.db").display());

    let service = FinanceService::open(&url).await.unwrap();
    service.record_income(Decimal::from(100), None).await.unwrap();
    service.pool().close().await;

    let reopened = FinanceService::open(&url).await.unwrap();
    assert_eq!(reopened.history(None).await.unwrap().len(), 1);
    assert_eq!(reopened.balances().await.unwrap().get("savings"), Decimal::from(20));
}
