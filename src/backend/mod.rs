mod handlers;
mod routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tracing::{error, info};

use crate::error::FinanceError;
use crate::oracle::Oracle;
use crate::service::FinanceService;

#[derive(Clone)]
pub struct AppState {
    pub service: FinanceService,
    /// `None` when no chat endpoint is configured.
    pub oracle: Option<Oracle>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "Backend is running" }))
        .merge(routes::api_routes())
        .with_state(state)
}

pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

impl FinanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidAmount(_)
            | Self::InvalidCategories(_)
            | Self::UnknownCategory(_)
            | Self::InvalidInput(_)
            | Self::InvalidImport(_)
            | Self::Serialization(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::LockedCategory(_) => StatusCode::CONFLICT,
            Self::Oracle(_) | Self::Sync(_) | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FinanceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
