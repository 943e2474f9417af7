use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{response::ApiResponse, state::AppState};

#[derive(Serialize, ToSchema)]
pub struct HealthData {
    /// `ok` when the database answers, `degraded` otherwise.
    pub status: String,
    pub database: bool,
    /// Gateway adapter in use (`mercadopago` or `mock`).
    pub gateway: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service liveness", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let database = match state.orm.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "database ping failed");
            false
        }
    };

    Json(ApiResponse::ok(
        "Health check",
        HealthData {
            status: if database { "ok" } else { "degraded" }.to_string(),
            database,
            gateway: state.gateway.name().to_string(),
        },
    ))
}
