use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tertulia_core::config::StateBackend;
use tertulia_db::{ping, DbPool};
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    backend: StateBackend,
    db_pool: Option<DbPool>,
}

impl HealthState {
    pub fn new(backend: StateBackend, db_pool: Option<DbPool>) -> Self {
        Self { backend, db_pool }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub state_store: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let state_store = state_store_check(&state).await;
    let ready = state_store.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "tertulia-server turn runner initialized".to_string(),
        },
        state_store,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn state_store_check(state: &HealthState) -> HealthCheck {
    match (state.backend, &state.db_pool) {
        (StateBackend::Memory, _) => {
            HealthCheck { status: "ready", detail: "in-memory conversation state".to_string() }
        }
        (StateBackend::Sqlite, None) => HealthCheck {
            status: "degraded",
            detail: "sqlite state backend has no connection pool".to_string(),
        },
        (StateBackend::Sqlite, Some(pool)) => match ping(pool).await {
            Ok(()) => {
                HealthCheck { status: "ready", detail: "database query succeeded".to_string() }
            }
            Err(error) => HealthCheck {
                status: "degraded",
                detail: format!("database query failed: {error}"),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use tertulia_core::config::StateBackend;
    use tertulia_db::connect_with_settings;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");

        let (status, Json(payload)) =
            health(State(HealthState::new(StateBackend::Sqlite, Some(pool.clone())))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.state_store.status, "ready");
        assert_eq!(payload.service.status, "ready");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) =
            health(State(HealthState::new(StateBackend::Sqlite, Some(pool)))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.state_store.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn memory_backend_is_ready_without_a_database() {
        let (status, Json(payload)) =
            health(State(HealthState::new(StateBackend::Memory, None))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.state_store.detail, "in-memory conversation state");
    }
}
