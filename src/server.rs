//! HTTP front end.
//!
//! A small axum application that serves the index page and a health endpoint
//! backed by the connection pool. The handlers only call into the data-access
//! layer through [`select`]; no HTTP type leaks into `db`.

use crate::db::{Pool, PoolStatus, select};
use crate::error::{DbError, DbResult};
use crate::models::Statement;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub pool: PoolStatus,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
}

impl DbError {
    fn status_code(&self) -> StatusCode {
        match self {
            DbError::Connection { .. } | DbError::PoolClosed | DbError::Timeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            DbError::Binding { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DbError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            suggestion: self.suggestion().map(String::from),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the application router.
pub fn router(pool: Pool) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(pool)
}

async fn index() -> Html<&'static str> {
    Html("<h1>Awesome</h1>")
}

async fn health(State(pool): State<Pool>) -> Result<Json<HealthResponse>, DbError> {
    select(&pool, &Statement::new("SELECT 1"), Some(1)).await?;
    Ok(Json(HealthResponse {
        status: "ok",
        pool: pool.status(),
    }))
}

/// HTTP server bound to one address, owning the pool's shutdown.
pub struct HttpServer {
    pool: Pool,
    host: String,
    port: u16,
}

impl HttpServer {
    pub fn new(pool: Pool, host: impl Into<String>, port: u16) -> Self {
        Self {
            pool,
            host: host.into(),
            port,
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Serve until SIGINT or SIGTERM, then drain requests and close the pool.
    pub async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;

        info!("server started at http://{}...", bind_addr);

        let result = axum::serve(listener, router(self.pool.clone()))
            .with_graceful_shutdown(wait_for_signal())
            .await;

        // close the pool even when serving failed
        info!("Closing database connections");
        self.pool.shutdown().await;

        match result {
            Ok(()) => {
                info!("HTTP server stopped");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "HTTP server error");
                Err(DbError::internal(format!("HTTP server error: {}", e)))
            }
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
