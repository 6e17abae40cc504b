//! HTTP API for the POS frontend.
//!
//! | Route                    | Auth      | Purpose                                  |
//! |--------------------------|-----------|------------------------------------------|
//! | `GET /health`            | none      | liveness                                 |
//! | `POST /api/generate_by_ref` | `X-API-Key` | open a transaction for a reference   |
//! | `POST /api/result`       | `X-API-Key` | raw verifier result                    |
//! | `GET /view/result`       | none      | plain-text receipt                       |

use crate::error::{Error, Result};
use crate::receipt::ReceiptView;
use crate::service::PosService;
use crate::verifier::{PollError, TransactionId};
use axum::{
    extract::{rejection::JsonRejection, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Header carrying the client API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
struct ApiState {
    service: PosService,
    api_key: Arc<str>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    transaction_id: String,
    auth_uri: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultRequest {
    #[serde(rename = "transactionId", default)]
    transaction_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    #[serde(rename = "transactionId", default)]
    transaction_id: Option<String>,
}

/// Build the API router.
///
/// `/api/*` routes reject requests whose `X-API-Key` does not equal `api_key`.
pub fn router(service: PosService, api_key: impl Into<String>) -> Router {
    let state = ApiState {
        service,
        api_key: Arc::from(api_key.into()),
    };

    let api = Router::new()
        .route("/api/generate_by_ref", post(generate_by_ref))
        .route("/api/result", post(result))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .route("/view/result", get(view_result))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown_rx` flips to true.
///
/// # Errors
///
/// Returns [`Error::Server`] if the server fails.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Serving HTTP API on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| Error::Server(e.to_string()))?;

    info!("HTTP API on {} stopped", addr);
    Ok(())
}

async fn require_api_key(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == state.api_key.as_ref());

    if !authorized {
        warn!("Rejected {} {}: missing or invalid API key", request.method(), request.uri().path());
        return error_body(StatusCode::UNAUTHORIZED, "Unauthorized. Valid API Key required.");
    }
    next.run(request).await
}

async fn health() -> &'static str {
    "ok"
}

async fn generate_by_ref(
    State(state): State<ApiState>,
    body: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    // An unreadable body is treated like one without a ref
    let request = body.map(|Json(r)| r).unwrap_or_default();

    match state.service.generate_by_ref(request.reference.as_deref()).await {
        Ok(transaction) => Json(GenerateResponse {
            transaction_id: transaction.transaction_id.to_string(),
            auth_uri: transaction.auth_uri,
            image: transaction
                .artifact_path
                .map(|p| p.to_string_lossy().into_owned()),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn result(
    State(state): State<ApiState>,
    body: std::result::Result<Json<ResultRequest>, JsonRejection>,
) -> Response {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let Some(transaction_id) = request
        .transaction_id
        .filter(|id| !id.trim().is_empty())
        .map(TransactionId::from)
    else {
        return error_body(StatusCode::BAD_REQUEST, "missing transactionId");
    };

    match state.service.poll_result(&transaction_id).await {
        Ok(result) => Json(result.raw).into_response(),
        Err(PollError::NotYetAvailable) => {
            error_body(StatusCode::NOT_FOUND, "Verification result not available yet")
        }
        Err(e) => {
            error!("Result lookup for {} failed: {}", transaction_id, e);
            error_body(StatusCode::BAD_GATEWAY, "Service temporarily unavailable")
        }
    }
}

async fn view_result(State(state): State<ApiState>, Query(query): Query<ViewQuery>) -> Response {
    let requested = query.transaction_id.filter(|id| !id.trim().is_empty());

    let view = match requested {
        Some(id) => state.service.receipt_view(Some(&id)).await,
        None => match state.service.sessions().current() {
            Some(live) => return redirect(&result_location(&live.transaction_id)),
            None => ReceiptView::NoTransaction,
        },
    };

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        view.to_string(),
    )
        .into_response()
}

/// Result page URL for `transaction_id`, query-encoded.
fn result_location(transaction_id: &TransactionId) -> String {
    let encoded = reqwest::Url::parse_with_params(
        "http://localhost/view/result",
        &[("transactionId", transaction_id.as_str())],
    );
    match encoded {
        Ok(url) => format!("{}?{}", url.path(), url.query().unwrap_or_default()),
        Err(_) => "/view/result".to_string(),
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn error_response(err: &Error) -> Response {
    match err {
        Error::Validation(message) => error_body(StatusCode::BAD_REQUEST, message),
        e if e.is_upstream() => {
            error!("Verifier call failed: {}", e);
            error_body(StatusCode::BAD_GATEWAY, "Service temporarily unavailable")
        }
        e => {
            error!("Request failed: {}", e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
