//! HTTP surface of the ledger.
//!
//! `POST /reset` and `POST /charge`, both taking an optional JSON body.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, de::DeserializeOwned};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::domain::{ChargeResult, DEFAULT_ACCOUNT, LedgerError, Store};
use crate::engine::Ledger;
use crate::strategy::Strategy;

/// Charge amount used when a request does not give one.
pub const DEFAULT_CHARGE: i64 = 10;

struct AppState<S>
where
    S: Store,
{
    ledger: Arc<Ledger<S>>,
    strategy: Strategy,
}

impl<S> Clone for AppState<S>
where
    S: Store,
{
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            strategy: self.strategy,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ResetRequest {
    account: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChargeRequest {
    account: Option<String>,
    charges: Option<i64>,
    strategy: Option<Strategy>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::Ledger(LedgerError::NegativeCharge(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Ledger(LedgerError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Builds the router. `strategy` serves requests that do not pick one.
pub fn router<S>(ledger: Arc<Ledger<S>>, strategy: Strategy) -> Router
where
    S: Store,
{
    Router::new()
        .route("/reset", post(reset::<S>))
        .route("/charge", post(charge::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { ledger, strategy })
}

/// An empty body reads as `{}`.
fn parse_body<T>(body: &Bytes) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn reset<S>(State(state): State<AppState<S>>, body: Bytes) -> Response
where
    S: Store,
{
    let result = async {
        let request: ResetRequest = parse_body(&body)?;
        let account = request.account.unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());
        state.ledger.reset(&account).await?;
        Ok::<_, ApiError>(account)
    }
    .await;

    match result {
        Ok(account) => {
            info!("Successfully reset account {}", account);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            error!(error = %e, "Error while resetting account");
            e.into_response()
        }
    }
}

async fn charge<S>(State(state): State<AppState<S>>, body: Bytes) -> Response
where
    S: Store,
{
    let result = async {
        let request: ChargeRequest = parse_body(&body)?;
        let account = request.account.unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());
        let amount = request.charges.unwrap_or(DEFAULT_CHARGE);
        let strategy = request.strategy.unwrap_or(state.strategy);

        let outcome = state.ledger.charge(strategy, &account, amount).await?;
        Ok::<_, ApiError>((account, ChargeResult::from(outcome)))
    }
    .await;

    match result {
        Ok((account, charge_result)) => {
            info!("Successfully charged account {}", account);
            (StatusCode::OK, Json(charge_result)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Error while charging account");
            e.into_response()
        }
    }
}
