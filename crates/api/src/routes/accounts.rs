//! Counterparty account endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::CounterpartyId;
use domain::{CounterpartyAccount, Money};
use ledger_store::LedgerStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::orders::{AppState, AccountMovementResponse, account_movement_response};

#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub credit_limit_cents: Option<i64>,
}

#[derive(Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: String,
    pub outstanding_cents: i64,
    pub credit_limit_cents: i64,
}

fn account_response(account: &CounterpartyAccount) -> AccountResponse {
    AccountResponse {
        id: account.id.as_uuid(),
        name: account.name.clone(),
        outstanding_cents: account.outstanding.cents(),
        credit_limit_cents: account.credit_limit.cents(),
    }
}

/// POST /accounts — creates a counterparty account.
pub async fn create<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("account name is required".to_string()));
    }

    let account = CounterpartyAccount::new(
        request.name,
        Money::from_cents(request.credit_limit_cents.unwrap_or(0)),
    );
    state.engine.store().insert_account(&account).await?;

    Ok((StatusCode::CREATED, Json(account_response(&account))))
}

/// GET /accounts/{id} — fetches an account with its running balance.
pub async fn get<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .engine
        .store()
        .get_account(CounterpartyId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("account {id} not found")))?;
    Ok(Json(account_response(&account)))
}

/// GET /accounts/{id}/movements — lists the account's balance movements.
pub async fn movements<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AccountMovementResponse>>, ApiError> {
    let movements = state
        .engine
        .store()
        .account_movements_for_counterparty(CounterpartyId::from_uuid(id))
        .await?;
    Ok(Json(movements.iter().map(account_movement_response).collect()))
}
