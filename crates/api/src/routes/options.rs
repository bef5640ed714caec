//! SKU option endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::SkuOptionId;
use domain::{Diopter, SkuOption};
use ledger_store::LedgerStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Deserialize)]
pub struct CreateOptionRequest {
    pub product_id: String,
    pub sph: Option<i32>,
    pub cyl: Option<i32>,
    pub stock: i64,
}

#[derive(Serialize)]
pub struct OptionResponse {
    pub id: Uuid,
    pub product_id: String,
    pub sph: Option<i32>,
    pub cyl: Option<i32>,
    pub stock: i64,
    pub active: bool,
}

fn option_response(option: &SkuOption) -> OptionResponse {
    OptionResponse {
        id: option.id.as_uuid(),
        product_id: option.product_id.to_string(),
        sph: option.sph.map(|d| d.as_hundredths()),
        cyl: option.cyl.map(|d| d.as_hundredths()),
        stock: option.stock,
        active: option.active,
    }
}

/// POST /sku-options — creates a stock-tracked option.
pub async fn create<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<CreateOptionRequest>,
) -> Result<(StatusCode, Json<OptionResponse>), ApiError> {
    if request.stock < 0 {
        return Err(ApiError::BadRequest("stock may not be negative".to_string()));
    }

    let option = SkuOption::new(
        request.product_id.as_str(),
        request.sph.map(Diopter::from_hundredths),
        request.cyl.map(Diopter::from_hundredths),
        request.stock,
    );
    state.engine.store().insert_option(&option).await?;

    Ok((StatusCode::CREATED, Json(option_response(&option))))
}

/// GET /sku-options/{id} — fetches an option with its current stock.
pub async fn get<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OptionResponse>, ApiError> {
    let option = state
        .engine
        .store()
        .get_option(SkuOptionId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("sku option {id} not found")))?;
    Ok(Json(option_response(&option)))
}
