//! Order endpoints: intake, fetch, transition, deletion, audit listings.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CounterpartyId, OrderId, OrderLineId, OrderNo};
use domain::{Diopter, Money, Order, OrderKind, OrderLine, OrderStatus};
use fulfillment::{FulfillmentEngine, TransitionOutcome, TransitionRequest};
use ledger_store::{AccountMovement, InventoryMovement, LedgerStore, WorkLogEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: LedgerStore> {
    pub engine: FulfillmentEngine<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub order_no: String,
    pub counterparty_id: Uuid,
    pub kind: String,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub sph: Option<i32>,
    pub cyl: Option<i32>,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Deserialize)]
pub struct TransitionBody {
    pub target: String,
    pub line_ids: Option<Vec<Uuid>>,
    pub actor: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_no: String,
    pub counterparty_id: Uuid,
    pub kind: String,
    pub status: String,
    pub total_cents: i64,
    pub lines: Vec<OrderLineResponse>,
    pub ordered_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub product_id: String,
    pub sph: Option<i32>,
    pub cyl: Option<i32>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub status: String,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub order_id: Uuid,
    pub order_no: String,
    pub previous_status: String,
    pub new_status: String,
    pub inventory_movements: Vec<InventoryMovementResponse>,
    pub account_movement: Option<AccountMovementResponse>,
    pub balance_after_cents: i64,
}

#[derive(Serialize)]
pub struct InventoryMovementResponse {
    pub id: Uuid,
    pub sku_option_id: Option<Uuid>,
    pub product_id: String,
    pub movement_type: String,
    pub quantity_delta: i32,
    pub stock_before: i64,
    pub stock_after: i64,
    pub memo: String,
}

#[derive(Serialize)]
pub struct AccountMovementResponse {
    pub id: Uuid,
    pub counterparty_id: Uuid,
    pub movement_type: String,
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    pub memo: String,
}

#[derive(Serialize)]
pub struct WorkLogResponse {
    pub id: Uuid,
    pub work_type: String,
    pub description: String,
    pub details: serde_json::Value,
    pub actor: String,
    pub logged_at: DateTime<Utc>,
}

impl OrderResponse {
    fn from_order(order: &Order) -> Self {
        Self {
            id: order.id().as_uuid(),
            order_no: order.order_no().to_string(),
            counterparty_id: order.counterparty_id().as_uuid(),
            kind: order.kind().as_str().to_string(),
            status: order.status().as_str().to_string(),
            total_cents: order.total_amount().cents(),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderLineResponse {
                    id: line.id.as_uuid(),
                    product_id: line.product_id.to_string(),
                    sph: line.sph.map(|d| d.as_hundredths()),
                    cyl: line.cyl.map(|d| d.as_hundredths()),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                    line_total_cents: line.line_total().cents(),
                    status: line.status.as_str().to_string(),
                })
                .collect(),
            ordered_at: order.ordered_at(),
            confirmed_at: order.confirmed_at(),
            shipped_at: order.shipped_at(),
            delivered_at: order.delivered_at(),
        }
    }
}

fn inventory_movement_response(movement: &InventoryMovement) -> InventoryMovementResponse {
    InventoryMovementResponse {
        id: movement.id.as_uuid(),
        sku_option_id: movement.sku_option_id.map(|id| id.as_uuid()),
        product_id: movement.product_id.to_string(),
        movement_type: movement.movement_type.as_str().to_string(),
        quantity_delta: movement.quantity_delta,
        stock_before: movement.stock_before,
        stock_after: movement.stock_after,
        memo: movement.memo.clone(),
    }
}

pub(crate) fn account_movement_response(movement: &AccountMovement) -> AccountMovementResponse {
    AccountMovementResponse {
        id: movement.id.as_uuid(),
        counterparty_id: movement.counterparty_id.as_uuid(),
        movement_type: movement.movement_type.as_str().to_string(),
        amount_cents: movement.amount.cents(),
        balance_after_cents: movement.balance_after.cents(),
        memo: movement.memo.clone(),
    }
}

fn transition_response(outcome: &TransitionOutcome) -> TransitionResponse {
    TransitionResponse {
        order_id: outcome.order_id.as_uuid(),
        order_no: outcome.order_no.to_string(),
        previous_status: outcome.previous_status.as_str().to_string(),
        new_status: outcome.new_status.as_str().to_string(),
        inventory_movements: outcome
            .inventory_movements
            .iter()
            .map(inventory_movement_response)
            .collect(),
        account_movement: outcome
            .account_movement
            .as_ref()
            .map(account_movement_response),
        balance_after_cents: outcome.balance_after.cents(),
    }
}

// -- Handlers --

/// POST /orders — creates a pending order with its lines.
pub async fn create<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let kind = OrderKind::parse(&request.kind)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown order kind: {}", request.kind)))?;

    if request.lines.is_empty() {
        return Err(ApiError::BadRequest("order has no lines".to_string()));
    }

    let counterparty_id = CounterpartyId::from_uuid(request.counterparty_id);
    if state.engine.store().get_account(counterparty_id).await?.is_none() {
        return Err(ApiError::BadRequest(format!(
            "unknown counterparty: {}",
            request.counterparty_id
        )));
    }

    let mut lines = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        if line.quantity == 0 {
            return Err(ApiError::BadRequest("line quantity may not be zero".to_string()));
        }
        lines.push(OrderLine::new(
            line.product_id.as_str(),
            line.sph.map(Diopter::from_hundredths),
            line.cyl.map(Diopter::from_hundredths),
            line.quantity,
            Money::from_cents(line.unit_price_cents),
        ));
    }

    let order = Order::new(
        OrderNo::new(request.order_no),
        counterparty_id,
        kind,
        lines,
        Utc::now(),
    );
    state.engine.store().insert_order(&order).await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from_order(&order))))
}

/// GET /orders/{id} — fetches an order with its lines.
pub async fn get<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .engine
        .store()
        .get_order(OrderId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /orders/{id}/transition — executes a status transition.
pub async fn transition<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let target = OrderStatus::parse(&body.target)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown target status: {}", body.target)))?;

    let request = TransitionRequest {
        order_id: OrderId::from_uuid(id),
        target,
        line_scope: body
            .line_ids
            .map(|ids| ids.into_iter().map(OrderLineId::from_uuid).collect()),
        actor: body.actor.unwrap_or_else(|| "api".to_string()),
    };

    let outcome = state.engine.transition(request).await?;
    Ok(Json(transition_response(&outcome)))
}

/// DELETE /orders/{id} — deletes an order that has never shipped.
pub async fn remove<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_order(OrderId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /orders/{id}/movements — lists the order's inventory movements.
pub async fn movements<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InventoryMovementResponse>>, ApiError> {
    let movements = state
        .engine
        .store()
        .inventory_movements_for_order(OrderId::from_uuid(id))
        .await?;
    Ok(Json(movements.iter().map(inventory_movement_response).collect()))
}

/// GET /orders/{id}/worklog — lists the order's audit entries.
pub async fn worklog<S: LedgerStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<WorkLogResponse>>, ApiError> {
    let entries = state
        .engine
        .store()
        .work_logs_for_order(OrderId::from_uuid(id))
        .await?;
    Ok(Json(
        entries
            .iter()
            .map(|entry: &WorkLogEntry| WorkLogResponse {
                id: entry.id,
                work_type: entry.work_type.clone(),
                description: entry.description.clone(),
                details: entry.details.clone(),
                actor: entry.actor.clone(),
                logged_at: entry.logged_at,
            })
            .collect(),
    ))
}
