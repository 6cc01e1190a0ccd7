use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::ranking::RankedShipment;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::shipment::{
    Location, NewShipment, Shipment, ShipmentId, ShipmentStatus, ShipmentUpdate,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shipments", post(create_shipment).get(list_shipments))
        .route("/shipments/check_status", get(check_status))
        .route("/shipments/sort_by_distance", post(sort_by_distance))
        .route(
            "/shipments/:id",
            get(get_shipment).put(update_shipment).delete(delete_shipment),
        )
        .route("/shipments/:id/assign", put(assign_shipment))
        .route("/shipments/:id/status", put(update_status))
}

#[derive(Deserialize)]
pub struct AssignQuery {
    pub courier_id: Uuid,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub new_status: String,
}

#[derive(Deserialize)]
pub struct CheckStatusQuery {
    pub shipment_id: ShipmentId,
    pub recipient_email: String,
}

/// Current courier position. `courier_id` defaults to the caller.
#[derive(Deserialize)]
pub struct SortByDistanceRequest {
    #[serde(flatten)]
    pub location: Location,
    #[serde(default)]
    pub courier_id: Option<Uuid>,
}

async fn create_shipment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewShipment>,
) -> Result<(StatusCode, Json<Shipment>), AppError> {
    let shipment = state.service.add_shipment(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

async fn list_shipments(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Shipment>>, AppError> {
    Ok(Json(state.service.get_all_shipments(&actor).await?))
}

async fn check_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckStatusQuery>,
) -> Result<Json<Shipment>, AppError> {
    let shipment = state
        .service
        .check_status(query.shipment_id, &query.recipient_email)
        .await?;
    Ok(Json(shipment))
}

async fn get_shipment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ShipmentId>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(state.service.get_shipment(&actor, id).await?))
}

async fn update_shipment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ShipmentId>,
    Json(payload): Json<ShipmentUpdate>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(state.service.update_shipment(&actor, id, payload).await?))
}

async fn delete_shipment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ShipmentId>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(state.service.delete_shipment(&actor, id).await?))
}

async fn assign_shipment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ShipmentId>,
    Query(query): Query<AssignQuery>,
) -> Result<Json<Shipment>, AppError> {
    let shipment = state
        .service
        .assign_shipment_to_courier(&actor, id, query.courier_id)
        .await?;
    Ok(Json(shipment))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<ShipmentId>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Shipment>, AppError> {
    let new_status = query
        .new_status
        .parse::<ShipmentStatus>()
        .map_err(|err| AppError::Validation(err.to_string()))?;

    Ok(Json(state.service.update_status(&actor, id, new_status).await?))
}

async fn sort_by_distance(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<SortByDistanceRequest>,
) -> Result<Json<Vec<RankedShipment>>, AppError> {
    let courier_id = payload.courier_id.unwrap_or(actor.id);
    let ranked = state
        .service
        .sort_by_distance(&actor, courier_id, &payload.location)
        .await?;
    Ok(Json(ranked))
}
