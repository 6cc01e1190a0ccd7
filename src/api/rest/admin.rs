use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::engine::seed::{seed_demo_data, SeedReport};
use crate::error::AppError;
use crate::geo::Coordinates;
use crate::models::actor::Actor;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seed", post(seed))
        .route("/geocode/reverse", get(reverse_geocode))
}

#[derive(Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Serialize)]
pub struct ReverseResponse {
    pub coordinates: Coordinates,
    pub address: String,
}

async fn seed(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<(StatusCode, Json<SeedReport>), AppError> {
    let report = seed_demo_data(&state.service, state.users.as_ref(), &actor).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn reverse_geocode(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ReverseQuery>,
) -> Result<Json<ReverseResponse>, AppError> {
    let coordinates = Coordinates::new(query.lat, query.lon);
    let address = state.service.reverse_geocode(&actor, coordinates).await?;
    Ok(Json(ReverseResponse {
        coordinates,
        address,
    }))
}
