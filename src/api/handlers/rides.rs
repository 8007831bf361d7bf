use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{
    api::extract::{JsonBody, PathParam},
    error::AppResult,
    models::RideWithParties,
    services::lifecycle::RideLifecycleManager,
    AppState,
};

fn lifecycle(state: &AppState) -> RideLifecycleManager {
    RideLifecycleManager::new(state.store.clone(), state.estimator.clone())
}

#[derive(Debug, Serialize)]
pub struct RideResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub ride: RideWithParties,
}

#[derive(Debug, Serialize)]
pub struct RidesResponse {
    pub rides: Vec<RideWithParties>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    pub customer_phone: Option<String>,
    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
    pub item_description: Option<String>,
}

pub async fn create_ride(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateRideRequest>,
) -> AppResult<(StatusCode, Json<RideResponse>)> {
    let ride = lifecycle(&state)
        .create_ride(
            req.customer_phone.as_deref().unwrap_or_default(),
            req.origin_address.as_deref().unwrap_or_default(),
            req.destination_address.as_deref().unwrap_or_default(),
            req.item_description.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RideResponse {
            message: Some("Ride created successfully".to_string()),
            ride,
        }),
    ))
}

pub async fn get_pending_rides(State(state): State<AppState>) -> AppResult<Json<RidesResponse>> {
    let rides = lifecycle(&state).list_pending_rides().await?;
    Ok(Json(RidesResponse { rides }))
}

#[derive(Debug, Deserialize)]
pub struct AcceptRideRequest {
    pub driver_phone: Option<String>,
}

pub async fn accept_ride(
    State(state): State<AppState>,
    PathParam(ride_id): PathParam<i64>,
    JsonBody(req): JsonBody<AcceptRideRequest>,
) -> AppResult<Json<RideResponse>> {
    let ride = lifecycle(&state)
        .accept_ride(ride_id, req.driver_phone.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(RideResponse {
        message: Some("Ride accepted successfully".to_string()),
        ride,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

pub async fn update_ride_status(
    State(state): State<AppState>,
    PathParam(ride_id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateStatusRequest>,
) -> AppResult<Json<RideResponse>> {
    let ride = lifecycle(&state)
        .advance_status(ride_id, req.status.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(RideResponse {
        message: Some("Status updated successfully".to_string()),
        ride,
    }))
}

pub async fn get_ride(
    State(state): State<AppState>,
    PathParam(ride_id): PathParam<i64>,
) -> AppResult<Json<RideResponse>> {
    let ride = lifecycle(&state).get_ride(ride_id).await?;
    Ok(Json(RideResponse { message: None, ride }))
}

pub async fn get_all_rides(State(state): State<AppState>) -> AppResult<Json<RidesResponse>> {
    let rides = lifecycle(&state).list_all_rides().await?;
    Ok(Json(RidesResponse { rides }))
}
