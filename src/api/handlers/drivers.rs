use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    api::extract::{JsonBody, PathParam},
    error::AppResult,
    models::User,
    services::directory::Directory,
    AppState,
};

#[derive(Debug, Serialize)]
pub struct DriversResponse {
    pub drivers: Vec<User>,
}

pub async fn get_online_drivers(State(state): State<AppState>) -> AppResult<Json<DriversResponse>> {
    let directory = Directory::new(state.store);
    let drivers = directory.list_online_drivers().await?;

    Ok(Json(DriversResponse { drivers }))
}

#[derive(Debug, Deserialize)]
pub struct DriverStatusRequest {
    #[serde(default)]
    pub is_online: bool,
}

#[derive(Debug, Serialize)]
pub struct DriverResponse {
    pub message: String,
    pub driver: User,
}

pub async fn update_driver_status(
    State(state): State<AppState>,
    PathParam(driver_phone): PathParam<String>,
    JsonBody(req): JsonBody<DriverStatusRequest>,
) -> AppResult<Json<DriverResponse>> {
    let directory = Directory::new(state.store);
    let driver = directory
        .set_driver_online(&driver_phone, req.is_online)
        .await?;

    let label = if req.is_online { "online" } else { "offline" };
    Ok(Json(DriverResponse {
        message: format!("Status updated to {}", label),
        driver,
    }))
}
