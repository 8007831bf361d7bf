use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{
    api::extract::{JsonBody, PathParam},
    error::{AppError, AppResult},
    models::{User, UserChanges},
    services::directory::Directory,
    AppState,
};

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: User,
}

pub async fn get_users(State(state): State<AppState>) -> AppResult<Json<UsersResponse>> {
    let users = Directory::new(state.store).list_users().await?;
    Ok(Json(UsersResponse { users }))
}

pub async fn get_user(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
) -> AppResult<Json<UserResponse>> {
    let user = Directory::new(state.store).get_user(user_id).await?;
    Ok(Json(UserResponse {
        message: None,
        user,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub user_type: Option<serde_json::Value>,
}

pub async fn update_user(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    if req.user_type.is_some() {
        return Err(AppError::Validation(
            "Field user_type cannot be changed".to_string(),
        ));
    }

    let changes = UserChanges {
        username: req.username,
        email: req.email,
        phone: req.phone,
    };
    let user = Directory::new(state.store)
        .update_user(user_id, changes)
        .await?;

    Ok(Json(UserResponse {
        message: Some("User updated successfully".to_string()),
        user,
    }))
}

/// Fails with 409 while any ride still references the user.
pub async fn delete_user(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
) -> AppResult<StatusCode> {
    Directory::new(state.store).delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
