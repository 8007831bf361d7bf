use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers;
use crate::AppState;

pub fn create_router() -> Router<AppState> {
    let ride_routes = Router::new()
        .route(
            "/",
            get(handlers::rides::get_all_rides).post(handlers::rides::create_ride),
        )
        .route("/pending", get(handlers::rides::get_pending_rides))
        .route("/:id", get(handlers::rides::get_ride))
        .route("/:id/accept", post(handlers::rides::accept_ride))
        .route("/:id/status", put(handlers::rides::update_ride_status));

    let driver_routes = Router::new()
        .route("/online", get(handlers::drivers::get_online_drivers))
        .route("/:phone/status", put(handlers::drivers::update_driver_status));

    let user_routes = Router::new()
        .route("/", get(handlers::users::get_users))
        .route(
            "/:id",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        );

    Router::new()
        .nest("/rides", ride_routes)
        .nest("/drivers", driver_routes)
        .nest("/users", user_routes)
}
