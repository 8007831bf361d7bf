//! Persistence for users and rides.
//!
//! Every read and write goes through a [`StoreTx`] opened with
//! [`RideStore::begin`]. A transaction that is dropped without
//! [`StoreTx::commit`] is rolled back.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{NewRide, NewUser, Ride, RideStatus, StatusChange, User, UserChanges, UserType},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait RideStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;
}

#[async_trait]
pub trait StoreTx: Send {
    // Users

    /// Return the user with this phone and role, inserting `user` if there is
    /// none. Concurrent callers with the same key observe the same row.
    async fn upsert_user_by_phone(&mut self, user: &NewUser) -> AppResult<User>;

    async fn find_user(&mut self, id: i64) -> AppResult<Option<User>>;

    async fn find_user_by_phone(
        &mut self,
        phone: &str,
        user_type: UserType,
    ) -> AppResult<Option<User>>;

    async fn set_user_online(&mut self, id: i64, is_online: bool) -> AppResult<Option<User>>;

    /// Apply `changes` to the user. Fails with `PhoneTaken` when another
    /// user of the same role already has the new phone.
    async fn update_user(&mut self, id: i64, changes: &UserChanges) -> AppResult<Option<User>>;

    async fn list_users(&mut self) -> AppResult<Vec<User>>;

    async fn list_online_drivers(&mut self) -> AppResult<Vec<User>>;

    /// Number of rides naming the user as customer or driver.
    async fn count_rides_for_user(&mut self, id: i64) -> AppResult<i64>;

    async fn delete_user(&mut self, id: i64) -> AppResult<bool>;

    // Rides

    async fn insert_ride(&mut self, ride: &NewRide) -> AppResult<Ride>;

    async fn find_ride(&mut self, id: i64) -> AppResult<Option<Ride>>;

    /// Newest first; all rides when `status` is `None`.
    async fn list_rides(&mut self, status: Option<RideStatus>) -> AppResult<Vec<Ride>>;

    /// Assign `driver_id` and move the ride to `accepted`, only if it is
    /// still `pending`. Returns `None` when the ride is absent or not pending.
    async fn claim_ride(
        &mut self,
        ride_id: i64,
        driver_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Ride>>;

    /// Apply `change` only if the ride's status is one of `change.expected`.
    /// Returns `None` when the ride is absent or the guard fails.
    async fn change_status(&mut self, ride_id: i64, change: &StatusChange)
        -> AppResult<Option<Ride>>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
