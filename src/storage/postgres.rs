use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{RideStore, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{NewRide, NewUser, Ride, RideStatus, StatusChange, User, UserChanges, UserType},
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RideStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn upsert_user_by_phone(&mut self, user: &NewUser) -> AppResult<User> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (username, email, phone, user_type, is_online)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (phone, user_type)
            DO UPDATE SET phone = EXCLUDED.phone
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.user_type)
        .bind(user.is_online)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn find_user(&mut self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn find_user_by_phone(
        &mut self,
        phone: &str,
        user_type: UserType,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE phone = $1 AND user_type = $2")
            .bind(phone)
            .bind(user_type)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn set_user_online(&mut self, id: i64, is_online: bool) -> AppResult<Option<User>> {
        let user = sqlx::query_as("UPDATE users SET is_online = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(is_online)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn update_user(&mut self, id: i64, changes: &UserChanges) -> AppResult<Option<User>> {
        let user = sqlx::query_as(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.phone)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return AppError::PhoneTaken;
                }
            }
            AppError::Database(e)
        })?;

        Ok(user)
    }

    async fn list_users(&mut self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as("SELECT * FROM users ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(users)
    }

    async fn list_online_drivers(&mut self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as(
            "SELECT * FROM users WHERE user_type = $1 AND is_online = true ORDER BY id",
        )
        .bind(UserType::Driver)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(users)
    }

    async fn count_rides_for_user(&mut self, id: i64) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM rides WHERE customer_id = $1 OR driver_id = $1")
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(count)
    }

    async fn delete_user(&mut self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.is_foreign_key_violation() {
                        return AppError::UserInUse;
                    }
                }
                AppError::Database(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_ride(&mut self, ride: &NewRide) -> AppResult<Ride> {
        let estimate = &ride.estimate;

        let ride: Ride = sqlx::query_as(
            r#"
            INSERT INTO rides (
                customer_id, origin_address, destination_address,
                origin_lat, origin_lng, destination_lat, destination_lng,
                item_description, estimated_price, distance_km, estimated_time_minutes,
                status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(ride.customer_id)
        .bind(&ride.origin_address)
        .bind(&ride.destination_address)
        .bind(estimate.origin.map(|p| p.lat))
        .bind(estimate.origin.map(|p| p.lng))
        .bind(estimate.destination.map(|p| p.lat))
        .bind(estimate.destination.map(|p| p.lng))
        .bind(&ride.item_description)
        .bind(estimate.estimated_price)
        .bind(estimate.distance_km)
        .bind(estimate.estimated_time_minutes)
        .bind(RideStatus::Pending)
        .bind(ride.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(ride)
    }

    async fn find_ride(&mut self, id: i64) -> AppResult<Option<Ride>> {
        let ride = sqlx::query_as("SELECT * FROM rides WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(ride)
    }

    async fn list_rides(&mut self, status: Option<RideStatus>) -> AppResult<Vec<Ride>> {
        let rides = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM rides WHERE status = $1 ORDER BY created_at DESC, id DESC",
                )
                .bind(status)
                .fetch_all(&mut *self.tx)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM rides ORDER BY created_at DESC, id DESC")
                    .fetch_all(&mut *self.tx)
                    .await?
            }
        };

        Ok(rides)
    }

    async fn claim_ride(
        &mut self,
        ride_id: i64,
        driver_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Ride>> {
        // A concurrent claimer blocks on the row lock and then re-checks the
        // status predicate, so only one UPDATE can match.
        let ride = sqlx::query_as(
            r#"
            UPDATE rides
            SET driver_id = $2, status = $3, accepted_at = $4
            WHERE id = $1 AND status = $5
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .bind(driver_id)
        .bind(RideStatus::Accepted)
        .bind(at)
        .bind(RideStatus::Pending)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(ride)
    }

    async fn change_status(
        &mut self,
        ride_id: i64,
        change: &StatusChange,
    ) -> AppResult<Option<Ride>> {
        let picked_up_at = (change.status == RideStatus::PickedUp).then_some(change.at);
        let delivered_at = (change.status == RideStatus::Delivered).then_some(change.at);

        let ride = sqlx::query_as(
            r#"
            UPDATE rides
            SET status = $2,
                picked_up_at = COALESCE($3, picked_up_at),
                delivered_at = COALESCE($4, delivered_at)
            WHERE id = $1 AND status = ANY($5)
            RETURNING *
            "#,
        )
        .bind(ride_id)
        .bind(change.status)
        .bind(picked_up_at)
        .bind(delivered_at)
        .bind(&change.expected)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(ride)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
