//! Ride lifecycle: creation, driver acceptance and status progression.
//!
//! Status flows `pending -> accepted -> picked_up -> in_transit -> delivered`.
//! A ride can be cancelled from any non-terminal state; `delivered` and
//! `cancelled` are terminal. Every write is a conditional update on the
//! current status, so two callers racing on one ride cannot both win.

use std::sync::Arc;

use chrono::Utc;

use super::{directory::Directory, estimator::Estimator};
use crate::{
    error::{AppError, AppResult},
    models::{
        NewRide, ParseRideStatusError, Ride, RideStatus, RideWithParties, StatusChange, UserType,
    },
    storage::{RideStore, StoreTx},
};

#[derive(Clone)]
pub struct RideLifecycleManager {
    store: Arc<dyn RideStore>,
    estimator: Arc<dyn Estimator>,
}

/// Column width for addresses and item descriptions.
const MAX_TEXT_LEN: usize = 200;

fn required<'a>(field: &str, value: &'a str) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("Field {} is required", field)));
    }
    Ok(value)
}

fn bounded(field: &str, value: &str) -> AppResult<()> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "Field {} must be at most {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(())
}

impl RideLifecycleManager {
    pub fn new(store: Arc<dyn RideStore>, estimator: Arc<dyn Estimator>) -> Self {
        Self { store, estimator }
    }

    /// Create a pending ride for the customer owning `customer_phone`.
    pub async fn create_ride(
        &self,
        customer_phone: &str,
        origin_address: &str,
        destination_address: &str,
        item_description: Option<&str>,
    ) -> AppResult<RideWithParties> {
        let customer_phone = required("customer_phone", customer_phone)?;
        let origin_address = required("origin_address", origin_address)?;
        let destination_address = required("destination_address", destination_address)?;
        let item_description = item_description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        bounded("origin_address", origin_address)?;
        bounded("destination_address", destination_address)?;
        if let Some(description) = &item_description {
            bounded("item_description", description)?;
        }

        let estimate = self.estimator.estimate(origin_address, destination_address);

        let mut tx = self.store.begin().await?;

        let customer =
            Directory::resolve_or_create(tx.as_mut(), customer_phone, UserType::Customer).await?;

        let ride = tx
            .insert_ride(&NewRide {
                customer_id: customer.id,
                origin_address: origin_address.to_string(),
                destination_address: destination_address.to_string(),
                item_description,
                estimate,
                created_at: Utc::now(),
            })
            .await?;

        tx.commit().await?;

        tracing::info!(
            ride_id = ride.id,
            customer_id = customer.id,
            estimated_price = ride.estimated_price,
            "Ride created"
        );

        Ok(RideWithParties {
            ride,
            customer: Some(customer),
            driver: None,
        })
    }

    /// Assign a pending ride to the driver owning `driver_phone`.
    ///
    /// Exactly one of several concurrent callers succeeds; the others get
    /// [`AppError::RideUnavailable`].
    pub async fn accept_ride(
        &self,
        ride_id: i64,
        driver_phone: &str,
    ) -> AppResult<RideWithParties> {
        let driver_phone = required("driver_phone", driver_phone)?;

        let mut tx = self.store.begin().await?;

        let driver =
            Directory::resolve_or_create(tx.as_mut(), driver_phone, UserType::Driver).await?;

        let Some(ride) = tx.claim_ride(ride_id, driver.id, Utc::now()).await? else {
            // Dropping the transaction discards a driver created above.
            return Err(match tx.find_ride(ride_id).await? {
                None => AppError::RideNotFound,
                Some(ride) => {
                    tracing::debug!(ride_id, status = %ride.status, "Ride already taken");
                    AppError::RideUnavailable
                }
            });
        };

        let details = Self::with_parties(tx.as_mut(), ride).await?;
        tx.commit().await?;

        tracing::info!(ride_id, driver_id = driver.id, "Ride accepted");
        Ok(details)
    }

    /// Move a ride forward (or cancel it) according to the transition table.
    pub async fn advance_status(&self, ride_id: i64, status: &str) -> AppResult<RideWithParties> {
        let status: RideStatus = status
            .trim()
            .parse()
            .map_err(|e: ParseRideStatusError| AppError::Validation(e.to_string()))?;
        if status == RideStatus::Pending {
            return Err(AppError::Validation(format!("Invalid status: {}", status)));
        }

        let change = StatusChange {
            expected: status.predecessors(),
            status,
            at: Utc::now(),
        };

        let mut tx = self.store.begin().await?;

        let Some(ride) = tx.change_status(ride_id, &change).await? else {
            return Err(match tx.find_ride(ride_id).await? {
                None => AppError::RideNotFound,
                Some(ride) => {
                    tracing::debug!(
                        ride_id,
                        from = %ride.status,
                        to = %status,
                        "Rejected status change"
                    );
                    AppError::InvalidTransition {
                        from: ride.status,
                        to: status,
                    }
                }
            });
        };

        let details = Self::with_parties(tx.as_mut(), ride).await?;
        tx.commit().await?;

        tracing::info!(ride_id, status = %status, "Ride status changed");
        Ok(details)
    }

    /// Pending rides, newest first
    pub async fn list_pending_rides(&self) -> AppResult<Vec<RideWithParties>> {
        self.list(Some(RideStatus::Pending)).await
    }

    /// All rides, newest first
    pub async fn list_all_rides(&self) -> AppResult<Vec<RideWithParties>> {
        self.list(None).await
    }

    pub async fn get_ride(&self, ride_id: i64) -> AppResult<RideWithParties> {
        let mut tx = self.store.begin().await?;

        let ride = tx.find_ride(ride_id).await?.ok_or(AppError::RideNotFound)?;

        Self::with_parties(tx.as_mut(), ride).await
    }

    async fn list(&self, status: Option<RideStatus>) -> AppResult<Vec<RideWithParties>> {
        let mut tx = self.store.begin().await?;

        let rides = tx.list_rides(status).await?;

        let mut result = Vec::with_capacity(rides.len());
        for ride in rides {
            result.push(Self::with_parties(tx.as_mut(), ride).await?);
        }

        Ok(result)
    }

    async fn with_parties(tx: &mut dyn StoreTx, ride: Ride) -> AppResult<RideWithParties> {
        let customer = tx.find_user(ride.customer_id).await?;
        let driver = match ride.driver_id {
            Some(driver_id) => tx.find_user(driver_id).await?,
            None => None,
        };

        Ok(RideWithParties {
            ride,
            customer,
            driver,
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::{
        models::{GeoPoint, RouteEstimate},
        services::estimator::FixedEstimator,
        storage::MemoryStore,
    };

    const CUSTOMER: &str = "5511999990000";

    fn manager() -> RideLifecycleManager {
        let estimate = RouteEstimate {
            estimated_price: 15.5,
            distance_km: 5.0,
            estimated_time_minutes: 22,
            origin: Some(GeoPoint {
                lat: -23.55,
                lng: -46.63,
            }),
            destination: Some(GeoPoint {
                lat: -23.60,
                lng: -46.70,
            }),
        };
        RideLifecycleManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FixedEstimator(estimate)),
        )
    }

    async fn pending_ride(manager: &RideLifecycleManager) -> Ride {
        assert_ok!(
            manager
                .create_ride(CUSTOMER, "Rua A, 1", "Rua B, 2", None)
                .await
        )
        .ride
    }

    async fn accepted_ride(manager: &RideLifecycleManager) -> Ride {
        let ride = pending_ride(manager).await;
        assert_ok!(manager.accept_ride(ride.id, "5511888880000").await).ride
    }

    #[tokio::test]
    async fn creates_pending_ride_with_customer() {
        let manager = manager();

        let created = assert_ok!(
            manager
                .create_ride(CUSTOMER, "Rua A, 1", "Rua B, 2", Some("  documents "))
                .await
        );

        assert_eq!(created.ride.status, RideStatus::Pending);
        assert_eq!(created.ride.driver_id, None);
        assert!(created.ride.estimated_price > 0.0);
        assert_eq!(created.ride.item_description.as_deref(), Some("documents"));
        assert_eq!(created.ride.origin_lat, Some(-23.55));
        let customer = created.customer.expect("customer is embedded");
        assert_eq!(customer.phone, CUSTOMER);
        assert_eq!(customer.user_type, UserType::Customer);
        assert!(created.driver.is_none());
    }

    #[tokio::test]
    async fn repeat_customer_reuses_identity() {
        let manager = manager();

        let first = pending_ride(&manager).await;
        let second = pending_ride(&manager).await;

        assert_eq!(first.customer_id, second.customer_id);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn create_validates_before_writing() {
        let manager = manager();

        let err = assert_err!(manager.create_ride(CUSTOMER, "  ", "Rua B, 2", None).await);
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("origin_address")));

        let err = assert_err!(manager.create_ride("", "Rua A, 1", "Rua B, 2", None).await);
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("customer_phone")));

        let long = "x".repeat(201);
        let err = assert_err!(
            manager
                .create_ride(CUSTOMER, "Rua A, 1", "Rua B, 2", Some(long.as_str()))
                .await
        );
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("item_description")));

        let directory = Directory::new(manager.store.clone());
        assert!(assert_ok!(directory.list_users().await).is_empty());
        assert!(assert_ok!(manager.list_all_rides().await).is_empty());
    }

    #[tokio::test]
    async fn accept_assigns_driver_once() {
        let manager = manager();
        let ride = pending_ride(&manager).await;

        let accepted = assert_ok!(manager.accept_ride(ride.id, "5511888880000").await);
        assert_eq!(accepted.ride.status, RideStatus::Accepted);
        assert!(accepted.ride.accepted_at.is_some());
        let driver = accepted.driver.expect("driver is embedded");
        assert_eq!(accepted.ride.driver_id, Some(driver.id));
        assert!(driver.is_online);

        let err = assert_err!(manager.accept_ride(ride.id, "5511777770000").await);
        assert!(matches!(err, AppError::RideUnavailable));

        let current = assert_ok!(manager.get_ride(ride.id).await);
        assert_eq!(current.ride.driver_id, Some(driver.id));
    }

    #[tokio::test]
    async fn losing_accept_leaves_no_driver_behind() {
        let manager = manager();
        let ride = pending_ride(&manager).await;
        assert_ok!(manager.accept_ride(ride.id, "5511888880000").await);
        assert_err!(manager.accept_ride(ride.id, "5511777770000").await);
        assert_err!(manager.accept_ride(999, "5511666660000").await);

        let directory = Directory::new(manager.store.clone());
        let phones: Vec<String> = assert_ok!(directory.list_users().await)
            .into_iter()
            .map(|u| u.phone)
            .collect();
        assert_eq!(phones, vec![CUSTOMER.to_string(), "5511888880000".to_string()]);
    }

    #[tokio::test]
    async fn accept_requires_driver_phone_and_ride() {
        let manager = manager();
        let ride = pending_ride(&manager).await;

        let err = assert_err!(manager.accept_ride(ride.id, " ").await);
        assert!(matches!(err, AppError::Validation(_)));

        let err = assert_err!(manager.accept_ride(999, "5511888880000").await);
        assert!(matches!(err, AppError::RideNotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accepts_have_one_winner() {
        let manager = manager();
        let ride_id = pending_ride(&manager).await.id;

        let attempts = (0..8).map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .accept_ride(ride_id, &format!("55118888800{:02}", i))
                    .await
            })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.expect("accept task completes"))
            .collect();

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AppError::RideUnavailable)));

        let current = assert_ok!(manager.get_ride(ride_id).await);
        assert_eq!(current.ride.driver_id, winners[0].ride.driver_id);
        assert_eq!(current.ride.status, RideStatus::Accepted);
    }

    #[tokio::test]
    async fn estimate_is_frozen_through_lifecycle() {
        let manager = manager();
        let created = accepted_ride(&manager).await;

        for status in ["picked_up", "in_transit", "delivered"] {
            let ride = assert_ok!(manager.advance_status(created.id, status).await).ride;
            assert_eq!(ride.estimated_price, created.estimated_price);
            assert_eq!(ride.distance_km, created.distance_km);
            assert_eq!(ride.estimated_time_minutes, created.estimated_time_minutes);
        }
    }

    #[tokio::test]
    async fn terminal_rides_reject_changes() {
        let manager = manager();

        let delivered = accepted_ride(&manager).await;
        assert_ok!(manager.advance_status(delivered.id, "delivered").await);

        let cancelled = pending_ride(&manager).await;
        assert_ok!(manager.advance_status(cancelled.id, "cancelled").await);

        for ride_id in [delivered.id, cancelled.id] {
            for status in ["accepted", "picked_up", "in_transit", "delivered", "cancelled"] {
                let err = assert_err!(manager.advance_status(ride_id, status).await);
                assert!(matches!(err, AppError::InvalidTransition { .. }), "{status}");
            }
            let err = assert_err!(manager.accept_ride(ride_id, "5511777770000").await);
            assert!(matches!(err, AppError::RideUnavailable));
        }

        let ride = assert_ok!(manager.get_ride(delivered.id).await).ride;
        assert_eq!(ride.status, RideStatus::Delivered);
    }

    #[tokio::test]
    async fn timestamps_follow_transitions() {
        let manager = manager();
        let ride = accepted_ride(&manager).await;
        let accepted_at = ride.accepted_at.expect("accepted_at set on accept");

        let picked = assert_ok!(manager.advance_status(ride.id, "picked_up").await).ride;
        let picked_up_at = picked.picked_up_at.expect("picked_up_at set");
        assert!(picked_up_at >= accepted_at);
        assert!(picked.delivered_at.is_none());

        let in_transit = assert_ok!(manager.advance_status(ride.id, "in_transit").await).ride;
        assert_eq!(in_transit.picked_up_at, Some(picked_up_at));

        let delivered = assert_ok!(manager.advance_status(ride.id, "delivered").await).ride;
        assert!(delivered.delivered_at.expect("delivered_at set") >= picked_up_at);
    }

    #[tokio::test]
    async fn advance_rejects_illegal_moves() {
        let manager = manager();
        let pending = pending_ride(&manager).await;

        let err = assert_err!(manager.advance_status(pending.id, "picked_up").await);
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: RideStatus::Pending,
                to: RideStatus::PickedUp,
            }
        ));

        let err = assert_err!(manager.advance_status(pending.id, "accepted").await);
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let ride = accepted_ride(&manager).await;
        assert_ok!(manager.advance_status(ride.id, "in_transit").await);
        let err = assert_err!(manager.advance_status(ride.id, "picked_up").await);
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn advance_validates_status_then_ride() {
        let manager = manager();

        let err = assert_err!(manager.advance_status(999, "delivered").await);
        assert!(matches!(err, AppError::RideNotFound));

        let err = assert_err!(manager.advance_status(999, "teleported").await);
        assert!(matches!(err, AppError::Validation(_)));

        let err = assert_err!(manager.advance_status(999, "pending").await);
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn pending_list_is_newest_first() {
        let manager = manager();
        let first = pending_ride(&manager).await;
        let second = pending_ride(&manager).await;
        let third = pending_ride(&manager).await;
        assert_ok!(manager.accept_ride(second.id, "5511888880000").await);

        let pending: Vec<i64> = assert_ok!(manager.list_pending_rides().await)
            .into_iter()
            .map(|r| r.ride.id)
            .collect();
        assert_eq!(pending, vec![third.id, first.id]);

        let all = assert_ok!(manager.list_all_rides().await);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].ride.id, third.id);
        assert!(all[1].driver.is_some());
    }
}
