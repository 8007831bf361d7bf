//! In-process store used by tests and `STORAGE_BACKEND=memory`.
//!
//! A transaction holds the store lock from `begin` until it is committed or
//! dropped, so transactions are fully serialized. Reads go straight to the
//! shared state. The first write copies it, and the copy replaces the shared
//! state on commit.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{RideStore, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{NewRide, NewUser, Ride, RideStatus, StatusChange, User, UserChanges, UserType},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    rides: BTreeMap<i64, Ride>,
    last_user_id: i64,
    last_ride_id: i64,
}

impl MemoryState {
    fn user_by_phone(&self, phone: &str, user_type: UserType) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.phone == phone && u.user_type == user_type)
    }

    fn rides_for_user(&self, id: i64) -> usize {
        self.rides
            .values()
            .filter(|r| r.customer_id == id || r.driver_id == Some(id))
            .count()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn begin_tx(&self) -> MemoryTx {
        let guard = self.state.clone().lock_owned().await;
        MemoryTx { guard, work: None }
    }
}

#[async_trait]
impl RideStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        Ok(Box::new(self.begin_tx().await))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    // Private copy, made on the first write.
    work: Option<MemoryState>,
}

impl MemoryTx {
    fn state(&self) -> &MemoryState {
        self.work.as_ref().unwrap_or(&*self.guard)
    }

    fn state_mut(&mut self) -> &mut MemoryState {
        let shared = &self.guard;
        self.work.get_or_insert_with(|| MemoryState::clone(shared))
    }

    fn newest_first(mut rides: Vec<Ride>) -> Vec<Ride> {
        rides.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        rides
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn upsert_user_by_phone(&mut self, user: &NewUser) -> AppResult<User> {
        if let Some(existing) = self.state().user_by_phone(&user.phone, user.user_type) {
            return Ok(existing.clone());
        }

        let state = self.state_mut();
        state.last_user_id += 1;
        let created = User {
            id: state.last_user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            user_type: user.user_type,
            is_online: user.is_online,
            created_at: Utc::now(),
        };
        state.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_user(&mut self, id: i64) -> AppResult<Option<User>> {
        Ok(self.state().users.get(&id).cloned())
    }

    async fn find_user_by_phone(
        &mut self,
        phone: &str,
        user_type: UserType,
    ) -> AppResult<Option<User>> {
        Ok(self.state().user_by_phone(phone, user_type).cloned())
    }

    async fn set_user_online(&mut self, id: i64, is_online: bool) -> AppResult<Option<User>> {
        if !self.state().users.contains_key(&id) {
            return Ok(None);
        }

        Ok(self.state_mut().users.get_mut(&id).map(|user| {
            user.is_online = is_online;
            user.clone()
        }))
    }

    async fn update_user(&mut self, id: i64, changes: &UserChanges) -> AppResult<Option<User>> {
        let Some(current) = self.state().users.get(&id) else {
            return Ok(None);
        };
        if let Some(phone) = &changes.phone {
            let taken = self
                .state()
                .user_by_phone(phone, current.user_type)
                .is_some_and(|other| other.id != id);
            if taken {
                return Err(AppError::PhoneTaken);
            }
        }

        Ok(self.state_mut().users.get_mut(&id).map(|user| {
            if let Some(username) = &changes.username {
                user.username = username.clone();
            }
            if let Some(email) = &changes.email {
                user.email = email.clone();
            }
            if let Some(phone) = &changes.phone {
                user.phone = phone.clone();
            }
            user.clone()
        }))
    }

    async fn list_users(&mut self) -> AppResult<Vec<User>> {
        Ok(self.state().users.values().cloned().collect())
    }

    async fn list_online_drivers(&mut self) -> AppResult<Vec<User>> {
        Ok(self
            .state()
            .users
            .values()
            .filter(|u| u.user_type == UserType::Driver && u.is_online)
            .cloned()
            .collect())
    }

    async fn count_rides_for_user(&mut self, id: i64) -> AppResult<i64> {
        Ok(self.state().rides_for_user(id) as i64)
    }

    async fn delete_user(&mut self, id: i64) -> AppResult<bool> {
        if self.state().rides_for_user(id) > 0 {
            return Err(AppError::UserInUse);
        }
        if !self.state().users.contains_key(&id) {
            return Ok(false);
        }
        Ok(self.state_mut().users.remove(&id).is_some())
    }

    async fn insert_ride(&mut self, ride: &NewRide) -> AppResult<Ride> {
        if !self.state().users.contains_key(&ride.customer_id) {
            return Err(AppError::UserNotFound);
        }

        let state = self.state_mut();
        state.last_ride_id += 1;
        let estimate = &ride.estimate;
        let created = Ride {
            id: state.last_ride_id,
            customer_id: ride.customer_id,
            driver_id: None,
            origin_address: ride.origin_address.clone(),
            destination_address: ride.destination_address.clone(),
            origin_lat: estimate.origin.map(|p| p.lat),
            origin_lng: estimate.origin.map(|p| p.lng),
            destination_lat: estimate.destination.map(|p| p.lat),
            destination_lng: estimate.destination.map(|p| p.lng),
            item_description: ride.item_description.clone(),
            estimated_price: estimate.estimated_price,
            distance_km: estimate.distance_km,
            estimated_time_minutes: estimate.estimated_time_minutes,
            status: RideStatus::Pending,
            created_at: ride.created_at,
            accepted_at: None,
            picked_up_at: None,
            delivered_at: None,
        };
        state.rides.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_ride(&mut self, id: i64) -> AppResult<Option<Ride>> {
        Ok(self.state().rides.get(&id).cloned())
    }

    async fn list_rides(&mut self, status: Option<RideStatus>) -> AppResult<Vec<Ride>> {
        let rides = self
            .state()
            .rides
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        Ok(Self::newest_first(rides))
    }

    async fn claim_ride(
        &mut self,
        ride_id: i64,
        driver_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Ride>> {
        let pending = self
            .state()
            .rides
            .get(&ride_id)
            .is_some_and(|r| r.status == RideStatus::Pending);
        if !pending {
            return Ok(None);
        }

        Ok(self.state_mut().rides.get_mut(&ride_id).map(|ride| {
            ride.driver_id = Some(driver_id);
            ride.status = RideStatus::Accepted;
            ride.accepted_at = Some(at);
            ride.clone()
        }))
    }

    async fn change_status(
        &mut self,
        ride_id: i64,
        change: &StatusChange,
    ) -> AppResult<Option<Ride>> {
        let allowed = self
            .state()
            .rides
            .get(&ride_id)
            .is_some_and(|r| change.expected.contains(&r.status));
        if !allowed {
            return Ok(None);
        }

        Ok(self.state_mut().rides.get_mut(&ride_id).map(|ride| {
            ride.status = change.status;
            match change.status {
                RideStatus::PickedUp => ride.picked_up_at = Some(change.at),
                RideStatus::Delivered => ride.delivered_at = Some(change.at),
                _ => {}
            }
            ride.clone()
        }))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, work } = *self;
        if let Some(work) = work {
            *guard = work;
        }
        Ok(())
    }
}
