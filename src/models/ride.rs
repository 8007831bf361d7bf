use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::User;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ride {
    pub id: i64,
    pub customer_id: i64,
    pub driver_id: Option<i64>,
    pub origin_address: String,
    pub destination_address: String,
    pub origin_lat: Option<f64>,
    pub origin_lng: Option<f64>,
    pub destination_lat: Option<f64>,
    pub destination_lng: Option<f64>,
    pub item_description: Option<String>,
    pub estimated_price: f64,
    pub distance_km: f64,
    pub estimated_time_minutes: i32,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ride_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    Accepted,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl RideStatus {
    pub const ALL: [RideStatus; 6] = [
        Self::Pending,
        Self::Accepted,
        Self::PickedUp,
        Self::InTransit,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::PickedUp => "picked_up",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position on the forward path. Cancelled sits off the path.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Accepted => Some(1),
            Self::PickedUp => Some(2),
            Self::InTransit => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Whether a status update may move a ride from `self` to `next`.
    ///
    /// Rides only move forward, may skip intermediate steps, and may be
    /// cancelled from any non-terminal state. `Accepted` is never a legal
    /// target here: it is reached only by a driver accepting the ride.
    pub fn can_advance_to(self, next: RideStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next) {
            (_, Self::Cancelled) => true,
            (_, Self::Pending | Self::Accepted) => false,
            (Some(from), _) => next.rank().is_some_and(|to| to > from && from > 0),
            (None, _) => false,
        }
    }

    /// Statuses from which a status update to `self` is legal.
    pub fn predecessors(self) -> Vec<RideStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_advance_to(self))
            .collect()
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRideStatusError(pub String);

impl fmt::Display for ParseRideStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid status: {}", self.0)
    }
}

impl std::error::Error for ParseRideStatusError {}

impl FromStr for RideStatus {
    type Err = ParseRideStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseRideStatusError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Estimate attached to a ride at creation time and never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub estimated_price: f64,
    pub distance_km: f64,
    pub estimated_time_minutes: i32,
    pub origin: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
}

#[derive(Debug, Clone)]
pub struct NewRide {
    pub customer_id: i64,
    pub origin_address: String,
    pub destination_address: String,
    pub item_description: Option<String>,
    pub estimate: RouteEstimate,
    pub created_at: DateTime<Utc>,
}

/// Conditional status write: applied only while the ride is in one of
/// `expected`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub expected: Vec<RideStatus>,
    pub status: RideStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideWithParties {
    #[serde(flatten)]
    pub ride: Ride,
    pub customer: Option<User>,
    pub driver: Option<User>,
}
