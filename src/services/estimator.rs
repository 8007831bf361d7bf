use rand::Rng;

use crate::{
    config::PricingConfig,
    models::{GeoPoint, RouteEstimate},
};

/// Produces the commercial estimate for a route.
pub trait Estimator: Send + Sync {
    fn estimate(&self, origin: &str, destination: &str) -> RouteEstimate;
}

/// Stand-in estimator: random distance, linear fare, and coordinates
/// scattered around the configured city centre.
pub struct RandomEstimator {
    pricing: PricingConfig,
}

const MIN_DISTANCE_KM: f64 = 1.0;
const MAX_DISTANCE_KM: f64 = 10.0;
const MINUTES_PER_KM: f64 = 3.0;
const JITTER_DEGREES: f64 = 0.1;

impl RandomEstimator {
    pub fn new(pricing: PricingConfig) -> Self {
        Self { pricing }
    }

    fn scatter<R: Rng>(&self, rng: &mut R) -> GeoPoint {
        GeoPoint {
            lat: self.pricing.center_lat + rng.gen_range(-JITTER_DEGREES..JITTER_DEGREES),
            lng: self.pricing.center_lng + rng.gen_range(-JITTER_DEGREES..JITTER_DEGREES),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl Estimator for RandomEstimator {
    fn estimate(&self, _origin: &str, _destination: &str) -> RouteEstimate {
        let mut rng = rand::thread_rng();

        let distance_km = rng.gen_range(MIN_DISTANCE_KM..MAX_DISTANCE_KM);
        let price = self.pricing.base_fare + distance_km * self.pricing.per_km;
        let minutes = distance_km * MINUTES_PER_KM + rng.gen_range(5.0..15.0);

        RouteEstimate {
            estimated_price: round_to(price, 2),
            distance_km: round_to(distance_km, 1),
            estimated_time_minutes: minutes as i32,
            origin: Some(self.scatter(&mut rng)),
            destination: Some(self.scatter(&mut rng)),
        }
    }
}

/// Returns the same estimate for every route.
#[derive(Debug, Clone, Copy)]
pub struct FixedEstimator(pub RouteEstimate);

impl Estimator for FixedEstimator {
    fn estimate(&self, _origin: &str, _destination: &str) -> RouteEstimate {
        self.0
    }
}
