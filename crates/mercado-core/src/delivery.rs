//! # Delivery Quotes
//!
//! Fee and ETA for home delivery, from the great-circle distance between
//! the store and the customer.
//!
//! ```text
//!   distance_km = haversine(origin, destination)      R = 6371 km
//!   fee_cents   = base_fee_cents + round(distance_km × per_km_cents)
//!   eta_minutes = ceil(distance_km × 3)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

const EARTH_RADIUS_KM: f64 = 6371.0;
const MINUTES_PER_KM: f64 = 3.0;

/// Store location and fee schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryRates {
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub base_fee_cents: i64,
    pub per_km_cents: i64,
}

impl Default for DeliveryRates {
    /// Santa Cruz de la Sierra store, 2.00 base plus 0.50 per km.
    fn default() -> Self {
        DeliveryRates {
            origin_lat: -17.7833,
            origin_lng: -63.1821,
            base_fee_cents: 200,
            per_km_cents: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryQuote {
    pub distance_km: f64,
    pub fee_cents: i64,
    pub eta_minutes: i64,
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Quotes a delivery to `(lat, lng)`.
pub fn quote(rates: &DeliveryRates, lat: f64, lng: f64) -> DeliveryQuote {
    let distance_km = haversine_km(rates.origin_lat, rates.origin_lng, lat, lng);
    let fee_cents = rates.base_fee_cents + (distance_km * rates.per_km_cents as f64).round() as i64;
    let eta_minutes = (distance_km * MINUTES_PER_KM).ceil() as i64;

    DeliveryQuote {
        distance_km,
        fee_cents,
        eta_minutes,
    }
}
