//! Distance and fare math. Everything here is pure and deterministic; the
//! storage layer uses [`haversine_km`] for radius filtering and the ride
//! handlers use [`ride_price`] to quote fares at request time.

use mela_types::models::{GeoPoint, VehicleType};

/// Earth's mean radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Minimum charge applied to every ride, in NPR.
pub const BASE_FARE: f64 = 50.0;

/// Great-circle distance between two points via the Haversine formula,
/// rounded to 2 decimals.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    let distance = EARTH_RADIUS_KM * c;

    (distance * 100.0).round() / 100.0
}

/// Per-km rate by vehicle type, in NPR.
pub fn rate_per_km(vehicle_type: VehicleType) -> f64 {
    match vehicle_type {
        VehicleType::Motorcycle => 15.0,
        VehicleType::Sedan => 25.0,
        VehicleType::Hatchback => 22.0,
        VehicleType::Suv => 35.0,
        VehicleType::Van => 40.0,
        VehicleType::Other => 25.0,
    }
}

/// Quote a ride: base fare plus distance at the vehicle's per-km rate, with
/// a 5% discount above 10 km and 10% above 20 km, rounded up to the nearest
/// 5. Monotonically non-decreasing in distance within a discount tier.
pub fn ride_price(distance_km: f64, vehicle_type: VehicleType) -> f64 {
    let mut price = BASE_FARE + distance_km * rate_per_km(vehicle_type);

    if distance_km > 20.0 {
        price *= 0.90;
    } else if distance_km > 10.0 {
        price *= 0.95;
    }

    (price / 5.0).ceil() * 5.0
}

/// Estimated trip duration in minutes at a 40 km/h blended average speed
/// (city and highway weighted), rounded up.
pub fn estimate_duration_min(distance_km: f64) -> i64 {
    const AVERAGE_SPEED_KMH: f64 = 40.0;
    (distance_km / AVERAGE_SPEED_KMH * 60.0).ceil() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    const KATHMANDU: GeoPoint = GeoPoint {
        latitude: 27.7172,
        longitude: 85.3240,
    };
    const POKHARA: GeoPoint = GeoPoint {
        latitude: 28.2096,
        longitude: 83.9856,
    };

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_km(KATHMANDU, KATHMANDU), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        assert_eq!(
            haversine_km(KATHMANDU, POKHARA),
            haversine_km(POKHARA, KATHMANDU)
        );
    }

    #[test]
    fn kathmandu_pokhara_is_roughly_140km() {
        let d = haversine_km(KATHMANDU, POKHARA);
        assert!((130.0..150.0).contains(&d), "got {d}");
    }

    #[test]
    fn one_degree_of_latitude_is_about_111km() {
        let d = haversine_km(pt(0.0, 0.0), pt(1.0, 0.0));
        assert!((110.0..112.5).contains(&d), "got {d}");
    }

    #[test]
    fn price_is_a_multiple_of_five_and_at_least_base_fare() {
        for distance in [0.0, 0.3, 1.0, 7.77, 10.0, 15.5, 20.0, 42.0] {
            let price = ride_price(distance, VehicleType::Sedan);
            assert!(price >= BASE_FARE, "{distance} km -> {price}");
            assert_eq!(price % 5.0, 0.0, "{distance} km -> {price}");
        }
    }

    #[test]
    fn short_sedan_ride_quotes_base_plus_rate() {
        // 50 + 4 * 25 = 150, no discount, already a multiple of 5
        assert_eq!(ride_price(4.0, VehicleType::Sedan), 150.0);
    }

    #[test]
    fn discounts_apply_above_ten_and_twenty_km() {
        // 50 + 12 * 25 = 350, * 0.95 = 332.5 -> 335
        assert_eq!(ride_price(12.0, VehicleType::Sedan), 335.0);
        // 50 + 25 * 25 = 675, * 0.9 = 607.5 -> 610
        assert_eq!(ride_price(25.0, VehicleType::Sedan), 610.0);
    }

    #[test]
    fn price_is_monotonic_within_each_discount_tier() {
        let tiers = [(0.0, 10.0), (10.01, 20.0), (20.01, 60.0)];
        for vt in [
            VehicleType::Motorcycle,
            VehicleType::Sedan,
            VehicleType::Hatchback,
            VehicleType::Suv,
            VehicleType::Van,
            VehicleType::Other,
        ] {
            for (lo, hi) in tiers {
                let mut prev = ride_price(lo, vt);
                let mut d = lo;
                while d < hi {
                    d += 0.25;
                    let p = ride_price(d, vt);
                    assert!(p >= prev, "{vt:?} at {d} km: {p} < {prev}");
                    prev = p;
                }
            }
        }
    }

    #[test]
    fn unknown_vehicle_prices_at_sedan_rate() {
        assert_eq!(
            ride_price(8.0, VehicleType::Other),
            ride_price(8.0, VehicleType::Sedan)
        );
    }

    #[test]
    fn duration_rounds_up_at_forty_kmh() {
        assert_eq!(estimate_duration_min(40.0), 60);
        assert_eq!(estimate_duration_min(10.0), 15);
        assert_eq!(estimate_duration_min(0.5), 1);
    }
}
