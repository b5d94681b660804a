//! Static city gazetteer and great-circle distances.
//!
//! Supplier matching only needs rough distances between Indian market towns, so coordinates come from a fixed
//! city table rather than a live geocoder. Unknown city/state pairs resolve to the geographic centre of the
//! country; callers should treat that as a low-confidence signal, never as an error.

use log::debug;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Centre-of-India fallback for cities missing from the table.
pub const FALLBACK_COORDINATES: Coordinates = Coordinates { lat: 20.5937, lng: 78.9629 };

/// (city, state, lat, lng). Lookups are case-insensitive.
const CITY_TABLE: &[(&str, &str, f64, f64)] = &[
    ("mumbai", "maharashtra", 19.0760, 72.8777),
    ("pune", "maharashtra", 18.5204, 73.8567),
    ("nagpur", "maharashtra", 21.1458, 79.0882),
    ("nashik", "maharashtra", 19.9975, 73.7898),
    ("delhi", "delhi", 28.7041, 77.1025),
    ("bengaluru", "karnataka", 12.9716, 77.5946),
    ("mysuru", "karnataka", 12.2958, 76.6394),
    ("chennai", "tamil nadu", 13.0827, 80.2707),
    ("coimbatore", "tamil nadu", 11.0168, 76.9558),
    ("kolkata", "west bengal", 22.5726, 88.3639),
    ("hyderabad", "telangana", 17.3850, 78.4867),
    ("ahmedabad", "gujarat", 23.0225, 72.5714),
    ("surat", "gujarat", 21.1702, 72.8311),
    ("jaipur", "rajasthan", 26.9124, 75.7873),
    ("lucknow", "uttar pradesh", 26.8467, 80.9462),
    ("kanpur", "uttar pradesh", 26.4499, 80.3319),
    ("patna", "bihar", 25.5941, 85.1376),
    ("bhopal", "madhya pradesh", 23.2599, 77.4126),
    ("indore", "madhya pradesh", 22.7196, 75.8577),
    ("chandigarh", "punjab", 30.7333, 76.7794),
    ("kochi", "kerala", 9.9312, 76.2673),
    ("visakhapatnam", "andhra pradesh", 17.6868, 83.2185),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True if these are the centre-of-country fallback coordinates.
    pub fn is_fallback(&self) -> bool {
        *self == FALLBACK_COORDINATES
    }
}

/// Case-insensitive lookup of a city's coordinates. Unknown pairs fall back to [`FALLBACK_COORDINATES`].
pub fn coordinates_for(city: &str, state: &str) -> Coordinates {
    let city = city.trim().to_lowercase();
    let state = state.trim().to_lowercase();
    CITY_TABLE
        .iter()
        .find(|(c, s, _, _)| *c == city && *s == state)
        .map(|(_, _, lat, lng)| Coordinates::new(*lat, *lng))
        .unwrap_or_else(|| {
            debug!("📍️ No coordinates for {city}, {state}. Using the centre-of-country fallback");
            FALLBACK_COORDINATES
        })
}

/// Haversine distance between two points, in kilometres, rounded to 2 decimal places.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) +
        a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let d = 2.0 * EARTH_RADIUS_KM * h.sqrt().asin();
    (d * 100.0).round() / 100.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_city_lookup_is_case_insensitive() {
        let a = coordinates_for("Mumbai", "Maharashtra");
        let b = coordinates_for("MUMBAI", "maharashtra");
        assert_eq!(a, b);
        assert!((a.lat - 19.0760).abs() < 1e-9);
        assert!(!a.is_fallback());
    }

    #[test]
    fn unknown_city_falls_back_to_centre() {
        let c = coordinates_for("Atlantis", "Maharashtra");
        assert!(c.is_fallback());
    }

    #[test]
    fn distance_is_symmetric_and_rounded() {
        let mumbai = coordinates_for("Mumbai", "Maharashtra");
        let pune = coordinates_for("Pune", "Maharashtra");
        let d1 = distance_km(mumbai, pune);
        let d2 = distance_km(pune, mumbai);
        assert_eq!(d1, d2);
        // Mumbai-Pune is roughly 120 km as the crow flies.
        assert!(d1 > 100.0 && d1 < 150.0, "unexpected distance {d1}");
        // Two decimal places only.
        assert_eq!(d1, (d1 * 100.0).round() / 100.0);
    }

    #[test]
    fn zero_distance_for_same_point() {
        let kochi = coordinates_for("Kochi", "Kerala");
        assert_eq!(distance_km(kochi, kochi), 0.0);
    }
}
