//! Coordinate helpers used when registering a premises

/// Latitude in [-90, 90] and longitude in [-180, 180], both finite
pub fn validate_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Parse a `"lat, lng"` string
pub fn parse_coordinate_string(value: &str) -> Option<(f64, f64)> {
    let (lat, lng) = value.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    validate_coordinates(lat, lng).then_some((lat, lng))
}

/// Address label used when no street address is available
pub fn approximate_label(latitude: f64, longitude: f64) -> String {
    format!("Ubicación aproximada: {:.4}, {:.4}", latitude, longitude)
}
