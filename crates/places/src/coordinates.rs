use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters (IUGG).
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

pub const LAT_MAX_POS: f64 = 90_f64;
pub const LONG_MAX_POS: f64 = 180_f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
	#[serde(alias = "lat")]
	pub latitude: f64,
	#[serde(alias = "lng", alias = "lon")]
	pub longitude: f64,
}

impl Coordinates {
	#[must_use]
	pub const fn new(latitude: f64, longitude: f64) -> Self {
		Self {
			latitude,
			longitude,
		}
	}

	/// Both values must be finite and inside their respective ranges, no clamping is done.
	#[must_use]
	pub fn is_valid(&self) -> bool {
		self.latitude.is_finite()
			&& self.longitude.is_finite()
			&& self.latitude.abs() <= LAT_MAX_POS
			&& self.longitude.abs() <= LONG_MAX_POS
	}

	/// Great-circle distance in meters, using the haversine formula.
	#[must_use]
	pub fn distance_to(&self, other: &Self) -> f64 {
		let (lat_a, lat_b) = (self.latitude.to_radians(), other.latitude.to_radians());
		let delta_lat = lat_b - lat_a;
		let delta_long = (other.longitude - self.longitude).to_radians();

		let h = (delta_lat / 2.0).sin().powi(2)
			+ lat_a.cos() * lat_b.cos() * (delta_long / 2.0).sin().powi(2);

		2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
	}
}

impl fmt::Display for Coordinates {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
	}
}

impl From<(f64, f64)> for Coordinates {
	fn from((latitude, longitude): (f64, f64)) -> Self {
		Self::new(latitude, longitude)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_point_has_no_distance() {
		let point = Coordinates::new(38.897_676, -7.365_603);
		assert!(point.distance_to(&point).abs() < f64::EPSILON);
	}

	#[test]
	fn known_distance() {
		// Paris to London is roughly 343.5km
		let paris = Coordinates::new(48.8566, 2.3522);
		let london = Coordinates::new(51.5074, -0.1278);

		let distance = paris.distance_to(&london);
		assert!((distance - 343_500.0).abs() < 1_500.0, "got {distance}");
		assert!((distance - london.distance_to(&paris)).abs() < 1e-6);
	}

	#[test]
	fn validity() {
		assert!(Coordinates::new(-90.0, 180.0).is_valid());
		assert!(!Coordinates::new(90.5, 0.0).is_valid());
		assert!(!Coordinates::new(0.0, f64::NAN).is_valid());
	}

	#[test]
	fn deserializes_short_keys() {
		let coordinates =
			serde_json::from_str::<Coordinates>(r#"{ "lat": 1.5, "lng": -2.25 }"#).unwrap();
		assert_eq!(coordinates, Coordinates::new(1.5, -2.25));
	}
}
