use crate::{
	coordinates::Coordinates,
	place::Place,
	travel_time::{TravelTimeError, TravelTimeProvider, TravelTimes},
};

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use async_trait::async_trait;

const KM_PER_DEGREE: f64 = 111.195;

/// A point `km` kilometers north of the null island.
pub fn at_km(km: f64) -> Coordinates {
	Coordinates::new(km / KM_PER_DEGREE, 0.0)
}

pub fn ids(places: &[Arc<Place>]) -> Vec<String> {
	places
		.iter()
		.map(|place| place.id().to_string())
		.collect()
}

/// Answers with scripted walking times, one second per meter when asked to, and no route
/// for anything else.
#[derive(Default)]
pub struct ScriptedProvider {
	etas: HashMap<(u64, u64), Duration>,
	proportional: bool,
	calls: AtomicUsize,
}

impl ScriptedProvider {
	pub fn proportional_to_distance() -> Self {
		Self {
			proportional: true,
			..Default::default()
		}
	}

	pub fn with_eta(mut self, to: Coordinates, eta: Duration) -> Self {
		self.etas.insert(key(to), eta);
		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

fn key(coordinates: Coordinates) -> (u64, u64) {
	(
		coordinates.latitude.to_bits(),
		coordinates.longitude.to_bits(),
	)
}

#[async_trait]
impl TravelTimeProvider for ScriptedProvider {
	async fn estimate(
		&self,
		from: Coordinates,
		to: Coordinates,
	) -> Result<TravelTimes, TravelTimeError> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if let Some(eta) = self.etas.get(&key(to)) {
			Ok(TravelTimes::new(Some(*eta), None))
		} else if self.proportional {
			Ok(TravelTimes::new(
				Some(Duration::from_secs_f64(from.distance_to(&to))),
				None,
			))
		} else {
			Err(TravelTimeError::NoRoute)
		}
	}
}
