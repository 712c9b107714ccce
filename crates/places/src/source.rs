use crate::{
	coordinates::Coordinates,
	place::{InvalidPlace, Place, PlaceId, RawPlace},
};

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{instrument, trace};

const METERS_PER_KM: f64 = 1_000_f64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
	#[error("place source unavailable: {0}")]
	Unavailable(String),
	#[error("place source request timed out")]
	Timeout,
}

/// Where places come from.
///
/// Record level failures are reported per record, so one broken record never fails a whole
/// fetch.
#[async_trait]
pub trait PlaceSource: Send + Sync + 'static {
	async fn fetch_places(
		&self,
		near: Coordinates,
		radius_km: f64,
	) -> Result<Vec<Result<Place, InvalidPlace>>, SourceError>;

	async fn fetch_place(&self, id: &PlaceId) -> Result<Option<Place>, SourceError>;
}

/// Place source backed by raw JSON records held in memory, decoded on every fetch.
///
/// Records that fail decoding are reported on every fetch since their coordinates can't be
/// trusted for the radius check.
#[derive(Debug, Default)]
pub struct MemorySource {
	records: RwLock<Vec<serde_json::Value>>,
}

impl MemorySource {
	#[must_use]
	pub fn new(records: Vec<serde_json::Value>) -> Self {
		Self {
			records: RwLock::new(records),
		}
	}

	pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(json).map(Self::new)
	}

	pub fn push(&self, record: serde_json::Value) {
		self.records.write().push(record);
	}

	/// Removes every record carrying one of `ids`.
	pub fn remove(&self, ids: &HashSet<&str>) {
		self.records.write().retain(|record| {
			record
				.get("id")
				.and_then(serde_json::Value::as_str)
				.map_or(true, |id| !ids.contains(id))
		});
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.records.read().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl PlaceSource for MemorySource {
	#[instrument(skip(self))]
	async fn fetch_places(
		&self,
		near: Coordinates,
		radius_km: f64,
	) -> Result<Vec<Result<Place, InvalidPlace>>, SourceError> {
		let radius = radius_km * METERS_PER_KM;

		let places = self
			.records
			.read()
			.iter()
			.cloned()
			.map(RawPlace::decode)
			.filter(|res| {
				res.as_ref()
					.map_or(true, |place| place.distance_from(&near) <= radius)
			})
			.collect::<Vec<_>>();

		trace!(records_count = places.len(), "Fetched places");

		Ok(places)
	}

	async fn fetch_place(&self, id: &PlaceId) -> Result<Option<Place>, SourceError> {
		let record = self
			.records
			.read()
			.iter()
			.find(|record| {
				record.get("id").and_then(serde_json::Value::as_str) == Some(id.as_str())
			})
			.cloned();

		Ok(record.and_then(|record| RawPlace::decode(record).ok()))
	}
}
