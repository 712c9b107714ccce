//! Travel time estimates and their memoization.
//!
//! Lookups are keyed by place id and single-flight: concurrent callers asking for the same place
//! while a request is in flight all wait on that one request. Settled results, failures
//! included, are kept until they expire or are evicted to make room for other places.

use crate::{
	config::CacheConfig,
	coordinates::Coordinates,
	place::{Place, PlaceId},
};

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{sync::OnceCell, time::Instant};
use tracing::{debug, instrument, trace};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelTimes {
	pub walking: Option<Duration>,
	pub driving: Option<Duration>,
}

impl TravelTimes {
	#[must_use]
	pub const fn new(walking: Option<Duration>, driving: Option<Duration>) -> Self {
		Self { walking, driving }
	}

	#[must_use]
	pub fn shortest_eta(&self) -> Option<Duration> {
		match (self.walking, self.driving) {
			(Some(walking), Some(driving)) => Some(walking.min(driving)),
			(walking, driving) => walking.or(driving),
		}
	}

	/// Shortest ETA in seconds, with a missing estimate ranking as infinitely far away.
	#[must_use]
	pub fn ranking_key(travel_times: Option<Self>) -> f64 {
		travel_times
			.and_then(|travel_times| travel_times.shortest_eta())
			.map_or(f64::INFINITY, |eta| eta.as_secs_f64())
	}
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TravelTimeError {
	#[error("travel time provider is rate limiting us")]
	RateLimited,
	#[error("no route between origin and destination")]
	NoRoute,
	#[error("travel time request failed: {0}")]
	Request(String),
}

/// Network collaborator producing walking and driving durations between two points.
#[async_trait]
pub trait TravelTimeProvider: Send + Sync + 'static {
	async fn estimate(
		&self,
		from: Coordinates,
		to: Coordinates,
	) -> Result<TravelTimes, TravelTimeError>;
}

type Slot = Arc<OnceCell<Result<TravelTimes, TravelTimeError>>>;

struct Entry {
	slot: Slot,
	created_at: Instant,
	last_access: u64,
}

#[derive(Default)]
struct Entries {
	map: HashMap<PlaceId, Entry>,
	tick: u64,
}

/// Memoized travel times, keyed by place id.
///
/// `capacity` bounds settled entries only. Lookups still in flight are never evicted, so a burst
/// of concurrent lookups for distinct places can push the entry count past `capacity` until they
/// settle, each later insertion then evicts one settled entry.
pub struct TravelTimeCache {
	provider: Arc<dyn TravelTimeProvider>,
	entries: Mutex<Entries>,
	capacity: usize,
	ttl: Option<Duration>,
}

impl TravelTimeCache {
	pub fn new(provider: Arc<dyn TravelTimeProvider>, config: &CacheConfig) -> Self {
		Self {
			provider,
			entries: Mutex::default(),
			capacity: config.capacity.max(1),
			ttl: config.ttl_secs.map(Duration::from_secs),
		}
	}

	/// Travel times from `origin` to `place`.
	///
	/// On success the place's last travel time is updated before returning.
	#[instrument(skip_all, fields(place_id = %place.id()))]
	pub async fn get(
		&self,
		place: &Place,
		origin: Coordinates,
	) -> Result<TravelTimes, TravelTimeError> {
		let slot = self.slot_for(place.id());
		let destination = place.coordinates();

		let res = slot
			.get_or_init(|| async {
				trace!(%origin, %destination, "Requesting travel times");
				let res = self.provider.estimate(origin, destination).await;
				if let Err(e) = &res {
					debug!(%e, "Travel time lookup failed");
				}
				res
			})
			.await
			.clone();

		if let Ok(travel_times) = &res {
			place.set_last_travel_time(*travel_times);
		}

		res
	}

	/// Settled result for a place, without triggering a lookup.
	#[must_use]
	pub fn peek(&self, id: &PlaceId) -> Option<Result<TravelTimes, TravelTimeError>> {
		let entries = self.entries.lock();
		entries
			.map
			.get(id)
			.filter(|entry| !self.is_expired(entry))
			.and_then(|entry| entry.slot.get().cloned())
	}

	/// Forgets a place, the next lookup will hit the provider again. An in-flight request keeps
	/// running for whoever is already waiting on it.
	pub fn invalidate(&self, id: &PlaceId) -> bool {
		self.entries.lock().map.remove(id).is_some()
	}

	pub fn clear(&self) {
		self.entries.lock().map.clear();
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.lock().map.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn slot_for(&self, id: &PlaceId) -> Slot {
		let mut entries = self.entries.lock();
		entries.tick += 1;
		let tick = entries.tick;

		if let Some(entry) = entries.map.get_mut(id) {
			if !self.is_expired(entry) {
				entry.last_access = tick;
				return Arc::clone(&entry.slot);
			}

			trace!(place_id = %id, "Travel times expired");
		}

		if entries.map.len() >= self.capacity && !entries.map.contains_key(id) {
			// only settled entries are evicted, in-flight ones have waiters
			if let Some(lru_id) = entries
				.map
				.iter()
				.filter(|(_, entry)| entry.slot.initialized())
				.min_by_key(|(_, entry)| entry.last_access)
				.map(|(id, _)| id.clone())
			{
				trace!(place_id = %lru_id, "Evicting travel times");
				entries.map.remove(&lru_id);
			}
		}

		let slot = Slot::default();
		entries.map.insert(
			id.clone(),
			Entry {
				slot: Arc::clone(&slot),
				created_at: Instant::now(),
				last_access: tick,
			},
		);

		slot
	}

	fn is_expired(&self, entry: &Entry) -> bool {
		self.ttl.is_some_and(|ttl| {
			entry.slot.initialized() && entry.created_at.elapsed() >= ttl
		})
	}
}

impl fmt::Debug for TravelTimeCache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TravelTimeCache")
			.field("len", &self.len())
			.field("capacity", &self.capacity)
			.field("ttl", &self.ttl)
			.finish_non_exhaustive()
	}
}
