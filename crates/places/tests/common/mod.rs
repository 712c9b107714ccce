#![allow(dead_code)]

use roam_places::{
	CategoryMap, Coordinates, MemorySource, Place, PlaceRegistry, PlacesDelegate, RegistryConfig,
	TravelTimeCache, TravelTimeError, TravelTimeProvider, TravelTimes,
};

use std::{
	collections::{HashMap, HashSet},
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::{
	sync::{mpsc, watch},
	time::timeout,
};

const KM_PER_DEGREE: f64 = 111.195;

pub const ORIGIN: Coordinates = Coordinates::new(0.0, 0.0);

/// A point `km` kilometers north of [`ORIGIN`].
pub fn at_km(km: f64) -> Coordinates {
	Coordinates::new(km / KM_PER_DEGREE, 0.0)
}

pub fn record(id: &str, km: f64, rating: f64, categories: &[&str]) -> serde_json::Value {
	let coordinates = at_km(km);
	json!({
		"id": id,
		"name": id,
		"coordinates": { "lat": coordinates.latitude, "lng": coordinates.longitude },
		"categories": categories,
		"photoURLs": [format!("https://example.com/{id}.jpg")],
		"yelp": { "rating": rating, "review_count": 25 },
	})
}

pub fn ids(places: &[Arc<Place>]) -> Vec<String> {
	places
		.iter()
		.map(|place| place.id().to_string())
		.collect()
}

fn key(coordinates: Coordinates) -> (u64, u64) {
	(
		coordinates.latitude.to_bits(),
		coordinates.longitude.to_bits(),
	)
}

/// Walking times of one second per meter unless scripted otherwise. Requests to held
/// destinations wait until [`GatedProvider::release`] is called.
pub struct GatedProvider {
	calls: AtomicUsize,
	etas: Mutex<HashMap<(u64, u64), Duration>>,
	held: Mutex<HashSet<(u64, u64)>>,
	released: watch::Sender<bool>,
}

impl Default for GatedProvider {
	fn default() -> Self {
		Self {
			calls: AtomicUsize::new(0),
			etas: Mutex::default(),
			held: Mutex::default(),
			released: watch::channel(false).0,
		}
	}
}

impl GatedProvider {
	pub fn script(&self, to: Coordinates, eta: Duration) {
		self.etas.lock().insert(key(to), eta);
	}

	pub fn hold(&self, to: Coordinates) {
		self.held.lock().insert(key(to));
	}

	pub fn release(&self) {
		self.released.send_replace(true);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl TravelTimeProvider for GatedProvider {
	async fn estimate(
		&self,
		from: Coordinates,
		to: Coordinates,
	) -> Result<TravelTimes, TravelTimeError> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if self.held.lock().contains(&key(to)) {
			let mut released = self.released.subscribe();
			if released.wait_for(|released| *released).await.is_err() {
				return Err(TravelTimeError::Request("provider dropped".into()));
			}
		}

		let eta = self
			.etas
			.lock()
			.get(&key(to))
			.copied()
			.unwrap_or_else(|| Duration::from_secs_f64(from.distance_to(&to)));

		Ok(TravelTimes::new(Some(eta), None))
	}
}

/// Forwards the ids of every displayed places update to a channel.
pub struct RecordingDelegate {
	updates_tx: mpsc::UnboundedSender<Vec<String>>,
}

impl PlacesDelegate for RecordingDelegate {
	fn on_displayed_places_changed(&self, places: Vec<Arc<Place>>) {
		self.updates_tx.send(ids(&places)).ok();
	}
}

pub struct Harness {
	pub registry: PlaceRegistry,
	pub source: Arc<MemorySource>,
	pub provider: Arc<GatedProvider>,
	updates_rx: mpsc::UnboundedReceiver<Vec<String>>,
}

impl Harness {
	pub fn new(records: Vec<serde_json::Value>, config: RegistryConfig) -> Self {
		Self::with_taxonomy(records, config, CategoryMap::default())
	}

	pub fn with_taxonomy(
		records: Vec<serde_json::Value>,
		config: RegistryConfig,
		taxonomy: CategoryMap,
	) -> Self {
		let source = Arc::new(MemorySource::new(records));
		let provider = Arc::new(GatedProvider::default());
		let cache = Arc::new(TravelTimeCache::new(
			provider.clone(),
			&config.travel_time_cache,
		));
		let (updates_tx, updates_rx) = mpsc::unbounded_channel();

		let registry = PlaceRegistry::new(
			config,
			source.clone(),
			cache,
			Arc::new(taxonomy),
			Arc::new(RecordingDelegate { updates_tx }),
		);

		Self {
			registry,
			source,
			provider,
			updates_rx,
		}
	}

	/// Ids of the next displayed places update received by the delegate.
	pub async fn next_update(&mut self) -> Vec<String> {
		timeout(Duration::from_secs(5), self.updates_rx.recv())
			.await
			.expect("delegate wasn't notified in time")
			.expect("notification context is gone")
	}

	pub fn no_pending_updates(&mut self) -> bool {
		self.updates_rx.try_recv().is_err()
	}
}

/// Lookups without warm-up, so provider calls only come from the staged sort.
pub fn config_without_warm_up() -> RegistryConfig {
	RegistryConfig {
		search_radius_km: 50.0,
		warm_up_limit: 0,
		..Default::default()
	}
}
