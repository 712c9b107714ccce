//! The registry owning the place list shown to the user.
//!
//! All places, the displayed subset and its position index live behind one lock as a single
//! unit. Network calls (place fetches and travel time lookups) always run outside of it, their
//! results get merged back in a short write section, after which the delegate is notified with
//! the new displayed list.

use crate::{
	config::RegistryConfig,
	coordinates::Coordinates,
	error::{Error, Result},
	notify::{Notifier, PlacesDelegate},
	place::{Place, PlaceId},
	ranking::{
		filter, filter_for_display, sort_by_distance, sort_by_travel_time, CategoryTaxonomy,
		FilterTag, SortOrder,
	},
	source::PlaceSource,
	travel_time::TravelTimeCache,
};

use std::{
	collections::HashSet,
	fmt,
	pin::pin,
	sync::{Arc, Weak},
};

use chrono::{DateTime, TimeZone};
use futures::StreamExt;
use futures_concurrency::future::{Join, Race};
use roam_watchers::{WatchHandle, Watchers};
use tracing::{debug, instrument, trace, warn};

mod state;

use state::{GuardedState, RegistryState};

struct Inner {
	state: GuardedState,
	source: Arc<dyn PlaceSource>,
	cache: Arc<TravelTimeCache>,
	taxonomy: Arc<dyn CategoryTaxonomy>,
	notifier: Notifier,
	watchers: Watchers,
	config: RegistryConfig,
}

#[derive(Clone)]
pub struct PlaceRegistry {
	inner: Arc<Inner>,
}

impl PlaceRegistry {
	/// Starts with no places and the configured default filters.
	///
	/// # Panics
	///
	/// Must be called from within a tokio runtime, the delegate gets its own notification task.
	pub fn new(
		config: RegistryConfig,
		source: Arc<dyn PlaceSource>,
		cache: Arc<TravelTimeCache>,
		taxonomy: Arc<dyn CategoryTaxonomy>,
		delegate: Arc<dyn PlacesDelegate>,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				state: GuardedState::new(RegistryState::new(config.default_filters.clone())),
				source,
				cache,
				taxonomy,
				notifier: Notifier::spawn(delegate),
				watchers: Watchers::default(),
				config,
			}),
		}
	}

	/// Fetches places around `location` and replaces the whole list with them, ranked by travel
	/// time. Always wins over a re-rank running at the same time.
	#[instrument(skip(self), err)]
	pub async fn update_places(&self, location: Coordinates) -> Result<()> {
		let fetched = self
			.inner
			.source
			.fetch_places(location, self.inner.config.search_radius_km)
			.await?;

		let mut seen = HashSet::with_capacity(fetched.len());
		let places = fetched
			.into_iter()
			.filter_map(|res| match res {
				Ok(place) => Some(place),
				Err(e) => {
					warn!(id = ?e.id, reason = %e.reason, "Dropping invalid place record");
					None
				}
			})
			.filter(|place| {
				let first = seen.insert(place.id().clone());
				if !first {
					warn!(place_id = %place.id(), "Dropping duplicate place record");
				}
				first
			})
			.map(Arc::new)
			.collect::<Vec<_>>();

		trace!(places_count = places.len(), "Fetched places");

		self.warm_up(&places, location).await;

		let sorted = sort_by_travel_time(
			&places,
			location,
			SortOrder::Ascending,
			&self.inner.cache,
			self.inner.config.travel_time_lookup_limit,
		)
		.await;

		self.inner.state.write(|state| {
			state.replace_all(sorted, &*self.inner.taxonomy);
			self.inner.notifier.notify(state.displayed().places().to_vec());
		});

		Ok(())
	}

	/// Requests travel times for the places that will be shown first, so they don't wait on the
	/// bounded lookups of the full staged sort.
	async fn warm_up(&self, places: &[Arc<Place>], location: Coordinates) {
		let limit = self.inner.config.warm_up_limit;
		if limit == 0 {
			return;
		}

		let filters = self.enabled_filters();
		let shown = filter(places, &filters, &*self.inner.taxonomy);

		let warmed = sort_by_distance(&shown, &location, SortOrder::Ascending)
			.iter()
			.take(limit)
			.map(|place| self.inner.cache.get(place, location))
			.collect::<Vec<_>>()
			.join()
			.await
			.into_iter()
			.filter(|res| res.is_ok())
			.count();

		trace!(warmed, "Warmed up travel times");
	}

	/// Re-derives the displayed places from the current list, without touching the network.
	#[instrument(skip(self))]
	pub fn refresh(&self, enabled_filters: HashSet<FilterTag>, top_rated_only: bool) {
		self.inner.state.write(|state| {
			state.set_view(enabled_filters, top_rated_only, &*self.inner.taxonomy);
			self.inner.notifier.notify(state.displayed().places().to_vec());
		});
	}

	/// Re-ranks the current places by travel time from `location`.
	///
	/// Returns whether the result was committed. Nothing happens while showing top rated places,
	/// and a result computed over a list that got replaced in the meantime is thrown away.
	#[instrument(skip(self))]
	pub async fn sort_places(&self, location: Coordinates) -> bool {
		let Some((generation, places)) = self.inner.state.read(|state| {
			(!state.top_rated_only()).then(|| (state.generation(), state.all_places().to_vec()))
		}) else {
			trace!("Showing top rated places, skipping re-rank");
			return false;
		};

		let sorted = sort_by_travel_time(
			&places,
			location,
			SortOrder::Ascending,
			&self.inner.cache,
			self.inner.config.travel_time_lookup_limit,
		)
		.await;

		self.inner.state.write(|state| {
			if state.generation() != generation {
				debug!(
					expected = generation,
					found = state.generation(),
					"Places changed while re-ranking, discarding result"
				);
				return false;
			}

			state.replace_all(sorted, &*self.inner.taxonomy);
			self.inner.notifier.notify(state.displayed().places().to_vec());
			true
		})
	}

	/// Looks a place up through the place source, whether it is displayed or not.
	#[instrument(skip(self), err)]
	pub async fn place_for_key(&self, id: &PlaceId) -> Result<Option<Arc<Place>>> {
		Ok(self.inner.source.fetch_place(id).await?.map(Arc::new))
	}

	pub fn place_at(&self, index: usize) -> Result<Arc<Place>> {
		self.inner.state.read(|state| {
			let displayed = state.displayed();
			displayed
				.get(index)
				.cloned()
				.ok_or(Error::IndexOutOfRange {
					index,
					len: displayed.len(),
				})
		})
	}

	/// Displayed place after `place`, or the first displayed place if `place` isn't shown.
	#[must_use]
	pub fn next_place(&self, place: &Place) -> Option<Arc<Place>> {
		self.inner.state.read(|state| {
			let displayed = state.displayed();
			displayed
				.index_of(place.id())
				.map_or_else(|| displayed.get(0), |idx| displayed.get(idx + 1))
				.cloned()
		})
	}

	#[must_use]
	pub fn previous_place(&self, place: &Place) -> Option<Arc<Place>> {
		self.inner.state.read(|state| {
			let displayed = state.displayed();
			displayed
				.index_of(place.id())
				.and_then(|idx| idx.checked_sub(1))
				.and_then(|idx| displayed.get(idx))
				.cloned()
		})
	}

	#[must_use]
	pub fn number_of_places(&self) -> usize {
		self.inner.state.read(|state| state.displayed().len())
	}

	#[must_use]
	pub fn index_of(&self, place: &Place) -> Option<usize> {
		self.inner
			.state
			.read(|state| state.displayed().index_of(place.id()))
	}

	#[must_use]
	pub fn all_places(&self) -> Vec<Arc<Place>> {
		self.inner.state.read(|state| state.all_places().to_vec())
	}

	#[must_use]
	pub fn displayed_places(&self) -> Vec<Arc<Place>> {
		self.inner
			.state
			.read(|state| state.displayed().places().to_vec())
	}

	/// Displayed places worth showing at `at`, judged by the configured display thresholds.
	///
	/// Keeps the displayed order, see [`filter_for_display`] for what gets dropped.
	#[must_use]
	pub fn displayable_places<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> Vec<Arc<Place>> {
		self.inner.state.read(|state| {
			filter_for_display(
				state.displayed().places(),
				state.enabled_filters(),
				&*self.inner.taxonomy,
				&self.inner.config.display,
				at,
			)
		})
	}

	#[must_use]
	pub fn enabled_filters(&self) -> HashSet<FilterTag> {
		self.inner.state.read(|state| state.enabled_filters().clone())
	}

	#[must_use]
	pub fn top_rated_only(&self) -> bool {
		self.inner.state.read(RegistryState::top_rated_only)
	}

	#[must_use]
	pub fn cache(&self) -> &Arc<TravelTimeCache> {
		&self.inner.cache
	}

	/// Runs [`Self::update_places`] for every location `locations` yields, until the stream ends
	/// or the watcher is stopped.
	pub fn follow_locations<S>(&self, locations: S) -> WatchHandle
	where
		S: futures::Stream<Item = Coordinates> + Send + 'static,
	{
		enum StreamMessage {
			Location(Coordinates),
			Stop,
		}

		// the watcher lives inside the registry, it must not keep it alive
		let inner = Arc::downgrade(&self.inner);

		self.inner.watchers.spawn("follow_locations", |stop| async move {
			let mut locations = pin!(locations);

			loop {
				let msg = (
					async {
						locations
							.next()
							.await
							.map_or(StreamMessage::Stop, StreamMessage::Location)
					},
					async {
						(&stop).await;
						StreamMessage::Stop
					},
				)
					.race()
					.await;

				let StreamMessage::Location(location) = msg else {
					break;
				};

				let Some(registry) = Weak::upgrade(&inner).map(|inner| Self { inner }) else {
					debug!("Registry dropped, no longer following locations");
					break;
				};

				if let Err(e) = registry.update_places(location).await {
					warn!(%location, ?e, "Failed to update places for new location");
				}
			}

			trace!("Stopped following locations");
		})
	}

	/// Stops every watcher this registry spawned.
	pub async fn stop_watchers(&self) {
		self.inner.watchers.stop_all().await;
	}
}

impl fmt::Debug for PlaceRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PlaceRegistry")
			.field("displayed_count", &self.number_of_places())
			.field("cache", &self.inner.cache)
			.field("config", &self.inner.config)
			.finish_non_exhaustive()
	}
}
