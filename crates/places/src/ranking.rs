//! Stateless ranking and filtering over place lists.
//!
//! Everything here is pure given its inputs, except for [`sort_by_travel_time`] which goes
//! through the [`TravelTimeCache`].

use crate::{
	config::DisplayThresholds,
	coordinates::Coordinates,
	place::Place,
	travel_time::{TravelTimeCache, TravelTimes},
};

use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
	fmt,
	sync::Arc,
};

use chrono::{DateTime, TimeZone};
use futures_concurrency::future::Join;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterTag(String);

impl FilterTag {
	pub const DISCOVER: &'static str = "discover";

	#[must_use]
	pub fn discover() -> Self {
		Self(Self::DISCOVER.to_string())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for FilterTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for FilterTag {
	fn from(tag: &str) -> Self {
		Self(tag.to_string())
	}
}

impl From<String> for FilterTag {
	fn from(tag: String) -> Self {
		Self(tag)
	}
}

/// Decides which places belong to a filter tag.
pub trait CategoryTaxonomy: Send + Sync + 'static {
	fn matches(&self, place: &Place, tag: &FilterTag) -> bool;
}

/// Taxonomy mapping each tag to the place categories it covers, `"*"` covers everything.
///
/// Deserializes from a `{ "tag": ["category", ...] }` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMap(HashMap<FilterTag, HashSet<String>>);

impl CategoryMap {
	pub const WILDCARD: &'static str = "*";

	#[must_use]
	pub fn with_tag(
		mut self,
		tag: impl Into<FilterTag>,
		categories: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		self.0.insert(
			tag.into(),
			categories
				.into_iter()
				.map(|category| category.into().to_lowercase())
				.collect(),
		);
		self
	}
}

impl Default for CategoryMap {
	fn default() -> Self {
		Self(HashMap::new()).with_tag(FilterTag::discover(), [Self::WILDCARD])
	}
}

impl CategoryTaxonomy for CategoryMap {
	fn matches(&self, place: &Place, tag: &FilterTag) -> bool {
		self.0.get(tag).is_some_and(|categories| {
			categories.contains(Self::WILDCARD)
				|| place.categories().is_some_and(|place_categories| {
					place_categories
						.iter()
						.any(|category| categories.contains(&category.to_lowercase()))
				})
		})
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
	#[default]
	Ascending,
	Descending,
}

impl SortOrder {
	const fn apply(self, ordering: Ordering) -> Ordering {
		match self {
			Self::Ascending => ordering,
			Self::Descending => ordering.reverse(),
		}
	}
}

fn sort_by_key(mut keyed: Vec<(f64, Arc<Place>)>, order: SortOrder) -> Vec<Arc<Place>> {
	// stable, so equal keys keep their incoming order
	keyed.sort_by(|(a, _), (b, _)| order.apply(a.total_cmp(b)));
	keyed.into_iter().map(|(_, place)| place).collect()
}

/// Sorts by great-circle distance from `origin`.
#[must_use]
pub fn sort_by_distance(
	places: &[Arc<Place>],
	origin: &Coordinates,
	order: SortOrder,
) -> Vec<Arc<Place>> {
	sort_by_key(
		places
			.iter()
			.map(|place| (place.distance_from(origin), Arc::clone(place)))
			.collect(),
		order,
	)
}

/// Staged sort: distance first, then travel time.
///
/// Only the first `lookup_limit` places by distance get a travel time lookup, which bounds the
/// requests sent to the provider no matter how many places come in. The whole list is then
/// re-sorted by shortest ETA. Places outside that prefix rank by whatever travel time they
/// already carry, and without one they rank as infinitely far, keeping their distance order
/// among themselves.
#[instrument(skip(places, cache), fields(places_count = places.len()))]
pub async fn sort_by_travel_time(
	places: &[Arc<Place>],
	origin: Coordinates,
	order: SortOrder,
	cache: &TravelTimeCache,
	lookup_limit: usize,
) -> Vec<Arc<Place>> {
	let by_distance = sort_by_distance(places, &origin, order);
	let prefix_len = lookup_limit.min(by_distance.len());

	let resolved = by_distance[..prefix_len]
		.iter()
		.map(|place| async move {
			(
				place.id().clone(),
				cache.get(place, origin).await.ok(),
			)
		})
		.collect::<Vec<_>>()
		.join()
		.await
		.into_iter()
		.collect::<HashMap<_, _>>();

	trace!(lookups = resolved.len(), "Travel times resolved");

	sort_by_key(
		by_distance
			.into_iter()
			.map(|place| {
				let travel_times = resolved
					.get(place.id())
					.copied()
					.unwrap_or_else(|| place.last_travel_time());

				(TravelTimes::ranking_key(travel_times), place)
			})
			.collect(),
		order,
	)
}

fn passes_filters(
	place: &Place,
	filters: &HashSet<FilterTag>,
	taxonomy: &dyn CategoryTaxonomy,
) -> bool {
	filters.is_empty() || filters.iter().any(|tag| taxonomy.matches(place, tag))
}

/// Keeps places matching any of the enabled tags. No enabled tags means no filtering.
#[must_use]
pub fn filter(
	places: &[Arc<Place>],
	filters: &HashSet<FilterTag>,
	taxonomy: &dyn CategoryTaxonomy,
) -> Vec<Arc<Place>> {
	places
		.iter()
		.filter(|place| passes_filters(place, filters, taxonomy))
		.cloned()
		.collect()
}

/// Stricter pass for what is worth showing.
///
/// A place hosting events is always kept. Otherwise it must pass the tag filter, be reasonably
/// popular and well reviewed, and be open at `at`, places without listed hours counting as
/// always open.
#[must_use]
pub fn filter_for_display<Tz: TimeZone>(
	places: &[Arc<Place>],
	filters: &HashSet<FilterTag>,
	taxonomy: &dyn CategoryTaxonomy,
	thresholds: &DisplayThresholds,
	at: &DateTime<Tz>,
) -> Vec<Arc<Place>> {
	places
		.iter()
		.filter(|place| {
			!place.events().is_empty()
				|| (passes_filters(place, filters, taxonomy)
					&& is_popular(place, thresholds)
					&& place.hours().map_or(true, |hours| hours.is_open(at)))
		})
		.cloned()
		.collect()
}

fn is_popular(place: &Place, thresholds: &DisplayThresholds) -> bool {
	place
		.rating()
		.is_some_and(|rating| rating >= thresholds.min_rating)
		&& place
			.review_count()
			.is_some_and(|count| count >= thresholds.min_review_count)
}

/// Best rated first, unrated places last.
#[must_use]
pub fn sort_by_top_rated(places: &[Arc<Place>]) -> Vec<Arc<Place>> {
	sort_by_key(
		places
			.iter()
			.map(|place| {
				(
					place.rating().unwrap_or(f64::NEG_INFINITY),
					Arc::clone(place),
				)
			})
			.collect(),
		SortOrder::Descending,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::{
		config::CacheConfig,
		place::{DayHours, OpenHours, ReviewProvider},
		test_utils::{at_km, ids, ScriptedProvider},
	};

	use std::time::Duration;

	use chrono::{NaiveTime, Utc, Weekday};
	use tracing_test::traced_test;

	const ORIGIN: Coordinates = Coordinates::new(0.0, 0.0);

	fn place_at(id: &str, km: f64) -> Arc<Place> {
		Arc::new(Place::new(id, id, at_km(km), ReviewProvider::default()))
	}

	fn rated(id: &str, rating: Option<f64>, reviews: u32) -> Place {
		Place::new(
			id,
			id,
			ORIGIN,
			ReviewProvider::new(rating, Some(reviews)),
		)
	}

	fn cache(provider: &Arc<ScriptedProvider>) -> TravelTimeCache {
		TravelTimeCache::new(provider.clone(), &CacheConfig::default())
	}

	#[test]
	fn distance_order() {
		let places = [place_at("a", 5.0), place_at("b", 1.0), place_at("c", 3.0)];

		assert_eq!(
			ids(&sort_by_distance(&places, &ORIGIN, SortOrder::Ascending)),
			["b", "c", "a"]
		);
		assert_eq!(
			ids(&sort_by_distance(&places, &ORIGIN, SortOrder::Descending)),
			["a", "c", "b"]
		);
	}

	#[tokio::test]
	#[traced_test]
	async fn travel_time_follows_distance_when_etas_agree() {
		let places = [place_at("a", 5.0), place_at("b", 1.0), place_at("c", 3.0)];
		let provider = Arc::new(ScriptedProvider::proportional_to_distance());

		let sorted = sort_by_travel_time(
			&places,
			ORIGIN,
			SortOrder::Ascending,
			&cache(&provider),
			10,
		)
		.await;

		assert_eq!(ids(&sorted), ["b", "c", "a"]);
		assert_eq!(provider.calls(), 3);
	}

	#[tokio::test]
	#[traced_test]
	async fn travel_time_can_beat_distance() {
		let places = [place_at("a", 5.0), place_at("b", 1.0), place_at("c", 3.0)];
		let provider = Arc::new(
			ScriptedProvider::default()
				// `b` is close but across a river
				.with_eta(at_km(1.0), Duration::from_secs(1_800))
				.with_eta(at_km(3.0), Duration::from_secs(600))
				.with_eta(at_km(5.0), Duration::from_secs(900)),
		);

		let sorted = sort_by_travel_time(
			&places,
			ORIGIN,
			SortOrder::Ascending,
			&cache(&provider),
			10,
		)
		.await;

		assert_eq!(ids(&sorted), ["c", "a", "b"]);
	}

	#[tokio::test]
	#[traced_test]
	async fn lookups_are_bounded() {
		let places = (0..25)
			.map(|i| place_at(&format!("p{i}"), f64::from(25 - i)))
			.collect::<Vec<_>>();
		let provider = Arc::new(ScriptedProvider::proportional_to_distance());

		let sorted = sort_by_travel_time(
			&places,
			ORIGIN,
			SortOrder::Ascending,
			&cache(&provider),
			10,
		)
		.await;

		assert_eq!(provider.calls(), 10);
		assert_eq!(sorted.len(), 25);

		// the nearest ten were looked up, the rest keep their distance order behind them
		let expected = (0..25).rev().map(|i| format!("p{i}")).collect::<Vec<_>>();
		assert_eq!(ids(&sorted), expected);
		assert!(sorted[..10].iter().all(|place| place.shortest_eta().is_some()));
		assert!(sorted[10..].iter().all(|place| place.shortest_eta().is_none()));
	}

	#[tokio::test]
	#[traced_test]
	async fn fewer_places_than_the_limit_are_all_looked_up() {
		let places = [place_at("a", 2.0), place_at("b", 1.0)];
		let provider = Arc::new(ScriptedProvider::proportional_to_distance());

		sort_by_travel_time(&places, ORIGIN, SortOrder::Ascending, &cache(&provider), 10).await;

		assert_eq!(provider.calls(), 2);
	}

	#[tokio::test]
	#[traced_test]
	async fn unresolved_eta_sorts_last_ascending_first_descending() {
		// `near` has no route, so no ETA even though it is the closest
		let places = [place_at("near", 1.0), place_at("mid", 2.0), place_at("far", 3.0)];
		let provider = Arc::new(
			ScriptedProvider::default()
				.with_eta(at_km(2.0), Duration::from_secs(300))
				.with_eta(at_km(3.0), Duration::from_secs(400)),
		);
		let cache = cache(&provider);

		let ascending =
			sort_by_travel_time(&places, ORIGIN, SortOrder::Ascending, &cache, 10).await;
		assert_eq!(ids(&ascending), ["mid", "far", "near"]);

		let descending =
			sort_by_travel_time(&places, ORIGIN, SortOrder::Descending, &cache, 10).await;
		assert_eq!(ids(&descending), ["near", "far", "mid"]);
	}

	#[tokio::test]
	#[traced_test]
	async fn earlier_travel_times_rank_places_outside_the_prefix() {
		let places = [place_at("a", 1.0), place_at("b", 2.0), place_at("c", 3.0)];
		places[2].set_last_travel_time(TravelTimes::new(Some(Duration::from_secs(1)), None));
		let provider = Arc::new(ScriptedProvider::proportional_to_distance());

		let sorted = sort_by_travel_time(
			&places,
			ORIGIN,
			SortOrder::Ascending,
			&cache(&provider),
			2,
		)
		.await;

		assert_eq!(provider.calls(), 2);
		assert_eq!(ids(&sorted), ["c", "a", "b"]);
	}

	#[test]
	fn filter_matches_any_enabled_tag() {
		let taxonomy = CategoryMap::default()
			.with_tag("food", ["Restaurants", "cafes"])
			.with_tag("nightlife", ["bars"]);
		let places = [
			Arc::new(rated("cafe", None, 0).with_categories(["cafes"])),
			Arc::new(rated("bar", None, 0).with_categories(["bars"])),
			Arc::new(rated("museum", None, 0).with_categories(["museums"])),
			Arc::new(rated("unknown", None, 0)),
		];

		let food = HashSet::from([FilterTag::from("food")]);
		assert_eq!(ids(&filter(&places, &food, &taxonomy)), ["cafe"]);

		let food_or_nightlife = HashSet::from([FilterTag::from("food"), FilterTag::from("nightlife")]);
		assert_eq!(
			ids(&filter(&places, &food_or_nightlife, &taxonomy)),
			["cafe", "bar"]
		);

		let discover = HashSet::from([FilterTag::discover()]);
		assert_eq!(filter(&places, &discover, &taxonomy).len(), 4);

		assert_eq!(filter(&places, &HashSet::new(), &taxonomy).len(), 4);

		let unknown = HashSet::from([FilterTag::from("sports")]);
		assert!(filter(&places, &unknown, &taxonomy).is_empty());
	}

	#[test]
	fn display_filter() {
		let taxonomy = CategoryMap::default();
		let discover = HashSet::from([FilterTag::discover()]);
		let thresholds = DisplayThresholds::default();
		// a Monday
		let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
		let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
		let five = NaiveTime::from_hms_opt(17, 0, 0).unwrap();

		let places = [
			Arc::new(rated("good", Some(4.0), 20)),
			Arc::new(rated("unpopular", Some(4.0), 3)),
			Arc::new(rated("poorly-rated", Some(2.4), 300)),
			Arc::new(rated("unrated", None, 300)),
			Arc::new(rated("bad-with-events", Some(1.0), 0).with_events(["gig"])),
			Arc::new(
				rated("closed-today", Some(4.5), 50)
					.with_hours(OpenHours::from_days([(Weekday::Tue, DayHours::new(nine, five))])),
			),
			Arc::new(
				rated("open-today", Some(4.5), 50)
					.with_hours(OpenHours::from_days([(Weekday::Mon, DayHours::new(nine, five))])),
			),
			Arc::new(rated("edge", Some(2.5), 4)),
		];

		assert_eq!(
			ids(&filter_for_display(&places, &discover, &taxonomy, &thresholds, &at)),
			["good", "bad-with-events", "open-today", "edge"]
		);

		let food = HashSet::from([FilterTag::from("food")]);
		assert_eq!(
			ids(&filter_for_display(&places, &food, &taxonomy, &thresholds, &at)),
			["bad-with-events"]
		);
	}

	#[test]
	fn top_rated_order() {
		let places = [
			Arc::new(rated("four", Some(4.0), 10)),
			Arc::new(rated("none", None, 10)),
			Arc::new(rated("two", Some(2.0), 10)),
			Arc::new(rated("five", Some(5.0), 10)),
		];

		assert_eq!(ids(&sort_by_top_rated(&places)), ["five", "four", "two", "none"]);
	}
}
