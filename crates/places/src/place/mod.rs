use crate::{coordinates::Coordinates, travel_time::TravelTimes};

use std::{
	borrow::Borrow,
	fmt,
	hash::{Hash, Hasher},
	sync::Arc,
	time::Duration,
};

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};

mod hours;
mod raw;

pub use hours::{DayHours, HoursError, OpenHours, RawHours};
pub use raw::{InvalidPlace, PlaceValidationError, RawPlace};

/// Ratings are on a 0 to 5 stars scale.
pub const MAX_RATING: f64 = 5_f64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceId(String);

impl PlaceId {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PlaceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<String> for PlaceId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl From<&str> for PlaceId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl Borrow<str> for PlaceId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// Rating summary from a single review source. Both fields absent means no information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewProvider {
	pub rating: Option<f64>,
	#[serde(alias = "review_count", alias = "totalReviewCount")]
	pub total_review_count: Option<u32>,
}

impl ReviewProvider {
	#[must_use]
	pub const fn new(rating: Option<f64>, total_review_count: Option<u32>) -> Self {
		Self {
			rating,
			total_review_count,
		}
	}

	#[must_use]
	pub const fn has_info(&self) -> bool {
		self.rating.is_some() || self.total_review_count.is_some()
	}

	#[must_use]
	pub fn is_valid(&self) -> bool {
		self.rating
			.map_or(true, |rating| (0.0..=MAX_RATING).contains(&rating))
	}
}

/// A point of interest.
///
/// Identity is the `id` alone: two records with the same id are the same place, whatever their
/// other attributes say. Everything is immutable except for the last observed travel time,
/// which the travel time cache updates as lookups land.
pub struct Place {
	id: PlaceId,
	name: String,
	coordinates: Coordinates,
	categories: Option<Vec<String>>,
	url: Option<String>,
	address: Option<String>,
	photo_urls: Vec<String>,
	yelp_provider: ReviewProvider,
	trip_advisor_provider: Option<ReviewProvider>,
	hours: Option<OpenHours>,
	wiki_description: Option<String>,
	yelp_description: Option<String>,
	events: Vec<String>,
	last_travel_time: ArcSwapOption<TravelTimes>,
}

impl Place {
	/// A place with only its required attributes, use the `with_*` methods for the rest.
	pub fn new(
		id: impl Into<PlaceId>,
		name: impl Into<String>,
		coordinates: Coordinates,
		yelp_provider: ReviewProvider,
	) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			coordinates,
			categories: None,
			url: None,
			address: None,
			photo_urls: Vec::new(),
			yelp_provider,
			trip_advisor_provider: None,
			hours: None,
			wiki_description: None,
			yelp_description: None,
			events: Vec::new(),
			last_travel_time: ArcSwapOption::empty(),
		}
	}

	#[must_use]
	pub fn with_categories(mut self, categories: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.categories = Some(categories.into_iter().map(Into::into).collect());
		self
	}

	#[must_use]
	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self
	}

	#[must_use]
	pub fn with_address(mut self, address: impl Into<String>) -> Self {
		self.address = Some(address.into());
		self
	}

	#[must_use]
	pub fn with_photo_urls(mut self, photo_urls: Vec<String>) -> Self {
		self.photo_urls = photo_urls;
		self
	}

	#[must_use]
	pub const fn with_trip_advisor_provider(mut self, provider: ReviewProvider) -> Self {
		self.trip_advisor_provider = Some(provider);
		self
	}

	#[must_use]
	pub fn with_hours(mut self, hours: OpenHours) -> Self {
		self.hours = Some(hours);
		self
	}

	#[must_use]
	pub fn with_wiki_description(mut self, description: impl Into<String>) -> Self {
		self.wiki_description = Some(description.into());
		self
	}

	#[must_use]
	pub fn with_yelp_description(mut self, description: impl Into<String>) -> Self {
		self.yelp_description = Some(description.into());
		self
	}

	#[must_use]
	pub fn with_events(mut self, events: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.events = events.into_iter().map(Into::into).collect();
		self
	}

	#[must_use]
	pub const fn id(&self) -> &PlaceId {
		&self.id
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub const fn coordinates(&self) -> Coordinates {
		self.coordinates
	}

	#[must_use]
	pub fn categories(&self) -> Option<&[String]> {
		self.categories.as_deref()
	}

	#[must_use]
	pub fn url(&self) -> Option<&str> {
		self.url.as_deref()
	}

	#[must_use]
	pub fn address(&self) -> Option<&str> {
		self.address.as_deref()
	}

	#[must_use]
	pub fn photo_urls(&self) -> &[String] {
		&self.photo_urls
	}

	#[must_use]
	pub const fn yelp_provider(&self) -> &ReviewProvider {
		&self.yelp_provider
	}

	#[must_use]
	pub const fn trip_advisor_provider(&self) -> Option<&ReviewProvider> {
		self.trip_advisor_provider.as_ref()
	}

	#[must_use]
	pub const fn hours(&self) -> Option<&OpenHours> {
		self.hours.as_ref()
	}

	#[must_use]
	pub fn wiki_description(&self) -> Option<&str> {
		self.wiki_description.as_deref()
	}

	#[must_use]
	pub fn yelp_description(&self) -> Option<&str> {
		self.yelp_description.as_deref()
	}

	/// Ids of the events hosted at this place.
	#[must_use]
	pub fn events(&self) -> &[String] {
		&self.events
	}

	/// Yelp rating, the one used for ranking and filtering.
	#[must_use]
	pub const fn rating(&self) -> Option<f64> {
		self.yelp_provider.rating
	}

	#[must_use]
	pub const fn review_count(&self) -> Option<u32> {
		self.yelp_provider.total_review_count
	}

	/// Distance in meters from `origin`.
	#[must_use]
	pub fn distance_from(&self, origin: &Coordinates) -> f64 {
		origin.distance_to(&self.coordinates)
	}

	/// Most recent travel time observed for this place, if any lookup succeeded so far.
	#[must_use]
	pub fn last_travel_time(&self) -> Option<TravelTimes> {
		self.last_travel_time.load().as_deref().copied()
	}

	/// Last writer wins, no ordering is kept between concurrent writers.
	pub fn set_last_travel_time(&self, travel_times: TravelTimes) {
		self.last_travel_time.store(Some(Arc::new(travel_times)));
	}

	#[must_use]
	pub fn shortest_eta(&self) -> Option<Duration> {
		self.last_travel_time()
			.and_then(|travel_times| travel_times.shortest_eta())
	}
}

impl PartialEq for Place {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for Place {}

impl Hash for Place {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Debug for Place {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Place")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("coordinates", &self.coordinates)
			.field("categories", &self.categories)
			.field("rating", &self.yelp_provider.rating)
			.field("hours", &self.hours)
			.field("events", &self.events)
			.field("last_travel_time", &self.last_travel_time())
			.finish_non_exhaustive()
	}
}
