use crate::coordinates::Coordinates;

use serde::Deserialize;
use thiserror::Error;

use super::{HoursError, OpenHours, Place, RawHours, ReviewProvider};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaceValidationError {
	#[error("malformed record: {0}")]
	Malformed(String),
	#[error("missing required field <field='{0}'>")]
	MissingField(&'static str),
	#[error("coordinates out of range <coordinates='{0}'>")]
	InvalidCoordinates(Coordinates),
	#[error("invalid {0} review provider")]
	InvalidReviewProvider(&'static str),
	#[error(transparent)]
	InvalidHours(#[from] HoursError),
}

/// A record that could not become a [`Place`], dropped by whoever fetched it.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid place record <id='{}'>: {reason}", .id.as_deref().unwrap_or("<unknown>"))]
pub struct InvalidPlace {
	pub id: Option<String>,
	#[source]
	pub reason: PlaceValidationError,
}

/// Place record exactly as a place source delivers it, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlace {
	pub id: Option<String>,
	pub name: Option<String>,
	#[serde(alias = "location")]
	pub coordinates: Option<Coordinates>,
	pub categories: Option<Vec<String>>,
	pub url: Option<String>,
	pub address: Option<String>,
	#[serde(alias = "photoURLs", alias = "photos")]
	pub photo_urls: Option<Vec<String>>,
	#[serde(alias = "yelp", alias = "yelpProvider")]
	pub yelp_provider: Option<ReviewProvider>,
	#[serde(alias = "tripadvisor", alias = "tripAdvisorProvider")]
	pub trip_advisor_provider: Option<ReviewProvider>,
	pub hours: Option<RawHours>,
	#[serde(alias = "wikiDescription")]
	pub wiki_description: Option<String>,
	#[serde(alias = "yelpDescription")]
	pub yelp_description: Option<String>,
	pub events: Option<Vec<String>>,
}

impl RawPlace {
	/// Decodes and validates a single JSON record.
	pub fn decode(value: serde_json::Value) -> Result<Place, InvalidPlace> {
		let id = value
			.get("id")
			.and_then(serde_json::Value::as_str)
			.map(ToString::to_string);

		serde_json::from_value::<Self>(value)
			.map_err(|e| InvalidPlace {
				id,
				reason: PlaceValidationError::Malformed(e.to_string()),
			})
			.and_then(Place::try_from)
	}

	fn validate(self) -> Result<Place, PlaceValidationError> {
		let Self {
			id,
			name,
			coordinates,
			categories,
			url,
			address,
			photo_urls,
			yelp_provider,
			trip_advisor_provider,
			hours,
			wiki_description,
			yelp_description,
			events,
		} = self;

		let id = id
			.filter(|id| !id.is_empty())
			.ok_or(PlaceValidationError::MissingField("id"))?;
		let name = name.ok_or(PlaceValidationError::MissingField("name"))?;

		let coordinates = coordinates.ok_or(PlaceValidationError::MissingField("coordinates"))?;
		if !coordinates.is_valid() {
			return Err(PlaceValidationError::InvalidCoordinates(coordinates));
		}

		let yelp_provider =
			yelp_provider.ok_or(PlaceValidationError::MissingField("yelp_provider"))?;
		if !yelp_provider.is_valid() {
			return Err(PlaceValidationError::InvalidReviewProvider("yelp"));
		}

		let photo_urls = photo_urls.ok_or(PlaceValidationError::MissingField("photo_urls"))?;

		let hours = hours.as_ref().map(OpenHours::from_raw).transpose()?;

		Ok(Place {
			categories,
			url,
			address,
			photo_urls,
			// optional provider, an unusable one is the same as not having it
			trip_advisor_provider: trip_advisor_provider.filter(ReviewProvider::is_valid),
			hours,
			wiki_description,
			yelp_description,
			events: events.unwrap_or_default(),
			..Place::new(id, name, coordinates, yelp_provider)
		})
	}
}

impl TryFrom<RawPlace> for Place {
	type Error = InvalidPlace;

	fn try_from(raw: RawPlace) -> Result<Self, Self::Error> {
		let id = raw.id.clone();
		raw.validate().map_err(|reason| InvalidPlace { id, reason })
	}
}
