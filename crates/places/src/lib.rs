//!
//! # Places
//!
//! Core of location based place discovery: validated place records, opening hours, travel time
//! lookups with their memoization, ranking and filtering, and the [`PlaceRegistry`] holding what
//! is currently shown to the user.
//!
//! The registry talks to the outside world through a few collaborators: a [`PlaceSource`]
//! delivering place records, a [`TravelTimeProvider`] estimating how long it takes to get
//! somewhere, a [`CategoryTaxonomy`] backing the category filters and a [`PlacesDelegate`]
//! receiving every new list of displayed places.

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod config;
pub mod coordinates;
pub mod error;
pub mod notify;
pub mod place;
pub mod ranking;
pub mod registry;
pub mod source;
pub mod travel_time;

#[cfg(test)]
mod test_utils;

pub use config::{CacheConfig, ConfigError, DisplayThresholds, RegistryConfig};
pub use coordinates::Coordinates;
pub use error::{Error, Result};
pub use notify::PlacesDelegate;
pub use place::{
	DayHours, HoursError, InvalidPlace, OpenHours, Place, PlaceId, PlaceValidationError, RawHours,
	RawPlace, ReviewProvider,
};
pub use ranking::{CategoryMap, CategoryTaxonomy, FilterTag, SortOrder};
pub use registry::PlaceRegistry;
pub use source::{MemorySource, PlaceSource, SourceError};
pub use travel_time::{TravelTimeCache, TravelTimeError, TravelTimeProvider, TravelTimes};

pub use roam_watchers::{WatchHandle, WatcherId};
