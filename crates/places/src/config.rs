use crate::ranking::FilterTag;

use std::{
	collections::HashSet,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

/// How many places get a travel time lookup on each staged sort.
pub const TRAVEL_TIME_LOOKUP_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file: {source}; path: '{}'", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse config: {0}")]
	Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
	/// Radius handed to the place source when fetching around a location.
	pub search_radius_km: f64,
	/// Size of the distance-sorted prefix that gets travel time lookups.
	pub travel_time_lookup_limit: usize,
	/// Upper bound on displayed places whose travel times are requested ahead of the staged sort.
	pub warm_up_limit: usize,
	pub default_filters: HashSet<FilterTag>,
	pub display: DisplayThresholds,
	pub travel_time_cache: CacheConfig,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			search_radius_km: 5.0,
			travel_time_lookup_limit: TRAVEL_TIME_LOOKUP_LIMIT,
			warm_up_limit: 25,
			default_filters: HashSet::from([FilterTag::discover()]),
			display: DisplayThresholds::default(),
			travel_time_cache: CacheConfig::default(),
		}
	}
}

impl RegistryConfig {
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		serde_json::from_str(json).map_err(Into::into)
	}

	pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();

		let contents = fs::read_to_string(path)
			.await
			.map_err(|source| ConfigError::Io {
				path: path.to_path_buf(),
				source,
			})?;

		Self::from_json(&contents)
	}
}

/// Minimum review numbers for a place to be worth showing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayThresholds {
	pub min_rating: f64,
	pub min_review_count: u32,
}

impl Default for DisplayThresholds {
	fn default() -> Self {
		Self {
			min_rating: 2.5,
			min_review_count: 4,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
	pub capacity: usize,
	/// `None` keeps settled results until evicted.
	pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			capacity: 512,
			ttl_secs: Some(15 * 60),
		}
	}
}
