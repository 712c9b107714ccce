use crate::{
	place::{Place, PlaceId},
	ranking::{filter, sort_by_top_rated, CategoryTaxonomy, FilterTag},
};

use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use parking_lot::RwLock;

/// Displayed places together with their position index, always built together.
#[derive(Debug, Default)]
pub(crate) struct DisplayedSet {
	places: Vec<Arc<Place>>,
	index: HashMap<PlaceId, usize>,
}

impl DisplayedSet {
	fn new(places: Vec<Arc<Place>>) -> Self {
		let index = places
			.iter()
			.enumerate()
			.map(|(idx, place)| (place.id().clone(), idx))
			.collect();

		Self { places, index }
	}

	pub fn places(&self) -> &[Arc<Place>] {
		&self.places
	}

	pub fn get(&self, idx: usize) -> Option<&Arc<Place>> {
		self.places.get(idx)
	}

	pub fn index_of(&self, id: &PlaceId) -> Option<usize> {
		self.index.get(id).copied()
	}

	pub fn len(&self) -> usize {
		self.places.len()
	}
}

/// Everything the registry guards with its single lock.
///
/// The only ways to change the place lists go through [`RegistryState::replace_all`] and
/// [`RegistryState::set_view`], both of which re-derive the displayed set, so readers can never
/// see all places, displayed places and their index out of step.
#[derive(Debug)]
pub(crate) struct RegistryState {
	all_places: Vec<Arc<Place>>,
	displayed: DisplayedSet,
	enabled_filters: HashSet<FilterTag>,
	top_rated_only: bool,
	generation: u64,
}

impl RegistryState {
	pub fn new(enabled_filters: HashSet<FilterTag>) -> Self {
		Self {
			all_places: Vec::new(),
			displayed: DisplayedSet::default(),
			enabled_filters,
			top_rated_only: false,
			generation: 0,
		}
	}

	pub fn all_places(&self) -> &[Arc<Place>] {
		&self.all_places
	}

	pub const fn displayed(&self) -> &DisplayedSet {
		&self.displayed
	}

	pub const fn enabled_filters(&self) -> &HashSet<FilterTag> {
		&self.enabled_filters
	}

	pub const fn top_rated_only(&self) -> bool {
		self.top_rated_only
	}

	/// Bumped on every write of the full place list.
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	pub fn replace_all(&mut self, all_places: Vec<Arc<Place>>, taxonomy: &dyn CategoryTaxonomy) {
		self.all_places = all_places;
		self.generation += 1;
		self.rederive(taxonomy);
	}

	pub fn set_view(
		&mut self,
		enabled_filters: HashSet<FilterTag>,
		top_rated_only: bool,
		taxonomy: &dyn CategoryTaxonomy,
	) {
		self.enabled_filters = enabled_filters;
		self.top_rated_only = top_rated_only;
		self.rederive(taxonomy);
	}

	fn rederive(&mut self, taxonomy: &dyn CategoryTaxonomy) {
		let filtered = filter(&self.all_places, &self.enabled_filters, taxonomy);

		self.displayed = DisplayedSet::new(if self.top_rated_only {
			sort_by_top_rated(&filtered)
		} else {
			filtered
		});
	}
}

/// The registry state behind a read/write lock, only reachable through lock-scoped closures.
#[derive(Debug)]
pub(crate) struct GuardedState(RwLock<RegistryState>);

impl GuardedState {
	pub fn new(state: RegistryState) -> Self {
		Self(RwLock::new(state))
	}

	pub fn read<R>(&self, f: impl FnOnce(&RegistryState) -> R) -> R {
		f(&self.0.read())
	}

	pub fn write<R>(&self, f: impl FnOnce(&mut RegistryState) -> R) -> R {
		f(&mut self.0.write())
	}
}
