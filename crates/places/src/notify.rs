use crate::place::Place;

use std::{
	panic::{catch_unwind, AssertUnwindSafe},
	sync::Arc,
};

use async_channel as chan;
use tokio::spawn;
use tracing::{error, trace, warn};

/// Output boundary of the registry.
///
/// Always called from the registry's notification task, one update at a time and in commit
/// order, so implementations need no synchronization of their own for display updates.
pub trait PlacesDelegate: Send + Sync + 'static {
	fn on_displayed_places_changed(&self, places: Vec<Arc<Place>>);
}

/// Single designated context delivering displayed place updates to the delegate.
pub(crate) struct Notifier {
	updates_tx: chan::Sender<Vec<Arc<Place>>>,
}

impl Notifier {
	/// Must be called from within a tokio runtime.
	pub fn spawn(delegate: Arc<dyn PlacesDelegate>) -> Self {
		let (updates_tx, updates_rx) = chan::unbounded::<Vec<Arc<Place>>>();

		spawn(async move {
			while let Ok(places) = updates_rx.recv().await {
				trace!(places_count = places.len(), "Notifying delegate");

				if catch_unwind(AssertUnwindSafe(|| {
					delegate.on_displayed_places_changed(places);
				}))
				.is_err()
				{
					error!("Places delegate panicked while handling an update");
				}
			}

			trace!("Notification context finished");
		});

		Self { updates_tx }
	}

	/// Never blocks, so it can be called while holding the registry lock.
	pub fn notify(&self, places: Vec<Arc<Place>>) {
		if self.updates_tx.try_send(places).is_err() {
			warn!("Notification context is gone, dropping displayed places update");
		}
	}
}
