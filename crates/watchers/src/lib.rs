//!
//! # Watchers
//!
//! Long-lived observers (location followers, remote change listeners and the like) are spawned
//! through a [`Watchers`] collection instead of being accumulated in some process-wide list.
//! Every spawn hands back a [`WatchHandle`], and the collection can stop everything at once when
//! the application crosses a lifecycle boundary, like going to background.
//!
//! ```
//! use roam_watchers::Watchers;
//!
//! #[tokio::main]
//! async fn main() {
//!     let watchers = Watchers::default();
//!
//!     let handle = watchers.spawn("idle", |stop| async move {
//!         (&stop).await;
//!     });
//!
//!     assert!(handle.stop().await);
//!     assert!(watchers.is_empty());
//! }
//! ```

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

use std::{
	collections::HashMap,
	fmt,
	future::{Future, IntoFuture},
	panic::AssertUnwindSafe,
	pin::Pin,
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Arc,
	},
	task::{Context, Poll},
	time::Duration,
};

use async_channel as chan;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::{spawn, task::JoinHandle, time::timeout};
use tracing::{debug, error, instrument, warn};

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(u64);

impl fmt::Display for WatcherId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "watcher#{}", self.0)
	}
}

struct WatcherHandler {
	name: &'static str,
	maybe_handle: Option<JoinHandle<()>>,
	is_running: Arc<AtomicBool>,
	stop_tx: chan::Sender<()>,
}

struct Inner {
	watchers_map: Mutex<HashMap<WatcherId, WatcherHandler>>,
	next_id: AtomicU64,
	grace_period: Duration,
}

/// Holds every running watcher, so they can be stopped individually or all at once.
///
/// Cloning is cheap and every clone refers to the same set of watchers.
#[derive(Clone)]
pub struct Watchers {
	inner: Arc<Inner>,
}

impl Watchers {
	/// `grace_period` is how long a stopped watcher gets to wind down before being aborted.
	#[must_use]
	pub fn with_grace_period(grace_period: Duration) -> Self {
		Self {
			inner: Arc::new(Inner {
				watchers_map: Mutex::default(),
				next_id: AtomicU64::new(0),
				grace_period,
			}),
		}
	}

	/// Spawns `run` on the tokio runtime, handing it a [`Stopper`] that resolves once the
	/// watcher is asked to stop.
	///
	/// # Panics
	///
	/// Must be called from within a tokio runtime.
	pub fn spawn<F, Fut>(&self, name: &'static str, run: F) -> WatchHandle
	where
		F: FnOnce(Stopper) -> Fut,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let id = WatcherId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
		let (stop_tx, stop_rx) = chan::bounded(1);
		let is_running = Arc::new(AtomicBool::new(true));

		let fut = run(Stopper(stop_rx));

		let handle = spawn({
			let is_running = Arc::clone(&is_running);
			async move {
				if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
					error!(%id, watcher = name, "Watcher unexpectedly panicked");
				}

				is_running.store(false, Ordering::Release);
			}
		});

		let mut watchers_map = self.inner.watchers_map.lock();
		watchers_map.retain(|_, watcher| watcher.is_running.load(Ordering::Acquire));
		watchers_map.insert(
			id,
			WatcherHandler {
				name,
				maybe_handle: Some(handle),
				is_running,
				stop_tx,
			},
		);

		debug!(%id, watcher = name, "Watcher spawned");

		WatchHandle {
			id,
			watchers: self.clone(),
		}
	}

	/// Stops a single watcher. Returns `false` if no watcher with this id is known.
	#[instrument(skip(self))]
	pub async fn stop(&self, id: WatcherId) -> bool {
		let Some(mut watcher) = self.inner.watchers_map.lock().remove(&id) else {
			return false;
		};

		stop_watcher(id, &mut watcher, self.inner.grace_period).await;

		true
	}

	/// Stops every watcher in the collection, waiting for all of them to wind down.
	#[instrument(skip(self))]
	pub async fn stop_all(&self) {
		let drained = self
			.inner
			.watchers_map
			.lock()
			.drain()
			.collect::<Vec<_>>();

		for (id, mut watcher) in drained {
			stop_watcher(id, &mut watcher, self.inner.grace_period).await;
		}
	}

	#[must_use]
	pub fn is_running(&self, id: WatcherId) -> bool {
		self.inner
			.watchers_map
			.lock()
			.get(&id)
			.is_some_and(|watcher| watcher.is_running.load(Ordering::Acquire))
	}

	/// Names and running status of every watcher that was not stopped yet.
	#[must_use]
	pub fn get_state(&self) -> Vec<(WatcherId, &'static str, bool)> {
		let mut state = self
			.inner
			.watchers_map
			.lock()
			.iter()
			.map(|(id, watcher)| {
				(
					*id,
					watcher.name,
					watcher.is_running.load(Ordering::Relaxed),
				)
			})
			.collect::<Vec<_>>();

		state.sort_by_key(|(id, _, _)| *id);

		state
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.inner.watchers_map.lock().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Default for Watchers {
	fn default() -> Self {
		Self::with_grace_period(DEFAULT_GRACE_PERIOD)
	}
}

impl fmt::Debug for Watchers {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Watchers")
			.field("watchers", &self.get_state())
			.field("grace_period", &self.inner.grace_period)
			.finish()
	}
}

/// Explicit handle to a spawned watcher. Dropping it does not stop the watcher.
#[must_use = "dropping a WatchHandle leaves the watcher running until `Watchers::stop_all`"]
#[derive(Clone)]
pub struct WatchHandle {
	id: WatcherId,
	watchers: Watchers,
}

impl WatchHandle {
	#[must_use]
	pub const fn id(&self) -> WatcherId {
		self.id
	}

	#[must_use]
	pub fn is_running(&self) -> bool {
		self.watchers.is_running(self.id)
	}

	/// Returns `false` if the watcher was already stopped through its collection.
	pub async fn stop(self) -> bool {
		self.watchers.stop(self.id).await
	}
}

impl fmt::Debug for WatchHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WatchHandle").field("id", &self.id).finish()
	}
}

/// Stop signal handed to a running watcher.
#[derive(Debug)]
pub struct Stopper(chan::Receiver<()>);

impl Stopper {
	#[must_use]
	pub fn check_stop(&self) -> bool {
		self.0.try_recv().is_ok() || self.0.is_closed()
	}
}

pin_project_lite::pin_project! {
	pub struct StopWatcherFuture<'recv> {
		#[pin]
		fut: chan::Recv<'recv, ()>,
	}
}

impl Future for StopWatcherFuture<'_> {
	type Output = ();

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.project();

		match this.fut.poll(cx) {
			Poll::Ready(res) => {
				if res.is_err() {
					warn!("Stop channel closed, will stop watcher");
				}
				Poll::Ready(())
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

impl<'recv> IntoFuture for &'recv Stopper {
	type Output = ();
	type IntoFuture = StopWatcherFuture<'recv>;

	fn into_future(self) -> Self::IntoFuture {
		Self::IntoFuture { fut: self.0.recv() }
	}
}

async fn stop_watcher(id: WatcherId, watcher: &mut WatcherHandler, grace_period: Duration) {
	if !watcher.is_running.load(Ordering::Acquire) {
		debug!(%id, watcher = watcher.name, "Watcher already finished");
	} else if watcher.stop_tx.send(()).await.is_err() {
		error!(%id, watcher = watcher.name, "Failed to send stop signal to watcher, will abort it if needed");
	}

	wait_stop_or_abort(watcher.maybe_handle.take(), grace_period).await;
}

async fn wait_stop_or_abort(maybe_handle: Option<JoinHandle<()>>, grace_period: Duration) {
	if let Some(handle) = maybe_handle {
		let abort_handle = handle.abort_handle();

		match timeout(grace_period, handle).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => {
				// Panics are caught inside the spawned task, so this is a cancellation.
				error!(?e, "Watcher task failed to join");
			}
			Err(_) => {
				error!("Watcher failed to gracefully stop in the allotted time, will force abortion");
				abort_handle.abort();
			}
		}
	}
}
