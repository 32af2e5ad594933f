//! Process-wide record collection with a load-state gate.
//!
//! Readers take lock-free snapshots of the contents. The load state and the
//! readiness waiters share one mutex, so checking the state and registering a
//! waiter is atomic with respect to transitions and no wakeup is missed.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StoreError};
use crate::record::Record;
use crate::state::LoadState;

const EVENT_CAPACITY: usize = 256;

/// Change notification for collection observers.
///
/// Delivery is best-effort: a lagging receiver skips events instead of
/// blocking writers.
#[derive(Debug, Clone)]
pub enum CollectionEvent<R: Record> {
	StateChanged(LoadState),
	/// Contents were swapped wholesale; carries the new length.
	Reset(usize),
	Added(R),
	Replaced(R),
	Removed(R::Key),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitFor {
	Loaded,
	Settled,
}

impl WaitFor {
	fn satisfied_by(self, state: LoadState) -> bool {
		match self {
			Self::Loaded => state == LoadState::Loaded,
			Self::Settled => state.is_settled(),
		}
	}
}

struct Waiter {
	id: u64,
	until: WaitFor,
	tx: oneshot::Sender<LoadState>,
}

struct Gate {
	state: LoadState,
	next_waiter: u64,
	waiters: Vec<Waiter>,
}

impl Gate {
	/// Fires every waiter satisfied by `state` and keeps the rest registered.
	fn release(&mut self, state: LoadState) {
		if self.waiters.is_empty() {
			return;
		}
		let pending = std::mem::take(&mut self.waiters);
		for waiter in pending {
			if waiter.until.satisfied_by(state) {
				let _ = waiter.tx.send(state);
			} else {
				self.waiters.push(waiter);
			}
		}
	}
}

/// Deregisters a waiter when its future completes, is cancelled or dropped.
struct WaiterGuard<'a> {
	gate: &'a Mutex<Gate>,
	id: u64,
}

impl Drop for WaiterGuard<'_> {
	fn drop(&mut self) {
		self.gate.lock().waiters.retain(|w| w.id != self.id);
	}
}

/// Shared, observable sequence of records plus its [`LoadState`].
///
/// Contents are meant to be mutated from one owning context only (see
/// [`aviary_worker::ThreadMarshal`]); state transitions and waiters may be
/// touched from any thread.
pub struct SharedCollection<R: Record> {
	items: ArcSwap<Vec<R>>,
	gate: Mutex<Gate>,
	events: broadcast::Sender<CollectionEvent<R>>,
}

impl<R: Record> Default for SharedCollection<R> {
	fn default() -> Self {
		Self::new()
	}
}

impl<R: Record> std::fmt::Debug for SharedCollection<R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let gate = self.gate.lock();
		f.debug_struct("SharedCollection")
			.field("state", &gate.state)
			.field("waiters", &gate.waiters.len())
			.field("len", &self.items.load().len())
			.finish()
	}
}

impl<R: Record> SharedCollection<R> {
	/// Creates an empty, `Uninitialized` collection.
	pub fn new() -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			items: ArcSwap::from_pointee(Vec::new()),
			gate: Mutex::new(Gate {
				state: LoadState::Uninitialized,
				next_waiter: 0,
				waiters: Vec::new(),
			}),
			events,
		}
	}

	pub fn state(&self) -> LoadState {
		self.gate.lock().state
	}

	/// Transitions to `next`.
	///
	/// Entering `Loaded` releases every registered waiter. Entering `Failed`
	/// releases waiters that only wait for the load to settle.
	pub fn set_state(&self, next: LoadState) {
		let mut gate = self.gate.lock();
		let previous = std::mem::replace(&mut gate.state, next);
		gate.release(next);
		self.note_transition(previous, next);
	}

	/// Enters `Loading` if no load is running and none has succeeded.
	///
	/// Moves `Uninitialized` or `Failed` to `Loading` in one step and returns
	/// true; returns false and changes nothing from `Loading` or `Loaded`. Of
	/// several concurrent callers exactly one wins.
	pub fn begin_load(&self) -> bool {
		let mut gate = self.gate.lock();
		let previous = gate.state;
		if !matches!(previous, LoadState::Uninitialized | LoadState::Failed) {
			return false;
		}
		gate.state = LoadState::Loading;
		gate.release(LoadState::Loading);
		self.note_transition(previous, LoadState::Loading);
		true
	}

	/// Swaps the full contents without touching the state.
	pub fn replace(&self, items: impl Into<Arc<Vec<R>>>) {
		let items = items.into();
		let len = items.len();
		self.items.store(items);
		self.emit(CollectionEvent::Reset(len));
	}

	/// Swaps the full contents and enters `Loaded` under the state lock.
	///
	/// Any reader that observes `Loaded` afterwards also observes the new
	/// contents.
	pub fn complete_load(&self, items: impl Into<Arc<Vec<R>>>) {
		let items = items.into();
		let len = items.len();
		let mut gate = self.gate.lock();
		self.items.store(items);
		let previous = std::mem::replace(&mut gate.state, LoadState::Loaded);
		gate.release(LoadState::Loaded);
		self.emit(CollectionEvent::Reset(len));
		self.note_transition(previous, LoadState::Loaded);
	}

	/// Appends a record.
	pub fn add(&self, record: R) {
		self.items.rcu(|current| {
			let mut next = Vec::clone(current);
			next.push(record.clone());
			next
		});
		self.emit(CollectionEvent::Added(record));
	}

	/// Overwrites the first record matching `matches`, or appends when none
	/// does. Returns true when a record was replaced.
	pub fn replace_or_add(&self, matches: impl Fn(&R) -> bool, record: R) -> bool {
		let mut replaced = false;
		self.items.rcu(|current| {
			let mut next = Vec::clone(current);
			match next.iter().position(&matches) {
				Some(index) => {
					next[index] = record.clone();
					replaced = true;
				}
				None => {
					next.push(record.clone());
					replaced = false;
				}
			}
			next
		});
		self.emit(if replaced {
			CollectionEvent::Replaced(record)
		} else {
			CollectionEvent::Added(record)
		});
		replaced
	}

	/// [`Self::replace_or_add`] keyed by record identity.
	pub fn upsert(&self, record: R) -> bool {
		let key = record.key();
		self.replace_or_add(|r| r.key() == key, record)
	}

	/// Removes the first record matching `matches`.
	pub fn remove(&self, matches: impl Fn(&R) -> bool) -> Option<R> {
		let mut removed = None;
		self.items.rcu(|current| {
			let mut next = Vec::clone(current);
			let position = next.iter().position(&matches);
			removed = position.map(|index| next.remove(index));
			next
		});
		if let Some(record) = &removed {
			self.emit(CollectionEvent::Removed(record.key()));
		}
		removed
	}

	/// Removes the record with `key`.
	pub fn remove_key(&self, key: &R::Key) -> Option<R> {
		self.remove(|r| r.key() == *key)
	}

	/// Point-in-time view of the contents.
	pub fn snapshot(&self) -> Arc<Vec<R>> {
		self.items.load_full()
	}

	pub fn len(&self) -> usize {
		self.items.load().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.load().is_empty()
	}

	/// Returns a clone of the first record matching `pred`.
	pub fn find(&self, pred: impl Fn(&R) -> bool) -> Option<R> {
		self.items.load().iter().find(|r| pred(r)).cloned()
	}

	/// Returns a clone of the record with `key`.
	pub fn get(&self, key: &R::Key) -> Option<R> {
		self.find(|r| r.key() == *key)
	}

	/// Subscribes to change notifications.
	pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent<R>> {
		self.events.subscribe()
	}

	/// Number of registered readiness waiters.
	pub fn waiter_count(&self) -> usize {
		self.gate.lock().waiters.len()
	}

	/// Resolves once the collection is `Loaded`.
	///
	/// Returns immediately when already loaded; otherwise waits for the next
	/// entry into `Loaded`. Fails with [`StoreError::Cancelled`] if `cancel`
	/// fires first, deregistering the waiter.
	pub async fn wait_until_loaded(&self, cancel: &CancellationToken) -> Result<()> {
		self.wait(WaitFor::Loaded, cancel).await.map(|_| ())
	}

	/// Resolves once no load is running and returns the settled state.
	///
	/// While `Loading`, waits for the next entry into `Loaded` or `Failed`.
	pub async fn wait_until_settled(&self, cancel: &CancellationToken) -> Result<LoadState> {
		self.wait(WaitFor::Settled, cancel).await
	}

	async fn wait(&self, until: WaitFor, cancel: &CancellationToken) -> Result<LoadState> {
		let (rx, _guard) = {
			let mut gate = self.gate.lock();
			if until.satisfied_by(gate.state) {
				return Ok(gate.state);
			}
			let id = gate.next_waiter;
			gate.next_waiter = gate.next_waiter.wrapping_add(1);
			let (tx, rx) = oneshot::channel();
			gate.waiters.push(Waiter { id, until, tx });
			(rx, WaiterGuard { gate: &self.gate, id })
		};

		tokio::select! {
			biased;
			released = rx => released.map_err(|_| StoreError::Cancelled),
			_ = cancel.cancelled() => {
				tracing::debug!(until = ?until, "store.collection.wait_cancelled");
				Err(StoreError::Cancelled)
			}
		}
	}

	/// Logs and publishes a transition. Callers hold the gate lock so
	/// observers receive transitions in the order they happened.
	fn note_transition(&self, previous: LoadState, next: LoadState) {
		if previous == next {
			return;
		}
		tracing::debug!(from = previous.as_str(), to = next.as_str(), "store.collection.state");
		self.emit(CollectionEvent::StateChanged(next));
	}

	fn emit(&self, event: CollectionEvent<R>) {
		let _ = self.events.send(event);
	}
}
