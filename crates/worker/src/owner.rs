//! Single-owner execution.
//!
//! Shared state with a single writer routes every mutation through a
//! [`ThreadMarshal`]. Callers never need to know which thread they are on:
//! [`run_on_owner`] executes inline when already on the owning context and
//! otherwise queues the action and awaits its completion.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::panic_message;

/// Unit of work executed on the owning context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Failure to run an action on the owning context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
	/// The owning context no longer accepts work.
	#[error("owning context is closed")]
	Closed,
	/// The action panicked while executing on the owning context.
	#[error("owner action panicked: {0}")]
	Panicked(String),
}

/// Runs work on one logical owning context.
pub trait ThreadMarshal: Send + Sync {
	/// Returns true when the caller is executing on the owning context.
	fn is_owner(&self) -> bool;

	/// Queues a job for execution on the owning context.
	fn dispatch(&self, job: Job) -> Result<(), MarshalError>;
}

/// Runs `action` on the owning context and returns its result.
///
/// Executes synchronously when the caller is already the owner. Otherwise the
/// action is queued and this future resolves once it has run. A panic inside
/// the action is caught where it runs and reported as
/// [`MarshalError::Panicked`] on both paths.
pub async fn run_on_owner<M, F, T>(marshal: &M, action: F) -> Result<T, MarshalError>
where
	M: ThreadMarshal + ?Sized,
	F: FnOnce() -> T + Send + 'static,
	T: Send + 'static,
{
	if marshal.is_owner() {
		return guarded(action);
	}

	let (tx, rx) = oneshot::channel();
	marshal.dispatch(Box::new(move || {
		let _ = tx.send(guarded(action));
	}))?;
	// A dropped sender means the job was discarded without running.
	rx.await.map_err(|_| MarshalError::Closed)?
}

fn guarded<F, T>(action: F) -> Result<T, MarshalError>
where
	F: FnOnce() -> T,
{
	catch_unwind(AssertUnwindSafe(action)).map_err(|payload| MarshalError::Panicked(panic_message(payload.as_ref())))
}

/// Marshal for a context that is always the owner.
///
/// Fits single-threaded event loops and tests: every job runs immediately on
/// the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineMarshal;

impl ThreadMarshal for InlineMarshal {
	fn is_owner(&self) -> bool {
		true
	}

	fn dispatch(&self, job: Job) -> Result<(), MarshalError> {
		job();
		Ok(())
	}
}

/// Dedicated OS thread that owns shared state and drains jobs in FIFO order.
pub struct OwnerThread {
	name: String,
	thread_id: ThreadId,
	tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
	join: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for OwnerThread {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OwnerThread")
			.field("name", &self.name)
			.field("thread_id", &self.thread_id)
			.field("open", &self.is_open())
			.finish()
	}
}

impl OwnerThread {
	/// Spawns the owning thread.
	pub fn spawn(name: impl Into<String>) -> std::io::Result<Self> {
		let name = name.into();
		let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
		let thread_name = name.clone();
		let join = std::thread::Builder::new().name(name.clone()).spawn(move || {
			tracing::debug!(owner = %thread_name, "worker.owner.start");
			let mut executed = 0u64;
			while let Some(job) = rx.blocking_recv() {
				// Jobs from `run_on_owner` are already guarded; raw dispatches are not.
				if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
					tracing::error!(owner = %thread_name, panic = %panic_message(payload.as_ref()), "worker.owner.job_panicked");
				}
				executed = executed.wrapping_add(1);
			}
			tracing::debug!(owner = %thread_name, executed, "worker.owner.stop");
		})?;

		Ok(Self {
			name,
			thread_id: join.thread().id(),
			tx: Mutex::new(Some(tx)),
			join: Mutex::new(Some(join)),
		})
	}

	/// Returns whether the owner still accepts jobs.
	pub fn is_open(&self) -> bool {
		self.tx.lock().as_ref().is_some_and(|tx| !tx.is_closed())
	}

	/// Stops accepting jobs, drains the queue and joins the thread.
	///
	/// Blocks the caller until queued jobs have run. Called from the owner
	/// itself, the queue is closed without joining.
	pub fn shutdown(&self) {
		drop(self.tx.lock().take());
		if self.is_owner() {
			return;
		}
		let Some(join) = self.join.lock().take() else {
			return;
		};
		if join.join().is_err() {
			tracing::error!(owner = %self.name, "worker.owner.join_failed");
		}
	}
}

impl ThreadMarshal for OwnerThread {
	fn is_owner(&self) -> bool {
		std::thread::current().id() == self.thread_id
	}

	fn dispatch(&self, job: Job) -> Result<(), MarshalError> {
		let guard = self.tx.lock();
		let Some(tx) = guard.as_ref() else {
			return Err(MarshalError::Closed);
		};
		tracing::trace!(owner = %self.name, "worker.owner.dispatch");
		tx.send(job).map_err(|_| MarshalError::Closed)
	}
}
