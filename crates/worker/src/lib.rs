//! Owning-context marshaling and retry primitives.
//!
//! * [`ThreadMarshal`] and [`run_on_owner`] serialize work onto one owning
//!   execution context, inline when the caller is already there.
//! * [`retry`] drives a fallible async operation under a [`RetryPolicy`],
//!   preempted by a [`CancellationToken`](tokio_util::sync::CancellationToken).

mod owner;
mod retry;

pub use owner::{InlineMarshal, Job, MarshalError, OwnerThread, ThreadMarshal, run_on_owner};
pub use retry::{RetryAttempt, RetryOutcome, RetryPolicy, retry};

/// Extracts a readable message from a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		return (*s).to_string();
	}
	if let Some(s) = payload.downcast_ref::<String>() {
		return s.clone();
	}
	"non-string panic payload".to_string()
}
