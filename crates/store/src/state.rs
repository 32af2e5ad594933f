use std::fmt;

/// Lifecycle phase of the shared collection.
///
/// The machine has no terminal state: `Loaded` and `Failed` both re-enter
/// `Loading` on reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
	/// Nothing has been fetched yet.
	#[default]
	Uninitialized,
	/// A load is in progress.
	Loading,
	/// Contents reflect the last successful fetch plus accepted mutations.
	Loaded,
	/// The last load exhausted its retries.
	Failed,
}

impl LoadState {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Uninitialized => "uninitialized",
			Self::Loading => "loading",
			Self::Loaded => "loaded",
			Self::Failed => "failed",
		}
	}

	/// Returns true once a load has reached an outcome or none is running.
	pub const fn is_settled(self) -> bool {
		!matches!(self, Self::Loading)
	}
}

impl fmt::Display for LoadState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
