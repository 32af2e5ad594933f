use std::fmt::Debug;

/// Identity-bearing value held by the shared collection.
///
/// The store never interprets record fields; it compares records by key only.
pub trait Record: Clone + Debug + Send + Sync + 'static {
	type Key: Eq + Clone + Debug + Send + Sync + 'static;

	fn key(&self) -> Self::Key;
}
