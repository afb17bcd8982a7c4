pub mod aggregator;
pub mod cache;
pub mod presence;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::StatusAggregator;
pub use cache::SingleFlightCache;
pub use presence::ViewerPresenceTracker;
pub use types::{PtzCapabilities, StatusSnapshot};
