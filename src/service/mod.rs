//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the cache, the external fetcher and background
//! refreshes.

mod gifts;
mod refresh;

pub use gifts::{GiftService, ProfileGifts};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
