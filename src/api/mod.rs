//! API layer
//!
//! HTTP handlers for:
//! - Profile gifts (`/profile-gifts`)
//! - Metrics (Prometheus)

mod dto;
pub mod metrics;
mod profile_gifts;

pub use dto::*;

pub use metrics::metrics_router;
pub use profile_gifts::profile_gifts_router;
