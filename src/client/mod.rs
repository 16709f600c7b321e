//! Client side
//!
//! A viewer-facing session over the gifts API: loads the active account,
//! keeps its latest response and re-polls while the service is refreshing.

mod http;
mod poll;
mod session;

use thiserror::Error;

pub use http::HttpGiftsSource;
pub use poll::PollScheduler;
pub use session::{GiftsSession, GiftsSource, LoadMode};

/// Client-side failure
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or undecodable body
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with `success: false`
    #[error("{0}")]
    Api(String),

    #[error("Invalid service URL: {0}")]
    Url(#[from] url::ParseError),
}
