//! HTTP outbound adapters for the remote story service.
//!
//! `StoryHttpClient` implements the `StoryRemote` port. `ReachabilityProbe`
//! polls the same base URL and feeds a `ConnectivityMonitor`.

mod dto;
mod reachability;
mod story_http_client;

pub use reachability::{ReachabilityHandle, ReachabilityProbe};
pub use story_http_client::{StoryHttpClient, StoryHttpClientError};
