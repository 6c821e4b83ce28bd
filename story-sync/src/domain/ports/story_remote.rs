//! Driven port for the remote story service.
//!
//! The sync core only needs two calls: submit one story and list confirmed
//! stories. Adapters translate transport failures into [`StoryRemoteError`]
//! so the domain can decide between staging and surfacing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;
use crate::domain::{AuthToken, GeoPoint, StoryDraft};

define_port_error! {
    /// Errors raised by remote story adapters.
    pub enum StoryRemoteError {
        /// The service could not be reached (offline, DNS, timeout, reset).
        Network { message: String } => "story service unreachable: {message}",
        /// The service answered with a non-success status.
        Rejected { status: u16, message: String } =>
            "story service rejected the request ({status}): {message}",
        /// The response body could not be understood.
        Decode { message: String } => "story service response invalid: {message}",
    }
}

/// Acknowledgement returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Human-readable message from the service.
    pub message: String,
}

/// A story as listed by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStory {
    /// Server-assigned identifier.
    pub id: String,
    /// Author display name.
    pub name: Option<String>,
    /// Story text.
    pub description: String,
    /// Photo location.
    pub photo_url: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optional geotag.
    pub location: Option<GeoPoint>,
}

/// Port for the remote story API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoryRemote: Send + Sync {
    /// Submit one story.
    async fn submit_story(
        &self,
        token: &AuthToken,
        draft: &StoryDraft,
    ) -> Result<SubmitReceipt, StoryRemoteError>;

    /// List confirmed stories, optionally restricted to geotagged ones.
    async fn fetch_stories(
        &self,
        token: &AuthToken,
        with_location: bool,
    ) -> Result<Vec<RemoteStory>, StoryRemoteError>;
}

/// Remote that accepts every submission and lists nothing.
///
/// Used when no API base URL is configured so the local paths stay usable.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureStoryRemote;

#[async_trait]
impl StoryRemote for FixtureStoryRemote {
    async fn submit_story(
        &self,
        _token: &AuthToken,
        _draft: &StoryDraft,
    ) -> Result<SubmitReceipt, StoryRemoteError> {
        Ok(SubmitReceipt {
            message: "Story created successfully".to_owned(),
        })
    }

    async fn fetch_stories(
        &self,
        _token: &AuthToken,
        _with_location: bool,
    ) -> Result<Vec<RemoteStory>, StoryRemoteError> {
        Ok(Vec::new())
    }
}
