//! Reqwest-backed story service adapter.
//!
//! This adapter owns transport details only: multipart encoding, bearer
//! authentication, timeout and status mapping, and JSON decoding into
//! `RemoteStory` records.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use super::dto::{MessageDto, StoryListDto};
use crate::domain::ports::{RemoteStory, StoryRemote, StoryRemoteError, SubmitReceipt};
use crate::domain::{AuthToken, PhotoAttachment, StoryDraft};

const DEFAULT_SUBMIT_MESSAGE: &str = "Story created successfully";

/// Errors raised while building a [`StoryHttpClient`].
#[derive(Debug, thiserror::Error)]
pub enum StoryHttpClientError {
    /// The reqwest client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    /// The base URL cannot carry path segments.
    #[error("API base URL `{0}` cannot be used as a base")]
    InvalidBaseUrl(String),
}

/// Story service adapter for `{base}/stories`.
#[derive(Debug, Clone)]
pub struct StoryHttpClient {
    client: Client,
    stories_url: Url,
}

impl StoryHttpClient {
    /// Build an adapter with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed or the
    /// base URL cannot carry a path.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, StoryHttpClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            stories_url: stories_url(&base_url)?,
        })
    }

    /// Endpoint used for both submission and listing.
    pub fn stories_url(&self) -> &Url {
        &self.stories_url
    }
}

fn stories_url(base_url: &Url) -> Result<Url, StoryHttpClientError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| StoryHttpClientError::InvalidBaseUrl(base_url.to_string()))?
        .pop_if_empty()
        .push("stories");
    Ok(url)
}

fn photo_part(photo: &PhotoAttachment) -> Part {
    let build = || Part::bytes(photo.bytes.clone()).file_name(photo.file_name.clone());
    build().mime_str(&photo.media_type).unwrap_or_else(|error| {
        warn!(%error, media_type = %photo.media_type, "sending photo without media type");
        build()
    })
}

fn story_form(draft: &StoryDraft) -> Form {
    let mut form = Form::new().text("description", draft.description().to_owned());
    if let Some(photo) = draft.photo() {
        form = form.part("photo", photo_part(photo));
    }
    if let Some(location) = draft.location() {
        form = form
            .text("lat", location.latitude().to_string())
            .text("lon", location.longitude().to_string());
    }
    form
}

#[async_trait]
impl StoryRemote for StoryHttpClient {
    async fn submit_story(
        &self,
        token: &AuthToken,
        draft: &StoryDraft,
    ) -> Result<SubmitReceipt, StoryRemoteError> {
        let response = self
            .client
            .post(self.stories_url.clone())
            .bearer_auth(token.expose())
            .multipart(story_form(draft))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        let decoded: MessageDto = serde_json::from_slice(&body).map_err(|error| {
            StoryRemoteError::decode(format!("invalid submission response: {error}"))
        })?;
        if decoded.error {
            return Err(StoryRemoteError::rejected(
                status.as_u16(),
                decoded.message.unwrap_or_else(|| "submission refused".to_owned()),
            ));
        }
        debug!(status = status.as_u16(), "story submitted");
        Ok(SubmitReceipt {
            message: decoded
                .message
                .unwrap_or_else(|| DEFAULT_SUBMIT_MESSAGE.to_owned()),
        })
    }

    async fn fetch_stories(
        &self,
        token: &AuthToken,
        with_location: bool,
    ) -> Result<Vec<RemoteStory>, StoryRemoteError> {
        let mut request = self
            .client
            .get(self.stories_url.clone())
            .bearer_auth(token.expose());
        if with_location {
            request = request.query(&[("location", "1")]);
        }
        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        parse_listing(status, body.as_ref())
    }
}

fn parse_listing(status: StatusCode, body: &[u8]) -> Result<Vec<RemoteStory>, StoryRemoteError> {
    let decoded: StoryListDto = serde_json::from_slice(body).map_err(|error| {
        StoryRemoteError::decode(format!("invalid story listing: {error}"))
    })?;
    if decoded.error {
        return Err(StoryRemoteError::rejected(
            status.as_u16(),
            decoded
                .message
                .unwrap_or_else(|| "listing refused".to_owned()),
        ));
    }
    Ok(decoded.into_remote_stories())
}

fn map_transport_error(error: reqwest::Error) -> StoryRemoteError {
    if error.is_timeout() {
        StoryRemoteError::network(format!("request timed out: {error}"))
    } else {
        StoryRemoteError::network(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> StoryRemoteError {
    let message = serde_json::from_slice::<MessageDto>(body)
        .ok()
        .and_then(|envelope| envelope.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP Error: {}", status.as_u16()));
    StoryRemoteError::rejected(status.as_u16(), message)
}
