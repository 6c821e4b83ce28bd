//! Locally authored stories awaiting remote confirmation.
//!
//! A [`PendingStory`] exists in the pending collection if and only if the
//! remote service has not yet accepted it. Photos are kept text-encoded as
//! `data:` URLs so the whole record is a plain JSON document.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::story::{GeoPoint, PhotoAttachment, StoryDraft};

const DEFAULT_PHOTO_NAME: &str = "photo.jpg";
const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Store-assigned, monotonically increasing identifier of a pending story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(i64);

impl LocalId {
    /// Wrap a raw sequence number.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw sequence number.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a pending story. Success removes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    /// Staged and never attempted, or not yet attempted since staging.
    #[default]
    Pending,
    /// At least one submission attempt failed.
    Failed,
}

/// Errors raised when a staged photo cannot be turned back into bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhotoDecodeError {
    /// The payload is not valid base64.
    #[error("staged photo is not valid base64: {message}")]
    InvalidBase64 {
        /// Decoder detail.
        message: String,
    },
}

/// Photo payload stored as text inside a pending record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedPhoto {
    /// `data:<media-type>;base64,<payload>` URL.
    pub data_url: String,
    /// MIME type of the original file.
    pub media_type: String,
    /// Original file name.
    pub file_name: String,
}

impl StagedPhoto {
    /// Encode an attachment for storage.
    pub fn encode(photo: &PhotoAttachment) -> Self {
        let payload = STANDARD.encode(&photo.bytes);
        Self {
            data_url: format!("data:{};base64,{payload}", photo.media_type),
            media_type: photo.media_type.clone(),
            file_name: photo.file_name.clone(),
        }
    }

    /// Decode the stored text back into an uploadable attachment.
    ///
    /// Bare base64 payloads without the `data:` prefix are accepted too.
    ///
    /// # Examples
    /// ```
    /// use story_sync::domain::{PhotoAttachment, StagedPhoto};
    ///
    /// let photo = PhotoAttachment {
    ///     bytes: vec![0xff, 0xd8, 0xff],
    ///     media_type: "image/jpeg".to_owned(),
    ///     file_name: "beach.jpg".to_owned(),
    /// };
    /// let staged = StagedPhoto::encode(&photo);
    /// assert!(staged.data_url.starts_with("data:image/jpeg;base64,"));
    /// assert_eq!(staged.decode().expect("decodes"), photo);
    /// ```
    pub fn decode(&self) -> Result<PhotoAttachment, PhotoDecodeError> {
        let payload = match self.data_url.split_once(',') {
            Some((header, payload)) if header.starts_with("data:") => payload,
            _ => self.data_url.as_str(),
        };
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|error| PhotoDecodeError::InvalidBase64 {
                message: error.to_string(),
            })?;

        let media_type = if self.media_type.trim().is_empty() {
            DEFAULT_MEDIA_TYPE.to_owned()
        } else {
            self.media_type.clone()
        };
        let file_name = if self.file_name.trim().is_empty() {
            DEFAULT_PHOTO_NAME.to_owned()
        } else {
            self.file_name.clone()
        };

        Ok(PhotoAttachment {
            bytes,
            media_type,
            file_name,
        })
    }
}

/// A staged story plus its retry bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingStory {
    /// Store-assigned identifier.
    pub local_id: LocalId,
    /// Story text.
    pub description: String,
    /// Optional geotag.
    pub location: Option<GeoPoint>,
    /// Optional text-encoded photo.
    pub photo: Option<StagedPhoto>,
    /// Lifecycle status.
    pub status: PendingStatus,
    /// Failed submission attempts so far.
    pub attempts: u32,
    /// When the story was staged.
    pub created_at: DateTime<Utc>,
    /// When the last failed attempt happened.
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Persisted body of a pending story. The local id is the record key and is
/// not repeated inside the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PendingStoryDocument {
    pub(crate) description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) photo: Option<StagedPhoto>,
    #[serde(default)]
    pub(crate) status: PendingStatus,
    #[serde(default)]
    pub(crate) attempts: u32,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) last_attempt_at: Option<DateTime<Utc>>,
}

impl PendingStoryDocument {
    pub(crate) fn staged(draft: &StoryDraft, now: DateTime<Utc>) -> Self {
        Self {
            description: draft.description().to_owned(),
            location: draft.location(),
            photo: draft.photo().map(StagedPhoto::encode),
            status: PendingStatus::Pending,
            attempts: 0,
            created_at: now,
            last_attempt_at: None,
        }
    }

    pub(crate) fn into_pending(self, local_id: LocalId) -> PendingStory {
        PendingStory {
            local_id,
            description: self.description,
            location: self.location,
            photo: self.photo,
            status: self.status,
            attempts: self.attempts,
            created_at: self.created_at,
            last_attempt_at: self.last_attempt_at,
        }
    }
}

impl PendingStory {
    /// Rebuild the submission draft, decoding the staged photo to bytes.
    pub fn to_draft(&self) -> Result<StoryDraft, crate::domain::Error> {
        let photo = self
            .photo
            .as_ref()
            .map(StagedPhoto::decode)
            .transpose()
            .map_err(|error| crate::domain::Error::invalid_request(error.to_string()))?;
        StoryDraft::new(self.description.clone(), self.location, photo)
            .map_err(|error| crate::domain::Error::invalid_request(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    fn staged(data_url: &str, media_type: &str, file_name: &str) -> StagedPhoto {
        StagedPhoto {
            data_url: data_url.to_owned(),
            media_type: media_type.to_owned(),
            file_name: file_name.to_owned(),
        }
    }

    #[rstest]
    fn decode_accepts_bare_base64() {
        let photo = staged("AQID", "image/png", "dots.png")
            .decode()
            .expect("bare payload decodes");
        assert_eq!(photo.bytes, vec![1, 2, 3]);
    }

    #[rstest]
    fn decode_fills_missing_name_and_type() {
        let photo = staged("data:;base64,AQID", "", "")
            .decode()
            .expect("payload decodes");
        assert_eq!(photo.file_name, DEFAULT_PHOTO_NAME);
        assert_eq!(photo.media_type, DEFAULT_MEDIA_TYPE);
    }

    #[rstest]
    fn decode_rejects_garbage() {
        let result = staged("data:image/png;base64,@@@", "image/png", "x.png").decode();
        assert!(matches!(result, Err(PhotoDecodeError::InvalidBase64 { .. })));
    }

    #[rstest]
    fn staged_document_starts_pending_with_zero_attempts() {
        let now = Utc
            .with_ymd_and_hms(2026, 5, 4, 9, 0, 0)
            .single()
            .expect("valid time");
        let draft = StoryDraft::new("Hello", None, None).expect("valid draft");
        let document = PendingStoryDocument::staged(&draft, now);

        assert_eq!(document.status, PendingStatus::Pending);
        assert_eq!(document.attempts, 0);
        assert!(document.last_attempt_at.is_none());

        let value = serde_json::to_value(&document).expect("document serialises");
        assert_eq!(value["status"], "pending");
        assert!(value.get("lastAttemptAt").is_none());
    }

    #[rstest]
    fn to_draft_round_trips_photo_bytes() {
        let now = Utc::now();
        let photo = PhotoAttachment {
            bytes: vec![9, 8, 7, 6],
            media_type: "image/jpeg".to_owned(),
            file_name: "pier.jpg".to_owned(),
        };
        let draft = StoryDraft::new("Pier", None, Some(photo.clone())).expect("valid draft");
        let pending = PendingStoryDocument::staged(&draft, now).into_pending(LocalId::new(4));

        let rebuilt = pending.to_draft().expect("draft rebuilds");
        assert_eq!(rebuilt.photo(), Some(&photo));
        assert_eq!(pending.local_id.get(), 4);
    }
}
