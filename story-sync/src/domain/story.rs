//! Story records shared by the cache, the write path, and favourites.
//!
//! A [`Story`] is a record the remote service has acknowledged. A
//! [`StoryDraft`] is what the user authored locally before submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validation errors raised while building a [`GeoPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeoPointError {
    /// Latitude or longitude was NaN or infinite.
    #[error("coordinates must be finite")]
    NonFinite,
    /// Latitude fell outside `[-90, 90]`.
    #[error("latitude must be within [-90, 90]")]
    LatitudeOutOfRange,
    /// Longitude fell outside `[-180, 180]`.
    #[error("longitude must be within [-180, 180]")]
    LongitudeOutOfRange,
}

/// WGS84 coordinate attached to a story.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoPointDto", into = "GeoPointDto")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Validate and build a coordinate.
    ///
    /// # Examples
    /// ```
    /// use story_sync::domain::GeoPoint;
    ///
    /// let point = GeoPoint::new(-6.2, 106.8).expect("valid point");
    /// assert_eq!(point.latitude(), -6.2);
    /// assert!(GeoPoint::new(91.0, 0.0).is_err());
    /// ```
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoPointError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(GeoPointError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoPointError::LatitudeOutOfRange);
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoPointError::LongitudeOutOfRange);
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Build a point only when both halves are present and valid.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Self::new(lat, lon).ok(),
            _ => None,
        }
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

#[derive(Serialize, Deserialize)]
struct GeoPointDto {
    lat: f64,
    lon: f64,
}

impl From<GeoPoint> for GeoPointDto {
    fn from(value: GeoPoint) -> Self {
        Self {
            lat: value.latitude,
            lon: value.longitude,
        }
    }
}

impl TryFrom<GeoPointDto> for GeoPoint {
    type Error = GeoPointError;

    fn try_from(value: GeoPointDto) -> Result<Self, Self::Error> {
        Self::new(value.lat, value.lon)
    }
}

/// Synchronisation status of a confirmed story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Acknowledged by the remote service.
    #[default]
    Synced,
}

/// A story acknowledged by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    /// Server-assigned identifier.
    pub id: String,
    /// Author display name, when the listing includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Story text.
    pub description: String,
    /// Remote photo location, when the listing includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Creation time reported by the remote service.
    pub created_at: DateTime<Utc>,
    /// Optional geotag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Always `synced` once stored.
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// When the local copy was last refreshed.
    pub last_updated: DateTime<Utc>,
}

/// Binary photo ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct PhotoAttachment {
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// MIME type such as `image/jpeg`.
    pub media_type: String,
    /// Original file name.
    pub file_name: String,
}

impl std::fmt::Debug for PhotoAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoAttachment")
            .field("bytes", &self.bytes.len())
            .field("media_type", &self.media_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// A story authored locally, not yet submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryDraft {
    description: String,
    location: Option<GeoPoint>,
    photo: Option<PhotoAttachment>,
}

/// Validation errors raised while building a [`StoryDraft`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoryDraftError {
    /// The description was blank.
    #[error("story description must not be empty")]
    EmptyDescription,
}

impl StoryDraft {
    /// Build a draft from its parts.
    pub fn new(
        description: impl Into<String>,
        location: Option<GeoPoint>,
        photo: Option<PhotoAttachment>,
    ) -> Result<Self, StoryDraftError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(StoryDraftError::EmptyDescription);
        }
        Ok(Self {
            description,
            location,
            photo,
        })
    }

    /// Story text.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Optional geotag.
    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    /// Optional photo.
    pub fn photo(&self) -> Option<&PhotoAttachment> {
        self.photo.as_ref()
    }
}

/// Bearer token passed through to the remote service.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token value for the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(f64::NAN, 0.0, GeoPointError::NonFinite)]
    #[case(-90.5, 0.0, GeoPointError::LatitudeOutOfRange)]
    #[case(0.0, 180.5, GeoPointError::LongitudeOutOfRange)]
    fn geo_point_rejects_invalid_coordinates(
        #[case] lat: f64,
        #[case] lon: f64,
        #[case] expected: GeoPointError,
    ) {
        assert_eq!(GeoPoint::new(lat, lon), Err(expected));
    }

    #[rstest]
    fn geo_point_from_parts_requires_both_halves() {
        assert!(GeoPoint::from_parts(Some(1.0), None).is_none());
        assert!(GeoPoint::from_parts(Some(1.0), Some(2.0)).is_some());
    }

    #[rstest]
    fn story_serialises_with_camel_case_fields() {
        let at = Utc
            .with_ymd_and_hms(2026, 3, 1, 8, 30, 0)
            .single()
            .expect("valid time");
        let story = Story {
            id: "story-1".to_owned(),
            name: None,
            description: "Sunrise at Bromo".to_owned(),
            photo_url: None,
            created_at: at,
            location: Some(GeoPoint::new(-7.94, 112.95).expect("valid point")),
            sync_status: SyncStatus::Synced,
            last_updated: at,
        };

        let value = serde_json::to_value(&story).expect("story serialises");
        assert_eq!(value["syncStatus"], "synced");
        assert_eq!(value["location"], json!({ "lat": -7.94, "lon": 112.95 }));
        assert!(value.get("name").is_none());

        let back: Story = serde_json::from_value(value).expect("story deserialises");
        assert_eq!(back, story);
    }

    #[rstest]
    fn draft_rejects_blank_description() {
        assert_eq!(
            StoryDraft::new("   ", None, None),
            Err(StoryDraftError::EmptyDescription)
        );
    }

    #[rstest]
    fn auth_token_debug_is_redacted() {
        let token = AuthToken::new("secret-value");
        assert_eq!(format!("{token:?}"), "AuthToken(***)");
        assert_eq!(token.expose(), "secret-value");
    }
}
