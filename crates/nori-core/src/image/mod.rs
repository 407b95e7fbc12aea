//! Fetched image records
//!
//! The shape API clients produce for one search result, and the contract
//! check that decides whether the rest of the application may trust it.

pub mod verify;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use verify::{verify_image, SoftWarning, Violation};

/// Tag classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    General,
    Artist,
    Copyright,
    Character,
}

/// A single tag attached to an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    /// `None` when the upstream API did not classify the tag
    #[serde(default)]
    pub tag_type: Option<TagType>,
}

impl Tag {
    /// Create a classified tag
    pub fn new(name: impl Into<String>, tag_type: TagType) -> Self {
        Self {
            name: name.into(),
            tag_type: Some(tag_type),
        }
    }
}

/// Content rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObscenityRating {
    Safe,
    Questionable,
    Explicit,
    Undefined,
}

/// One image returned by a search API
///
/// Dimensions are signed because upstream APIs occasionally report
/// negative values; the contract check rejects those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub file_url: String,
    pub width: i32,
    pub height: i32,

    pub preview_url: String,
    pub preview_width: i32,
    pub preview_height: i32,

    pub sample_url: String,
    pub sample_width: i32,
    pub sample_height: i32,

    #[serde(default)]
    pub tags: Vec<Tag>,

    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub web_url: String,
    #[serde(default)]
    pub pixiv_id: Option<String>,

    #[serde(default)]
    pub obscenity_rating: Option<ObscenityRating>,
    pub score: i32,
    #[serde(default)]
    pub source: Option<String>,
    pub md5: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
