//! Image contract verification
//!
//! Hard checks reject the record outright. Soft warnings flag fields some
//! upstream APIs are known to omit; they are logged and returned but never
//! block acceptance.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::warn;

use super::Image;
use crate::{Error, Result};

/// Liberal URL matcher after John Gruber's public-domain pattern
/// (http://daringfireball.net/2010/07/improved_regex_for_matching_urls),
/// anchored so the whole field must be a URL.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^(?:https?://|www\d{0,3}[.]|[a-z0-9.\-]+[.][a-z]{2,4}/)(?:[^\s()<>]+|\(([^\s()<>]+|(\([^\s()<>]+\)))*\))+(?:\(([^\s()<>]+|(\([^\s()<>]+\)))*\)|[^\s`!()\[\]{};:'".,<>?«»“”‘’])$"#,
    )
    .expect("URL pattern compiles")
});

/// Numeric string ids
static INTEGER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("integer pattern compiles"));

/// MD5 hex digests are always 32 characters long
const MD5_LENGTH: usize = 32;

/// A violated hard constraint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("{field} is not a valid URL: {value:?}")]
    MalformedUrl { field: &'static str, value: String },

    #[error("{field} must be positive, got {value}")]
    NonPositiveDimension { field: &'static str, value: i32 },

    #[error("{field} must not be negative, got {value}")]
    NegativeDimension { field: &'static str, value: i32 },

    #[error("tag #{index} has an empty name")]
    EmptyTagName { index: usize },

    #[error("tag {name:?} has no type")]
    UntypedTag { name: String },

    #[error("{field} is not a decimal id: {value:?}")]
    MalformedId { field: &'static str, value: String },

    #[error("obscenity rating is missing")]
    MissingRating,

    #[error("score must not be negative, got {score}")]
    NegativeScore { score: i32 },

    #[error("md5 must be 32 characters, got {length}")]
    Md5Length { length: usize },

    #[error("creation timestamp is missing")]
    MissingCreatedAt,
}

/// A non-fatal data-quality issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftWarning {
    /// Preview or sample dimension reported as 0
    ZeroDimension { field: &'static str },
    NoTags,
    NoParentId,
    NoPixivId,
    NoSource,
}

impl fmt::Display for SoftWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftWarning::ZeroDimension { field } => write!(f, "{} was 0", field),
            SoftWarning::NoTags => write!(f, "No tags"),
            SoftWarning::NoParentId => write!(f, "No parent ID"),
            SoftWarning::NoPixivId => write!(f, "No Pixiv ID"),
            SoftWarning::NoSource => write!(f, "No source"),
        }
    }
}

/// Verify that an image record is well-formed
///
/// Every hard check runs; all violations are reported together in
/// [`Error::InvalidImage`]. Soft warnings are logged either way and
/// returned on success.
pub fn verify_image(image: &Image) -> Result<Vec<SoftWarning>> {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    for (field, value) in [
        ("fileUrl", &image.file_url),
        ("previewUrl", &image.preview_url),
        ("sampleUrl", &image.sample_url),
        ("webUrl", &image.web_url),
    ] {
        if !URL_PATTERN.is_match(value) {
            violations.push(Violation::MalformedUrl {
                field,
                value: value.clone(),
            });
        }
    }

    for (field, value) in [("width", image.width), ("height", image.height)] {
        if value <= 0 {
            violations.push(Violation::NonPositiveDimension { field, value });
        }
    }

    for (field, value) in [
        ("previewWidth", image.preview_width),
        ("previewHeight", image.preview_height),
        ("sampleWidth", image.sample_width),
        ("sampleHeight", image.sample_height),
    ] {
        if value < 0 {
            violations.push(Violation::NegativeDimension { field, value });
        } else if value == 0 {
            warnings.push(SoftWarning::ZeroDimension { field });
        }
    }

    if image.tags.is_empty() {
        warnings.push(SoftWarning::NoTags);
    }
    for (index, tag) in image.tags.iter().enumerate() {
        if tag.name.is_empty() {
            violations.push(Violation::EmptyTagName { index });
        }
        if tag.tag_type.is_none() {
            violations.push(Violation::UntypedTag {
                name: tag.name.clone(),
            });
        }
    }

    if !INTEGER_PATTERN.is_match(&image.id) {
        violations.push(Violation::MalformedId {
            field: "id",
            value: image.id.clone(),
        });
    }
    match image.parent_id.as_deref() {
        Some(parent_id) if !parent_id.is_empty() => {
            if !INTEGER_PATTERN.is_match(parent_id) {
                violations.push(Violation::MalformedId {
                    field: "parentId",
                    value: parent_id.to_string(),
                });
            }
        }
        _ => warnings.push(SoftWarning::NoParentId),
    }
    match image.pixiv_id.as_deref() {
        Some(pixiv_id) => {
            if !INTEGER_PATTERN.is_match(pixiv_id) {
                violations.push(Violation::MalformedId {
                    field: "pixivId",
                    value: pixiv_id.to_string(),
                });
            }
        }
        None => warnings.push(SoftWarning::NoPixivId),
    }

    if image.obscenity_rating.is_none() {
        violations.push(Violation::MissingRating);
    }
    if image.score < 0 {
        violations.push(Violation::NegativeScore { score: image.score });
    }
    if image.source.as_deref().is_none_or(str::is_empty) {
        warnings.push(SoftWarning::NoSource);
    }

    let md5_length = image.md5.chars().count();
    if md5_length != MD5_LENGTH {
        violations.push(Violation::Md5Length { length: md5_length });
    }
    if image.created_at.is_none() {
        violations.push(Violation::MissingCreatedAt);
    }

    for warning in &warnings {
        warn!("{} for image: {}", warning, image.web_url);
    }

    if !violations.is_empty() {
        return Err(Error::InvalidImage { violations });
    }

    Ok(warnings)
}
