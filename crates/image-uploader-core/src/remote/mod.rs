//! The remote photo service.

mod flickr;
pub mod oauth;

use std::path::Path;

use crate::error::Result;

pub use flickr::{edit_url, photo_url, profile_url, FlickrClient};

/// Who may see or find a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyLevel {
    Safe = 1,
    Moderate = 2,
    Restricted = 3,
}

/// Everything sent along with the image file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadParams {
    pub title: String,
    pub description: String,

    /// Tags as sent, already quoted
    pub tags: Vec<String>,

    pub is_public: bool,
    pub is_friend: bool,
    pub is_family: bool,
    pub safety_level: SafetyLevel,

    /// Keep the photo out of public search results
    pub hidden: bool,
}

impl UploadParams {
    /// Parameters for a public, safe photo tagged with `keywords`.
    ///
    /// Each keyword is wrapped in double quotes so multi-word keywords
    /// stay a single tag.
    pub fn new(title: impl Into<String>, description: impl Into<String>, keywords: &[String]) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags: keywords.iter().map(|k| format!("\"{}\"", k)).collect(),
            is_public: true,
            is_friend: true,
            is_family: true,
            safety_level: SafetyLevel::Safe,
            hidden: false,
        }
    }
}

/// Operations the uploader needs from the photo service
pub trait PhotoService {
    /// Upload the image at `path`, returning the new photo id
    fn upload(&self, path: &Path, params: &UploadParams) -> Result<String>;

    /// Set the photo's "date posted" (unix seconds)
    fn set_date_posted(&self, photo_id: &str, date_posted: i64) -> Result<()>;

    /// Add the photo to an album
    fn add_to_album(&self, album_id: &str, photo_id: &str) -> Result<()>;
}
