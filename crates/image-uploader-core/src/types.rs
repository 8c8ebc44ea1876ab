use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported image formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Tiff,
    Heic,
    Gif,
    Other(String),
}

impl ImageFormat {
    /// Determine format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "tif" | "tiff" => Self::Tiff,
            "heic" => Self::Heic,
            "gif" => Self::Gif,
            other => Self::Other(other.to_string()),
        }
    }

    /// Check if format can be uploaded
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Metadata read from an image file's embedded tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Title, empty if the image has none
    pub title: String,

    /// Description, empty if the image has none
    pub description: String,

    /// Keywords in the order the metadata tool reported them, without duplicates
    pub keywords: Vec<String>,

    /// When the photo was taken, if recorded
    pub date: Option<DateTime<Local>>,
}

/// A remote album (a Flickr photoset)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
}

impl fmt::Display for Album {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Keyword conditions of a rule. An empty list places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Condition {
    /// Skip the rule if the image has every one of these keywords
    pub excludes_all: Vec<String>,

    /// Skip the rule if the image has any of these keywords
    pub excludes_any: Vec<String>,

    /// Apply the rule if the image has every one of these keywords
    pub includes_all: Vec<String>,

    /// Apply the rule if the image has at least one of these keywords.
    /// Ignored when `includes_all` is set.
    pub includes_any: Vec<String>,
}

/// What happens when a rule applies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Action {
    /// Remove the matched keywords from the file and from the uploaded tags
    pub delete: bool,

    /// Albums to add the photo to
    pub albums: Vec<Album>,
}

/// A condition/action pair from the configuration.
///
/// A rule whose condition has neither `includes_all` nor `includes_any`
/// never applies. That is intentional: a rule must say which keywords it
/// acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub condition: Condition,
    pub action: Action,
}

/// Terminal state of processing a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadOutcome {
    /// Uploaded for the first time
    Uploaded,

    /// Already in the ledger but uploaded again because of `--force`
    Reuploaded,

    /// Already in the ledger, nothing done
    AlreadyUploaded,

    /// Actions computed and printed, nothing changed
    DryRun,

    /// The metadata tool could not read the file
    MetadataError,

    /// The ledger could not be read under the fail-closed policy
    LedgerError,

    /// The remote service did not accept the file
    UploadError,
}

/// Result of processing a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub outcome: UploadOutcome,

    /// Remote photo id, present only when the file was uploaded in this run
    pub photo_id: Option<String>,
}

impl UploadResult {
    pub(crate) fn stopped(outcome: UploadOutcome) -> Self {
        Self {
            outcome,
            photo_id: None,
        }
    }

    pub(crate) fn uploaded(outcome: UploadOutcome, photo_id: String) -> Self {
        Self {
            outcome,
            photo_id: Some(photo_id),
        }
    }
}

/// Totals for a batch of files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Ids of every photo uploaded in this run, in upload order
    pub photo_ids: Vec<String>,
    pub already_uploaded: usize,
    pub dry_run: usize,
    pub failed: usize,

    /// Files left unprocessed because a stop was requested
    pub not_processed: usize,
}

impl BatchSummary {
    pub(crate) fn record(&mut self, result: UploadResult) {
        match result.outcome {
            UploadOutcome::Uploaded | UploadOutcome::Reuploaded => {}
            UploadOutcome::AlreadyUploaded => self.already_uploaded += 1,
            UploadOutcome::DryRun => self.dry_run += 1,
            UploadOutcome::MetadataError
            | UploadOutcome::LedgerError
            | UploadOutcome::UploadError => self.failed += 1,
        }
        if let Some(photo_id) = result.photo_id {
            self.photo_ids.push(photo_id);
        }
    }
}
