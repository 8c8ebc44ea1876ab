//! Core functionality for uploading images to Flickr.
//!
//! This library provides the components of the upload pipeline:
//! - An upload ledger so each file is uploaded once
//! - Metadata extraction and keyword stripping through exiftool
//! - Keyword rules deciding which tags are kept and which albums are used
//! - The Flickr API client

// -- External Dependencies --

use log::{info, warn};

// -- Standard Library --
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// -- Internal Modules --
mod error;
mod timeout;
mod upload;

// -- Public Re-exports --
pub use config::Config;
pub use error::{Error, Result};
pub use metadata::{ExifTool, MetadataTool};
pub use remote::{FlickrClient, PhotoService, UploadParams};
pub use rules::RuleOutcome;
pub use upload::preview;
pub use types::*;

// -- Public Modules --
pub mod config;
pub mod discovery;
pub mod keywords;
pub mod logging;
pub mod metadata;
pub mod persistence;
pub mod remote;
pub mod rules;
pub mod types;

use persistence::ledger_path;

/// Main entry point for the upload process
pub struct ImageUploader {
    config: Config,
    ledger_dir: Option<PathBuf>,
    metadata: Arc<dyn MetadataTool>,
    service: Arc<dyn PhotoService>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ImageUploader {
    /// Create an uploader using the given metadata tool and photo service
    pub fn new(
        config: Config,
        metadata: Arc<dyn MetadataTool>,
        service: Arc<dyn PhotoService>,
    ) -> Result<Self> {
        let ledger_dir = if config.upload.store_in_image_dir {
            None
        } else {
            Some(config.ledger_dir()?)
        };

        Ok(Self {
            config,
            ledger_dir,
            metadata,
            service,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Create an uploader backed by exiftool and the Flickr API
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let metadata = Arc::new(ExifTool::from_config(&config)?);
        let service = Arc::new(FlickrClient::from_config(&config)?);
        Self::new(config, metadata, service)
    }

    /// Stop before the next file once `flag` is set
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_requested = flag;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Upload every file in order, one at a time
    pub fn run<P: AsRef<Path>>(&self, files: &[P]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for (index, file) in files.iter().enumerate() {
            if self.shutdown_requested.load(Ordering::SeqCst) {
                summary.not_processed = files.len() - index;
                warn!(
                    "Stop requested, {} files left unprocessed",
                    summary.not_processed
                );
                break;
            }

            let result = self.upload_file(file.as_ref());
            info!(
                "{}: {:?}{}",
                file.as_ref().display(),
                result.outcome,
                result
                    .photo_id
                    .as_deref()
                    .map(|id| format!(" ({})", id))
                    .unwrap_or_default()
            );
            summary.record(result);
        }

        summary
    }

    fn ledger_path(&self, image: &Path) -> PathBuf {
        let ledger_dir = self.ledger_dir.as_deref().unwrap_or_else(|| Path::new("."));
        ledger_path(image, self.config.upload.store_in_image_dir, ledger_dir)
    }
}
