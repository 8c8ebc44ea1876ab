use log::{debug, info, warn};
use std::path::Path;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::{log_file_error, log_remote_error};
use crate::metadata::MetadataTool;
use crate::persistence::{ledger_key, UploadLedger};
use crate::remote::{photo_url, UploadParams};
use crate::rules::{self, RuleOutcome};
use crate::types::{Album, ImageInfo, UploadOutcome, UploadResult};
use crate::ImageUploader;

/// Read an image's metadata and work out what the rules would do with it.
/// Nothing is changed, locally or remotely.
pub fn preview(
    config: &Config,
    metadata: &dyn MetadataTool,
    path: &Path,
) -> Result<(ImageInfo, RuleOutcome)> {
    let info = metadata.extract(path)?;
    let outcome = rules::evaluate(&info.keywords, &config.rules);
    Ok((info, outcome))
}

/// Title to upload under: the image's own title, else its file name
/// without the extension
fn upload_title(path: &Path, info: &ImageInfo) -> String {
    let title = info.title.trim();
    if !title.is_empty() {
        return title.to_string();
    }

    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn report_ledger_error(ledger_path: &Path, operation: &str, err: Error) {
    log_file_error(ledger_path, operation, &err);
    println!("Error: {}", err);
}

impl ImageUploader {
    /// Process a single file: skip it if the ledger has it, apply the
    /// keyword rules, upload it, record it and file it into albums.
    ///
    /// Errors are reported and folded into the returned outcome so the
    /// caller can carry on with the next file.
    pub fn upload_file(&self, path: &Path) -> UploadResult {
        println!("Processing {}", path.display());

        let Some(key) = ledger_key(path) else {
            println!("Error: {} is not a file", path.display());
            return UploadResult::stopped(UploadOutcome::MetadataError);
        };

        let ledger_path = self.ledger_path(path);
        let ledger = match UploadLedger::open_with_recovery(
            &ledger_path,
            self.config.upload.ledger_recovery,
            |e| {
                report_ledger_error(&ledger_path, "read_ledger", Error::from(e));
                println!("Starting a new upload ledger at {}", ledger_path.display());
            },
        ) {
            Ok(ledger) => ledger,
            Err(e) => {
                report_ledger_error(&ledger_path, "read_ledger", Error::from(e));
                println!("Skipping {}, its upload ledger cannot be read", path.display());
                return UploadResult::stopped(UploadOutcome::LedgerError);
            }
        };

        let reupload = match ledger.lookup(&key) {
            Some(photo_id) if !self.config.force => {
                println!("This image has already been uploaded to Flickr.");
                println!(
                    "View this photo: {}",
                    photo_url(&self.config.flickr.username, photo_id)
                );
                println!();
                return UploadResult::stopped(UploadOutcome::AlreadyUploaded);
            }
            Some(_) => {
                println!("This image has already been uploaded to Flickr. Forcing upload.");
                true
            }
            None => false,
        };

        let (info, actions) = match preview(&self.config, self.metadata.as_ref(), path) {
            Ok(preview) => preview,
            Err(e) => {
                log_file_error(path, "read_metadata", &e);
                println!("Error: {}", e);
                return UploadResult::stopped(UploadOutcome::MetadataError);
            }
        };

        if actions.has_actions() {
            println!("Actions:");
            for line in actions.describe() {
                println!("  - {}", line);
            }
        }

        if self.config.dry_run {
            println!("Would upload photo to Flickr");
            println!();
            return UploadResult::stopped(UploadOutcome::DryRun);
        }

        if !actions.keywords_to_remove.is_empty() {
            if let Err(e) = self
                .metadata
                .strip_keywords(path, &actions.keywords_to_remove)
            {
                log_file_error(path, "strip_keywords", &e);
                println!("Error: {}", e);
            }
        }

        let title = upload_title(path, &info);
        let params = UploadParams::new(
            title.as_str(),
            info.description.as_str(),
            &actions.keywords_to_add,
        );

        println!("Uploading photo to Flickr");
        let photo_id = match self.service.upload(path, &params) {
            Ok(photo_id) => photo_id,
            Err(e) => {
                log_remote_error("upload", &path.display().to_string(), &e);
                println!("Error: {}", e);
                println!();
                return UploadResult::stopped(UploadOutcome::UploadError);
            }
        };
        info!("Uploaded {} as photo {}", path.display(), photo_id);
        println!("Uploaded photo '{}'", title);

        self.record_upload(ledger, &key, &photo_id);
        self.correct_date_posted(&photo_id, &info);
        self.add_to_albums(&photo_id, &actions.albums_to_add);

        println!(
            "View this photo: {}",
            photo_url(&self.config.flickr.username, &photo_id)
        );
        println!();

        let outcome = if reupload {
            UploadOutcome::Reuploaded
        } else {
            UploadOutcome::Uploaded
        };
        UploadResult::uploaded(outcome, photo_id)
    }

    /// Add the new id to the ledger. A write failure leaves the photo
    /// uploaded but unrecorded.
    fn record_upload(&self, mut ledger: UploadLedger, key: &str, photo_id: &str) {
        if !ledger.record_if_absent(key, photo_id) {
            debug!(
                "{} already recorded in {}, keeping the existing entry",
                key,
                ledger.path().display()
            );
            return;
        }

        if let Err(e) = ledger.flush() {
            report_ledger_error(ledger.path(), "write_ledger", Error::from(e));
            println!("{} was uploaded as {} but is not recorded", key, photo_id);
        }
    }

    /// Make the photostream follow the capture date
    fn correct_date_posted(&self, photo_id: &str, info: &ImageInfo) {
        if !self.config.upload.set_date_posted {
            return;
        }
        let Some(date) = info.date else {
            debug!("No capture date for photo {}, date posted left alone", photo_id);
            return;
        };

        if let Err(e) = self.service.set_date_posted(photo_id, date.timestamp()) {
            log_remote_error("flickr.photos.setDates", photo_id, &e);
            println!("Failed to update the date posted of photo {}: {}", photo_id, e);
        }
    }

    fn add_to_albums(&self, photo_id: &str, albums: &[Album]) {
        for album in albums {
            match self.service.add_to_album(&album.id, photo_id) {
                Ok(()) => println!("Added photo {} to set {}", photo_id, album),
                Err(e) => {
                    log_remote_error("flickr.photosets.addPhoto", photo_id, &e);
                    warn!("Photo {} was not added to {}", photo_id, album);
                    println!("Failed adding photo {} to the set {}: {}", photo_id, album, e);
                }
            }
        }
    }
}
