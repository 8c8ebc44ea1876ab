#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image_uploader_core::{
    Config, Error, ImageInfo, ImageUploader, MetadataTool, PhotoService, Result, UploadParams,
};

/// Metadata tool serving canned metadata by file name
#[derive(Default)]
pub struct MockMetadata {
    images: HashMap<String, ImageInfo>,
    failing_strip: bool,
    pub stripped: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl MockMetadata {
    pub fn with_image(mut self, file_name: &str, info: ImageInfo) -> Self {
        self.images.insert(file_name.to_string(), info);
        self
    }

    pub fn failing_strip(mut self) -> Self {
        self.failing_strip = true;
        self
    }

    pub fn stripped(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.stripped.lock().unwrap().clone()
    }
}

impl MetadataTool for MockMetadata {
    fn extract(&self, path: &Path) -> Result<ImageInfo> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.images.get(&name).cloned().ok_or_else(|| Error::Metadata {
            path: path.to_path_buf(),
            message: "Error: File format error".to_string(),
        })
    }

    fn strip_keywords(&self, path: &Path, keywords: &[String]) -> Result<()> {
        if self.failing_strip {
            return Err(Error::KeywordStrip {
                path: path.to_path_buf(),
                message: "Error opening file for writing".to_string(),
            });
        }

        self.stripped
            .lock()
            .unwrap()
            .push((path.to_path_buf(), keywords.to_vec()));
        Ok(())
    }
}

/// Photo service recording every call
#[derive(Default)]
pub struct MockService {
    next_id: Mutex<u64>,
    failing_uploads: Vec<String>,
    failing_albums: Vec<String>,
    failing_dates: bool,
    pub uploads: Mutex<Vec<(PathBuf, UploadParams)>>,
    pub dates: Mutex<Vec<(String, i64)>>,
    pub albums: Mutex<Vec<(String, String)>>,
}

impl MockService {
    pub fn failing_upload_of(mut self, file_name: &str) -> Self {
        self.failing_uploads.push(file_name.to_string());
        self
    }

    pub fn failing_album(mut self, album_id: &str) -> Self {
        self.failing_albums.push(album_id.to_string());
        self
    }

    pub fn failing_dates(mut self) -> Self {
        self.failing_dates = true;
        self
    }

    pub fn uploads(&self) -> Vec<(PathBuf, UploadParams)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn dates(&self) -> Vec<(String, i64)> {
        self.dates.lock().unwrap().clone()
    }

    pub fn albums(&self) -> Vec<(String, String)> {
        self.albums.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.uploads().len() + self.dates().len() + self.albums().len()
    }
}

impl PhotoService for MockService {
    fn upload(&self, path: &Path, params: &UploadParams) -> Result<String> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if self.failing_uploads.contains(&name) {
            return Err(Error::Upload("Filetype was not recognised".to_string()));
        }

        self.uploads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), params.clone()));
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        Ok(format!("5100{}", next_id))
    }

    fn set_date_posted(&self, photo_id: &str, date_posted: i64) -> Result<()> {
        if self.failing_dates {
            return Err(Error::Remote {
                method: "flickr.photos.setDates".to_string(),
                message: "Invalid date posted".to_string(),
            });
        }

        self.dates
            .lock()
            .unwrap()
            .push((photo_id.to_string(), date_posted));
        Ok(())
    }

    fn add_to_album(&self, album_id: &str, photo_id: &str) -> Result<()> {
        if self.failing_albums.iter().any(|id| id == album_id) {
            return Err(Error::Remote {
                method: "flickr.photosets.addPhoto".to_string(),
                message: "Photoset not found".to_string(),
            });
        }

        self.albums
            .lock()
            .unwrap()
            .push((album_id.to_string(), photo_id.to_string()));
        Ok(())
    }
}

/// Config keeping the ledger in `ledger_dir`
pub fn test_config(ledger_dir: &Path) -> Config {
    let mut config = Config::default();
    config.flickr.username = "tester".to_string();
    config.upload.ledger_dir = Some(ledger_dir.to_path_buf());
    config
}

pub fn keywords(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn image_info(title: &str, values: &[&str]) -> ImageInfo {
    ImageInfo {
        title: title.to_string(),
        keywords: keywords(values),
        ..Default::default()
    }
}

/// Create an empty image file named `name` in `dir`
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"DUMMY IMAGE DATA").unwrap();
    path
}

pub fn uploader(
    config: Config,
    metadata: &Arc<MockMetadata>,
    service: &Arc<MockService>,
) -> ImageUploader {
    ImageUploader::new(config, metadata.clone(), service.clone()).unwrap()
}
