use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::types::ImageFormat;

/// Expand command-line arguments into the files to upload.
///
/// Files are kept in argument order, whatever their extension. A directory
/// is replaced by the supported images it contains, sorted by path; only its
/// top level is searched unless `recursive` is set.
pub fn expand_paths<P: AsRef<Path>>(arguments: &[P], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for argument in arguments {
        let path = argument.as_ref();
        if path.is_dir() {
            let found = discover_images_in_directory(path, recursive);
            debug!("Found {} images in {}", found.len(), path.display());
            files.extend(found);
        } else {
            files.push(path.to_path_buf());
        }
    }

    files
}

/// Discover images in a single directory
fn discover_images_in_directory(directory: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut images: Vec<PathBuf> = WalkDir::new(directory)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                // Log error but continue with other files
                warn!("Error reading {}: {}", directory.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_image_path(path) && !is_hidden(path))
        .collect();

    images.sort();
    images
}

/// Get image format from file extension
fn get_image_format(path: &Path) -> Option<ImageFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(ImageFormat::from_extension)
}

/// Returns if the given path has a supported image extension
pub fn is_image_path(path: &Path) -> bool {
    match get_image_format(path) {
        Some(format) => format.is_supported(),
        None => false,
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn create_test_image(dir: &Path, name: &str, ext: &str) -> PathBuf {
        let file_path = dir.join(format!("{}.{}", name, ext));
        let mut file = File::create(&file_path).unwrap();
        // Write some dummy data to simulate an image
        file.write_all(b"DUMMY IMAGE DATA").unwrap();
        file_path
    }

    fn setup_test_directory() -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempdir().unwrap();

        let subdir_path = dir.path().join("subdir");
        fs::create_dir(&subdir_path).unwrap();

        let files = vec![
            create_test_image(dir.path(), "image1", "jpg"),
            create_test_image(dir.path(), "image2", "png"),
            create_test_image(dir.path(), "image3", "tiff"),
            create_test_image(dir.path(), "image4", "heic"),
            create_test_image(&subdir_path, "subdir_image1", "jpg"),
            create_test_image(&subdir_path, "subdir_image2", "png"),
        ];

        // A non-image file and a hidden ledger
        create_test_image(dir.path(), "document", "txt");
        create_test_image(dir.path(), ".image-uploader-uploaded-files", "json");
        create_test_image(dir.path(), "._image1", "jpg");

        (dir, files)
    }

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("test.jpg")));
        assert!(is_image_path(Path::new("test.JPEG")));
        assert!(is_image_path(Path::new("test.png")));
        assert!(is_image_path(Path::new("test.tiff")));
        assert!(is_image_path(Path::new("test.heic")));
        assert!(!is_image_path(Path::new("test.txt")));
        assert!(!is_image_path(Path::new("test")));
    }

    #[test]
    fn test_directory_top_level_only() {
        let (dir, files) = setup_test_directory();

        let discovered = expand_paths(&[dir.path()], false);

        assert_eq!(discovered, files[..4].to_vec());
    }

    #[test]
    fn test_directory_recursive() {
        let (dir, files) = setup_test_directory();

        let discovered = expand_paths(&[dir.path()], true);

        assert_eq!(discovered.len(), 6);
        for file_path in &files {
            assert!(discovered.contains(file_path));
        }
    }

    #[test]
    fn test_files_keep_argument_order() {
        let (dir, files) = setup_test_directory();
        let missing = dir.path().join("missing.jpg");
        let document = dir.path().join("document.txt");

        let arguments = vec![files[2].clone(), missing.clone(), files[0].clone(), document.clone()];
        let expanded = expand_paths(&arguments, false);

        // Files are passed through untouched, even when missing or not images
        assert_eq!(expanded, vec![files[2].clone(), missing, files[0].clone(), document]);
    }
}
