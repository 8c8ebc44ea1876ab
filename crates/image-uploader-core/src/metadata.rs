//! Reading and editing embedded image metadata.
//!
//! The uploader talks to metadata through [`MetadataTool`]. [`ExifTool`]
//! implements it by running the `exiftool` command.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use log::{debug, info};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::keywords::dedup;
use crate::logging::log_fs_modification;
use crate::timeout::output_with_timeout;
use crate::types::ImageInfo;

/// Source of image metadata
pub trait MetadataTool {
    /// Read title, description, keywords and capture date from `path`
    fn extract(&self, path: &Path) -> Result<ImageInfo>;

    /// Remove `keywords` from the embedded metadata of `path`, in place
    fn strip_keywords(&self, path: &Path, keywords: &[String]) -> Result<()>;
}

/// Tags requested from exiftool
const EXTRACT_TAGS: &[&str] = &[
    "-Title",
    "-ObjectName",
    "-Description",
    "-ImageDescription",
    "-Caption-Abstract",
    "-Keywords",
    "-Subject",
    "-DateTimeOriginal",
    "-CreateDate",
];

/// [`MetadataTool`] backed by the exiftool command
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    timeout: Duration,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Build from the `commands` section of the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let program = config
            .commands
            .exiftool
            .clone()
            .ok_or_else(|| Error::Configuration("commands.exiftool needs to be configured".into()))?;

        Ok(Self::new(
            program,
            Duration::from_secs(config.commands.exiftool_timeout_secs),
        ))
    }

    /// Run exiftool with `args`, in the directory of `path`
    fn run(&self, path: &Path, args: Vec<OsString>) -> Result<Output> {
        let mut command = Command::new(&self.program);
        command.args(args);
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            command.current_dir(dir);
        }
        debug!("Running {:?}", command);

        output_with_timeout("Exiftool", &mut command, self.timeout)
    }
}

impl MetadataTool for ExifTool {
    fn extract(&self, path: &Path) -> Result<ImageInfo> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let metadata_error = |message: String| Error::Metadata {
            path: path.to_path_buf(),
            message,
        };

        let file_name = file_argument(path);
        let mut args: Vec<OsString> = vec!["-json".into()];
        args.extend(EXTRACT_TAGS.iter().map(OsString::from));
        args.push(file_name);

        let output = self.run(path, args).map_err(|e| metadata_error(e.to_string()))?;
        if !output.status.success() {
            return Err(metadata_error(command_failure(&output)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_exiftool_json(&stdout).map_err(metadata_error)
    }

    fn strip_keywords(&self, path: &Path, keywords: &[String]) -> Result<()> {
        if keywords.is_empty() {
            return Ok(());
        }

        let mut args: Vec<OsString> = vec!["-overwrite_original".into()];
        for keyword in keywords {
            args.push(format!("-keywords-={}", keyword).into());
            args.push(format!("-subject-={}", keyword).into());
        }
        args.push(file_argument(path));

        let strip_error = |message: String| Error::KeywordStrip {
            path: path.to_path_buf(),
            message,
        };

        let output = self.run(path, args).map_err(|e| strip_error(e.to_string()))?;
        if !output.status.success() {
            return Err(strip_error(command_failure(&output)));
        }

        log_fs_modification(
            "strip_keywords",
            path,
            Some(&format!("removed {}", keywords.join(", "))),
        );
        info!("Removed keywords from {}", path.display());
        Ok(())
    }
}

/// The file argument as seen from the working directory `run` uses
fn file_argument(path: &Path) -> OsString {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => name.to_os_string(),
        _ => path.as_os_str().to_os_string(),
    }
}

fn command_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exiftool exited with {}", output.status)
    } else {
        format!("exiftool exited with {}: {}", output.status, stderr)
    }
}

/// Build an [`ImageInfo`] from the output of `exiftool -json`
pub fn parse_exiftool_json(json: &str) -> std::result::Result<ImageInfo, String> {
    let records: Vec<serde_json::Map<String, Value>> =
        serde_json::from_str(json).map_err(|e| format!("Unexpected exiftool output: {}", e))?;
    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| "exiftool returned no metadata".to_string())?;

    let first_text = |tags: &[&str]| {
        tags.iter()
            .filter_map(|tag| record.get(*tag))
            .flat_map(values_as_strings)
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    };

    let title = first_text(&["Title", "ObjectName"]);
    let description = first_text(&["Description", "ImageDescription", "Caption-Abstract"]);

    let keywords = dedup(
        ["Keywords", "Subject"]
            .iter()
            .filter_map(|tag| record.get(*tag))
            .flat_map(values_as_strings)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    );

    let date = ["DateTimeOriginal", "CreateDate"]
        .iter()
        .filter_map(|tag| record.get(*tag))
        .flat_map(values_as_strings)
        .find_map(|s| parse_exif_date(&s));

    Ok(ImageInfo {
        title,
        description,
        keywords,
        date,
    })
}

/// exiftool reports single values as scalars and repeated ones as arrays.
/// Numeric-looking keywords come back as numbers.
fn values_as_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Array(items) => items.iter().flat_map(values_as_strings).collect(),
        Value::Null | Value::Object(_) => Vec::new(),
    }
}

/// Parse an EXIF date such as `2020:06:14 17:03:22`, optionally with
/// sub-seconds and a UTC offset. Dates without an offset are local time.
pub fn parse_exif_date(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();

    if let Ok(date) = DateTime::parse_from_str(value, "%Y:%m:%d %H:%M:%S%.f%:z") {
        return Some(date.with_timezone(&Local));
    }

    let naive = NaiveDateTime::parse_from_str(value.get(..19)?, "%Y:%m:%d %H:%M:%S").ok()?;
    Local.from_local_datetime(&naive).earliest()
}
