use log::debug;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::error::{LedgerError, LedgerResult};
use crate::config::LedgerRecovery;
use crate::logging::log_fs_modification;

/// File name of the ledger. Prefixed with `.` when stored next to images.
pub const LEDGER_BASE_FILENAME: &str = "image-uploader-uploaded-files.json";

/// Location of the ledger responsible for `image`
pub fn ledger_path(image: &Path, store_in_image_dir: bool, ledger_dir: &Path) -> PathBuf {
    if store_in_image_dir {
        let directory = image
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        return directory.join(format!(".{}", LEDGER_BASE_FILENAME));
    }

    ledger_dir.join(LEDGER_BASE_FILENAME)
}

/// Key under which an image is recorded: its file name without directories
pub fn ledger_key(image: &Path) -> Option<String> {
    image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Record of uploaded files, keyed by base file name, persisted as a flat
/// JSON object.
///
/// Entries are never overwritten: the first photo id recorded for a file
/// name is kept.
#[derive(Debug)]
pub struct UploadLedger {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl UploadLedger {
    /// An empty ledger that will be written to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Read the ledger at `path`. A missing file is an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No ledger at {}, starting empty", path.display());
            return Ok(Self::empty(path));
        }

        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => return Err(LedgerError::Read(path, e)),
        };

        let entries: BTreeMap<String, String> = match serde_json::from_str(&data) {
            Ok(entries) => entries,
            Err(e) => return Err(LedgerError::Parse(path, e)),
        };

        debug!("Read {} entries from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    /// Read the ledger at `path`, applying `recovery` if it cannot be read.
    ///
    /// With [`LedgerRecovery::Reset`] the error is handed to `on_reset` and
    /// the ledger starts empty; the next flush replaces the unreadable file.
    /// With [`LedgerRecovery::Fail`] the error is returned.
    pub fn open_with_recovery(
        path: impl Into<PathBuf>,
        recovery: LedgerRecovery,
        on_reset: impl FnOnce(LedgerError),
    ) -> LedgerResult<Self> {
        let path = path.into();
        match (Self::open(path.clone()), recovery) {
            (Ok(ledger), _) => Ok(ledger),
            (Err(err), LedgerRecovery::Reset) => {
                on_reset(err);
                Ok(Self::empty(path))
            }
            (Err(err), LedgerRecovery::Fail) => Err(err),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Photo id recorded for `filename`
    pub fn lookup(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(String::as_str)
    }

    /// Record `photo_id` for `filename` unless the file name is already
    /// present. Returns true if the entry was added.
    pub fn record_if_absent(&mut self, filename: &str, photo_id: &str) -> bool {
        if self.entries.contains_key(filename) {
            debug!("{} already recorded, keeping existing entry", filename);
            return false;
        }

        self.entries.insert(filename.to_string(), photo_id.to_string());
        self.dirty = true;
        true
    }

    /// All entries, ordered by file name
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Write pending changes. The file is replaced atomically so a crash
    /// leaves either the old or the new ledger.
    pub fn flush(&mut self) -> LedgerResult<()> {
        if !self.dirty {
            return Ok(());
        }

        let write_error =
            |e: &dyn std::fmt::Display| LedgerError::Write(self.path.clone(), e.to_string());

        let directory = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory).map_err(|e| write_error(&e))?;

        let mut file = NamedTempFile::new_in(directory).map_err(|e| write_error(&e))?;
        serde_json::to_writer_pretty(&mut file, &self.entries).map_err(|e| write_error(&e))?;
        file.flush().map_err(|e| write_error(&e))?;
        file.persist(&self.path).map_err(|e| write_error(&e.error))?;

        log_fs_modification(
            "write_ledger",
            &self.path,
            Some(&format!("{} entries", self.entries.len())),
        );
        self.dirty = false;
        Ok(())
    }
}
