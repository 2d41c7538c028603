//! Per pit stop audit files.
//!
//! Every log entry of pit stop `n` is appended to `PS-<n, 9 digits>` in the
//! configured directory as `<rfc3339 instant> - <event>`. Files left over by a
//! previous run are removed when the dumper starts.

use super::{WorldEvent, WorldListener};
use crate::constants::PS_LOG_FILE_PREFIX;
use crate::logging::log_error;
use crate::models::{PsId, PsLogEntry};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct PsFileDumper {
    directory: PathBuf,
}

impl PsFileDumper {
    /// Create the directory if needed and clear stale `PS-*` files
    pub fn new(directory: impl Into<PathBuf>) -> io::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        let mut removed = 0usize;
        for entry in fs::read_dir(&directory)? {
            let entry = entry?;
            let is_ps_file = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(PS_LOG_FILE_PREFIX));
            if is_ps_file && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        debug!(directory = %directory.display(), removed, "PS file dumper ready");

        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File holding the log of `ps_id`
    pub fn file_for(&self, ps_id: PsId) -> PathBuf {
        self.directory.join(format!("{PS_LOG_FILE_PREFIX}{ps_id:09}"))
    }

    fn append(&self, ps_id: PsId, entry: &PsLogEntry) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(ps_id))?;
        writeln!(file, "{entry}")
    }
}

impl WorldListener for PsFileDumper {
    fn on_world_event(&mut self, event: &WorldEvent) {
        if let WorldEvent::PitStopLogged { ps_id, entry, .. } = event {
            if let Err(e) = self.append(*ps_id, entry) {
                let file = self.file_for(*ps_id);
                log_error(
                    "ps_file_dumper",
                    "append",
                    &e.to_string(),
                    Some(&file.display().to_string()),
                );
            }
        }
    }
}
