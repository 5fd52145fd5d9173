//! Capture destination naming

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generates time-unique file names for new recordings
#[derive(Debug, Clone)]
pub struct DestinationNamer {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl DestinationNamer {
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    /// Directory recordings are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh destination for a recording starting now. Creates the scratch
    /// directory if needed.
    pub fn next(&self) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(self.name_at(Utc::now()))
    }

    /// `<prefix>-<UTC timestamp, µs>-<8 hex>.<extension>`. Names sort
    /// chronologically; the random suffix separates names minted within the
    /// same microsecond.
    pub fn name_at(&self, at: DateTime<Utc>) -> PathBuf {
        let timestamp = at.format("%Y%m%dT%H%M%S%.6fZ");
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        self.dir.join(format!(
            "{}-{}-{}.{}",
            self.prefix, timestamp, suffix, self.extension
        ))
    }
}
