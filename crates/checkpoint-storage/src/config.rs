use crate::error::{StorageError, StorageResult};
use crate::store::RecordKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Location and behaviour of the flat-file store
///
/// Can be built in code or loaded from a TOML file:
///
/// ```toml
/// data_dir = "/var/lib/checkpoint"
/// visitors_file = "visitors.txt"
/// event_capacity = 128
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding every backing file
    pub data_dir: PathBuf,

    /// Roster file name (`id,role,name[,status]`)
    pub roster_file: String,

    /// Visitor/Special Pass file name
    pub visitors_file: String,

    /// Violation counter file name
    pub violations_file: String,

    /// Append-only access log file name
    pub access_log_file: String,

    /// Student/teacher attendance file name
    pub attendance_file: String,

    /// Whether to create the directory and missing files on open
    pub create_if_missing: bool,

    /// Buffered scan and fault events per subscriber
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            roster_file: "database.txt".to_string(),
            visitors_file: "visitors.txt".to_string(),
            violations_file: "violations.txt".to_string(),
            access_log_file: "access_log.txt".to_string(),
            attendance_file: "attendance.txt".to_string(),
            create_if_missing: true,
            event_capacity: 64,
        }
    }
}

impl StoreConfig {
    /// Create a configuration rooted at the given directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a TOML file
    ///
    /// Keys left out keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> StorageResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| StorageError::Configuration(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the roster file name
    pub fn roster_file(mut self, name: impl Into<String>) -> Self {
        self.roster_file = name.into();
        self
    }

    /// Set the visitor file name
    pub fn visitors_file(mut self, name: impl Into<String>) -> Self {
        self.visitors_file = name.into();
        self
    }

    /// Set the violations file name
    pub fn violations_file(mut self, name: impl Into<String>) -> Self {
        self.violations_file = name.into();
        self
    }

    /// Set the access log file name
    pub fn access_log_file(mut self, name: impl Into<String>) -> Self {
        self.access_log_file = name.into();
        self
    }

    /// Set the attendance file name
    pub fn attendance_file(mut self, name: impl Into<String>) -> Self {
        self.attendance_file = name.into();
        self
    }

    /// Set whether missing files are created on open
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set the event buffer size
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Full path of the file backing `kind`
    pub fn path_for(&self, kind: RecordKind) -> PathBuf {
        let name = match kind {
            RecordKind::Roster => &self.roster_file,
            RecordKind::Visitors => &self.visitors_file,
            RecordKind::Violations => &self.violations_file,
            RecordKind::AccessLog => &self.access_log_file,
            RecordKind::Attendance => &self.attendance_file,
        };
        self.data_dir.join(name)
    }

    pub(crate) fn validate(&self) -> StorageResult<()> {
        if self.event_capacity == 0 {
            return Err(StorageError::Configuration(
                "event_capacity must be greater than zero".to_string(),
            ));
        }

        let names = [
            &self.roster_file,
            &self.visitors_file,
            &self.violations_file,
            &self.access_log_file,
            &self.attendance_file,
        ];
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(StorageError::Configuration("file names must not be empty".into()));
            }
            if names[..i].contains(name) {
                return Err(StorageError::Configuration(format!(
                    "file name {name} is used for two record kinds"
                )));
            }
        }

        Ok(())
    }
}
