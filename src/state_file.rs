use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::error::StateFileError;

const STATE_FILE_NAME: &str = "status.xml";

/// Metrics snapshot persisted across treadmill sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    speed: f64,
    inclination: f64,
    updated: OffsetDateTime,
}

impl SessionState {
    /// Creates a snapshot stamped with the current wall-clock time.
    #[must_use]
    pub fn now(speed: f64, inclination: f64) -> Self {
        Self {
            speed,
            inclination,
            updated: OffsetDateTime::now_utc(),
        }
    }

    /// Last observed speed in km/h.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Last observed inclination in percent.
    #[must_use]
    pub fn inclination(&self) -> f64 {
        self.inclination
    }

    /// Time the snapshot was recorded.
    #[must_use]
    pub fn updated(&self) -> OffsetDateTime {
        self.updated
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Gym")]
struct GymDocument {
    #[serde(rename = "@Updated")]
    updated: Option<String>,
    #[serde(rename = "Treadmill")]
    treadmill: Option<TreadmillElement>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TreadmillElement {
    #[serde(rename = "@Speed")]
    speed: Option<String>,
    #[serde(rename = "@Incline")]
    incline: Option<String>,
}

/// On-disk XML document recording the metrics of the last treadmill session.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Creates a handle over the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default document location under the platform state directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let project_dirs = ProjectDirs::from("org", "gymlink", "gymlink");
        let Some(project_dirs) = project_dirs else {
            return std::env::temp_dir().join("gymlink").join(STATE_FILE_NAME);
        };

        let root = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_local_dir().to_path_buf());
        root.join(STATE_FILE_NAME)
    }

    /// Path of the underlying document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the last persisted snapshot, if a readable one exists.
    ///
    /// Unreadable or malformed documents are treated as absent so a stale
    /// file can never prevent a session from starting.
    #[must_use]
    pub fn load(&self) -> Option<SessionState> {
        if !self.path.exists() {
            return None;
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) => {
                debug!(
                    ?error,
                    path = %self.path.display(),
                    "session state document is unreadable"
                );
                return None;
            }
        };
        let document: GymDocument = match quick_xml::de::from_str(&raw) {
            Ok(document) => document,
            Err(error) => {
                debug!(
                    ?error,
                    path = %self.path.display(),
                    "ignoring malformed session state document"
                );
                return None;
            }
        };

        let treadmill = document.treadmill?;
        let updated = document
            .updated
            .and_then(|stamp| OffsetDateTime::parse(&stamp, &Rfc3339).ok())
            .unwrap_or_else(OffsetDateTime::now_utc);
        Some(SessionState {
            speed: parse_metric(treadmill.speed),
            inclination: parse_metric(treadmill.incline),
            updated,
        })
    }

    /// Writes `state` as the persisted snapshot, replacing any previous one.
    ///
    /// Metrics are recorded with one decimal place, matching what equipment
    /// consoles display.
    pub fn save(&self, state: &SessionState) -> Result<(), StateFileError> {
        let document = GymDocument {
            updated: Some(state.updated.format(&Rfc3339)?),
            treadmill: Some(TreadmillElement {
                speed: Some(format!("{:.1}", state.speed)),
                incline: Some(format!("{:.1}", state.inclination)),
            }),
        };
        let serialised = quick_xml::se::to_string(&document)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StateFileError::Io { source })?;
        }
        let staged = self.path.with_extension("xml.tmp");
        fs::write(&staged, serialised).map_err(|source| StateFileError::Io { source })?;
        fs::rename(&staged, &self.path).map_err(|source| StateFileError::Io { source })?;
        Ok(())
    }

    /// Removes the persisted snapshot; succeeds when none exists.
    pub fn clear(&self) -> Result<(), StateFileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateFileError::Io { source }),
        }
    }
}

fn parse_metric(value: Option<String>) -> f64 {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(0.0)
}
