//! Editor settings stored as JSON in the user's config directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::sequencer::geometry::{
    GridGeometry, DEFAULT_CELL_SIZE, DEFAULT_COLUMNS, DEFAULT_COLUMN_GROWTH,
    DEFAULT_SECONDS_PER_CELL,
};
use crate::sequencer::interaction::{InteractionController, PreviewPolicy};
use crate::sequencer::lattice::PitchLattice;
use crate::sequencer::playback::PlaybackScheduler;
use crate::sequencer::NoteStore;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Octave of the lowest C on the grid.
    pub lowest_octave: i8,
    pub octaves: u8,
    /// Cell edge length in pixels.
    pub cell_size: f32,
    pub initial_columns: u32,
    /// Columns added when a note is placed on the last column.
    pub column_growth: u32,
    pub seconds_per_cell: f64,
    pub preview: PreviewPolicy,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            lowest_octave: 3,
            octaves: 3,
            cell_size: DEFAULT_CELL_SIZE,
            initial_columns: DEFAULT_COLUMNS,
            column_growth: DEFAULT_COLUMN_GROWTH,
            seconds_per_cell: DEFAULT_SECONDS_PER_CELL,
            preview: PreviewPolicy::default(),
        }
    }
}

impl EditorConfig {
    pub fn default_path() -> Option<PathBuf> {
        let mut base = dirs::config_dir()?;
        base.push("notegrid");
        base.push("editor.json");
        Some(base)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings from the default location. Falls back to defaults on any failure.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(%err, path = %path.display(), "using default editor settings");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lattice()?;
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "cell_size",
                reason: format!("must be positive, got {}", self.cell_size),
            });
        }
        if self.initial_columns == 0 {
            return Err(ConfigError::Invalid {
                field: "initial_columns",
                reason: "must be at least 1".into(),
            });
        }
        if self.column_growth == 0 {
            return Err(ConfigError::Invalid {
                field: "column_growth",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.seconds_per_cell.is_finite() && self.seconds_per_cell > 0.0) {
            return Err(ConfigError::Invalid {
                field: "seconds_per_cell",
                reason: format!("must be positive, got {}", self.seconds_per_cell),
            });
        }
        if let PreviewPolicy::AutoRelease { seconds } = self.preview {
            if !(seconds.is_finite() && seconds >= 0.0) {
                return Err(ConfigError::Invalid {
                    field: "preview",
                    reason: format!("release interval must be non-negative, got {seconds}"),
                });
            }
        }
        Ok(())
    }

    pub fn lattice(&self) -> Result<PitchLattice, ConfigError> {
        PitchLattice::new(self.lowest_octave, self.octaves).ok_or_else(|| ConfigError::Invalid {
            field: "octaves",
            reason: format!(
                "{} octave(s) from octave {} leave the MIDI note range",
                self.octaves, self.lowest_octave
            ),
        })
    }

    pub fn controller(&self) -> Result<InteractionController, ConfigError> {
        self.validate()?;
        let lattice = self.lattice()?;
        let rows = lattice.len();
        Ok(InteractionController::new(
            NoteStore::new(lattice),
            GridGeometry::new(self.cell_size, rows, self.initial_columns, self.column_growth),
            self.preview,
        ))
    }

    pub fn scheduler(&self) -> PlaybackScheduler {
        PlaybackScheduler::new(self.seconds_per_cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EditorConfig::default();
        config.validate().unwrap();
        let controller = config.controller().unwrap();
        assert_eq!(controller.geometry().rows(), 36);
        assert_eq!(controller.geometry().columns(), 64);
        assert_eq!(config.scheduler().seconds_per_cell(), 0.25);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("editor.json");
        let config = EditorConfig {
            octaves: 2,
            preview: PreviewPolicy::Sustain,
            ..EditorConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EditorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{ "octaves": 4 }"#).unwrap();
        assert_eq!(config.octaves, 4);
        assert_eq!(config.cell_size, DEFAULT_CELL_SIZE);
        assert_eq!(config.preview, PreviewPolicy::default());
    }

    #[test]
    fn preview_policy_is_tagged() {
        let config: EditorConfig =
            serde_json::from_str(r#"{ "preview": { "mode": "auto_release", "seconds": 1.5 } }"#)
                .unwrap();
        assert_eq!(config.preview, PreviewPolicy::AutoRelease { seconds: 1.5 });
        let config: EditorConfig =
            serde_json::from_str(r#"{ "preview": { "mode": "sustain" } }"#).unwrap();
        assert_eq!(config.preview, PreviewPolicy::Sustain);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_range = EditorConfig {
            lowest_octave: 8,
            octaves: 4,
            ..EditorConfig::default()
        };
        assert!(matches!(
            bad_range.validate(),
            Err(ConfigError::Invalid { field: "octaves", .. })
        ));

        let bad_tempo = EditorConfig {
            seconds_per_cell: 0.0,
            ..EditorConfig::default()
        };
        assert!(matches!(
            bad_tempo.validate(),
            Err(ConfigError::Invalid {
                field: "seconds_per_cell",
                ..
            })
        ));

        let no_growth = EditorConfig {
            column_growth: 0,
            ..EditorConfig::default()
        };
        assert!(no_growth.controller().is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EditorConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            EditorConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
