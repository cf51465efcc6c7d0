use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const PORT_FILE: &str = "port.txt";
pub const SEQUENCE_FILE: &str = "sequence.txt";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read {0}: {1}")]
    Read(PathBuf, #[source] io::Error),
    #[error("could not write {0}: {1}")]
    Write(PathBuf, #[source] io::Error),
    #[error("{0} does not name a serial port")]
    NoPort(PathBuf),
}

/// Flat-file settings store: `port.txt` holds the last-used port name on its
/// first line, `sequence.txt` holds the programmed command script.
pub struct FileSettings {
    port_path: PathBuf,
    sequence_path: PathBuf,
}

impl FileSettings {
    /// Store rooted in the current directory, next to the executable's cwd,
    /// which is where the files have always lived.
    pub fn new() -> Self {
        Self::in_dir(".")
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            port_path: dir.join(PORT_FILE),
            sequence_path: dir.join(SEQUENCE_FILE),
        }
    }

    pub fn port_name(&self) -> Result<String, SettingsError> {
        let text = fs::read_to_string(&self.port_path)
            .map_err(|e| SettingsError::Read(self.port_path.clone(), e))?;
        let name = text.lines().next().unwrap_or("").trim();
        if name.is_empty() {
            return Err(SettingsError::NoPort(self.port_path.clone()));
        }
        Ok(name.to_string())
    }

    /// Persists immediately.
    pub fn set_port_name(&self, name: &str) -> Result<(), SettingsError> {
        fs::write(&self.port_path, name)
            .map_err(|e| SettingsError::Write(self.port_path.clone(), e))
    }

    /// The sequence script, flattened to a (direction, speed, duration, ...)
    /// field list. Lines containing a `#` anywhere, or not splitting into
    /// exactly 3 comma-separated fields, are skipped rather than rejected;
    /// fields are trimmed.
    pub fn sequence_fields(&self) -> Result<Vec<String>, SettingsError> {
        let text = fs::read_to_string(&self.sequence_path)
            .map_err(|e| SettingsError::Read(self.sequence_path.clone(), e))?;
        let mut fields = Vec::new();
        for line in text.lines() {
            if line.contains('#') {
                continue;
            }
            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() != 3 {
                continue;
            }
            fields.extend(parts.iter().map(|p| p.trim().to_string()));
        }
        Ok(fields)
    }
}

impl Default for FileSettings {
    fn default() -> Self {
        Self::new()
    }
}
