// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

use std::io::ErrorKind;
use std::path::PathBuf;

use super::error::ConfigError;

/// Where the relay's YAML comes from.
pub trait ConfigSource {
    fn load(&self) -> Result<String, ConfigError>;

    /// Human-readable origin, kept on the loaded `Config`.
    fn describe(&self) -> String;
}

/// Reads `aspen.yaml` (or whatever `--config` points at) from disk.
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<String, ConfigError> {
        std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound {
                path: self.path.clone(),
            },
            _ => ConfigError::IoError(e),
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory YAML. Tests use it, and so does `Config::for_upstream`.
pub struct StringSource {
    pub content: String,
}

impl ConfigSource for StringSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(self.content.clone())
    }

    fn describe(&self) -> String {
        "<inline>".to_string()
    }
}
