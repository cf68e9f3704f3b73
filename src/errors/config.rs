// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while loading a run configuration.
///
/// Configuration loading is fail-fast: a missing file, unparseable YAML, or
/// missing required key aborts before anything is built. There are no silent
/// defaults for required settings.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file does not exist
    NotFound { path: PathBuf },
    /// The configuration file could not be read
    Io { path: PathBuf, source: std::io::Error },
    /// The configuration file is not valid YAML for the expected schema
    Parse { path: PathBuf, source: serde_yaml::Error },
    /// The configuration parsed but is not usable
    Invalid { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound { path } => {
                write!(f, "Config not found: {}", path.display())
            }
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Invalid { message } => {
                write!(f, "Invalid config: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}
