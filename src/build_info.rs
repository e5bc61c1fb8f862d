//! Build metadata emitted next to the build output.
//!
//! After a successful build, `build-info.json` records when the build ran,
//! which builder produced it, and the pinned version of every policy.

use crate::lock::LockFile;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use thiserror::Error;

/// File name of the build metadata document.
pub const BUILD_INFO_FILE: &str = "build-info.json";

/// Errors raised while writing build metadata.
#[derive(Debug, Error)]
pub enum BuildInfoError {
    /// The metadata could not be serialised.
    #[error("failed to serialise build info: {source}")]
    Serialize {
        /// The underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },

    /// The metadata file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// A policy name and the version it was built at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInfo {
    /// Policy name.
    pub name: String,
    /// Pinned version.
    pub version: String,
}

/// Contents of `build-info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// UTC time of the build, RFC 3339 with second precision.
    pub build_timestamp: String,
    /// Version of this tool.
    pub builder_version: String,
    /// Directory the build output was written to.
    pub output_dir: String,
    /// Built policies in manifest order.
    pub policies: Vec<PolicyInfo>,
}

impl BuildInfo {
    /// Describe a build of `lock` into `output_dir`, stamped now.
    #[must_use]
    pub fn new(lock: &LockFile, output_dir: &Utf8Path) -> Self {
        Self {
            build_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            builder_version: env!("CARGO_PKG_VERSION").to_owned(),
            output_dir: output_dir.to_string(),
            policies: lock
                .policies
                .iter()
                .map(|entry| PolicyInfo {
                    name: entry.name.clone(),
                    version: entry.version.clone(),
                })
                .collect(),
        }
    }

    /// Render as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BuildInfoError::Serialize`] if serialisation fails.
    pub fn to_json(&self) -> Result<String, BuildInfoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write [`BUILD_INFO_FILE`] into `dir` and return its path.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildInfoError`] if the document cannot be rendered or
    /// written.
    pub fn write_to(&self, dir: &Utf8Path) -> Result<Utf8PathBuf, BuildInfoError> {
        let path = dir.join(BUILD_INFO_FILE);
        log::info!("writing build info to {path}");
        fs::write(&path, self.to_json()?).map_err(|source| BuildInfoError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
