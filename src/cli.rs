//! CLI argument definitions for the policy builder.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::BUILD_FILE_NAME;
use crate::engine::{DEFAULT_ENGINE_PROGRAM, ProcessBuildEngine};
use crate::orchestration::BuildOptions;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use thiserror::Error;

/// Build gateway images from a policy build file.
#[derive(Parser, Debug, Clone)]
#[command(name = "policy-builder")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build gateway images from a policy build file.\n\n",
    "The build file (build.yaml) lists the policies compiled into the gateway. ",
    "Local policies are validated and copied into an ephemeral workspace, the ",
    "build engine produces the images, and every policy is then pinned to one ",
    "concrete version in build-lock.yaml next to the build file.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build from the build file in the current directory:\n",
    "    $ policy-builder\n\n",
    "  Build and push multi-arch images for a named gateway:\n",
    "    $ policy-builder -p ./gateway --name edge --push --platform linux/amd64\n\n",
    "  Keep the build output:\n",
    "    $ policy-builder --output-dir ./dist\n",
))]
pub struct Cli {
    /// Directory containing build.yaml.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub path: Utf8PathBuf,

    /// Gateway name [default: name of the build file's directory].
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Repository the images are tagged into.
    #[arg(long, value_name = "REPO")]
    pub repository: Option<String>,

    /// Push images after building.
    #[arg(long)]
    pub push: bool,

    /// Build without the engine's cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Target platform, e.g. linux/amd64.
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    /// Copy build output to this directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Override the gateway builder image.
    #[arg(long, value_name = "IMAGE")]
    pub builder_image: Option<String>,

    /// Override the gateway controller base image.
    #[arg(long, value_name = "IMAGE")]
    pub controller_image: Option<String>,

    /// Override the gateway runtime base image.
    #[arg(long, value_name = "IMAGE")]
    pub runtime_image: Option<String>,

    /// Program that performs the image build.
    #[arg(long, value_name = "PROGRAM", default_value = DEFAULT_ENGINE_PROGRAM)]
    pub engine: String,

    /// Extra argument for the build engine (can be repeated).
    #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Errors raised while interpreting command-line arguments.
#[derive(Debug, Error)]
pub enum CliError {
    /// The `--path` directory does not exist.
    #[error("path does not exist: {path}; pass a directory with --path")]
    PathNotFound {
        /// The path given.
        path: Utf8PathBuf,
    },

    /// `--path` names a file.
    #[error("--path must be a directory containing {BUILD_FILE_NAME}, not a file: {path}")]
    NotADirectory {
        /// The path given.
        path: Utf8PathBuf,
    },

    /// The directory has no build file.
    #[error("{BUILD_FILE_NAME} not found in {path}; create one or choose another --path")]
    BuildFileMissing {
        /// The directory searched.
        path: Utf8PathBuf,
    },
}

impl Default for Cli {
    /// Creates a `Cli` with every flag at its command-line default.
    fn default() -> Self {
        Self {
            path: Utf8PathBuf::from("."),
            name: None,
            repository: None,
            push: false,
            no_cache: false,
            platform: None,
            output_dir: None,
            builder_image: None,
            controller_image: None,
            runtime_image: None,
            engine: DEFAULT_ENGINE_PROGRAM.to_owned(),
            engine_args: Vec::new(),
            verbosity: 0,
            quiet: false,
        }
    }
}

impl Cli {
    /// Locate the build file inside `--path`.
    ///
    /// # Errors
    ///
    /// Returns a [`CliError`] if the path is missing, is not a directory, or
    /// holds no build file.
    pub fn build_file_path(&self) -> Result<Utf8PathBuf, CliError> {
        build_file_in(&self.path)
    }

    /// Build settings selected by the flags.
    #[must_use]
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            gateway_name: self.name.clone(),
            repository: self.repository.clone(),
            push: self.push,
            no_cache: self.no_cache,
            platform: self.platform.clone(),
            output_dir: self.output_dir.clone(),
            builder_image: self.builder_image.clone(),
            controller_image: self.controller_image.clone(),
            runtime_image: self.runtime_image.clone(),
        }
    }

    /// The build engine selected by the flags.
    #[must_use]
    pub fn build_engine(&self) -> ProcessBuildEngine {
        ProcessBuildEngine::new(self.engine.clone(), self.engine_args.clone())
    }
}

fn build_file_in(dir: &Utf8Path) -> Result<Utf8PathBuf, CliError> {
    let metadata = dir.metadata().map_err(|_| CliError::PathNotFound {
        path: dir.to_owned(),
    })?;
    if !metadata.is_dir() {
        return Err(CliError::NotADirectory {
            path: dir.to_owned(),
        });
    }
    let build_file = dir.join(BUILD_FILE_NAME);
    if !build_file.is_file() {
        return Err(CliError::BuildFileMissing {
            path: dir.to_owned(),
        });
    }
    Ok(build_file)
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
