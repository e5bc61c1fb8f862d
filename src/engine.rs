//! External image build engine.
//!
//! The pipeline hands a [`BuildOrchestrationConfig`] to a [`BuildEngine`]
//! and blocks until it returns. [`ProcessBuildEngine`] runs a configured
//! program inside the workspace, passes the configuration through
//! `POLICY_BUILDER_*` environment variables, and copies the program's
//! output line by line into the build log and the caller's echo writer.

use crate::orchestration::BuildOrchestrationConfig;
use crate::output::write_stderr_line;
use crate::stager::OUTPUT_DIR;
use camino::Utf8PathBuf;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Sender};
use thiserror::Error;

/// Program run by [`ProcessBuildEngine`] when none is configured.
pub const DEFAULT_ENGINE_PROGRAM: &str = "docker-build-gateway";

/// Errors raised by a build engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine program could not be started.
    #[error("failed to start build engine '{program}': {source}")]
    Spawn {
        /// The program that was run.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The build log could not be written.
    #[error("failed to write build log {path}: {source}")]
    Log {
        /// Path of the build log.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Waiting for the engine failed.
    #[error("failed to wait for build engine '{program}': {source}")]
    Wait {
        /// The program that was run.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The engine exited unsuccessfully.
    #[error("build engine failed ({status}); see {log_file} for details")]
    Failed {
        /// Exit status description.
        status: String,
        /// Path of the build log.
        log_file: Utf8PathBuf,
    },
}

/// Runs an image build for a configuration.
#[cfg_attr(test, mockall::automock)]
pub trait BuildEngine {
    /// Build images as described by `config`, blocking until done.
    ///
    /// Output the engine produces is echoed line by line to `echo`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the build cannot run or fails.
    fn build(
        &self,
        config: &BuildOrchestrationConfig,
        echo: &mut dyn Write,
    ) -> Result<(), EngineError>;
}

/// Environment passed to the engine program.
///
/// Optional settings are omitted when unset; flags are `"true"` or
/// `"false"`.
#[must_use]
pub fn engine_environment(config: &BuildOrchestrationConfig) -> Vec<(&'static str, String)> {
    let flag = |value: bool| value.to_string();

    let mut env = vec![
        ("POLICY_BUILDER_WORKSPACE", config.workspace_root.to_string()),
        (
            "POLICY_BUILDER_OUTPUT_DIR",
            config.workspace_root.join(OUTPUT_DIR).into_string(),
        ),
        ("POLICY_BUILDER_GATEWAY_NAME", config.gateway_name.clone()),
        ("POLICY_BUILDER_GATEWAY_VERSION", config.gateway_version.clone()),
        ("POLICY_BUILDER_BUILDER_IMAGE", config.builder_image.clone()),
        ("POLICY_BUILDER_CONTROLLER_IMAGE", config.controller_image.clone()),
        ("POLICY_BUILDER_RUNTIME_IMAGE", config.runtime_image.clone()),
        ("POLICY_BUILDER_REPOSITORY", config.repository.clone()),
        ("POLICY_BUILDER_IMAGE_TAG", config.image_tag.clone()),
        ("POLICY_BUILDER_RUNTIME_IMAGE_TAG", config.runtime_image_tag()),
        (
            "POLICY_BUILDER_CONTROLLER_IMAGE_TAG",
            config.controller_image_tag(),
        ),
        ("POLICY_BUILDER_PUSH", flag(config.push)),
        ("POLICY_BUILDER_NO_CACHE", flag(config.no_cache)),
        ("POLICY_BUILDER_LOG_FILE", config.log_file.to_string()),
    ];
    if let Some(platform) = &config.platform {
        env.push(("POLICY_BUILDER_PLATFORM", platform.clone()));
    }
    env
}

/// Runs an external program as the build engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessBuildEngine {
    program: String,
    args: Vec<String>,
}

impl ProcessBuildEngine {
    /// Create an engine running `program` with `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Return the program this engine runs.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for ProcessBuildEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_PROGRAM, Vec::new())
    }
}

impl BuildEngine for ProcessBuildEngine {
    fn build(
        &self,
        config: &BuildOrchestrationConfig,
        echo: &mut dyn Write,
    ) -> Result<(), EngineError> {
        let log_error = |source| EngineError::Log {
            path: config.log_file.clone(),
            source,
        };
        if let Some(parent) = config.log_file.parent() {
            fs::create_dir_all(parent).map_err(log_error)?;
        }
        let mut log = fs::File::create(&config.log_file).map_err(log_error)?;

        log::info!("running build engine '{}'", self.program);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(config.workspace_root.as_std_path())
            .envs(engine_environment(config))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let tee_result = std::thread::scope(|scope| {
            let (lines, received) = mpsc::channel();
            let readers = [
                stdout.map(|pipe| {
                    let lines = lines.clone();
                    scope.spawn(move || forward_lines(pipe, &lines))
                }),
                stderr.map(|pipe| {
                    let lines = lines.clone();
                    scope.spawn(move || forward_lines(pipe, &lines))
                }),
            ];
            drop(lines);

            // Keep draining after a log failure so the engine never blocks on
            // a full pipe.
            let mut recorded = Ok(());
            for line in received {
                if recorded.is_ok() {
                    recorded = record_line(&mut log, echo, &line);
                }
            }
            let read = readers
                .into_iter()
                .flatten()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(io::Error::other("log reader thread panicked")))
                })
                .collect::<io::Result<()>>();
            recorded.and(read)
        });

        let status = child.wait().map_err(|source| EngineError::Wait {
            program: self.program.clone(),
            source,
        })?;
        tee_result.map_err(log_error)?;
        check_status(status, config)
    }
}

fn check_status(status: ExitStatus, config: &BuildOrchestrationConfig) -> Result<(), EngineError> {
    if status.success() {
        log::info!("build engine finished; log at {}", config.log_file);
        return Ok(());
    }
    Err(EngineError::Failed {
        status: status.to_string(),
        log_file: config.log_file.clone(),
    })
}

/// Send each line of `pipe` to `lines` until end of input.
fn forward_lines(pipe: impl Read, lines: &Sender<Vec<u8>>) -> io::Result<()> {
    let mut reader = BufReader::new(pipe);
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        if lines.send(line).is_err() {
            // Receiver gone; nothing is listening any more.
            return Ok(());
        }
    }
}

/// Append `line` to the log and echo it.
///
/// Only log failures are reported; echo failures are ignored.
fn record_line(log: &mut impl Write, echo: &mut dyn Write, line: &[u8]) -> io::Result<()> {
    let text = line.strip_suffix(b"\n").unwrap_or(line);
    log.write_all(text)?;
    log.write_all(b"\n")?;
    write_stderr_line(echo, String::from_utf8_lossy(text));
    Ok(())
}
