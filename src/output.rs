//! Progress and summary formatting for the CLI.
//!
//! Everything user-facing goes to stderr through [`write_stderr_line`], so
//! tests can capture it in a `Vec<u8>`.

use camino::Utf8PathBuf;
use std::io::{self, Write};

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Writes progress lines unless quiet mode is on.
///
/// `Progress` is also a [`Write`] sink, which is how build engine output
/// reaches the terminal. Writes made while quiet are accepted and dropped.
pub struct Progress<'a> {
    stderr: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Progress<'a> {
    /// Wrap `stderr`; nothing is written when `quiet` is set.
    #[must_use]
    pub fn new(stderr: &'a mut dyn Write, quiet: bool) -> Self {
        Self { stderr, quiet }
    }

    /// Write one progress line.
    pub fn line(&mut self, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(self.stderr, message);
        }
    }
}

impl Write for Progress<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.quiet {
            return Ok(buf.len());
        }
        self.stderr.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.stderr.flush()
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Gateway name used in image tags.
    pub gateway_name: String,
    /// Gateway platform version.
    pub gateway_version: String,
    /// Tag of the built runtime image.
    pub runtime_image_tag: String,
    /// Tag of the built controller image.
    pub controller_image_tag: String,
    /// Whether images were pushed.
    pub pushed: bool,
    /// Target platform, if one was requested.
    pub platform: Option<String>,
    /// Number of policies in the build.
    pub policy_count: usize,
    /// Path of the written lock file.
    pub lock_file: Utf8PathBuf,
    /// Directory the output tree was copied to, if any.
    pub output_copy_dir: Option<Utf8PathBuf>,
}

impl BuildSummary {
    /// Format the summary for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let plural = if self.policy_count == 1 {
            "policy"
        } else {
            "policies"
        };
        let mut lines = vec![
            format!(
                "Built gateway {} {} with {} {plural}",
                self.gateway_name, self.gateway_version, self.policy_count
            ),
            String::new(),
            "Images:".to_owned(),
            format!("  runtime:    {}", self.runtime_image_tag),
            format!("  controller: {}", self.controller_image_tag),
        ];

        if let Some(platform) = &self.platform {
            lines.push(format!("Platform: {platform}"));
        }
        if self.pushed {
            lines.push("Images were pushed to the repository.".to_owned());
        } else {
            lines.push("Images are available in the local image store.".to_owned());
        }
        lines.push(format!("Lock file: {}", self.lock_file));
        if let Some(dir) = &self.output_copy_dir {
            lines.push(format!("Build output copied to {dir}"));
        }

        lines.join("\n")
    }
}
