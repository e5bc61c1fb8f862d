//! Policy builder CLI entrypoint.
//!
//! This binary validates a gateway build file, stages its local policies
//! into an ephemeral workspace, runs the image build engine, and pins every
//! policy in `build-lock.yaml` beside the build file.

use clap::Parser;
use policy_builder::cancel::{CleanupRegistry, install_ctrlc_handler};
use policy_builder::cli::{Cli, CliError};
use policy_builder::dirs::SystemBaseDirs;
use policy_builder::discovery::DefinitionScanner;
use policy_builder::error::PipelineError;
use policy_builder::output::write_stderr_line;
use policy_builder::pipeline::{PipelineContext, run_pipeline};
use std::io::Write;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Cli(#[from] CliError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<(), RunError> {
    let manifest_path = cli.build_file_path()?;

    let cleanup = CleanupRegistry::new();
    if let Err(err) = install_ctrlc_handler(&cleanup) {
        log::warn!("interrupt handler not installed; workspaces may be left behind: {err}");
    }

    let options = cli.build_options();
    let context = PipelineContext {
        manifest_path: &manifest_path,
        options: &options,
        dirs: &SystemBaseDirs,
        cleanup: &cleanup,
        quiet: cli.quiet,
    };
    let summary = run_pipeline(&context, &cli.build_engine(), &DefinitionScanner, stderr)?;

    if !cli.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(stderr, summary.display_text());
    }
    Ok(())
}

fn filter_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbosity: u8) {
    if let Err(err) = try_init_logging(verbosity) {
        log::debug!("keeping the existing log subscriber: {err}");
    }
}

fn try_init_logging(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for_verbosity(verbosity)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}

fn exit_code_for_run_result(result: Result<(), RunError>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_error_chain(stderr, &err);
            1
        }
    }
}

/// Print `err` and each distinct cause beneath it.
fn write_error_chain(stderr: &mut dyn Write, err: &dyn std::error::Error) {
    let mut shown = err.to_string();
    write_stderr_line(stderr, format!("error: {shown}"));
    let mut cause = err.source();
    while let Some(source) = cause {
        let message = source.to_string();
        if !shown.contains(&message) {
            write_stderr_line(stderr, format!("  caused by: {message}"));
            shown = message;
        }
        cause = source.source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use policy_builder::error::PipelineStage;
    use policy_builder::manifest::ManifestError;
    use rstest::rstest;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = RunError::Cli(CliError::BuildFileMissing {
            path: Utf8PathBuf::from("/srv/gateway"),
        });

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.starts_with("error: build.yaml not found in /srv/gateway"));
    }

    #[test]
    fn repeated_causes_are_not_printed_twice() {
        let err = RunError::Pipeline(PipelineError::at(PipelineStage::Validate)(
            ManifestError::EmptyPolicyList,
        ));

        let mut stderr = Vec::new();
        exit_code_for_run_result(Err(err), &mut stderr);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert_eq!(stderr_text.lines().count(), 1, "{stderr_text}");
        assert!(stderr_text.starts_with("error: validate failed: "));
    }

    #[rstest]
    #[case::default(0, "warn")]
    #[case::verbose(1, "info")]
    #[case::debug(2, "debug")]
    #[case::trace(5, "trace")]
    fn verbosity_raises_log_filter(#[case] verbosity: u8, #[case] expected: &str) {
        assert_eq!(filter_for_verbosity(verbosity), expected);
    }

    #[test]
    fn second_logging_init_reports_existing_subscriber() {
        // The first call may lose to another test; the second never wins.
        try_init_logging(0).ok();
        assert!(try_init_logging(1).is_err());
        init_logging(2);
    }
}
