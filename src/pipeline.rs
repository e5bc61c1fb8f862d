//! End-to-end build pipeline.
//!
//! [`run_pipeline`] drives one build through a fixed sequence of stages:
//! validate, classify, validate local sources, stage the workspace, build,
//! and resolve locks. The first failure ends the run. Build parameters are
//! checked during validation, so nothing is staged for a build that could
//! never start. The workspace is registered for interrupt cleanup from the
//! moment it is created and is removed whether the run succeeds or not.

use crate::archive::copy_dir;
use crate::build_info::BuildInfo;
use crate::cancel::CleanupRegistry;
use crate::classifier::classify;
use crate::dirs::BaseDirs;
use crate::discovery::{DiscoveryScope, PolicyDiscovery};
use crate::engine::BuildEngine;
use crate::error::{PipelineError, PipelineStage, Result};
use crate::lock::{resolve_manifest, write_lock_file};
use crate::manifest::{BuildManifest, manifest_dir, validate, validate_local_sources};
use crate::orchestration::{BuildOptions, BuildOrchestrationConfig};
use crate::output::{BuildSummary, Progress};
use crate::stager::{Stager, Workspace};
use camino::Utf8Path;
use std::io::Write;

/// Inputs for one pipeline run.
pub struct PipelineContext<'a> {
    /// Path of the build manifest.
    pub manifest_path: &'a Utf8Path,
    /// Operator build settings.
    pub options: &'a BuildOptions,
    /// Locates the directory build workspaces are created under.
    pub dirs: &'a dyn BaseDirs,
    /// Registry the workspace is added to for as long as it exists.
    pub cleanup: &'a CleanupRegistry,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Run the build pipeline.
///
/// Progress is written to `stderr` unless the context is quiet. On success
/// the lock file sits beside the manifest and, when an output directory was
/// requested, the workspace `output/` tree (including `build-info.json`) has
/// been copied there.
///
/// # Errors
///
/// Returns [`PipelineError::Stage`] naming the first stage that failed.
pub fn run_pipeline(
    context: &PipelineContext<'_>,
    engine: &dyn BuildEngine,
    discovery: &dyn PolicyDiscovery,
    stderr: &mut dyn Write,
) -> Result<BuildSummary> {
    let mut progress = Progress::new(stderr, context.quiet);
    let source_dir = manifest_dir(context.manifest_path);

    progress.line("[1/6] Validating build file");
    let manifest = BuildManifest::load(context.manifest_path)
        .map_err(PipelineError::at(PipelineStage::Validate))?;
    validate(&manifest, &source_dir).map_err(PipelineError::at(PipelineStage::Validate))?;
    BuildOrchestrationConfig::check(context.options, &manifest, &source_dir)
        .map_err(PipelineError::at(PipelineStage::Validate))?;
    progress.line(format!(
        "  Loaded build file with {} policies",
        manifest.policies.len()
    ));

    progress.line("[2/6] Classifying policies");
    let classified = classify(&manifest);
    progress.line(format!("  Local policies:  {}", classified.local.len()));
    progress.line(format!("  Remote policies: {}", classified.remote.len()));

    progress.line("[3/6] Validating local policies");
    let definitions = validate_local_sources(&manifest, &source_dir)
        .map_err(PipelineError::at(PipelineStage::ValidateLocalSources))?;
    for definition in &definitions {
        log::debug!("local policy '{}' passed validation", definition.name);
    }

    progress.line("[4/6] Preparing workspace");
    let mut workspace = Stager::from_dirs(context.dirs)
        .map(|stager| stager.with_cleanup(context.cleanup.clone()))
        .and_then(|stager| stager.stage(context.manifest_path))
        .map_err(PipelineError::at(PipelineStage::StageWorkspace))?;
    progress.line(format!("  Workspace ready: {}", workspace.root()));

    let outcome = build_in_workspace(
        context,
        &manifest,
        &source_dir,
        &workspace,
        engine,
        discovery,
        &mut progress,
    );
    workspace.cleanup();
    outcome
}

fn build_in_workspace(
    context: &PipelineContext<'_>,
    manifest: &BuildManifest,
    source_dir: &Utf8Path,
    workspace: &Workspace,
    engine: &dyn BuildEngine,
    discovery: &dyn PolicyDiscovery,
    progress: &mut Progress<'_>,
) -> Result<BuildSummary> {
    progress.line("[5/6] Building gateway images");
    let config =
        BuildOrchestrationConfig::resolve(context.options, manifest, source_dir, workspace)
            .map_err(PipelineError::at(PipelineStage::Build))?;
    progress.line(format!("  Builder:    {}", config.builder_image));
    progress.line(format!("  Controller: {}", config.controller_image));
    progress.line(format!("  Runtime:    {}", config.runtime_image));
    engine
        .build(&config, &mut *progress)
        .map_err(PipelineError::at(PipelineStage::Build))?;

    progress.line("[6/6] Resolving policy versions");
    let scope = discovery_scope(manifest, source_dir, workspace);
    let candidates = discovery
        .discover(&scope)
        .map_err(PipelineError::at(PipelineStage::ResolveLocks))?;
    let lock = resolve_manifest(manifest, source_dir, &candidates)
        .map_err(PipelineError::at(PipelineStage::ResolveLocks))?;
    let lock_file = write_lock_file(context.manifest_path, &lock)
        .map_err(PipelineError::at(PipelineStage::ResolveLocks))?;
    progress.line(format!("  Lock file written: {lock_file}"));

    let output_dir = workspace.output_dir();
    let reported_output = config.output_copy_dir.as_deref().unwrap_or(&output_dir);
    BuildInfo::new(&lock, reported_output)
        .write_to(&output_dir)
        .map_err(PipelineError::at(PipelineStage::Finalize))?;
    if let Some(destination) = &config.output_copy_dir {
        copy_dir(output_dir.as_std_path(), destination.as_std_path())
            .map_err(PipelineError::at(PipelineStage::Finalize))?;
    }

    Ok(BuildSummary {
        runtime_image_tag: config.runtime_image_tag(),
        controller_image_tag: config.controller_image_tag(),
        gateway_name: config.gateway_name,
        gateway_version: config.gateway_version,
        pushed: config.push,
        platform: config.platform,
        policy_count: lock.policies.len(),
        lock_file,
        output_copy_dir: config.output_copy_dir,
    })
}

/// Local sources are searched where the manifest points; everything else
/// is expected in the build output.
fn discovery_scope(
    manifest: &BuildManifest,
    source_dir: &Utf8Path,
    workspace: &Workspace,
) -> DiscoveryScope {
    manifest
        .policies
        .iter()
        .filter_map(|entry| entry.source.resolve_local(source_dir))
        .fold(DiscoveryScope::new(), DiscoveryScope::with_root)
        .with_root(workspace.output_dir())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
