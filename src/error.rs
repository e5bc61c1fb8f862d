//! Pipeline-level error type.
//!
//! Each module keeps its own error enum. The pipeline wraps whichever one a
//! step produced in [`PipelineError::Stage`], tagged with the
//! [`PipelineStage`] that failed.

use crate::archive::ArchiveError;
use crate::build_info::BuildInfoError;
use crate::discovery::DiscoveryError;
use crate::engine::EngineError;
use crate::lock::LockError;
use crate::manifest::ManifestError;
use crate::orchestration::OrchestrationError;
use crate::stager::StageError;
use std::fmt;
use thiserror::Error;

/// Steps of the build pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Parse and structurally validate the manifest.
    Validate,
    /// Check local source layouts and definitions.
    ValidateLocalSources,
    /// Create the workspace and copy local sources.
    StageWorkspace,
    /// Run the image build engine.
    Build,
    /// Discover candidates and pin versions.
    ResolveLocks,
    /// Write build metadata and copy the output tree.
    Finalize,
}

impl PipelineStage {
    /// Short lowercase label used in messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::ValidateLocalSources => "validate local sources",
            Self::StageWorkspace => "stage workspace",
            Self::Build => "build",
            Self::ResolveLocks => "resolve locks",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The module error behind a failed stage.
#[derive(Debug, Error)]
pub enum StageFailure {
    /// Manifest loading or validation failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// Workspace staging failed.
    #[error(transparent)]
    Stage(#[from] StageError),
    /// Build parameters could not be assembled.
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
    /// The build engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Candidate discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// Lock resolution or writing failed.
    #[error(transparent)]
    Lock(#[from] LockError),
    /// Build metadata could not be written.
    #[error(transparent)]
    BuildInfo(#[from] BuildInfoError),
    /// Copying build output failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Errors returned by [`run_pipeline`](crate::pipeline::run_pipeline).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A pipeline stage failed; later stages did not run.
    #[error("{stage} failed: {source}")]
    Stage {
        /// The stage that failed.
        stage: PipelineStage,
        /// What went wrong.
        #[source]
        source: StageFailure,
    },
}

impl PipelineError {
    /// Return the stage that failed.
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Stage { stage, .. } => *stage,
        }
    }

    /// Return the underlying module error.
    #[must_use]
    pub fn failure(&self) -> &StageFailure {
        match self {
            Self::Stage { source, .. } => source,
        }
    }

    /// Adapter for `map_err` that tags a module error with `stage`.
    pub fn at<E>(stage: PipelineStage) -> impl FnOnce(E) -> Self
    where
        E: Into<StageFailure>,
    {
        move |err| Self::Stage {
            stage,
            source: err.into(),
        }
    }
}

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;
