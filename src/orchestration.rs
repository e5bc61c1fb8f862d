//! Parameters handed to the image build engine.
//!
//! [`BuildOrchestrationConfig`] is assembled once from the command-line
//! options, the manifest, and the staged workspace. It is the only thing the
//! build engine receives; nothing here starts a process.

use crate::manifest::{BuildManifest, GatewayImages};
use crate::stager::Workspace;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Default repository images are tagged into.
pub const DEFAULT_REPOSITORY: &str = "ghcr.io/wso2/api-platform";

/// Registry path the default base images are pulled from.
const DEFAULT_IMAGE_REGISTRY: &str = "ghcr.io/wso2/api-platform";

/// File name of the build engine log inside the workspace `logs/` directory.
pub const BUILD_LOG_FILE: &str = "build.log";

/// The three gateway images a build produces or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayImage {
    /// Image that compiles policies into the gateway.
    Builder,
    /// Control plane image.
    Controller,
    /// Data plane image.
    Runtime,
}

impl GatewayImage {
    /// Repository suffix of the image, e.g. `gateway-runtime`.
    #[must_use]
    pub fn component(self) -> &'static str {
        match self {
            Self::Builder => "gateway-builder",
            Self::Controller => "gateway-controller",
            Self::Runtime => "gateway-runtime",
        }
    }

    /// Default base image reference for `version`.
    #[must_use]
    pub fn default_reference(self, version: &str) -> String {
        format!("{DEFAULT_IMAGE_REGISTRY}/{}:{version}", self.component())
    }

    fn manifest_override(self, images: &GatewayImages) -> Option<&str> {
        match self {
            Self::Builder => images.builder.as_deref(),
            Self::Controller => images.controller.as_deref(),
            Self::Runtime => images.runtime.as_deref(),
        }
        .filter(|reference| !reference.trim().is_empty())
    }
}

/// Build settings chosen by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Gateway name; defaults to the manifest directory's name.
    pub gateway_name: Option<String>,
    /// Image repository; defaults to [`DEFAULT_REPOSITORY`].
    pub repository: Option<String>,
    /// Push images after building.
    pub push: bool,
    /// Disable the engine's build cache.
    pub no_cache: bool,
    /// Target platform, e.g. `linux/amd64`.
    pub platform: Option<String>,
    /// Directory the workspace `output/` tree is copied to afterwards.
    pub output_dir: Option<Utf8PathBuf>,
    /// Builder image override.
    pub builder_image: Option<String>,
    /// Controller image override.
    pub controller_image: Option<String>,
    /// Runtime image override.
    pub runtime_image: Option<String>,
}

impl BuildOptions {
    fn image_override(&self, image: GatewayImage) -> Option<&str> {
        match image {
            GatewayImage::Builder => self.builder_image.as_deref(),
            GatewayImage::Controller => self.controller_image.as_deref(),
            GatewayImage::Runtime => self.runtime_image.as_deref(),
        }
        .filter(|reference| !reference.trim().is_empty())
    }
}

/// Errors raised while assembling build parameters.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Neither `gateway.version` nor the manifest `version` is set.
    #[error("gateway version is required: set gateway.version (or version) in the build file")]
    MissingGatewayVersion,

    /// No gateway name was given and none could be derived.
    #[error("cannot derive a gateway name from {path}; pass --name")]
    UnnamedGateway {
        /// The manifest directory.
        path: Utf8PathBuf,
    },
}

/// Everything the build engine needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOrchestrationConfig {
    /// Staged workspace root.
    pub workspace_root: Utf8PathBuf,
    /// Gateway name used in image tags.
    pub gateway_name: String,
    /// Gateway platform version.
    pub gateway_version: String,
    /// Builder base image.
    pub builder_image: String,
    /// Controller base image.
    pub controller_image: String,
    /// Runtime base image.
    pub runtime_image: String,
    /// Target repository.
    pub repository: String,
    /// `repository/name:version`.
    pub image_tag: String,
    /// Push images after building.
    pub push: bool,
    /// Disable the build cache.
    pub no_cache: bool,
    /// Target platform, if any.
    pub platform: Option<String>,
    /// Log file the engine output is written to.
    pub log_file: Utf8PathBuf,
    /// Directory the output tree is copied to afterwards, if any.
    pub output_copy_dir: Option<Utf8PathBuf>,
}

impl BuildOrchestrationConfig {
    /// Check that a configuration can be assembled, before any workspace
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns the same errors [`Self::resolve`] would.
    pub fn check(
        options: &BuildOptions,
        manifest: &BuildManifest,
        manifest_dir: &Utf8Path,
    ) -> Result<(), OrchestrationError> {
        gateway_version(manifest)?;
        gateway_name(options, manifest_dir)?;
        Ok(())
    }

    /// Assemble the configuration.
    ///
    /// `manifest_dir` is the directory holding the original manifest; its
    /// name becomes the gateway name when none is given.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::MissingGatewayVersion`] if no version
    /// is set, or [`OrchestrationError::UnnamedGateway`] if no name can be
    /// derived.
    pub fn resolve(
        options: &BuildOptions,
        manifest: &BuildManifest,
        manifest_dir: &Utf8Path,
        workspace: &Workspace,
    ) -> Result<Self, OrchestrationError> {
        Self::resolve_in(options, manifest, manifest_dir, workspace.root())
    }

    /// [`Self::resolve`] against a bare workspace root.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve`].
    pub fn resolve_in(
        options: &BuildOptions,
        manifest: &BuildManifest,
        manifest_dir: &Utf8Path,
        workspace_root: &Utf8Path,
    ) -> Result<Self, OrchestrationError> {
        let gateway_version = gateway_version(manifest)?;
        let gateway_name = gateway_name(options, manifest_dir)?;
        let repository = options
            .repository
            .as_deref()
            .map(|repo| repo.trim().trim_end_matches('/'))
            .filter(|repo| !repo.is_empty())
            .unwrap_or(DEFAULT_REPOSITORY)
            .to_owned();

        let images = manifest
            .gateway
            .as_ref()
            .map(|gateway| gateway.images.clone())
            .unwrap_or_default();
        let pick = |image: GatewayImage| {
            options
                .image_override(image)
                .or_else(|| image.manifest_override(&images))
                .map_or_else(|| image.default_reference(&gateway_version), str::to_owned)
        };

        Ok(Self {
            workspace_root: workspace_root.to_owned(),
            image_tag: format!("{repository}/{gateway_name}:{gateway_version}"),
            builder_image: pick(GatewayImage::Builder),
            controller_image: pick(GatewayImage::Controller),
            runtime_image: pick(GatewayImage::Runtime),
            gateway_name,
            gateway_version,
            repository,
            push: options.push,
            no_cache: options.no_cache,
            platform: options
                .platform
                .clone()
                .filter(|platform| !platform.trim().is_empty()),
            log_file: workspace_root
                .join(crate::stager::LOGS_DIR)
                .join(BUILD_LOG_FILE),
            output_copy_dir: options.output_dir.clone(),
        })
    }

    /// Tag of the produced image for `image`.
    #[must_use]
    pub fn image_tag_for(&self, image: GatewayImage) -> String {
        format!(
            "{}/{}-{}:{}",
            self.repository,
            self.gateway_name,
            image.component(),
            self.gateway_version
        )
    }

    /// Tag of the produced runtime image.
    #[must_use]
    pub fn runtime_image_tag(&self) -> String {
        self.image_tag_for(GatewayImage::Runtime)
    }

    /// Tag of the produced controller image.
    #[must_use]
    pub fn controller_image_tag(&self) -> String {
        self.image_tag_for(GatewayImage::Controller)
    }
}

fn gateway_version(manifest: &BuildManifest) -> Result<String, OrchestrationError> {
    manifest
        .gateway
        .as_ref()
        .and_then(|gateway| gateway.version.as_deref())
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .or_else(|| Some(manifest.version.trim()).filter(|version| !version.is_empty()))
        .map(str::to_owned)
        .ok_or(OrchestrationError::MissingGatewayVersion)
}

fn gateway_name(
    options: &BuildOptions,
    manifest_dir: &Utf8Path,
) -> Result<String, OrchestrationError> {
    match options.gateway_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_owned()),
        _ => derive_gateway_name(manifest_dir),
    }
}

fn derive_gateway_name(manifest_dir: &Utf8Path) -> Result<String, OrchestrationError> {
    let absolute = std::path::absolute(manifest_dir)
        .ok()
        .and_then(|absolute| Utf8PathBuf::from_path_buf(absolute).ok())
        .unwrap_or_else(|| manifest_dir.to_owned());
    let absolute = absolute.canonicalize_utf8().unwrap_or(absolute);
    absolute
        .file_name()
        .map(str::to_owned)
        .ok_or_else(|| OrchestrationError::UnnamedGateway { path: absolute })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn manifest() -> BuildManifest {
        BuildManifest::parse(
            b"version: 0.9.0\ngateway:\n  version: 1.0.0\n  images:\n    controller: registry.example.com/controller:pinned\npolicies:\n  - name: cors\n",
        )
        .expect("valid manifest")
    }

    fn resolve(options: &BuildOptions, manifest: &BuildManifest) -> BuildOrchestrationConfig {
        BuildOrchestrationConfig::resolve_in(
            options,
            manifest,
            Utf8Path::new("/work/edge-gateway"),
            Utf8Path::new("/home/u/.policy-builder/.tmp/gateway-image-build-abc123"),
        )
        .expect("config resolves")
    }

    #[rstest]
    fn defaults_follow_manifest(manifest: BuildManifest) {
        let config = resolve(&BuildOptions::default(), &manifest);

        assert_eq!(config.gateway_name, "edge-gateway");
        assert_eq!(config.gateway_version, "1.0.0");
        assert_eq!(config.repository, DEFAULT_REPOSITORY);
        assert_eq!(
            config.image_tag,
            "ghcr.io/wso2/api-platform/edge-gateway:1.0.0"
        );
        assert_eq!(
            config.builder_image,
            "ghcr.io/wso2/api-platform/gateway-builder:1.0.0"
        );
        assert_eq!(config.controller_image, "registry.example.com/controller:pinned");
        assert_eq!(
            config.runtime_image,
            "ghcr.io/wso2/api-platform/gateway-runtime:1.0.0"
        );
        assert!(config.log_file.ends_with("logs/build.log"));
        assert!(config.platform.is_none());
        assert!(!config.push);
    }

    #[rstest]
    fn options_override_everything(manifest: BuildManifest) {
        let options = BuildOptions {
            gateway_name: Some("prod".to_owned()),
            repository: Some("registry.example.com/team/".to_owned()),
            push: true,
            no_cache: true,
            platform: Some("linux/arm64".to_owned()),
            output_dir: Some(Utf8PathBuf::from("/tmp/out")),
            builder_image: Some("b:1".to_owned()),
            controller_image: Some("c:1".to_owned()),
            runtime_image: Some("r:1".to_owned()),
        };
        let config = resolve(&options, &manifest);

        assert_eq!(config.image_tag, "registry.example.com/team/prod:1.0.0");
        assert_eq!(
            (
                config.builder_image.as_str(),
                config.controller_image.as_str(),
                config.runtime_image.as_str()
            ),
            ("b:1", "c:1", "r:1")
        );
        assert_eq!(
            config.runtime_image_tag(),
            "registry.example.com/team/prod-gateway-runtime:1.0.0"
        );
        assert_eq!(
            config.controller_image_tag(),
            "registry.example.com/team/prod-gateway-controller:1.0.0"
        );
        assert_eq!(config.platform.as_deref(), Some("linux/arm64"));
        assert_eq!(config.output_copy_dir, Some(Utf8PathBuf::from("/tmp/out")));
        assert!(config.push && config.no_cache);
    }

    #[test]
    fn manifest_version_is_the_fallback() {
        let manifest =
            BuildManifest::parse(b"version: 2.1.0\npolicies:\n  - name: cors\n").expect("valid");
        let config = resolve(&BuildOptions::default(), &manifest);
        assert_eq!(config.gateway_version, "2.1.0");
        assert_eq!(
            config.controller_image,
            "ghcr.io/wso2/api-platform/gateway-controller:2.1.0"
        );
    }

    #[test]
    fn missing_version_is_an_error() {
        let manifest = BuildManifest::parse(b"policies:\n  - name: cors\n").expect("valid");
        let err = BuildOrchestrationConfig::resolve_in(
            &BuildOptions::default(),
            &manifest,
            Utf8Path::new("/work/gw"),
            Utf8Path::new("/ws"),
        )
        .expect_err("version required");
        assert!(matches!(err, OrchestrationError::MissingGatewayVersion));
    }

    #[test]
    fn check_reports_missing_version_without_a_workspace() {
        let manifest = BuildManifest::parse(b"policies:\n  - name: cors\n").expect("valid");
        let err = BuildOrchestrationConfig::check(
            &BuildOptions::default(),
            &manifest,
            Utf8Path::new("/work/gw"),
        )
        .expect_err("version required");
        assert!(matches!(err, OrchestrationError::MissingGatewayVersion));
    }

    #[rstest]
    fn check_accepts_what_resolve_accepts(manifest: BuildManifest) {
        BuildOrchestrationConfig::check(
            &BuildOptions::default(),
            &manifest,
            Utf8Path::new("/work/edge-gateway"),
        )
        .expect("config checks");
    }

    #[rstest]
    fn check_rejects_an_unnameable_root(manifest: BuildManifest) {
        let err =
            BuildOrchestrationConfig::check(&BuildOptions::default(), &manifest, Utf8Path::new("/"))
                .expect_err("root has no name");
        assert!(matches!(err, OrchestrationError::UnnamedGateway { .. }));
    }
}
