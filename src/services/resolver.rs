// src/services/resolver.rs

//! Manifest resolution for new releases.
//!
//! Resolution is a small state machine. Each state names the document it
//! needs (`ResolveState::request`); the driver loads it and hands it to the
//! pure transition (`ResolveState::advance`), which returns the next state
//! plus a partial result. Partials may ask for follow-up lookups (build
//! metadata files, kernel Makefile, sub-manifests) that the driver performs
//! afterwards, in order.
//!
//! Resolution is best effort: anything unreachable or unparseable leaves the
//! corresponding field empty and never fails the release.

use std::collections::{BTreeSet, VecDeque};

use regex::Regex;

use crate::error::Result;
use crate::models::{
    Config, EnrichmentResult, ManifestLink, ProjectKind, ResolverConfig, UpstreamConfig,
};
use crate::services::ExclusionRuleSet;
use crate::services::manifest::{self, KernelRef};
use crate::utils::HttpSource;

/// Where the resolution of one release stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveState {
    Unresolved,
    PlatformProbe { manifest_url: String },
    SystemProbe { manifest_url: String },
    VendorFanout { manifest_url: String },
    Resolved,
}

/// Document a state needs before it can advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,

    /// `false` when only existence matters
    pub fetch: bool,
}

/// What the driver found for a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Unavailable,
    Exists,
    Text(String),
}

/// Which metadata a referenced sub-manifest contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubManifestRole {
    /// Android version, security patch, build id, chipsets
    System,
    /// Kernel version
    Kernel,
    /// Link only
    Other,
}

/// Lookup requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    BuildMetadata { revision: String },
    Kernel(KernelRef),
    SubManifest {
        label: String,
        url: String,
        role: SubManifestRole,
    },
}

/// Output of one transition or follow-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partial {
    pub enrichment: EnrichmentResult,
    pub follow_ups: Vec<FollowUp>,
}

/// Everything a transition needs to know about the release being resolved.
pub struct ResolveContext<'a> {
    pub tag: &'a str,
    pub project: ProjectKind,
    upstream: &'a UpstreamConfig,
    settings: &'a ResolverConfig,
    kernel_pattern: &'a Regex,
    excluded: BTreeSet<String>,
}

impl ResolveContext<'_> {
    fn is_le(&self) -> bool {
        self.settings.is_le_tag(self.tag)
    }

    fn le_manifest_url(&self) -> String {
        self.upstream
            .manifest_for(&self.settings.le_manifest_project, self.tag)
    }

    fn manifest_url(&self, project: &str) -> String {
        self.upstream.manifest_for(project, self.tag)
    }

    fn filter_chipsets(&self, found: BTreeSet<String>) -> BTreeSet<String> {
        found
            .into_iter()
            .filter(|c| !self.excluded.contains(c))
            .collect()
    }

    /// Build metadata, chipsets, and kernel of a platform or system manifest.
    fn single_manifest(&self, label: &str, url: &str, text: &str) -> Partial {
        let mut partial = self.system_metadata(text);
        partial
            .enrichment
            .manifests
            .insert(0, ManifestLink::new(label, url));
        partial.follow_ups.extend(self.kernel_metadata(text).follow_ups);
        partial
    }

    /// Build metadata and chipsets of a system-style manifest.
    fn system_metadata(&self, text: &str) -> Partial {
        let mut partial = Partial::default();
        partial.enrichment.chipsets = self.filter_chipsets(manifest::chipsets(text));
        if let Some(revision) = manifest::project_revision(text, &self.settings.build_project) {
            partial.follow_ups.push(FollowUp::BuildMetadata { revision });
        }
        partial
    }

    /// Kernel reference of a manifest.
    fn kernel_metadata(&self, text: &str) -> Partial {
        let mut partial = Partial::default();
        if let Some(kernel) = manifest::kernel_project(text, self.kernel_pattern) {
            partial.follow_ups.push(FollowUp::Kernel(kernel));
        }
        partial
    }

    /// Vendor link, its chipsets, and one follow-up per referenced manifest.
    fn vendor_fanout(&self, url: &str, text: &str) -> Partial {
        let mut partial = Partial::default();
        partial
            .enrichment
            .manifests
            .push(ManifestLink::new("Vendor", url));
        partial.enrichment.chipsets = self.filter_chipsets(manifest::chipsets(text));

        for reference in manifest::sub_manifests(text) {
            let role = if reference.project == self.settings.system_manifest_project {
                SubManifestRole::System
            } else if reference.project == self.settings.kernel_manifest_project {
                SubManifestRole::Kernel
            } else {
                SubManifestRole::Other
            };
            let label = match role {
                SubManifestRole::Kernel => "Kernel".to_string(),
                _ => label_for_project(&reference.project),
            };
            partial.follow_ups.push(FollowUp::SubManifest {
                label,
                url: self.upstream.manifest_for(&reference.project, &reference.tag),
                role,
            });
        }
        partial
    }

    /// Fields read from `version_defaults.mk` and `build_id.mk`.
    fn build_metadata(&self, version_defaults: Option<&str>, build_id: Option<&str>) -> Partial {
        let mut partial = Partial::default();
        if let Some(text) = version_defaults {
            partial.enrichment.security_patch = manifest::security_patch(text);
            partial.enrichment.android_version = manifest::android_version(text);
        }
        partial.enrichment.build_id = build_id.and_then(manifest::build_id);
        partial
    }
}

impl ResolveState {
    /// Document needed before advancing, if any.
    pub fn request(&self, ctx: &ResolveContext<'_>) -> Option<Request> {
        match self {
            ResolveState::Unresolved if ctx.is_le() => Some(Request {
                url: ctx.le_manifest_url(),
                fetch: false,
            }),
            ResolveState::PlatformProbe { manifest_url }
            | ResolveState::SystemProbe { manifest_url }
            | ResolveState::VendorFanout { manifest_url } => Some(Request {
                url: manifest_url.clone(),
                fetch: true,
            }),
            ResolveState::Unresolved | ResolveState::Resolved => None,
        }
    }

    /// Pure transition on the loaded document.
    pub fn advance(self, ctx: &ResolveContext<'_>, document: &Document) -> (ResolveState, Partial) {
        match self {
            ResolveState::Unresolved if ctx.is_le() => {
                let mut partial = Partial::default();
                if *document != Document::Unavailable {
                    partial
                        .enrichment
                        .manifests
                        .push(ManifestLink::new("Manifest", ctx.le_manifest_url()));
                }
                (ResolveState::Resolved, partial)
            }
            ResolveState::Unresolved => {
                let next = match ctx.project {
                    ProjectKind::Platform => ResolveState::PlatformProbe {
                        manifest_url: ctx.manifest_url(&ctx.settings.platform_manifest_project),
                    },
                    ProjectKind::System => ResolveState::SystemProbe {
                        manifest_url: ctx.manifest_url(&ctx.settings.system_manifest_project),
                    },
                    ProjectKind::Vendor => ResolveState::VendorFanout {
                        manifest_url: ctx.manifest_url(&ctx.settings.vendor_manifest_project),
                    },
                    ProjectKind::Wiki | ProjectKind::Other => ResolveState::Resolved,
                };
                (next, Partial::default())
            }
            ResolveState::PlatformProbe { manifest_url } => {
                let partial = match document {
                    Document::Text(text) => ctx.single_manifest("Platform", &manifest_url, text),
                    _ => Partial::default(),
                };
                (ResolveState::Resolved, partial)
            }
            ResolveState::SystemProbe { manifest_url } => {
                let partial = match document {
                    Document::Text(text) => ctx.single_manifest("System", &manifest_url, text),
                    _ => Partial::default(),
                };
                (ResolveState::Resolved, partial)
            }
            ResolveState::VendorFanout { manifest_url } => {
                let partial = match document {
                    Document::Text(text) => ctx.vendor_fanout(&manifest_url, text),
                    _ => Partial::default(),
                };
                (ResolveState::Resolved, partial)
            }
            ResolveState::Resolved => (ResolveState::Resolved, Partial::default()),
        }
    }
}

/// Display label for a manifest project path, e.g. `clo/la/la/system/manifest` → `System`.
fn label_for_project(project: &str) -> String {
    let segment = project
        .trim_end_matches('/')
        .rsplit('/')
        .find(|s| !s.is_empty() && *s != "manifest")
        .unwrap_or(project);
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolves [`EnrichmentResult`]s through an [`HttpSource`].
pub struct ManifestResolver<'a> {
    source: &'a dyn HttpSource,
    upstream: &'a UpstreamConfig,
    settings: &'a ResolverConfig,
    exclusions: &'a ExclusionRuleSet,
    kernel_pattern: Regex,
}

impl<'a> ManifestResolver<'a> {
    pub fn new(
        source: &'a dyn HttpSource,
        config: &'a Config,
        exclusions: &'a ExclusionRuleSet,
    ) -> Result<Self> {
        Ok(Self {
            source,
            upstream: &config.upstream,
            settings: &config.resolver,
            exclusions,
            kernel_pattern: Regex::new(&config.resolver.kernel_project_pattern)?,
        })
    }

    fn context<'c>(&'c self, tag: &'c str, project: ProjectKind) -> ResolveContext<'c> {
        ResolveContext {
            tag,
            project,
            upstream: self.upstream,
            settings: self.settings,
            kernel_pattern: &self.kernel_pattern,
            excluded: self.exclusions.excluded_chipsets(tag),
        }
    }

    /// Resolve everything derivable for `tag`.
    pub async fn resolve(&self, tag: &str, project: ProjectKind) -> EnrichmentResult {
        let ctx = self.context(tag, project);
        let mut result = EnrichmentResult::default();
        let mut pending = VecDeque::new();

        let mut state = ResolveState::Unresolved;
        while state != ResolveState::Resolved {
            let document = match state.request(&ctx) {
                Some(request) => self.load(&request).await,
                None => Document::Unavailable,
            };
            let (next, partial) = state.advance(&ctx, &document);
            log::debug!("{}: -> {:?}", tag, next);
            result.merge(partial.enrichment);
            pending.extend(partial.follow_ups);
            state = next;
        }

        while let Some(follow_up) = pending.pop_front() {
            let partial = self.follow(&ctx, follow_up).await;
            result.merge(partial.enrichment);
            pending.extend(partial.follow_ups);
        }

        result
    }

    async fn follow(&self, ctx: &ResolveContext<'_>, follow_up: FollowUp) -> Partial {
        match follow_up {
            FollowUp::BuildMetadata { revision } => {
                let name = &self.settings.build_project;
                let version_defaults = self
                    .text(&self.upstream.raw_file_for(name, &revision, &self.settings.version_defaults_path))
                    .await;
                let build_id = self
                    .text(&self.upstream.raw_file_for(name, &revision, &self.settings.build_id_path))
                    .await;
                ctx.build_metadata(version_defaults.as_deref(), build_id.as_deref())
            }
            FollowUp::Kernel(kernel) => {
                let url = self.upstream.raw_file_for(
                    &kernel.name,
                    &kernel.revision,
                    &self.settings.kernel_makefile_path,
                );
                let mut partial = Partial::default();
                partial.enrichment.kernel_version = self
                    .text(&url)
                    .await
                    .and_then(|makefile| manifest::kernel_version(&makefile, kernel.upstream.as_deref()));
                partial
            }
            FollowUp::SubManifest { label, url, role } => {
                let request = Request {
                    url: url.clone(),
                    fetch: role != SubManifestRole::Other,
                };
                let document = self.load(&request).await;
                if document == Document::Unavailable {
                    log::debug!("{}: sub-manifest {} unavailable", ctx.tag, url);
                    return Partial::default();
                }

                let mut partial = match (&document, role) {
                    (Document::Text(text), SubManifestRole::System) => ctx.system_metadata(text),
                    (Document::Text(text), SubManifestRole::Kernel) => ctx.kernel_metadata(text),
                    _ => Partial::default(),
                };
                partial.enrichment.manifests.insert(0, ManifestLink::new(label, url));
                partial
            }
        }
    }

    /// Probe and optionally fetch a manifest.
    async fn load(&self, request: &Request) -> Document {
        if !self.source.head_exists(&request.url).await {
            return Document::Unavailable;
        }
        if !request.fetch {
            return Document::Exists;
        }
        match self.source.get(&request.url).await {
            Ok(fetched) if manifest::looks_like_manifest(&fetched.body) => Document::Text(fetched.body),
            Ok(_) => {
                log::debug!("{} is not a manifest", request.url);
                Document::Unavailable
            }
            Err(e) => {
                log::warn!("Failed to fetch manifest {}: {}", request.url, e);
                Document::Exists
            }
        }
    }

    /// Fetch a plain text file, `None` if unavailable.
    async fn text(&self, url: &str) -> Option<String> {
        match self.source.get(url).await {
            Ok(fetched) => Some(fetched.body),
            Err(e) => {
                log::debug!("Failed to fetch {}: {}", url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExclusionRule;
    use crate::utils::fixtures::FixtureSource;

    const BASE: &str = "https://git.codelinaro.org";

    fn config() -> Config {
        let mut config = Config::default();
        config.exclusions = vec![ExclusionRule {
            pattern: r"^LA\.".into(),
            chipsets: vec!["common".into()],
        }];
        config
    }

    fn platform_manifest(build_revision: &str) -> String {
        format!(
            r#"<manifest>
  <project name="platform/build" path="build/make" revision="{build_revision}"/>
  <project name="kernel/msm-5.10" path="kernel/msm-5.10" revision="kern1" upstream="refs/heads/kernel.lnx.5.10.r1-rel"/>
  <project name="device/qcom/lahaina" path="device/qcom/lahaina" revision="d1"/>
  <project name="device/qcom/common" path="device/qcom/common" revision="d2"/>
</manifest>"#
        )
    }

    const TAG: &str = "LA.UM.9.14.r1-21600-LAHAINA.0";

    fn platform_url() -> String {
        format!("{BASE}/clo/la/platform/manifest/-/raw/release/{TAG}.xml")
    }

    fn platform_fixture(version_defaults: &str, build_id: &str) -> FixtureSource {
        FixtureSource::new()
            .with(platform_url(), platform_manifest("rev42"))
            .with(
                format!("{BASE}/clo/la/platform/build/-/raw/rev42/core/version_defaults.mk"),
                version_defaults,
            )
            .with(
                format!("{BASE}/clo/la/platform/build/-/raw/rev42/core/build_id.mk"),
                build_id,
            )
            .with(
                format!("{BASE}/clo/la/kernel/msm-5.10/-/raw/kern1/Makefile"),
                "VERSION = 5\nPATCHLEVEL = 10\nSUBLEVEL = 198\n",
            )
    }

    #[tokio::test]
    async fn test_platform_resolution_extracts_markers() {
        let config = config();
        let exclusions = ExclusionRuleSet::new(&config.exclusions).unwrap();
        let source = platform_fixture(
            "PLATFORM_SECURITY_PATCH := 2024-03-01\nPLATFORM_VERSION_LAST_STABLE := 11\n",
            "BUILD_ID=RKQ1.211119.001\n",
        );
        let resolver = ManifestResolver::new(&source, &config, &exclusions).unwrap();

        let result = resolver.resolve(TAG, ProjectKind::Platform).await;

        assert_eq!(result.security_patch.as_deref(), Some("2024-03-01"));
        assert_eq!(result.android_version.as_deref(), Some("11"));
        assert_eq!(result.build_id.as_deref(), Some("RKQ1.211119.001"));
        assert_eq!(
            result.kernel_version.unwrap().to_string(),
            "5.10.198 (kernel.lnx.5.10.r1-rel)"
        );
        assert_eq!(result.chipsets.into_iter().collect::<Vec<_>>(), vec!["lahaina"]);
        assert_eq!(result.manifests, vec![ManifestLink::new("Platform", platform_url())]);
    }

    #[tokio::test]
    async fn test_platform_resolution_without_markers() {
        let config = config();
        let exclusions = ExclusionRuleSet::new(&config.exclusions).unwrap();
        let source = platform_fixture("# nothing here\n", "# nor here\n");
        let resolver = ManifestResolver::new(&source, &config, &exclusions).unwrap();

        let result = resolver.resolve(TAG, ProjectKind::Platform).await;

        assert_eq!(result.security_patch, None);
        assert_eq!(result.android_version, None);
        assert_eq!(result.build_id, None);
        assert!(result.kernel_version.is_some());
    }

    #[tokio::test]
    async fn test_missing_manifest_yields_empty_result() {
        let config = config();
        let exclusions = ExclusionRuleSet::new(&config.exclusions).unwrap();
        let source = FixtureSource::new();
        let resolver = ManifestResolver::new(&source, &config, &exclusions).unwrap();

        let result = resolver.resolve(TAG, ProjectKind::System).await;
        assert_eq!(result, EnrichmentResult::default());
        assert_eq!(source.request_count(), 0);
    }

    #[tokio::test]
    async fn test_error_page_counts_as_unavailable() {
        let config = config();
        let exclusions = ExclusionRuleSet::new(&config.exclusions).unwrap();
        let source = FixtureSource::new().with(
            platform_url(),
            "<!DOCTYPE html><html><body>Sign in</body></html>",
        );
        let resolver = ManifestResolver::new(&source, &config, &exclusions).unwrap();

        let result = resolver.resolve(TAG, ProjectKind::Platform).await;
        assert!(!result.has_metadata());
        assert!(result.manifests.is_empty());
    }

    #[tokio::test]
    async fn test_le_family_only_probes() {
        let config = config();
        let exclusions = ExclusionRuleSet::new(&config.exclusions).unwrap();
        let le_url = format!("{BASE}/clo/le/le/manifest/-/raw/release/LE.BR.1.2.xml");
        let source = FixtureSource::new().with(le_url.clone(), "<manifest/>");
        let resolver = ManifestResolver::new(&source, &config, &exclusions).unwrap();

        let result = resolver.resolve("LE.BR.1.2", ProjectKind::Platform).await;

        assert_eq!(result.manifests, vec![ManifestLink::new("Manifest", le_url)]);
        assert!(!result.has_metadata());
        assert_eq!(source.request_count(), 0);
    }

    #[test]
    fn test_unresolved_transition_picks_branch() {
        let config = config();
        let pattern = Regex::new(&config.resolver.kernel_project_pattern).unwrap();
        let ctx = ResolveContext {
            tag: "LA.VENDOR.14.3.2.r1",
            project: ProjectKind::Vendor,
            upstream: &config.upstream,
            settings: &config.resolver,
            kernel_pattern: &pattern,
            excluded: BTreeSet::new(),
        };

        assert_eq!(ResolveState::Unresolved.request(&ctx), None);
        let (next, partial) = ResolveState::Unresolved.advance(&ctx, &Document::Unavailable);
        assert_eq!(
            next,
            ResolveState::VendorFanout {
                manifest_url: format!(
                    "{BASE}/clo/la/la/vendor/manifest/-/raw/release/LA.VENDOR.14.3.2.r1.xml"
                )
            }
        );
        assert_eq!(partial, Partial::default());
    }

    #[test]
    fn test_label_for_project() {
        assert_eq!(label_for_project("clo/la/la/system/manifest"), "System");
        assert_eq!(label_for_project("clo/la/camx"), "Camx");
    }
}
