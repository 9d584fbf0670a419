//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Upper bound accepted for `notify.retention_days`.
pub const MAX_RETENTION_DAYS: i64 = 3650;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Upstream endpoints and URL templates
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Manifest resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Tracked projects
    #[serde(default = "defaults::projects")]
    pub projects: Vec<TrackedProject>,

    /// Chipsets hidden per release family
    #[serde(default = "defaults::exclusions")]
    pub exclusions: Vec<ExclusionRule>,

    /// Notification settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Local paths
    #[serde(default)]
    pub paths: PathsConfig,

    /// Git publishing of the data directory
    #[serde(default)]
    pub publish: PublishConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from `path`, or the defaults if it does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_if_present(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if !(1..=100).contains(&self.upstream.per_page) {
            return Err(AppError::validation("upstream.per_page must be in 1..=100"));
        }
        url::Url::parse(&self.upstream.api_url)?;
        require_placeholders("upstream.manifest_url", &self.upstream.manifest_url, &["{project}", "{tag}"])?;
        require_placeholders(
            "upstream.raw_file_url",
            &self.upstream.raw_file_url,
            &["{name}", "{revision}", "{file}"],
        )?;
        require_placeholders(
            "upstream.wiki_manifest_url",
            &self.upstream.wiki_manifest_url,
            &["{manifest}", "{tag}"],
        )?;

        if self.projects.is_empty() {
            return Err(AppError::validation("No projects defined"));
        }
        for project in &self.projects {
            project.validate()?;
        }

        for rule in &self.exclusions {
            regex::Regex::new(&rule.pattern).map_err(|e| {
                AppError::validation(format!("exclusion pattern '{}': {}", rule.pattern, e))
            })?;
        }
        regex::Regex::new(&self.resolver.kernel_project_pattern)?;

        if !(1..=MAX_RETENTION_DAYS).contains(&self.notify.retention_days) {
            return Err(AppError::validation(format!(
                "notify.retention_days must be in 1..={MAX_RETENTION_DAYS}"
            )));
        }
        if self.publish.enabled && self.publish.remote.trim().is_empty() {
            return Err(AppError::validation("publish.remote is empty"));
        }
        Ok(())
    }

    /// Look up a tracked project by name.
    pub fn project(&self, name: &str) -> Option<&TrackedProject> {
        self.projects.iter().find(|p| p.name == name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            upstream: UpstreamConfig::default(),
            resolver: ResolverConfig::default(),
            projects: defaults::projects(),
            exclusions: defaults::exclusions(),
            notify: NotifyConfig::default(),
            paths: PathsConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

fn require_placeholders(field: &str, template: &str, placeholders: &[&str]) -> Result<()> {
    match placeholders.iter().find(|p| !template.contains(**p)) {
        Some(missing) => Err(AppError::validation(format!(
            "{field} is missing the {missing} placeholder"
        ))),
        None => Ok(()),
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Upstream endpoints.
///
/// Templates use `{placeholder}` substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base of the paginated REST API
    #[serde(default = "defaults::api_url")]
    pub api_url: String,

    /// Items per listing page
    #[serde(default = "defaults::per_page")]
    pub per_page: u32,

    /// Raw manifest for a manifest project at a tag: `{project}`, `{tag}`
    #[serde(default = "defaults::manifest_url")]
    pub manifest_url: String,

    /// Raw file of a source project at a revision: `{name}`, `{revision}`, `{file}`
    #[serde(default = "defaults::raw_file_url")]
    pub raw_file_url: String,

    /// Manifest browser link for wiki rows: `{manifest}`, `{tag}`
    #[serde(default = "defaults::wiki_manifest_url")]
    pub wiki_manifest_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::api_url(),
            per_page: defaults::per_page(),
            manifest_url: defaults::manifest_url(),
            raw_file_url: defaults::raw_file_url(),
            wiki_manifest_url: defaults::wiki_manifest_url(),
        }
    }
}

impl UpstreamConfig {
    /// URL of a manifest project's manifest for `tag`.
    pub fn manifest_for(&self, project: &str, tag: &str) -> String {
        self.manifest_url
            .replace("{project}", project)
            .replace("{tag}", tag)
    }

    /// URL of `file` inside source project `name` at `revision`.
    pub fn raw_file_for(&self, name: &str, revision: &str, file: &str) -> String {
        self.raw_file_url
            .replace("{name}", name)
            .replace("{revision}", revision)
            .replace("{file}", file)
    }

    /// Browser link for a wiki row's manifest.
    pub fn wiki_manifest_for(&self, manifest: &str, tag: &str) -> String {
        self.wiki_manifest_url
            .replace("{manifest}", manifest)
            .replace("{tag}", tag)
    }
}

/// Manifest resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Tag prefixes of the LE family (no metadata resolution)
    #[serde(default = "defaults::le_prefixes")]
    pub le_prefixes: Vec<String>,

    #[serde(default = "defaults::le_manifest_project")]
    pub le_manifest_project: String,

    #[serde(default = "defaults::platform_manifest_project")]
    pub platform_manifest_project: String,

    #[serde(default = "defaults::system_manifest_project")]
    pub system_manifest_project: String,

    #[serde(default = "defaults::vendor_manifest_project")]
    pub vendor_manifest_project: String,

    #[serde(default = "defaults::kernel_manifest_project")]
    pub kernel_manifest_project: String,

    /// Source project holding the build metadata files
    #[serde(default = "defaults::build_project")]
    pub build_project: String,

    #[serde(default = "defaults::version_defaults_path")]
    pub version_defaults_path: String,

    #[serde(default = "defaults::build_id_path")]
    pub build_id_path: String,

    /// Regex matched against project names to find the kernel
    #[serde(default = "defaults::kernel_project_pattern")]
    pub kernel_project_pattern: String,

    #[serde(default = "defaults::kernel_makefile_path")]
    pub kernel_makefile_path: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            le_prefixes: defaults::le_prefixes(),
            le_manifest_project: defaults::le_manifest_project(),
            platform_manifest_project: defaults::platform_manifest_project(),
            system_manifest_project: defaults::system_manifest_project(),
            vendor_manifest_project: defaults::vendor_manifest_project(),
            kernel_manifest_project: defaults::kernel_manifest_project(),
            build_project: defaults::build_project(),
            version_defaults_path: defaults::version_defaults_path(),
            build_id_path: defaults::build_id_path(),
            kernel_project_pattern: defaults::kernel_project_pattern(),
            kernel_makefile_path: defaults::kernel_makefile_path(),
        }
    }
}

impl ResolverConfig {
    pub fn is_le_tag(&self, tag: &str) -> bool {
        self.le_prefixes.iter().any(|p| tag.starts_with(p.as_str()))
    }
}

/// How a tracked project publishes its releases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Paginated tag listing per part
    #[default]
    Api,
    /// Single HTML release table
    Wiki,
}

/// A project whose releases are tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedProject {
    /// Project name, used for file names and section keys
    pub name: String,

    #[serde(default)]
    pub source: SourceKind,

    /// Named parts and their upstream handles (API sources)
    #[serde(default)]
    pub parts: Vec<PartHandle>,

    /// Release table page (wiki sources)
    #[serde(default)]
    pub url: Option<String>,
}

impl TrackedProject {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("project name is empty"));
        }
        match self.source {
            SourceKind::Api if self.parts.is_empty() => Err(AppError::validation(format!(
                "project '{}' has no parts",
                self.name
            ))),
            SourceKind::Wiki if self.url.is_none() => Err(AppError::validation(format!(
                "wiki project '{}' has no url",
                self.name
            ))),
            _ => Ok(()),
        }
    }

    /// Snapshot section key of one part.
    pub fn section_key(&self, part: &str) -> String {
        format!("{}_{}", self.name, part)
    }
}

/// A named part of a tracked project and its upstream identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartHandle {
    /// Part classification (e.g. "platform", "system", "vendor")
    pub name: String,

    /// Numeric id or full path of the upstream repository
    pub id: String,
}

/// Tag pattern mapped to chipsets to hide from derived chipset lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionRule {
    /// Regex matched against the release tag
    pub pattern: String,

    pub chipsets: Vec<String>,
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Chat identifiers every release is sent to
    #[serde(default = "defaults::channels")]
    pub channels: Vec<String>,

    /// Bot API base URL
    #[serde(default = "defaults::bot_api_url")]
    pub api_url: String,

    /// Environment variable holding the bot token
    #[serde(default = "defaults::bot_token_env")]
    pub token_env: String,

    /// Delay between successive sends in milliseconds
    #[serde(default = "defaults::pacing")]
    pub pacing_ms: u64,

    /// Releases older than this are not announced
    #[serde(default = "defaults::retention_days")]
    pub retention_days: i64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channels: defaults::channels(),
            api_url: defaults::bot_api_url(),
            token_env: defaults::bot_token_env(),
            pacing_ms: defaults::pacing(),
            retention_days: defaults::retention_days(),
        }
    }
}

/// Local paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding snapshots and Markdown exports
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

/// Git publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Push URL; `{token}` is replaced with the token from `token_env`
    #[serde(default = "defaults::publish_remote")]
    pub remote: String,

    #[serde(default = "defaults::publish_branch")]
    pub branch: String,

    #[serde(default = "defaults::publish_user_name")]
    pub user_name: String,

    #[serde(default = "defaults::publish_user_email")]
    pub user_email: String,

    #[serde(default = "defaults::git_token_env")]
    pub token_env: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            remote: defaults::publish_remote(),
            branch: defaults::publish_branch(),
            user_name: defaults::publish_user_name(),
            user_email: defaults::publish_user_email(),
            token_env: defaults::git_token_env(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{ExclusionRule, PartHandle, SourceKind, TrackedProject};

    // HTTP defaults
    pub fn user_agent() -> String {
        concat!("caf-tracker/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Upstream defaults
    pub fn api_url() -> String {
        "https://git.codelinaro.org/api/v4".into()
    }
    pub fn per_page() -> u32 {
        100
    }
    pub fn manifest_url() -> String {
        "https://git.codelinaro.org/{project}/-/raw/release/{tag}.xml".into()
    }
    pub fn raw_file_url() -> String {
        "https://git.codelinaro.org/clo/la/{name}/-/raw/{revision}/{file}".into()
    }
    pub fn wiki_manifest_url() -> String {
        "https://source.codeaurora.org/quic/la/platform/manifest/tree/{manifest}?h={tag}".into()
    }

    // Resolver defaults
    pub fn le_prefixes() -> Vec<String> {
        vec!["LE.".into()]
    }
    pub fn le_manifest_project() -> String {
        "clo/le/le/manifest".into()
    }
    pub fn platform_manifest_project() -> String {
        "clo/la/platform/manifest".into()
    }
    pub fn system_manifest_project() -> String {
        "clo/la/la/system/manifest".into()
    }
    pub fn vendor_manifest_project() -> String {
        "clo/la/la/vendor/manifest".into()
    }
    pub fn kernel_manifest_project() -> String {
        "clo/la/kernelplatform/manifest".into()
    }
    pub fn build_project() -> String {
        "platform/build".into()
    }
    pub fn version_defaults_path() -> String {
        "core/version_defaults.mk".into()
    }
    pub fn build_id_path() -> String {
        "core/build_id.mk".into()
    }
    pub fn kernel_project_pattern() -> String {
        r"^kernel/msm-\d".into()
    }
    pub fn kernel_makefile_path() -> String {
        "Makefile".into()
    }

    pub fn projects() -> Vec<TrackedProject> {
        let part = |name: &str, id: &str| PartHandle {
            name: name.into(),
            id: id.into(),
        };
        vec![
            TrackedProject {
                name: "la".into(),
                source: SourceKind::Api,
                parts: vec![
                    part("platform", "clo/la/platform/manifest"),
                    part("system", "clo/la/la/system/manifest"),
                    part("vendor", "clo/la/la/vendor/manifest"),
                ],
                url: None,
            },
            TrackedProject {
                name: "le".into(),
                source: SourceKind::Api,
                parts: vec![part("manifest", "clo/le/le/manifest")],
                url: None,
            },
        ]
    }

    pub fn exclusions() -> Vec<ExclusionRule> {
        let rule = |pattern: &str, chipsets: &[&str]| ExclusionRule {
            pattern: pattern.into(),
            chipsets: chipsets.iter().map(|c| c.to_string()).collect(),
        };
        vec![
            rule(
                r"^LA\.",
                &["common", "sepolicy", "sepolicy_vndr", "vendor-common", "qssi", "qssi_64"],
            ),
            rule(r"^LA\.UM\.9\.", &["msmnile_au", "sdmshrike_au"]),
            rule(r"^LA\.VENDOR\.1\.0\.", &["lahaina", "holi"]),
            rule(r"^LA\.VENDOR\.14\.3\.", &["taro"]),
        ]
    }

    // Notification defaults
    pub fn channels() -> Vec<String> {
        vec!["@CAFReleases".into()]
    }
    pub fn bot_api_url() -> String {
        "https://api.telegram.org".into()
    }
    pub fn bot_token_env() -> String {
        "BOT_TOKEN".into()
    }
    pub fn pacing() -> u64 {
        2000
    }
    pub fn retention_days() -> i64 {
        15
    }

    // Path defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }

    // Publish defaults
    pub fn publish_remote() -> String {
        "https://{token}@github.com/androidtrackers/codeaurora-releases-tracker.git".into()
    }
    pub fn publish_branch() -> String {
        "master".into()
    }
    pub fn publish_user_name() -> String {
        "XiaomiFirmwareUpdater".into()
    }
    pub fn publish_user_email() -> String {
        "xiaomifirmwareupdater@gmail.com".into()
    }
    pub fn git_token_env() -> String {
        "GIT_TOKEN".into()
    }
}
