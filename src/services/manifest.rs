// src/services/manifest.rs

//! Text extraction from manifests and build metadata files.
//!
//! Manifests are XML-like lists of project elements. They are scanned with
//! regular expressions rather than parsed as XML: upstream serves them as raw
//! text and occasionally answers with an HTML error page instead, which must
//! simply yield nothing.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::KernelVersion;

static ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z][\w-]*)\b([^<>]*?)/?>").expect("valid regex"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*"([^"]*)""#).expect("valid regex")
});

static CHIPSET_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bpath="device/qcom/([\w.-]+)""#).expect("valid regex"));
static CHIPSET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bname="(?:[\w.-]+/)*device/qcom/([\w.-]+)""#).expect("valid regex")
});

static SECURITY_PATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*PLATFORM_SECURITY_PATCH\s*:=\s*(\d{4}-\d{2}-\d{2})").expect("valid regex")
});
static VERSION_LAST_STABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*PLATFORM_VERSION_LAST_STABLE\s*:=\s*(\d[\w.]*)").expect("valid regex")
});
static PLATFORM_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*PLATFORM_VERSION\s*:=\s*(\d[\w.]*)").expect("valid regex")
});
static BUILD_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:export\s+)?BUILD_ID\s*:?=\s*(\S+)").expect("valid regex")
});

static KERNEL_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^VERSION\s*=\s*(\d+)").expect("valid regex"));
static KERNEL_PATCHLEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^PATCHLEVEL\s*=\s*(\d+)").expect("valid regex"));
static KERNEL_SUBLEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^SUBLEVEL\s*=\s*(\d+)").expect("valid regex"));

/// One element of a manifest with its attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Kernel project pinned by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelRef {
    pub name: String,
    pub revision: String,
    pub upstream: Option<String>,
}

/// Reference from a vendor manifest to another manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubManifestRef {
    pub project: String,
    pub tag: String,
}

/// Whether `text` looks like a manifest rather than an error page.
pub fn looks_like_manifest(text: &str) -> bool {
    let head: String = text.chars().take(512).collect::<String>().to_lowercase();
    text.contains("<manifest") && !head.contains("<html") && !head.contains("<!doctype html")
}

/// Every element in `text`, in document order.
pub fn elements(text: &str) -> Vec<Element> {
    ELEMENT
        .captures_iter(text)
        .map(|caps| Element {
            name: caps[1].to_string(),
            attributes: ATTRIBUTE
                .captures_iter(&caps[2])
                .map(|a| (a[1].to_string(), a[2].to_string()))
                .collect(),
        })
        .collect()
}

/// Pinned revision of the `<project>` named `name`.
pub fn project_revision(text: &str, name: &str) -> Option<String> {
    elements(text)
        .into_iter()
        .filter(|e| e.name == "project")
        .find(|e| e.attr("name") == Some(name))
        .and_then(|e| e.attr("revision").map(str::to_string))
}

/// First `<project>` whose name matches `pattern` and carries a revision.
pub fn kernel_project(text: &str, pattern: &Regex) -> Option<KernelRef> {
    elements(text)
        .into_iter()
        .filter(|e| e.name == "project")
        .find_map(|e| {
            let name = e.attr("name").filter(|n| pattern.is_match(n))?;
            let revision = e.attr("revision")?;
            Some(KernelRef {
                name: name.to_string(),
                revision: revision.to_string(),
                upstream: e.attr("upstream").map(branch_name),
            })
        })
}

/// References to other manifests: any element carrying `project` and `tag`.
pub fn sub_manifests(text: &str) -> Vec<SubManifestRef> {
    elements(text)
        .into_iter()
        .filter_map(|e| {
            Some(SubManifestRef {
                project: e.attr("project")?.to_string(),
                tag: e.attr("tag")?.to_string(),
            })
        })
        .collect()
}

/// Chipset names from `device/qcom/<name>` entries.
///
/// `path` attributes are preferred; `name` attributes are only consulted
/// when no `path` matches.
pub fn chipsets(text: &str) -> BTreeSet<String> {
    let by_path: BTreeSet<String> = CHIPSET_PATH
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();
    if !by_path.is_empty() {
        return by_path;
    }
    CHIPSET_NAME
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// `PLATFORM_SECURITY_PATCH` from `version_defaults.mk`.
pub fn security_patch(version_defaults: &str) -> Option<String> {
    capture(&SECURITY_PATCH, version_defaults)
}

/// Android version from `version_defaults.mk`.
pub fn android_version(version_defaults: &str) -> Option<String> {
    capture(&VERSION_LAST_STABLE, version_defaults)
        .or_else(|| capture(&PLATFORM_VERSION, version_defaults))
}

/// `BUILD_ID` from `build_id.mk`.
pub fn build_id(build_id_mk: &str) -> Option<String> {
    capture(&BUILD_ID, build_id_mk)
}

/// Kernel version from the top-level kernel `Makefile`.
pub fn kernel_version(makefile: &str, branch: Option<&str>) -> Option<KernelVersion> {
    let version = capture(&KERNEL_VERSION, makefile)?;
    let patchlevel = capture(&KERNEL_PATCHLEVEL, makefile)?;
    let sublevel = capture(&KERNEL_SUBLEVEL, makefile)?;
    Some(KernelVersion {
        version: format!("{version}.{patchlevel}.{sublevel}"),
        branch: branch.map(str::to_string),
    })
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern.captures(text).map(|c| c[1].to_string())
}

fn branch_name(upstream: &str) -> String {
    upstream
        .trim_start_matches("refs/heads/")
        .trim_start_matches("refs/tags/")
        .to_string()
}
