// src/models/enrichment.rs

//! Derived release metadata.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A labelled link to a manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLink {
    pub label: String,
    pub url: String,
}

impl ManifestLink {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Kernel version pinned by a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelVersion {
    /// `VERSION.PATCHLEVEL.SUBLEVEL`
    pub version: String,

    /// Upstream branch the kernel project tracks
    pub branch: Option<String>,
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.branch {
            Some(branch) => write!(f, "{} ({})", self.version, branch),
            None => f.write_str(&self.version),
        }
    }
}

/// Attributes resolved for a release by following its manifests.
///
/// Every field is optional: absence means the value could not be derived
/// from the documents that were reachable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub security_patch: Option<String>,
    pub android_version: Option<String>,
    pub build_id: Option<String>,
    pub kernel_version: Option<KernelVersion>,
    pub chipsets: BTreeSet<String>,
    pub manifests: Vec<ManifestLink>,
}

impl EnrichmentResult {
    /// Fold `other` into `self`. Values already present win.
    pub fn merge(&mut self, other: EnrichmentResult) {
        self.security_patch = self.security_patch.take().or(other.security_patch);
        self.android_version = self.android_version.take().or(other.android_version);
        self.build_id = self.build_id.take().or(other.build_id);
        self.kernel_version = self.kernel_version.take().or(other.kernel_version);
        self.chipsets.extend(other.chipsets);
        self.manifests.extend(other.manifests);
    }

    /// True when nothing beyond manifest links was resolved.
    pub fn has_metadata(&self) -> bool {
        self.security_patch.is_some()
            || self.android_version.is_some()
            || self.build_id.is_some()
            || self.kernel_version.is_some()
            || !self.chipsets.is_empty()
    }
}
