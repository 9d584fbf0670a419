// src/models/release.rs

//! Release record data structure.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::OrderedMap;

/// Classification of the listing a release came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Platform,
    System,
    Vendor,
    Wiki,
    Other,
}

impl ProjectKind {
    /// Classify a part/project name. Unknown names map to `Other`.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "platform" => ProjectKind::Platform,
            "system" => ProjectKind::System,
            "vendor" => ProjectKind::Vendor,
            "wiki" => ProjectKind::Wiki,
            _ => ProjectKind::Other,
        }
    }
}

/// One published release/tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseRecord {
    /// Tag name, unique within its listing
    pub tag: String,

    /// Which part the tag belongs to (e.g. "platform", "system", "vendor", "wiki")
    pub project: String,

    /// Publication date (RFC 3339 for API listings, free text for wiki rows)
    pub date: String,

    /// Chipset column (wiki rows only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chipset: Option<String>,

    /// Manifest file name (wiki rows only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,

    /// Android version column (wiki rows only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<String>,

    /// Every source column in header order (wiki rows only)
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub columns: OrderedMap<String>,
}

impl ReleaseRecord {
    /// Create a record for an API-listed tag.
    pub fn new(tag: impl Into<String>, project: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            project: project.into(),
            date: date.into(),
            chipset: None,
            manifest: None,
            android: None,
            columns: OrderedMap::new(),
        }
    }

    /// Key of this record within its snapshot section.
    ///
    /// Wiki rows publish one tag for several chipsets, so the chipset is
    /// part of their key.
    pub fn key(&self) -> String {
        match &self.chipset {
            Some(chipset) => format!("{}_{}", self.tag, chipset),
            None => self.tag.clone(),
        }
    }

    pub fn kind(&self) -> ProjectKind {
        ProjectKind::parse(&self.project)
    }

    /// Parse the publication date, if it is in a recognised format.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let date = self.date.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%d", "%B %d, %Y", "%d %B %Y"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}
