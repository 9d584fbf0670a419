// src/services/formatter.rs

//! Telegram Markdown rendering of release notifications.

use crate::models::{
    Config, EnrichmentResult, ManifestLink, ProjectKind, ReleaseRecord, UpstreamConfig,
};

/// Renders the notification text for one release.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    le_prefixes: Vec<String>,
    upstream: UpstreamConfig,
}

impl MessageFormatter {
    pub fn new(config: &Config) -> Self {
        Self {
            le_prefixes: config.resolver.le_prefixes.clone(),
            upstream: config.upstream.clone(),
        }
    }

    /// Headline, tag, body, and the date as the last line.
    pub fn format(&self, record: &ReleaseRecord, enrichment: &EnrichmentResult) -> String {
        let mut lines = Vec::new();

        if self.is_le(&record.tag) {
            lines.push("*New LE release detected!*".to_string());
            lines.push(format!("Tag: `{}`", record.tag));
            if let Some(link) = enrichment.manifests.first() {
                lines.push(format!("Manifest: [Here]({})", link.url));
            }
        } else {
            match record.kind() {
                ProjectKind::Wiki => self.wiki_body(record, &mut lines),
                ProjectKind::Vendor => {
                    lines.push(headline(&record.project));
                    lines.push(format!("Tag: `{}`", record.tag));
                    if !enrichment.manifests.is_empty() {
                        lines.push(format!("Manifests: {}", link_list(&enrichment.manifests)));
                    }
                    optional_lines(enrichment, &mut lines);
                }
                _ => {
                    lines.push(headline(&record.project));
                    lines.push(format!("Tag: `{}`", record.tag));
                    if let Some(link) = enrichment.manifests.first() {
                        lines.push(format!("Manifest: {}", markdown_link(link)));
                    }
                    optional_lines(enrichment, &mut lines);
                }
            }
        }

        lines.push(format!("Date: {}", record.date));
        lines.join("\n")
    }

    fn is_le(&self, tag: &str) -> bool {
        self.le_prefixes.iter().any(|p| tag.starts_with(p.as_str()))
    }

    fn wiki_body(&self, record: &ReleaseRecord, lines: &mut Vec<String>) {
        lines.push("*New CAF release detected!*".to_string());
        if let Some(chipset) = &record.chipset {
            lines.push(format!("Chipset: *{}*", escape(chipset)));
        }
        if let Some(android) = &record.android {
            lines.push(format!("Android: *{}*", escape(android)));
        }
        lines.push(format!("Tag: `{}`", record.tag));
        if let Some(manifest) = &record.manifest {
            let url = self.upstream.wiki_manifest_for(manifest, &record.tag);
            lines.push(format!("Manifest: [Here]({url})"));
        }
    }
}

fn headline(project: &str) -> String {
    format!("*New CAF {} release detected!*", escape(project))
}

fn optional_lines(enrichment: &EnrichmentResult, lines: &mut Vec<String>) {
    if !enrichment.chipsets.is_empty() {
        let chipsets: Vec<String> = enrichment.chipsets.iter().map(|c| escape(c)).collect();
        lines.push(format!("Chipsets: {}", chipsets.join(", ")));
    }
    if let Some(android) = &enrichment.android_version {
        lines.push(format!("Android: *{}*", escape(android)));
    }
    if let Some(patch) = &enrichment.security_patch {
        lines.push(format!("Security Patch: {}", escape(patch)));
    }
    if let Some(build_id) = &enrichment.build_id {
        lines.push(format!("Build ID: `{build_id}`"));
    }
    if let Some(kernel) = &enrichment.kernel_version {
        lines.push(format!("Kernel: {}", escape(&kernel.to_string())));
    }
}

fn markdown_link(link: &ManifestLink) -> String {
    format!("[{}]({})", escape(&link.label), link.url)
}

fn link_list(links: &[ManifestLink]) -> String {
    links
        .iter()
        .map(markdown_link)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Escape legacy Markdown control characters in free text.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KernelVersion;

    fn formatter() -> MessageFormatter {
        MessageFormatter::new(&Config::default())
    }

    #[test]
    fn test_le_short_form() {
        let record = ReleaseRecord::new("LE.BR.1.2", "manifest", "2024-05-01T10:00:00+00:00");
        let enrichment = EnrichmentResult {
            manifests: vec![ManifestLink::new("Manifest", "https://m/LE.BR.1.2.xml")],
            ..Default::default()
        };

        assert_eq!(
            formatter().format(&record, &enrichment),
            "*New LE release detected!*\n\
             Tag: `LE.BR.1.2`\n\
             Manifest: [Here](https://m/LE.BR.1.2.xml)\n\
             Date: 2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_platform_form_lists_present_fields_only() {
        let record = ReleaseRecord::new("LA.UM.9.14.r1", "platform", "2024-05-01");
        let enrichment = EnrichmentResult {
            android_version: Some("11".into()),
            kernel_version: Some(KernelVersion {
                version: "5.4.210".into(),
                branch: Some("kernel.lnx.5.4.r1-rel".into()),
            }),
            chipsets: ["lahaina".to_string(), "msmnile_au".to_string()].into(),
            manifests: vec![ManifestLink::new("Platform", "https://m/p.xml")],
            ..Default::default()
        };

        let text = formatter().format(&record, &enrichment);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "*New CAF platform release detected!*");
        assert_eq!(lines[1], "Tag: `LA.UM.9.14.r1`");
        assert_eq!(lines[2], "Manifest: [Platform](https://m/p.xml)");
        assert_eq!(lines[3], "Chipsets: lahaina, msmnile\\_au");
        assert_eq!(lines[4], "Android: *11*");
        assert_eq!(lines[5], "Kernel: 5.4.210 (kernel.lnx.5.4.r1-rel)");
        assert_eq!(lines.last(), Some(&"Date: 2024-05-01"));
        assert!(!text.contains("Security Patch"));
        assert!(!text.contains("Build ID"));
    }

    #[test]
    fn test_vendor_form_joins_links() {
        let record = ReleaseRecord::new("LA.VENDOR.14.3.2.r1", "vendor", "2024-05-01");
        let enrichment = EnrichmentResult {
            manifests: vec![
                ManifestLink::new("Vendor", "https://m/v.xml"),
                ManifestLink::new("System", "https://m/s.xml"),
            ],
            ..Default::default()
        };

        let text = formatter().format(&record, &enrichment);
        assert!(text.contains("Manifests: [Vendor](https://m/v.xml) | [System](https://m/s.xml)"));
    }

    #[test]
    fn test_wiki_form() {
        let mut record = ReleaseRecord::new("LA.UM.8.1.r1-15100-sm8150.0", "wiki", "April 10, 2020");
        record.chipset = Some("sm8150".into());
        record.android = Some("10".into());
        record.manifest = Some("LA.UM.8.1.r1-15100-sm8150.0.xml".into());

        let text = formatter().format(&record, &EnrichmentResult::default());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "*New CAF release detected!*");
        assert_eq!(lines[1], "Chipset: *sm8150*");
        assert_eq!(lines[2], "Android: *10*");
        assert_eq!(lines[3], "Tag: `LA.UM.8.1.r1-15100-sm8150.0`");
        assert!(lines[4].starts_with("Manifest: [Here]("));
        assert!(lines[4].contains("LA.UM.8.1.r1-15100-sm8150.0.xml"));
        assert_eq!(lines[5], "Date: April 10, 2020");
    }

    #[test]
    fn test_format_is_deterministic() {
        let record = ReleaseRecord::new("LA.QSSI.14.0.r1", "system", "2024-05-01");
        let enrichment = EnrichmentResult {
            chipsets: ["b".to_string(), "a".to_string()].into(),
            ..Default::default()
        };
        let formatter = formatter();
        assert_eq!(
            formatter.format(&record, &enrichment),
            formatter.format(&record, &enrichment)
        );
        assert!(formatter.format(&record, &enrichment).contains("Chipsets: a, b"));
    }
}
