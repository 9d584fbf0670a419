//! End-to-end tracking scenarios against recorded upstream documents.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use caf_tracker::error::{AppError, Result};
use caf_tracker::models::{Config, PartHandle, SourceKind, TrackedProject};
use caf_tracker::pipeline::Tracker;
use caf_tracker::services::Messenger;
use caf_tracker::storage::{LocalStore, SnapshotStore};
use caf_tracker::utils::{Fetched, HttpSource};
use chrono::{DateTime, Utc};
use tempfile::TempDir;

const API: &str = "https://git.codelinaro.org/api/v4";
const RAW: &str = "https://git.codelinaro.org";

/// Serves canned documents by exact URL.
#[derive(Default)]
struct RecordedUpstream {
    documents: HashMap<String, Fetched>,
}

impl RecordedUpstream {
    fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.documents.insert(url.into(), Fetched::new(body));
        self
    }
}

#[async_trait]
impl HttpSource for RecordedUpstream {
    async fn get(&self, url: &str) -> Result<Fetched> {
        self.documents.get(url).cloned().ok_or(AppError::Status {
            url: url.to_string(),
            status: 404,
        })
    }

    async fn head_exists(&self, url: &str) -> bool {
        self.documents.contains_key(url)
    }
}

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, text: &str, channel: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T00:00:00+00:00")
        .unwrap()
        .with_timezone(&Utc)
}

fn project(name: &str, part: &str, id: &str) -> TrackedProject {
    TrackedProject {
        name: name.into(),
        source: SourceKind::Api,
        parts: vec![PartHandle {
            name: part.into(),
            id: id.into(),
        }],
        url: None,
    }
}

fn config(projects: Vec<TrackedProject>) -> Config {
    let mut config = Config::default();
    config.projects = projects;
    config.notify.channels = vec!["@test".into()];
    config.notify.pacing_ms = 0;
    config
}

fn listing_url(id: &str) -> String {
    let encoded = id.replace('/', "%2F");
    format!("{API}/projects/{encoded}/repository/tags?per_page=100&page=1")
}

fn listing(tags: &[(&str, &str)]) -> String {
    let items: Vec<String> = tags
        .iter()
        .map(|(name, date)| format!(r#"{{"name":"{name}","commit":{{"created_at":"{date}"}}}}"#))
        .collect();
    format!("[{}]", items.join(","))
}

const VENDOR_TAG: &str = "LA.VENDOR.14.3.2.r1";
const SYSTEM_TAG: &str = "LA.QSSI.14.0.r1-09800-qssi.0";

fn vendor_manifest() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <remote name="clo" fetch=".."/>
  <project name="device/qcom/taro" path="device/qcom/taro" revision="v1"/>
  <project name="device/qcom/kalama" path="device/qcom/kalama" revision="v2"/>
  <refs>
    <image name="LA.QSSI.14.0.r1" project="clo/la/la/system/manifest" tag="{SYSTEM_TAG}" targets="qssi"/>
    <image name="KERNEL.PLATFORM.3.0.r1" project="clo/la/kernelplatform/manifest" tag="{KERNEL_TAG}"/>
  </refs>
</manifest>
"#
    )
}

const KERNEL_TAG: &str = "KERNEL.PLATFORM.3.0.r1-07000-kernel.0";

const KERNEL_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <project name="kernel/msm-5.15" path="kernel_platform/msm-kernel" revision="kp-rev" upstream="refs/heads/android14-5.15"/>
  <project name="platform/external/dtc" path="kernel_platform/external/dtc" revision="dtc-rev"/>
</manifest>
"#;

const SYSTEM_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <project name="platform/build" path="build/make" revision="sys-build-rev"/>
  <project name="device/qcom/qssi" path="device/qcom/qssi" revision="q1"/>
</manifest>
"#;

fn vendor_upstream() -> RecordedUpstream {
    RecordedUpstream::default()
        .with(
            listing_url("clo/la/la/vendor/manifest"),
            listing(&[(VENDOR_TAG, "2024-05-30T08:00:00.000+00:00")]),
        )
        .with(
            format!("{RAW}/clo/la/la/vendor/manifest/-/raw/release/{VENDOR_TAG}.xml"),
            vendor_manifest(),
        )
        .with(
            format!("{RAW}/clo/la/la/system/manifest/-/raw/release/{SYSTEM_TAG}.xml"),
            SYSTEM_MANIFEST,
        )
        .with(
            format!("{RAW}/clo/la/platform/build/-/raw/sys-build-rev/core/version_defaults.mk"),
            "PLATFORM_VERSION_LAST_STABLE := 14\nPLATFORM_SECURITY_PATCH := 2024-05-05\n",
        )
        .with(
            format!("{RAW}/clo/la/platform/build/-/raw/sys-build-rev/core/build_id.mk"),
            "BUILD_ID=UKQ1.240505.001\n",
        )
        .with(
            format!("{RAW}/clo/la/kernelplatform/manifest/-/raw/release/{KERNEL_TAG}.xml"),
            KERNEL_MANIFEST,
        )
        .with(
            format!("{RAW}/clo/la/kernel/msm-5.15/-/raw/kp-rev/Makefile"),
            "VERSION = 5\nPATCHLEVEL = 15\nSUBLEVEL = 123\nEXTRAVERSION =\n",
        )
}

#[tokio::test]
async fn vendor_release_follows_sub_manifests_and_excludes_chipsets() {
    let tmp = TempDir::new().unwrap();
    let store = LocalStore::new(tmp.path());
    let messenger = RecordingMessenger::default();
    let upstream = vendor_upstream();
    let config = config(vec![project("la", "vendor", "clo/la/la/vendor/manifest")]);

    let tracker = Tracker::new(&config, &upstream, &store, &messenger)
        .unwrap()
        .at(now());
    let report = tracker.run(None).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.projects[0].new_records, 1);

    let texts = messenger.texts();
    assert_eq!(texts.len(), 1);
    let text = &texts[0];

    assert!(text.starts_with("*New CAF vendor release detected!*\n"));
    assert!(text.contains(&format!("Tag: `{VENDOR_TAG}`")));
    assert!(text.contains(&format!(
        "[Vendor]({RAW}/clo/la/la/vendor/manifest/-/raw/release/{VENDOR_TAG}.xml)"
    )));
    assert!(text.contains(&format!(
        "[System]({RAW}/clo/la/la/system/manifest/-/raw/release/{SYSTEM_TAG}.xml)"
    )));
    assert!(text.contains(&format!(
        " | [Kernel]({RAW}/clo/la/kernelplatform/manifest/-/raw/release/{KERNEL_TAG}.xml)\n"
    )));
    assert!(text.contains("Android: *14*"));
    assert!(text.contains("Security Patch: 2024-05-05"));
    assert!(text.contains("Build ID: `UKQ1.240505.001`"));
    assert!(text.contains("Chipsets: kalama\n"));
    assert!(!text.contains("taro"));
    assert!(text.ends_with(
        "Kernel: 5.15.123 (android14-5.15)\nDate: 2024-05-30T08:00:00.000+00:00"
    ));
}

#[tokio::test]
async fn vendor_release_without_kernel_manifest_omits_kernel() {
    let tmp = TempDir::new().unwrap();
    let store = LocalStore::new(tmp.path());
    let messenger = RecordingMessenger::default();
    let mut upstream = vendor_upstream();
    upstream
        .documents
        .remove(&format!("{RAW}/clo/la/kernelplatform/manifest/-/raw/release/{KERNEL_TAG}.xml"));
    let config = config(vec![project("la", "vendor", "clo/la/la/vendor/manifest")]);

    let tracker = Tracker::new(&config, &upstream, &store, &messenger)
        .unwrap()
        .at(now());
    tracker.run(None).await.unwrap();

    let text = &messenger.texts()[0];
    assert!(text.contains("[System]("));
    assert!(!text.contains("[Kernel]"));
    assert!(!text.contains("Kernel:"));
    assert!(text.contains("Build ID: `UKQ1.240505.001`"));
}

#[tokio::test]
async fn le_release_has_manifest_link_only() {
    let tmp = TempDir::new().unwrap();
    let store = LocalStore::new(tmp.path());
    let messenger = RecordingMessenger::default();
    let manifest_url = format!("{RAW}/clo/le/le/manifest/-/raw/release/LE.BR.1.2.xml");
    let upstream = RecordedUpstream::default()
        .with(
            listing_url("clo/le/le/manifest"),
            listing(&[("LE.BR.1.2", "2024-05-30T08:00:00.000+00:00")]),
        )
        .with(manifest_url.clone(), "<manifest></manifest>");
    let config = config(vec![project("le", "manifest", "clo/le/le/manifest")]);

    let tracker = Tracker::new(&config, &upstream, &store, &messenger)
        .unwrap()
        .at(now());
    tracker.run(None).await.unwrap();

    assert_eq!(
        messenger.texts(),
        vec![format!(
            "*New LE release detected!*\n\
             Tag: `LE.BR.1.2`\n\
             Manifest: [Here]({manifest_url})\n\
             Date: 2024-05-30T08:00:00.000+00:00"
        )]
    );
}

#[tokio::test]
async fn second_run_announces_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = LocalStore::new(tmp.path());
    let messenger = RecordingMessenger::default();
    let upstream = vendor_upstream();
    let config = config(vec![project("la", "vendor", "clo/la/la/vendor/manifest")]);

    let tracker = Tracker::new(&config, &upstream, &store, &messenger)
        .unwrap()
        .at(now());
    tracker.run(None).await.unwrap();
    let report = tracker.run(None).await.unwrap();

    assert_eq!(report.projects[0].new_records, 0);
    assert_eq!(messenger.texts().len(), 1);
    assert!(tmp.path().join("la.json.bak").exists());
    assert!(tmp.path().join("la.md").exists());
}

#[tokio::test]
async fn old_releases_are_stored_but_not_announced() {
    let tmp = TempDir::new().unwrap();
    let store = LocalStore::new(tmp.path());
    let messenger = RecordingMessenger::default();
    let upstream = RecordedUpstream::default().with(
        listing_url("clo/la/platform/manifest"),
        listing(&[("LA.UM.9.14.r1-21600-LAHAINA.0", "2024-01-10T08:00:00.000+00:00")]),
    );
    let config = config(vec![project("la", "platform", "clo/la/platform/manifest")]);

    let tracker = Tracker::new(&config, &upstream, &store, &messenger)
        .unwrap()
        .at(now());
    let report = tracker.run(None).await.unwrap();

    assert_eq!(report.projects[0].new_records, 1);
    assert_eq!(report.projects[0].delivered, 0);
    assert!(messenger.texts().is_empty());
    assert!(store.load("la").await.unwrap().contains("la_platform", "LA.UM.9.14.r1-21600-LAHAINA.0"));
}

#[tokio::test(start_paused = true)]
async fn pacing_carries_across_projects() {
    let tmp = TempDir::new().unwrap();
    let store = LocalStore::new(tmp.path());
    let messenger = RecordingMessenger::default();
    let upstream = vendor_upstream()
        .with(
            listing_url("clo/le/le/manifest"),
            listing(&[("LE.BR.1.2", "2024-05-30T08:00:00.000+00:00")]),
        )
        .with(
            format!("{RAW}/clo/le/le/manifest/-/raw/release/LE.BR.1.2.xml"),
            "<manifest></manifest>",
        );
    let mut config = config(vec![
        project("la", "vendor", "clo/la/la/vendor/manifest"),
        project("le", "manifest", "clo/le/le/manifest"),
    ]);
    config.notify.pacing_ms = 1000;

    let tracker = Tracker::new(&config, &upstream, &store, &messenger)
        .unwrap()
        .at(now());
    let start = tokio::time::Instant::now();
    tracker.run(None).await.unwrap();

    assert_eq!(messenger.texts().len(), 2);
    assert!(start.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test]
async fn failing_project_does_not_stop_the_run() {
    let tmp = TempDir::new().unwrap();
    let store = LocalStore::new(tmp.path());
    let messenger = RecordingMessenger::default();
    let upstream = vendor_upstream();
    let config = config(vec![
        project("broken", "platform", "clo/does/not/exist"),
        project("la", "vendor", "clo/la/la/vendor/manifest"),
    ]);

    let tracker = Tracker::new(&config, &upstream, &store, &messenger)
        .unwrap()
        .at(now());
    let report = tracker.run(None).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failures[0].0, "broken");
    assert_eq!(report.projects.len(), 1);
    assert_eq!(messenger.texts().len(), 1);
    assert!(!tmp.path().join("broken.json").exists());
}
