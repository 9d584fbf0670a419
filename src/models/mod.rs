// src/models/mod.rs

//! Domain models for the tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod enrichment;
mod release;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, ExclusionRule, HttpConfig, NotifyConfig, PartHandle, PathsConfig, PublishConfig,
    ResolverConfig, SourceKind, TrackedProject, UpstreamConfig,
};
pub use enrichment::{EnrichmentResult, KernelVersion, ManifestLink};
pub use release::{ProjectKind, ReleaseRecord};
pub use snapshot::{OrderedMap, Snapshot};
