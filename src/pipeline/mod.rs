//! Pipeline entry points for tracker operations.
//!
//! - `SnapshotDiff`: New records between two snapshots
//! - `Tracker`: Fetch → diff → resolve → notify → persist per project

pub mod diff;
pub mod track;

pub use diff::{SnapshotDiff, diff};
pub use track::{ProjectReport, RunReport, Tracker};
