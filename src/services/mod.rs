//! Service layer for the tracker.
//!
//! This module contains the business logic for:
//! - Release listings (`Fetcher`, wiki table parsing)
//! - Manifest resolution (`ManifestResolver`, `ExclusionRuleSet`)
//! - Notifications (`MessageFormatter`, `NotificationDispatcher`)

mod exclusions;
mod fetcher;
mod formatter;
pub mod manifest;
mod notifier;
pub mod resolver;
pub mod wiki;

pub use exclusions::ExclusionRuleSet;
pub use fetcher::Fetcher;
pub use formatter::MessageFormatter;
pub use notifier::{LogMessenger, Messenger, NotificationDispatcher, TelegramMessenger};
pub use resolver::ManifestResolver;
