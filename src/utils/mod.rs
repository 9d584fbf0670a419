//! Utility functions and helpers.

pub mod http;

pub use http::{Fetched, HttpClient, HttpSource};

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory [`HttpSource`] serving canned documents.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{Fetched, HttpSource};
    use crate::error::{AppError, Result};

    #[derive(Default)]
    pub struct FixtureSource {
        documents: HashMap<String, Fetched>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FixtureSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
            self.documents.insert(url.into(), Fetched::new(body));
            self
        }

        pub fn with_fetched(mut self, url: impl Into<String>, fetched: Fetched) -> Self {
            self.documents.insert(url.into(), fetched);
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpSource for FixtureSource {
        async fn get(&self, url: &str) -> Result<Fetched> {
            self.requests.lock().unwrap().push(url.to_string());
            self.documents.get(url).cloned().ok_or(AppError::Status {
                url: url.to_string(),
                status: 404,
            })
        }

        async fn head_exists(&self, url: &str) -> bool {
            self.documents.contains_key(url)
        }
    }
}
