//! Where the post index and post bodies come from.
//!
//! The base location is either a directory on disk or a static host. Both
//! serve `index.json` and `<slug>.md`; callers only see [`ContentSource`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::fs;
use tracing::debug;

use crate::error::SourceError;

pub const INDEX_DOCUMENT: &str = "index.json";

/// Upper bound on one remote fetch, connect to last byte.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Raw `index.json` document.
    async fn fetch_index_document(&self) -> Result<String, SourceError>;

    /// Raw Markdown body of `<slug>.md`.
    async fn fetch_post_document(&self, slug: &str) -> Result<String, SourceError>;

    /// Human readable base location, for logs.
    fn describe(&self) -> String;

    /// Local directory backing this source, if any. Hot reload watches it.
    fn local_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// True for slugs made only of ASCII alphanumerics, `-` and `_`.
pub fn is_url_safe_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn post_document(slug: &str) -> Result<String, SourceError> {
    if is_url_safe_slug(slug) {
        Ok(format!("{}.md", slug))
    } else {
        Err(SourceError::NotFound(slug.to_string()))
    }
}

/// Picks the source for a configured base location: `http://` and
/// `https://` locations are remote, anything else is a directory.
pub fn source_for(base: &str) -> Result<Arc<dyn ContentSource>, SourceError> {
    if base.starts_with("http://") || base.starts_with("https://") {
        Ok(Arc::new(HttpSource::new(base)?))
    } else {
        Ok(Arc::new(FsSource::new(base)))
    }
}

pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, name: &str) -> Result<String, SourceError> {
        let path = self.root.join(name);
        debug!(path = %path.display(), "reading document");
        fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(path.display().to_string()),
            _ => SourceError::Transport(format!("{}: {}", path.display(), e)),
        })
    }
}

#[async_trait]
impl ContentSource for FsSource {
    async fn fetch_index_document(&self) -> Result<String, SourceError> {
        self.read(INDEX_DOCUMENT).await
    }

    async fn fetch_post_document(&self, slug: &str) -> Result<String, SourceError> {
        let name = post_document(slug)?;
        self.read(&name).await
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn local_dir(&self) -> Option<PathBuf> {
        Some(self.root.clone())
    }
}

pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transport(format!("http client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn document_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn get(&self, name: &str) -> Result<String, SourceError> {
        let url = self.document_url(name);
        debug!(%url, "fetching document");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(format!("{}: {}", url, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(url)),
            status if !status.is_success() => Err(SourceError::Transport(format!("{}: {}", url, status))),
            _ => response
                .text()
                .await
                .map_err(|e| SourceError::Transport(format!("{}: {}", url, e))),
        }
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn fetch_index_document(&self) -> Result<String, SourceError> {
        self.get(INDEX_DOCUMENT).await
    }

    async fn fetch_post_document(&self, slug: &str) -> Result<String, SourceError> {
        let name = post_document(slug)?;
        self.get(&name).await
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// In-memory source that counts index fetches.
    #[derive(Default)]
    pub struct MemorySource {
        pub index: Option<String>,
        pub posts: HashMap<String, String>,
        pub index_fetches: AtomicUsize,
    }

    impl MemorySource {
        pub fn new(index: &str) -> Self {
            Self {
                index: Some(index.to_string()),
                ..Default::default()
            }
        }

        pub fn with_post(mut self, slug: &str, body: &str) -> Self {
            self.posts.insert(slug.to_string(), body.to_string());
            self
        }

        pub fn fetches(&self) -> usize {
            self.index_fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentSource for MemorySource {
        async fn fetch_index_document(&self) -> Result<String, SourceError> {
            self.index_fetches.fetch_add(1, Ordering::SeqCst);
            self.index
                .clone()
                .ok_or_else(|| SourceError::Transport("connection refused".to_string()))
        }

        async fn fetch_post_document(&self, slug: &str) -> Result<String, SourceError> {
            self.posts
                .get(slug)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(slug.to_string()))
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }
}
