//! Resource fetching.
//!
//! Scene documents, images, vector artwork and video metadata are all
//! addressed by URL-like paths (`/data/activity1.json`, `/img/logo.png`).
//! A `Fetcher` resolves those paths to bytes; the harness hands one to every
//! backend so resource loading stays testable without a file system.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid resource location `{0}`")]
    InvalidLocation(String),

    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the raw bytes at `location`.
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetch and decode as UTF-8, replacing invalid sequences.
    async fn fetch_text(&self, location: &str) -> Result<String, FetchError> {
        let bytes = self.fetch(location).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Serves locations from a directory; `/img/a.png` maps to `<root>/img/a.png`.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a location below the root. Parent-directory segments and
    /// empty locations are rejected.
    pub fn resolve(&self, location: &str) -> Result<PathBuf, FetchError> {
        let relative = location.split(['?', '#']).next().unwrap_or_default();
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(FetchError::InvalidLocation(location.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Fetcher for FsFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(location)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                log::trace!("fetched {location} ({} bytes)", bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(location.to_string()))
            }
            Err(source) => Err(FetchError::Io {
                location: location.to_string(),
                source,
            }),
        }
    }
}

/// In-memory resources, keyed by exact location.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(location, bytes);
        self
    }

    pub fn insert(&mut self, location: &str, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(location.to_string(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        self.entries
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(location.to_string()))
    }
}
