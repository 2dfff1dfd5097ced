//! Artifact download from remote model storage.
//!
//! Ensures a descriptor's artifact exists at its declared local path,
//! downloading it exactly once if absent. Downloads go through a
//! `.part` staging file and an atomic rename, so a concurrent fetch of
//! the same descriptor can never leave a torn artifact at the final
//! path.

use crate::error::{Result, ServiceError};
use crate::models::registry::ModelDescriptor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Resolves a descriptor's remote address to bytes at its local path.
///
/// Trait-based so tests can substitute a counting fake for the network
/// backend.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Ensure the artifact exists locally and return its path.
    ///
    /// Idempotent: returns immediately without network traffic when the
    /// destination already exists. Does not retry internally.
    async fn ensure_local(&self, descriptor: &ModelDescriptor) -> Result<PathBuf>;
}

/// Coordinates of one artifact on the Hugging Face Hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubLocation {
    pub repo_id: String,
    pub filename: String,
}

impl HubLocation {
    /// Decompose a Hub url of the form
    /// `https://huggingface.co/{user}/{repo}/.../{filename}` into a
    /// (repository, artifact-name) pair.
    pub fn parse(url: &str) -> Option<Self> {
        let rest = url
            .strip_prefix("https://huggingface.co/")
            .or_else(|| url.strip_prefix("http://huggingface.co/"))?;
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 3 {
            return None;
        }
        let filename = segments.last()?.split(['?', '#']).next()?.trim();
        if filename.is_empty() {
            return None;
        }
        Some(Self {
            repo_id: format!("{}/{}", segments[0], segments[1]),
            filename: filename.to_string(),
        })
    }

    /// Canonical download url for this artifact.
    pub fn download_url(&self) -> String {
        format!(
            "https://huggingface.co/{}/resolve/main/{}",
            self.repo_id, self.filename
        )
    }
}

/// Fetcher backed by the Hugging Face Hub over HTTPS.
pub struct HubFetcher {
    client: reqwest::Client,
}

impl HubFetcher {
    /// Build a fetcher with a bounded request timeout. Model artifacts
    /// are large, so the timeout covers the whole download.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Config(format!("cannot build http client: {e}")))?;
        Ok(Self { client })
    }

    async fn download(&self, descriptor: &ModelDescriptor, location: &HubLocation) -> Result<()> {
        let url = location.download_url();
        info!(
            model = %descriptor.id,
            repo = %location.repo_id,
            file = %location.filename,
            "Downloading model artifact"
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::fetch(&descriptor.id, format!("request {url}: {e}")))?
            .error_for_status()
            .map_err(|e| ServiceError::fetch(&descriptor.id, format!("download {url}: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::fetch(&descriptor.id, format!("read body: {e}")))?;

        let staging = staging_path(&descriptor.local_path);
        if let Some(parent) = staging.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ServiceError::fetch(&descriptor.id, format!("create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&staging, &bytes).await.map_err(|e| {
            ServiceError::fetch(&descriptor.id, format!("write {}: {e}", staging.display()))
        })?;

        // Atomic publish: a concurrent fetch either sees the complete
        // artifact or nothing.
        tokio::fs::rename(&staging, &descriptor.local_path)
            .await
            .map_err(|e| {
                ServiceError::fetch(
                    &descriptor.id,
                    format!("rename into {}: {e}", descriptor.local_path.display()),
                )
            })?;

        info!(
            model = %descriptor.id,
            path = %descriptor.local_path.display(),
            bytes = bytes.len(),
            "Model artifact downloaded"
        );
        Ok(())
    }
}

fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

#[async_trait]
impl ArtifactFetcher for HubFetcher {
    async fn ensure_local(&self, descriptor: &ModelDescriptor) -> Result<PathBuf> {
        if descriptor.local_path.exists() {
            debug!(
                model = %descriptor.id,
                path = %descriptor.local_path.display(),
                "Artifact already present, skipping download"
            );
            return Ok(descriptor.local_path.clone());
        }

        match descriptor.remote.as_str() {
            "huggingface" => {
                let location = HubLocation::parse(&descriptor.url).ok_or_else(|| {
                    ServiceError::fetch(
                        &descriptor.id,
                        format!("unparseable hub url: {}", descriptor.url),
                    )
                })?;
                self.download(descriptor, &location).await?;
                Ok(descriptor.local_path.clone())
            }
            other => Err(ServiceError::fetch(
                &descriptor.id,
                format!("unrecognized remote scheme: {other}"),
            )),
        }
    }
}
