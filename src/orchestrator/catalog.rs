// Release catalog client.
//
// Polls a GitHub Releases-style JSON endpoint for the newest release,
// compares it against a locally persisted version marker, and downloads the
// release's single patch asset with progress reporting.

use std::io::Write;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid catalog response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no releases found at {0}")]
    NoReleases(String),
    #[error("release {version} has {count} assets, expected exactly one")]
    UnexpectedAssetCount { version: String, count: usize },
}

/// A single asset attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub browser_download_url: String,
}

/// A single entry from the releases JSON array.
///
/// Mirrors the subset of GitHub's releases API response the original
/// updater relied on: a version name plus its asset list.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDescriptor {
    pub name: String,
    pub assets: Vec<ReleaseAsset>,
}

/// Polls a releases endpoint and downloads patch assets.
pub struct CatalogClient {
    releases_url: String,
    client: reqwest::blocking::Client,
}

impl CatalogClient {
    pub fn new(releases_url: impl Into<String>) -> Self {
        Self {
            releases_url: releases_url.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Fetch the release list and return the newest entry (the first in the
    /// response, matching GitHub's newest-first ordering).
    pub fn latest_release(&self) -> Result<ReleaseDescriptor, CatalogError> {
        log::debug!("polling catalog at {}", self.releases_url);
        let body = self.client.get(&self.releases_url).send()?.text()?;
        let releases: Vec<ReleaseDescriptor> = serde_json::from_str(&body)?;
        releases
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NoReleases(self.releases_url.clone()))
    }

    /// Download a release's single patch asset to `dest_path`.
    ///
    /// Fails if the release has anything other than exactly one asset,
    /// matching the original tool's assumption about how releases are
    /// published.
    pub fn download_patch(
        &self,
        release: &ReleaseDescriptor,
        dest_path: &Path,
    ) -> Result<(), CatalogError> {
        if release.assets.len() != 1 {
            return Err(CatalogError::UnexpectedAssetCount {
                version: release.name.clone(),
                count: release.assets.len(),
            });
        }
        let url = &release.assets[0].browser_download_url;
        log::info!("downloading patch {} from {url}", release.name);

        let mut resp = self.client.get(url).send()?;
        let total = resp.content_length();

        #[cfg(feature = "cli")]
        let bar = total
            .map(indicatif::ProgressBar::new)
            .unwrap_or_else(indicatif::ProgressBar::new_spinner);

        let mut out = std::fs::File::create(dest_path)?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            use std::io::Read;
            let n = resp.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            #[cfg(feature = "cli")]
            bar.inc(n as u64);
        }
        #[cfg(feature = "cli")]
        bar.finish();

        Ok(())
    }
}
