use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use url::Url;

use crate::config::MirrorConfig;
use crate::error::{DownloadError, FetchError};
use crate::file_manager::{self, FileManager};
use crate::html_parser::{AssetCategory, AssetReference};

/// Response body of a successful GET.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl Fetched {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The HTTP collaborator. Anything that can GET a URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<Fetched, FetchError>;
}

pub struct ReqwestSource {
    client: Client,
}

impl ReqwestSource {
    pub fn new(config: &MirrorConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSource for ReqwestSource {
    async fn get(&self, url: &str) -> Result<Fetched, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(transport)?.to_vec();

        Ok(Fetched { body, content_type })
    }
}

type Outcome = Result<String, DownloadError>;

#[derive(Default)]
struct Naming {
    by_url: HashMap<String, String>,
    taken: HashSet<String>,
}

/// Per-job map from absolute asset URL to its output-relative file, shared by
/// the root page and every subpage. Each URL is downloaded at most once even
/// when several pages ask for it concurrently.
#[derive(Default)]
pub struct AssetRegistry {
    naming: Mutex<Naming>,
    downloads: Mutex<HashMap<String, Arc<OnceCell<Outcome>>>>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the output-relative path for `url`, assigning one on first
    /// sight. A name already held by another URL (ignoring case) gets a hash
    /// suffix.
    pub fn assign(&self, url: &Url, category: AssetCategory) -> String {
        let mut naming = self.naming.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = naming.by_url.get(url.as_str()) {
            return existing.clone();
        }

        let directory = category.directory();
        let name = file_manager::derive_asset_filename(url, category);
        let name = file_manager::reserve_name(&mut naming.taken, directory, &name, url.as_str());
        let relative = format!("{}/{}", directory, name);

        naming.by_url.insert(url.to_string(), relative.clone());
        relative
    }

    pub fn assigned(&self, url: &Url) -> Option<String> {
        let naming = self.naming.lock().unwrap_or_else(PoisonError::into_inner);
        naming.by_url.get(url.as_str()).cloned()
    }

    fn cell(&self, url: &Url) -> Arc<OnceCell<Outcome>> {
        let mut downloads = self.downloads.lock().unwrap_or_else(PoisonError::into_inner);
        downloads.entry(url.to_string()).or_default().clone()
    }

    pub fn download_count(&self) -> usize {
        let downloads = self.downloads.lock().unwrap_or_else(PoisonError::into_inner);
        downloads.values().filter(|cell| cell.initialized()).count()
    }
}

/// Terminal outcome of localizing one reference.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub reference: AssetReference,
    /// Output-relative path such as `images/logo.png`
    pub outcome: Result<String, DownloadError>,
}

impl DownloadResult {
    pub fn local_path(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&DownloadError> {
        self.outcome.as_ref().err()
    }
}

#[derive(Clone)]
pub struct AssetFetcher {
    source: Arc<dyn HttpSource>,
    files: FileManager,
    registry: Arc<AssetRegistry>,
    max_concurrent: usize,
    show_progress: bool,
}

impl AssetFetcher {
    pub fn new(
        source: Arc<dyn HttpSource>,
        files: FileManager,
        registry: Arc<AssetRegistry>,
        config: &MirrorConfig,
    ) -> Self {
        Self {
            source,
            files,
            registry,
            max_concurrent: config.max_concurrent.max(1),
            show_progress: config.show_progress,
        }
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    /// Downloads one asset to its assigned path. Failures are logged and
    /// returned, never raised.
    pub async fn fetch(&self, reference: AssetReference) -> DownloadResult {
        let relative = self.registry.assign(&reference.absolute_url, reference.category);
        self.fetch_assigned(reference, relative).await
    }

    async fn fetch_assigned(&self, reference: AssetReference, relative: String) -> DownloadResult {
        let cell = self.registry.cell(&reference.absolute_url);
        let outcome = cell
            .get_or_init(|| self.download(&reference.absolute_url, relative))
            .await
            .clone();

        if let Err(e) = &outcome {
            tracing::warn!(url = %reference.absolute_url, category = ?reference.category, error = %e, "asset download failed");
        }

        DownloadResult { reference, outcome }
    }

    async fn download(&self, url: &Url, relative: String) -> Outcome {
        tracing::debug!(%url, path = %relative, "downloading asset");
        let fetched = self.source.get(url.as_str()).await?;

        self.files
            .save_file(&relative, &fetched.body)
            .await
            .map_err(|e| DownloadError::Write {
                path: self.files.path_for(&relative),
                message: e.to_string(),
            })?;

        Ok(relative)
    }

    /// Resolves every reference of one page to a terminal result.
    ///
    /// Names are assigned up front in document order so they do not depend
    /// on completion order. Stylesheets and scripts are fetched one after
    /// another; images go through a pool of `max_concurrent` workers.
    /// Results come back in the order of `references`.
    pub async fn fetch_all(&self, references: Vec<AssetReference>) -> Vec<DownloadResult> {
        let planned: Vec<(usize, AssetReference, String)> = references
            .into_iter()
            .enumerate()
            .map(|(index, reference)| {
                let relative = self.registry.assign(&reference.absolute_url, reference.category);
                (index, reference, relative)
            })
            .collect();

        let progress = self.progress_bar(planned.len() as u64);
        let (images, ordered): (Vec<_>, Vec<_>) =
            planned.into_iter().partition(|(_, reference, _)| reference.category.is_image());

        let mut results = Vec::with_capacity(images.len() + ordered.len());
        for (index, reference, relative) in ordered {
            progress.set_message(reference.absolute_url.to_string());
            results.push((index, self.fetch_assigned(reference, relative).await));
            progress.inc(1);
        }

        let image_results: Vec<(usize, DownloadResult)> = stream::iter(images)
            .map(|(index, reference, relative)| {
                let progress = &progress;
                async move {
                    let result = self.fetch_assigned(reference, relative).await;
                    progress.inc(1);
                    (index, result)
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        results.extend(image_results);

        progress.finish_and_clear();
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}") {
            bar.set_style(style);
        }
        bar
    }
}
