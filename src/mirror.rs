use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::config::MirrorConfig;
use crate::document::HtmlDocument;
use crate::downloader::{AssetFetcher, AssetRegistry, DownloadResult, HttpSource, ReqwestSource};
use crate::error::MirrorError;
use crate::file_manager::{self, FileManager, INDEX_FILE, PAGES_DIR};
use crate::html_parser::{AssetCategory, HtmlParser, NavigationLink};
use crate::rewriter::{self, PageLink};
use crate::url_resolver;
use crate::validator::{self, ValidationReport};

/// A validated mirroring request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRequest {
    pub source_url: Url,
    pub output_root: PathBuf,
    pub max_subpages: usize,
}

impl MirrorRequest {
    pub fn new(source_url: &str, output_root: &str, max_subpages: usize) -> Result<Self, MirrorError> {
        let source = source_url.trim();
        let source_url = Url::parse(source).map_err(|e| MirrorError::InvalidUrl {
            url: source.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(source_url.scheme(), "http" | "https") {
            return Err(MirrorError::InvalidUrl {
                url: source.to_string(),
                reason: format!("unsupported scheme '{}'", source_url.scheme()),
            });
        }

        let output_root = output_root.trim();
        if output_root.is_empty() {
            return Err(MirrorError::EmptyOutputDir);
        }

        Ok(Self {
            source_url,
            output_root: PathBuf::from(output_root),
            max_subpages,
        })
    }
}

/// One written page and the results of localizing its assets.
#[derive(Debug, Clone)]
pub struct MirroredPage {
    pub url: Url,
    /// Output-relative file, e.g. `index.html` or `pages/about.html`
    pub relative_output_path: String,
    pub downloads: Vec<DownloadResult>,
}

impl MirroredPage {
    pub fn count(&self, category: AssetCategory) -> usize {
        self.downloads.iter().filter(|d| d.reference.category == category).count()
    }

    pub fn image_count(&self) -> usize {
        self.downloads.iter().filter(|d| d.reference.category.is_image()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DownloadResult> {
        self.downloads.iter().filter(|d| d.local_path().is_none())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub stylesheets: usize,
    pub scripts: usize,
    pub images: usize,
}

#[derive(Debug, Clone)]
pub struct MirrorReport {
    pub source_url: Url,
    pub output_root: PathBuf,
    pub root: MirroredPage,
    pub subpages: Vec<MirroredPage>,
    /// Subpages written and linked from the root page
    pub page_links: Vec<PageLink>,
    /// Same-origin paths found on the root page, before the cap
    pub discovered_subpages: usize,
    pub updated_links: usize,
    pub validation: ValidationReport,
}

impl MirrorReport {
    pub fn root_counts(&self) -> CategoryCounts {
        CategoryCounts {
            stylesheets: self.root.count(AssetCategory::Stylesheet),
            scripts: self.root.count(AssetCategory::Script),
            images: self.root.image_count(),
        }
    }

    /// Number of files written into the shared asset directories.
    pub fn unique_assets(&self) -> usize {
        let mut paths = HashSet::new();
        for page in std::iter::once(&self.root).chain(&self.subpages) {
            paths.extend(page.downloads.iter().filter_map(|d| d.local_path()));
        }
        paths.len()
    }

    pub fn summary(&self) -> MirrorSummary {
        MirrorSummary {
            source_url: self.source_url.to_string(),
            output_root: self.output_root.display().to_string(),
            assets: self.root_counts(),
            unique_assets: self.unique_assets(),
            subpages: self.page_links.clone(),
            discovered_subpages: self.discovered_subpages,
            updated_links: self.updated_links,
            validation: self.validation.clone(),
        }
    }
}

/// Serializable view of a [`MirrorReport`].
#[derive(Debug, Clone, Serialize)]
pub struct MirrorSummary {
    pub source_url: String,
    pub output_root: String,
    pub assets: CategoryCounts,
    pub unique_assets: usize,
    pub subpages: Vec<PageLink>,
    pub discovered_subpages: usize,
    pub updated_links: usize,
    pub validation: ValidationReport,
}

/// Parsed, rewritten and written page, kept around for later passes.
struct PageOutcome {
    page: MirroredPage,
    document: HtmlDocument,
    links: Vec<NavigationLink>,
}

/// Per-job state. The registry is shared by every page of the job.
struct MirrorJob {
    files: FileManager,
    fetcher: AssetFetcher,
}

pub struct WebsiteMirror {
    source: Arc<dyn HttpSource>,
    config: MirrorConfig,
}

impl WebsiteMirror {
    pub fn new(config: MirrorConfig) -> anyhow::Result<Self> {
        let source = ReqwestSource::new(&config)?;
        Ok(Self::with_source(Arc::new(source), config))
    }

    pub fn with_source(source: Arc<dyn HttpSource>, config: MirrorConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    fn start_job(&self, output_root: &Path) -> MirrorJob {
        let files = FileManager::new(output_root);
        let fetcher = AssetFetcher::new(
            self.source.clone(),
            files.clone(),
            Arc::new(AssetRegistry::new()),
            &self.config,
        );
        MirrorJob { files, fetcher }
    }

    /// Mirrors the single page at `request.source_url` into `index.html`.
    pub async fn mirror_page(&self, request: &MirrorRequest) -> Result<MirrorReport, MirrorError> {
        self.with_deadline(self.run_single(request)).await
    }

    /// Mirrors the root page plus up to `request.max_subpages` same-origin
    /// subpages into `pages/`, then points the root navigation at them.
    pub async fn mirror_site(&self, request: &MirrorRequest) -> Result<MirrorReport, MirrorError> {
        self.with_deadline(self.run_site(request)).await
    }

    /// Same-origin subpage paths linked from `url`, first appearance first.
    pub async fn discover_subpages(&self, url: &Url) -> Result<Vec<String>, MirrorError> {
        self.with_deadline(async {
            let html = self.fetch_markup(url).await?;
            Ok::<_, MirrorError>(HtmlParser::from_url(url.clone()).navigation_paths(&html))
        })
        .await
    }

    async fn with_deadline<T>(
        &self,
        job: impl std::future::Future<Output = Result<T, MirrorError>>,
    ) -> Result<T, MirrorError> {
        let deadline = self.config.job_timeout();
        tokio::time::timeout(deadline, job)
            .await
            .map_err(|_| MirrorError::Timeout(deadline))?
    }

    async fn run_single(&self, request: &MirrorRequest) -> Result<MirrorReport, MirrorError> {
        tracing::info!(url = %request.source_url, output = ?request.output_root, "mirroring page");
        let job = self.start_job(&request.output_root);
        let root = self.mirror_document(&job, &request.source_url, INDEX_FILE, "").await?;

        let validation = self.validate(&job, std::slice::from_ref(&root.page)).await?;

        Ok(MirrorReport {
            source_url: request.source_url.clone(),
            output_root: request.output_root.clone(),
            root: root.page,
            subpages: Vec::new(),
            page_links: Vec::new(),
            discovered_subpages: 0,
            updated_links: 0,
            validation,
        })
    }

    async fn run_site(&self, request: &MirrorRequest) -> Result<MirrorReport, MirrorError> {
        tracing::info!(url = %request.source_url, output = ?request.output_root, max_subpages = request.max_subpages, "mirroring site");
        let job = self.start_job(&request.output_root);
        let mut root = self.mirror_document(&job, &request.source_url, INDEX_FILE, "").await?;

        let discovered: Vec<String> = root.links.iter().map(|link| link.path.clone()).collect();
        let discovered_subpages = discovered.len();
        let selected: Vec<String> = discovered.into_iter().take(request.max_subpages).collect();
        if discovered_subpages > selected.len() {
            tracing::info!(
                discovered = discovered_subpages,
                kept = selected.len(),
                "subpage cap reached, ignoring the rest"
            );
        }

        // Phase 1: write each subpage, collecting path -> file pairs
        let mut subpages = Vec::new();
        let mut page_links = Vec::new();
        let mut used_files = HashSet::new();
        if !selected.is_empty() {
            job.files.ensure_dir(PAGES_DIR).await?;
        }

        for (index, path) in selected.iter().enumerate() {
            let Some(url) = url_resolver::resolve(&request.source_url, path) else {
                continue;
            };
            let filename =
                file_manager::reserve_name(&mut used_files, PAGES_DIR, &file_manager::page_filename(path), path);
            let relative = format!("{}/{}", PAGES_DIR, filename);

            tracing::info!("cloning subpage {}/{}: {}", index + 1, selected.len(), path);
            match self.mirror_document(&job, &url, &relative, PAGES_DIR).await {
                Ok(outcome) => {
                    page_links.push(PageLink {
                        path: path.clone(),
                        file: relative,
                    });
                    subpages.push(outcome.page);
                }
                Err(e) => tracing::warn!(%path, error = %e, "failed to clone subpage"),
            }
        }

        // Phase 2: reconcile root navigation against what was written
        let updated_links =
            rewriter::reconcile_navigation(&mut root.document, &request.source_url, &page_links);
        if updated_links > 0 {
            let html = root.document.to_html()?;
            self.write_page(&job, INDEX_FILE, &html).await?;
        }

        let pages: Vec<MirroredPage> = std::iter::once(root.page.clone()).chain(subpages.iter().cloned()).collect();
        let validation = self.validate(&job, &pages).await?;

        Ok(MirrorReport {
            source_url: request.source_url.clone(),
            output_root: request.output_root.clone(),
            root: root.page,
            subpages,
            page_links,
            discovered_subpages,
            updated_links,
            validation,
        })
    }

    /// Fetch, extract, download, rewrite and write one document.
    ///
    /// Nothing is written when the markup itself cannot be fetched.
    async fn mirror_document(
        &self,
        job: &MirrorJob,
        url: &Url,
        relative_output_path: &str,
        page_dir: &str,
    ) -> Result<PageOutcome, MirrorError> {
        let html = self.fetch_markup(url).await?;

        let mut document = HtmlDocument::parse(&html);
        let extraction = HtmlParser::from_url(url.clone()).extract(&document);
        tracing::info!(
            url = %url,
            css = extraction.count(AssetCategory::Stylesheet),
            js = extraction.count(AssetCategory::Script),
            images = extraction.assets.len()
                - extraction.count(AssetCategory::Stylesheet)
                - extraction.count(AssetCategory::Script),
            "found assets"
        );

        job.files.ensure_dir("").await?;
        let downloads = job.fetcher.fetch_all(extraction.assets).await;

        rewriter::rewrite_assets(&mut document, &downloads, page_dir);
        let rewritten = document.to_html()?;
        self.write_page(job, relative_output_path, &rewritten).await?;

        Ok(PageOutcome {
            page: MirroredPage {
                url: url.clone(),
                relative_output_path: relative_output_path.to_string(),
                downloads,
            },
            document,
            links: extraction.links,
        })
    }

    async fn fetch_markup(&self, url: &Url) -> Result<String, MirrorError> {
        let fetched = self
            .source
            .get(url.as_str())
            .await
            .map_err(|source| MirrorError::PageFetch {
                url: url.to_string(),
                source,
            })?;

        if let Some(content_type) = fetched.content_type.as_deref() {
            let is_html = content_type
                .parse::<mime::Mime>()
                .map(|m| m.subtype() == mime::HTML || m.essence_str() == "application/xhtml+xml")
                .unwrap_or(true);
            if !is_html {
                tracing::warn!(%url, %content_type, "page is not served as HTML, mirroring anyway");
            }
        }

        Ok(fetched.text())
    }

    async fn write_page(&self, job: &MirrorJob, relative: &str, html: &str) -> Result<(), MirrorError> {
        let path = job
            .files
            .save_file(relative, html.as_bytes())
            .await
            .map_err(|e| MirrorError::io(job.files.path_for(relative), e))?;
        tracing::debug!(?path, "saved page");
        Ok(())
    }

    /// Fresh on-disk check of the whole tree, plus one issue per failed
    /// download. A failed reference that was already `./`/`../` relative is
    /// left in the markup and counted by the on-disk pass.
    async fn validate(&self, job: &MirrorJob, pages: &[MirroredPage]) -> Result<ValidationReport, MirrorError> {
        let root = job.files.base_dir().to_path_buf();
        let mut report = tokio::task::spawn_blocking(move || validator::validate_output(&root))
            .await
            .map_err(|e| MirrorError::Validation(e.to_string()))?
            .map_err(|e| MirrorError::Validation(format!("{:#}", e)))?;

        for page in pages {
            for failure in page
                .failures()
                .filter(|f| !validator::is_local_reference(&f.reference.original))
            {
                let label = if page.relative_output_path == INDEX_FILE {
                    failure.reference.category.label().to_string()
                } else {
                    format!("{} ({})", failure.reference.category.label(), page.relative_output_path)
                };
                let error = failure.error().map(|e| e.to_string()).unwrap_or_default();
                report.record_failed_download(&label, &failure.reference.original, &error);
            }
        }

        Ok(report)
    }
}
