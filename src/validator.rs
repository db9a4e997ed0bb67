use anyhow::{Context, Result};
use regex::Regex;
use select::document::Document;
use select::predicate::{Attr, Name};
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;

use crate::file_manager::{INDEX_FILE, PAGES_DIR};

/// Outcome of re-checking written markup against the files on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub total_paths: usize,
    pub valid_paths: usize,
    pub issues: Vec<String>,
    pub is_valid: bool,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }

    pub fn invalid_paths(&self) -> usize {
        self.total_paths - self.valid_paths
    }

    fn record_valid(&mut self) {
        self.total_paths += 1;
        self.valid_paths += 1;
        self.refresh();
    }

    fn record_missing(&mut self, issue: String) {
        self.total_paths += 1;
        self.issues.push(issue);
        self.refresh();
    }

    /// Counts an asset that never made it to disk and whose remote reference
    /// was therefore left in the markup.
    pub fn record_failed_download(&mut self, label: &str, original: &str, error: &str) {
        self.record_missing(format!("Failed to download {}: {} ({})", label, original, error));
    }

    fn refresh(&mut self) {
        self.is_valid = self.valid_paths == self.total_paths;
    }
}

/// Validates `index.html` and every `pages/*.html` under `output_dir`.
pub fn validate_output(output_dir: &Path) -> Result<ValidationReport> {
    let mut report = ValidationReport::new();
    validate_document(output_dir, INDEX_FILE, &mut report)?;

    let pages_dir = output_dir.join(PAGES_DIR);
    if pages_dir.is_dir() {
        let mut pages: Vec<String> = std::fs::read_dir(&pages_dir)
            .with_context(|| format!("Failed to list {:?}", pages_dir))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".html"))
            .collect();
        pages.sort();

        for page in pages {
            validate_document(output_dir, &format!("{}/{}", PAGES_DIR, page), &mut report)?;
        }
    }

    Ok(report)
}

/// Checks every `./` or `../` reference of one written document. Issues from
/// documents other than the root page are prefixed with their path.
pub fn validate_document(output_dir: &Path, document_path: &str, report: &mut ValidationReport) -> Result<()> {
    let file = output_dir.join(document_path);
    let html = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {:?}", file))?;
    let document_dir = file.parent().unwrap_or(output_dir);
    let prefix = if document_path == INDEX_FILE {
        String::new()
    } else {
        format!("{}: ", document_path)
    };

    for (label, reference) in local_references(&html) {
        let on_disk = document_dir.join(strip_suffix(&reference));
        if on_disk.is_file() {
            report.record_valid();
        } else {
            report.record_missing(format!("{}Missing {}: {}", prefix, label, reference));
        }
    }

    Ok(())
}

/// Relative references of the asset-bearing elements, labelled by kind.
fn local_references(html: &str) -> Vec<(&'static str, String)> {
    let document = Document::from(html);
    let mut references = Vec::new();

    for link in document.find(Name("link")) {
        if let Some(href) = link.attr("href") {
            let rel = link.attr("rel").unwrap_or_default().to_ascii_lowercase();
            let label = if rel.contains("preload") && !href.contains(".css") { "Image" } else { "CSS" };
            references.push((label, href.to_string()));
        }
    }
    for script in document.find(Name("script")) {
        if let Some(src) = script.attr("src") {
            references.push(("JS", src.to_string()));
        }
    }
    for img in document.find(Name("img")) {
        if let Some(src) = img.attr("src") {
            references.push(("Image", src.to_string()));
        }
    }
    for element in document.find(Attr("style", ())) {
        if let Some(style) = element.attr("style") {
            for captures in style_url_regex().captures_iter(style) {
                references.push(("Image", captures[1].to_string()));
            }
        }
    }

    references.retain(|(_, reference)| is_local_reference(reference));
    references
}

/// Whether the on-disk pass checks `reference` (`./` or `../` prefixed).
pub fn is_local_reference(reference: &str) -> bool {
    reference.starts_with("./") || reference.starts_with("../")
}

fn strip_suffix(reference: &str) -> &str {
    reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference)
}

fn style_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("url pattern is valid"))
}
