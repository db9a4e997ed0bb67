use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::MirrorError;
use crate::html_parser::AssetCategory;

pub const INDEX_FILE: &str = "index.html";
pub const PAGES_DIR: &str = "pages";

const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// Descriptive names for well-known image APIs whose URLs carry no
/// meaningful file name.
const KNOWN_IMAGE_HOSTS: &[(&str, &str)] = &[
    ("ghchart.rshah.org", "github-chart.svg"),
    ("leetcode.card.workers.dev", "leetcode-stats.png"),
    ("github-readme-stats.vercel.app", "github-stats.svg"),
];

const API_HOST_HINTS: &[&str] = &["github", "leetcode", "chart"];

/// Writes mirrored files under one output root.
#[derive(Debug, Clone)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute location of an output-relative path such as `css/site.css`.
    pub fn path_for(&self, relative: &str) -> PathBuf {
        let mut path = self.base_dir.clone();
        for segment in relative.split('/').filter(|s| !s.is_empty() && *s != ".") {
            path.push(segment);
        }
        path
    }

    pub async fn ensure_dir(&self, relative: &str) -> Result<PathBuf, MirrorError> {
        let dir = self.path_for(relative);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| MirrorError::io(&dir, e))?;
        Ok(dir)
    }

    /// Writes `content` to `relative`, creating parent directories first.
    pub async fn save_file(&self, relative: &str, content: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.path_for(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }

    pub fn file_exists(&self, relative: &str) -> bool {
        self.path_for(relative).is_file()
    }
}

/// Local file name for an asset, before collision handling.
pub fn derive_asset_filename(url: &Url, category: AssetCategory) -> String {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(sanitize_filename);

    match category {
        AssetCategory::Stylesheet => {
            with_extension(last_segment.unwrap_or_else(|| "styles.css".to_string()), ".css")
        }
        AssetCategory::Script => {
            with_extension(last_segment.unwrap_or_else(|| "script.js".to_string()), ".js")
        }
        _ => image_filename(url, last_segment),
    }
}

fn image_filename(url: &Url, last_segment: Option<String>) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

    if let Some((_, name)) = KNOWN_IMAGE_HOSTS.iter().find(|(known, _)| host.contains(known)) {
        return name.to_string();
    }
    if API_HOST_HINTS.iter().any(|hint| host.contains(hint)) {
        return format!("api-image-{}.{}", short_hash(url.as_str()), DEFAULT_IMAGE_EXTENSION);
    }

    let name = last_segment.unwrap_or_else(|| "image".to_string());
    let is_image = mime_guess::from_path(&name)
        .first()
        .is_some_and(|m| m.type_() == mime::IMAGE);
    if is_image {
        name
    } else {
        format!("{}.{}", name, DEFAULT_IMAGE_EXTENSION)
    }
}

fn with_extension(name: String, extension: &str) -> String {
    if name.to_ascii_lowercase().ends_with(extension) {
        name
    } else {
        format!("{}{}", name, extension)
    }
}

/// Restricts a path segment to `[A-Za-z0-9._-]`.
pub fn sanitize_filename(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => c,
            _ => '-',
        })
        .collect();

    // Never produce hidden files or `..`
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Output file name for a subpage path, e.g. `/blog/post/` -> `blog-post.html`.
pub fn page_filename(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let lower = trimmed.to_ascii_lowercase();
    let stem = if lower.ends_with(".html") {
        &trimmed[..trimmed.len() - 5]
    } else if lower.ends_with(".htm") {
        &trimmed[..trimmed.len() - 4]
    } else {
        trimmed
    };

    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();

    if stem.is_empty() {
        "page.html".to_string()
    } else {
        format!("{}.html", stem)
    }
}

/// First 8 hex digits of SHA-256 over `input`.
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

/// `name` with `-<hash>` inserted before its extension.
pub fn disambiguate(name: &str, key: &str) -> String {
    let hash = short_hash(key);
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}-{}{}", &name[..dot], hash, &name[dot..]),
        _ => format!("{}-{}", name, hash),
    }
}

/// Claims a free file name in `directory` for `key`, starting from `name`.
///
/// `taken` holds case-folded `directory/name` entries, so `Logo.png` and
/// `logo.png` collide as they would on a case-insensitive filesystem. Each
/// further collision salts the hash with an attempt counter.
pub fn reserve_name(taken: &mut HashSet<String>, directory: &str, name: &str, key: &str) -> String {
    let mut candidate = name.to_string();
    let mut attempt = 0usize;
    while !taken.insert(format!("{}/{}", directory, candidate).to_ascii_lowercase()) {
        let salted = if attempt == 0 {
            key.to_string()
        } else {
            format!("{}#{}", key, attempt)
        };
        candidate = disambiguate(name, &salted);
        attempt += 1;
    }
    candidate
}

/// Markup reference from a document in `page_dir` to the output-relative
/// `target`; always `./` or `../` prefixed.
pub fn local_reference(target: &str, page_dir: &str) -> String {
    let relative = pathdiff::diff_paths(Path::new(target), Path::new(page_dir))
        .unwrap_or_else(|| PathBuf::from(target));
    let relative = relative.to_string_lossy().replace('\\', "/");

    if relative.starts_with("../") {
        relative
    } else {
        format!("./{}", relative)
    }
}
