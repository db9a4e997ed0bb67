use url::Url;

use crate::document::HtmlDocument;
use crate::downloader::DownloadResult;
use crate::error::MirrorError;
use crate::file_manager;
use crate::html_parser::{Anchor, AssetCategory};
use crate::url_resolver::{self, LinkClass};

/// A same-origin path that was mirrored, and where its file landed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PageLink {
    pub path: String,
    /// Output-relative file, e.g. `pages/about.html`
    pub file: String,
}

/// Points every successfully downloaded reference at its local copy.
///
/// `page_dir` is the output-relative directory of the document being
/// rewritten (`""` for the root page, `pages` for subpages). Failed downloads
/// keep their original reference. Returns the number of rewritten anchors.
pub fn rewrite_assets(document: &mut HtmlDocument, results: &[DownloadResult], page_dir: &str) -> usize {
    let mut rewritten = 0;

    for result in results {
        let Some(local) = result.local_path() else {
            continue;
        };
        let reference = file_manager::local_reference(local, page_dir);

        match &result.reference.anchor {
            Anchor::Attribute { node, name } => {
                document.set_attr(*node, name, &reference);
                if result.reference.category == AssetCategory::ImageAttribute {
                    document.remove_attr(*node, "srcset");
                }
                rewritten += 1;
            }
            Anchor::StyleUrl { node, span, token } => {
                let Some(mut style) = document.attr(*node, "style") else {
                    continue;
                };
                if style.get(span.clone()) != Some(token.as_str()) {
                    continue;
                }
                style.replace_range(span.clone(), &format!("url('{}')", reference));
                document.set_attr(*node, "style", &style);
                rewritten += 1;
            }
        }
    }

    rewritten
}

/// Reconciliation pass for the root page: anchors whose same-origin path was
/// mirrored now point at the subpage file. Unmatched links stay as they are.
pub fn reconcile_navigation(document: &mut HtmlDocument, base: &Url, pages: &[PageLink]) -> usize {
    let mut updated = 0;

    for node in document.node_ids() {
        if document.tag(node) != Some("a") {
            continue;
        }
        let Some(href) = document.attr(node, "href") else {
            continue;
        };
        let LinkClass::SameOriginPath(path) = url_resolver::classify_link(base, &href) else {
            continue;
        };

        if let Some(page) = pages.iter().find(|page| page.path == path) {
            let target = file_manager::local_reference(&page.file, "");
            tracing::debug!(%href, %target, "updated navigation link");
            document.set_attr(node, "href", &target);
            updated += 1;
        }
    }

    updated
}

/// Applies asset rewrites and navigation reconciliation, then serializes.
pub fn rewrite(
    document: &mut HtmlDocument,
    results: &[DownloadResult],
    base: &Url,
    pages: &[PageLink],
) -> Result<String, MirrorError> {
    rewrite_assets(document, results, "");
    reconcile_navigation(document, base, pages);
    document.to_html()
}
