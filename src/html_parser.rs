use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;
use url::Url;

use crate::document::{HtmlDocument, NodeId};
use crate::url_resolver::{self, LinkClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    Stylesheet,
    Script,
    ImageAttribute,
    ImagePreload,
    ImageBackground,
}

impl AssetCategory {
    /// Category subdirectory under the output root.
    pub fn directory(self) -> &'static str {
        match self {
            AssetCategory::Stylesheet => "css",
            AssetCategory::Script => "js",
            _ => "images",
        }
    }

    pub fn is_image(self) -> bool {
        matches!(
            self,
            AssetCategory::ImageAttribute | AssetCategory::ImagePreload | AssetCategory::ImageBackground
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            AssetCategory::Stylesheet => "CSS",
            AssetCategory::Script => "JS",
            _ => "Image",
        }
    }
}

/// Where in the document a reference lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// The whole value of an attribute (`href` or `src`).
    Attribute { node: NodeId, name: &'static str },
    /// One `url(...)` token inside a `style` attribute, at byte range `span`.
    StyleUrl {
        node: NodeId,
        span: Range<usize>,
        token: String,
    },
}

impl Anchor {
    pub fn node(&self) -> NodeId {
        match self {
            Anchor::Attribute { node, .. } | Anchor::StyleUrl { node, .. } => *node,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub absolute_url: Url,
    /// The reference exactly as written in the markup
    pub original: String,
    pub category: AssetCategory,
    pub anchor: Anchor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationLink {
    /// `href` as written in the markup
    pub original: String,
    /// Resolved same-origin URL path
    pub path: String,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub assets: Vec<AssetReference>,
    pub links: Vec<NavigationLink>,
}

impl Extraction {
    pub fn count(&self, category: AssetCategory) -> usize {
        self.assets.iter().filter(|a| a.category == category).count()
    }
}

#[derive(Clone)]
pub struct HtmlParser {
    base_url: Url,
}

impl HtmlParser {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Failed to parse base URL: {}", base_url))?;

        Ok(Self { base_url })
    }

    pub fn from_url(base_url: Url) -> Self {
        Self { base_url }
    }

    /// Walks the node table once and classifies every asset reference and
    /// same-origin navigation link. Unresolvable references are skipped.
    pub fn extract(&self, document: &HtmlDocument) -> Extraction {
        let mut extraction = Extraction::default();
        let mut seen_paths = HashSet::new();

        for node in document.node_ids() {
            let Some(tag) = document.tag(node) else {
                continue;
            };

            match tag {
                "link" => self.extract_link(document, node, &mut extraction.assets),
                "script" => {
                    self.push_attribute(document, node, "src", AssetCategory::Script, &mut extraction.assets)
                }
                "img" => self.push_attribute(
                    document,
                    node,
                    "src",
                    AssetCategory::ImageAttribute,
                    &mut extraction.assets,
                ),
                "a" => {
                    if let Some(href) = document.attr(node, "href") {
                        if let LinkClass::SameOriginPath(path) =
                            url_resolver::classify_link(&self.base_url, &href)
                        {
                            if seen_paths.insert(path.clone()) {
                                extraction.links.push(NavigationLink { original: href, path });
                            }
                        }
                    }
                }
                _ => {}
            }

            if let Some(style) = document.attr(node, "style") {
                if let Some(reference) = self.background_reference(node, &style) {
                    extraction.assets.push(reference);
                }
            }
        }

        extraction
    }

    /// Same-origin navigation paths of an HTML page, first appearance first.
    pub fn navigation_paths(&self, html: &str) -> Vec<String> {
        let document = HtmlDocument::parse(html);
        self.extract(&document)
            .links
            .into_iter()
            .map(|link| link.path)
            .collect()
    }

    fn extract_link(&self, document: &HtmlDocument, node: NodeId, assets: &mut Vec<AssetReference>) {
        let Some(href) = document.attr(node, "href") else {
            return;
        };
        let rel = document.attr(node, "rel").unwrap_or_default().to_ascii_lowercase();
        let has_rel = |token: &str| rel.split_ascii_whitespace().any(|t| t == token);

        let category = if has_rel("stylesheet") || href.contains(".css") {
            AssetCategory::Stylesheet
        } else if has_rel("preload")
            && document
                .attr(node, "as")
                .is_some_and(|value| value.eq_ignore_ascii_case("image"))
        {
            AssetCategory::ImagePreload
        } else {
            return;
        };

        if let Some(reference) = self.attribute_reference(node, "href", &href, category) {
            assets.push(reference);
        }
    }

    fn push_attribute(
        &self,
        document: &HtmlDocument,
        node: NodeId,
        name: &'static str,
        category: AssetCategory,
        assets: &mut Vec<AssetReference>,
    ) {
        if let Some(value) = document.attr(node, name) {
            if let Some(reference) = self.attribute_reference(node, name, &value, category) {
                assets.push(reference);
            }
        }
    }

    fn attribute_reference(
        &self,
        node: NodeId,
        name: &'static str,
        value: &str,
        category: AssetCategory,
    ) -> Option<AssetReference> {
        if is_data_uri(value) {
            return None;
        }
        let absolute_url = url_resolver::resolve(&self.base_url, value)?;

        Some(AssetReference {
            absolute_url,
            original: value.to_string(),
            category,
            anchor: Anchor::Attribute { node, name },
        })
    }

    fn background_reference(&self, node: NodeId, style: &str) -> Option<AssetReference> {
        let (span, url) = background_url(style)?;
        if is_data_uri(url) {
            return None;
        }
        let absolute_url = url_resolver::resolve(&self.base_url, url)?;

        Some(AssetReference {
            absolute_url,
            original: url.to_string(),
            category: AssetCategory::ImageBackground,
            anchor: Anchor::StyleUrl {
                node,
                token: style[span.clone()].to_string(),
                span,
            },
        })
    }
}

fn is_data_uri(value: &str) -> bool {
    value.trim_start().get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

fn background_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)background(?:-image)?\s*:[^;]*?(url\(\s*['"]?([^'")\s]+)['"]?\s*\))"#)
            .expect("background pattern is valid")
    })
}

/// First `url(...)` of a `background`/`background-image` declaration:
/// the byte range of the whole token and the URL inside it.
pub fn background_url(style: &str) -> Option<(Range<usize>, &str)> {
    let captures = background_regex().captures(style)?;
    Some((captures.get(1)?.range(), captures.get(2)?.as_str()))
}
