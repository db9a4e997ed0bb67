use url::Url;

/// Extensions that never name a navigable document.
const NON_PAGE_EXTENSIONS: &[&str] = &[".pdf", ".zip", ".jpg", ".jpeg", ".png", ".gif"];

/// Path fragments that point at restricted areas.
const RESTRICTED_SEGMENTS: &[&str] = &["admin", "login"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkClass {
    /// Same scheme, host and port as the base page; holds the URL path.
    SameOriginPath(String),
    ExternalAbsolute(Url),
    NonPage,
}

/// Resolves `reference` against `base` with standard URL joining.
///
/// Absolute references come back unchanged, protocol-relative ones inherit the
/// base scheme, and anything that does not end up as an http(s) URL is
/// unresolvable.
pub fn resolve(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let url = base.join(reference).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Classifies an anchor `href` found on the page at `base`.
pub fn classify_link(base: &Url, href: &str) -> LinkClass {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return LinkClass::NonPage;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("tel:") {
        return LinkClass::NonPage;
    }
    if href.contains('?') || href.contains('#') {
        return LinkClass::NonPage;
    }

    let Some(url) = resolve(base, href) else {
        return LinkClass::NonPage;
    };

    if !is_same_origin(base, &url) {
        return LinkClass::ExternalAbsolute(url);
    }

    let path = url.path().to_string();
    if path == "/" || path == base.path() {
        return LinkClass::NonPage;
    }

    let lower_path = path.to_ascii_lowercase();
    if NON_PAGE_EXTENSIONS.iter().any(|ext| lower_path.ends_with(ext))
        || RESTRICTED_SEGMENTS.iter().any(|seg| lower_path.contains(seg))
    {
        return LinkClass::NonPage;
    }

    LinkClass::SameOriginPath(path)
}
