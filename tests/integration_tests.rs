mod common;

use common::{quiet_config, HangingSource, StaticSource};
use select::document::Document;
use select::predicate::Name;
use site_cloner::file_manager;
use site_cloner::{AssetCategory, MirrorConfig, MirrorError, MirrorRequest, WebsiteMirror};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const BASIC_PAGE: &str = r#"<!DOCTYPE html>
<html>
    <head>
        <title>Basic</title>
        <link rel="stylesheet" href="/styles.css">
        <script src="js/app.js"></script>
    </head>
    <body>
        <img src="https://example.com/img/logo.png" srcset="/img/logo@2x.png 2x" alt="Logo">
        <a href="/about">About</a>
    </body>
</html>"#;

fn basic_source() -> StaticSource {
    StaticSource::new()
        .page("https://example.com/", BASIC_PAGE)
        .asset("https://example.com/styles.css", b"body { color: red; }")
        .asset("https://example.com/js/app.js", b"console.log('hi');")
        .asset("https://example.com/img/logo.png", b"\x89PNG")
}

fn request(output: &Path, max_subpages: usize) -> MirrorRequest {
    MirrorRequest::new("https://example.com/", output.to_str().unwrap(), max_subpages).unwrap()
}

fn attrs(html: &str, tag: &str, attr: &str) -> Vec<String> {
    Document::from(html)
        .find(Name(tag))
        .filter_map(|node| node.attr(attr).map(str::to_string))
        .collect()
}

fn files_in(root: &Path) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for dir in ["css", "js", "images", "pages"] {
        if let Ok(entries) = fs::read_dir(root.join(dir)) {
            for entry in entries.flatten() {
                found.insert(format!("{}/{}", dir, entry.file_name().to_string_lossy()));
            }
        }
    }
    found
}

#[tokio::test]
async fn test_single_page_mirror_all_assets_reachable() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let mirror = WebsiteMirror::with_source(Arc::new(basic_source()), quiet_config());

    let report = mirror.mirror_page(&request(root, 0)).await.unwrap();

    assert!(root.join("css/styles.css").is_file());
    assert!(root.join("js/app.js").is_file());
    assert!(root.join("images/logo.png").is_file());
    assert_eq!(fs::read(root.join("css/styles.css")).unwrap(), b"body { color: red; }");

    assert_eq!(report.validation.valid_paths, 3);
    assert_eq!(report.validation.total_paths, 3);
    assert!(report.validation.is_valid);

    let counts = report.root_counts();
    assert_eq!((counts.stylesheets, counts.scripts, counts.images), (1, 1, 1));

    let html = fs::read_to_string(root.join("index.html")).unwrap();
    assert_eq!(attrs(&html, "link", "href"), vec!["./css/styles.css"]);
    assert_eq!(attrs(&html, "script", "src"), vec!["./js/app.js"]);
    assert_eq!(attrs(&html, "img", "src"), vec!["./images/logo.png"]);
    assert!(attrs(&html, "img", "srcset").is_empty());
    assert_eq!(attrs(&html, "img", "alt"), vec!["Logo"]);
    // Single-page mode leaves navigation alone
    assert_eq!(attrs(&html, "a", "href"), vec!["/about"]);
    assert!(html.contains("<title>Basic</title>"));
}

#[tokio::test]
async fn test_unreachable_image_is_reported_and_left_remote() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let source = StaticSource::new()
        .page(
            "https://example.com/",
            r#"<html><head><link rel="stylesheet" href="/styles.css"><script src="/app.js"></script></head>
               <body><img src="https://images.down.example/logo.png"></body></html>"#,
        )
        .asset("https://example.com/styles.css", b"css")
        .asset("https://example.com/app.js", b"js");
    let mirror = WebsiteMirror::with_source(Arc::new(source), quiet_config());

    let report = mirror.mirror_page(&request(root, 0)).await.unwrap();

    assert!(root.join("css/styles.css").is_file());
    assert!(root.join("js/app.js").is_file());
    assert!(!root.join("images").exists());

    let html = fs::read_to_string(root.join("index.html")).unwrap();
    assert_eq!(attrs(&html, "link", "href"), vec!["./css/styles.css"]);
    assert_eq!(attrs(&html, "script", "src"), vec!["./js/app.js"]);
    assert_eq!(attrs(&html, "img", "src"), vec!["https://images.down.example/logo.png"]);

    assert!(!report.validation.is_valid);
    assert_eq!(report.validation.valid_paths, 2);
    assert_eq!(report.validation.total_paths, 3);
    assert_eq!(report.validation.issues.len(), 1);
    assert!(report.validation.issues[0].contains("https://images.down.example/logo.png"));
    assert_eq!(report.root.failures().count(), 1);
}

#[tokio::test]
async fn test_every_asset_reference_is_local_or_listed() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let source = StaticSource::new()
        .page(
            "https://example.com/",
            r#"<html><head>
                 <link rel="stylesheet" href="/a.css"><link rel="stylesheet" href="/missing.css">
                 <link rel="preload" as="image" href="/hero.webp">
                 <script src="/a.js"></script><script src="/missing.js"></script>
               </head><body>
                 <img src="/one.png"><img src="/gone.png">
                 <div style="background-image: url(/bg.png)"></div>
               </body></html>"#,
        )
        .asset("https://example.com/a.css", b"a")
        .asset("https://example.com/a.js", b"a")
        .asset("https://example.com/hero.webp", b"w")
        .asset("https://example.com/one.png", b"1")
        .asset("https://example.com/bg.png", b"b");
    let mirror = WebsiteMirror::with_source(Arc::new(source), quiet_config());

    let report = mirror.mirror_page(&request(root, 0)).await.unwrap();
    let html = fs::read_to_string(root.join("index.html")).unwrap();

    let mut references = attrs(&html, "link", "href");
    references.extend(attrs(&html, "script", "src"));
    references.extend(attrs(&html, "img", "src"));

    for reference in references {
        if reference.starts_with("./") {
            assert!(root.join(&reference[2..]).is_file(), "{} should exist", reference);
        } else {
            assert!(
                report.validation.issues.iter().any(|issue| issue.contains(&reference)),
                "{} should be listed as an issue",
                reference
            );
        }
    }
    assert_eq!(report.validation.total_paths, 8);
    assert_eq!(report.validation.valid_paths, 5);
}

#[tokio::test]
async fn test_background_rewrite_keeps_other_declarations() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let source = StaticSource::new()
        .page(
            "https://example.com/",
            r#"<section class="hero" style="padding: 2rem; background: #000 url('/img/hero.jpg') center / cover no-repeat; color: white">Hi</section>"#,
        )
        .asset("https://example.com/img/hero.jpg", b"jpg");
    let mirror = WebsiteMirror::with_source(Arc::new(source), quiet_config());

    let report = mirror.mirror_page(&request(root, 0)).await.unwrap();
    assert_eq!(report.root.count(AssetCategory::ImageBackground), 1);

    let html = fs::read_to_string(root.join("index.html")).unwrap();
    assert_eq!(
        attrs(&html, "section", "style"),
        vec!["padding: 2rem; background: #000 url('./images/hero.jpg') center / cover no-repeat; color: white"]
    );
    assert!(report.validation.is_valid);
    assert_eq!(report.validation.total_paths, 1);
}

#[tokio::test]
async fn test_failed_relative_reference_is_counted_once() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let source = StaticSource::new().page("https://example.com/", r#"<img src="./gone.png">"#);
    let mirror = WebsiteMirror::with_source(Arc::new(source), quiet_config());

    let report = mirror.mirror_page(&request(root, 0)).await.unwrap();

    let html = fs::read_to_string(root.join("index.html")).unwrap();
    assert_eq!(attrs(&html, "img", "src"), vec!["./gone.png"]);
    assert_eq!(report.root.failures().count(), 1);
    assert_eq!(report.validation.total_paths, 1);
    assert_eq!(report.validation.valid_paths, 0);
    assert_eq!(report.validation.issues, vec!["Missing Image: ./gone.png".to_string()]);
    assert!(!report.validation.is_valid);
}

#[tokio::test]
async fn test_background_rewrite_skips_identical_url_in_other_declaration() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let source = StaticSource::new()
        .page(
            "https://example.com/",
            r#"<div style="mask-image: url(/a.png); background: url(/a.png)"></div>"#,
        )
        .asset("https://example.com/a.png", b"png");
    let mirror = WebsiteMirror::with_source(Arc::new(source), quiet_config());

    let report = mirror.mirror_page(&request(root, 0)).await.unwrap();

    let html = fs::read_to_string(root.join("index.html")).unwrap();
    assert_eq!(
        attrs(&html, "div", "style"),
        vec!["mask-image: url(/a.png); background: url('./images/a.png')"]
    );
    assert_eq!(report.validation.total_paths, 1);
    assert!(report.validation.is_valid);
}

#[tokio::test]
async fn test_colliding_names_are_disambiguated() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let source = StaticSource::new()
        .page(
            "https://example.com/",
            r#"<img src="/a/logo.png"><img src="/b/logo.png"><img src="/a/logo.png">"#,
        )
        .asset("https://example.com/a/logo.png", b"first")
        .asset("https://example.com/b/logo.png", b"second");
    let source = Arc::new(source);
    let mirror = WebsiteMirror::with_source(source.clone(), quiet_config());

    let report = mirror.mirror_page(&request(root, 0)).await.unwrap();

    let html = fs::read_to_string(root.join("index.html")).unwrap();
    let srcs = attrs(&html, "img", "src");
    assert_eq!(srcs[0], "./images/logo.png");
    assert_ne!(srcs[1], srcs[0]);
    assert_eq!(srcs[2], srcs[0]);
    assert_eq!(fs::read(root.join("images/logo.png")).unwrap(), b"first");
    assert_eq!(fs::read(root.join(&srcs[1][2..])).unwrap(), b"second");
    assert_eq!(source.requests_for("https://example.com/a/logo.png"), 1);
    assert!(report.validation.is_valid);
}

#[tokio::test]
async fn test_mirroring_twice_is_idempotent() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let mirror = WebsiteMirror::with_source(Arc::new(basic_source()), quiet_config());

    let a = mirror.mirror_page(&request(first.path(), 0)).await.unwrap();
    let b = mirror.mirror_page(&request(second.path(), 0)).await.unwrap();

    assert_eq!(files_in(first.path()), files_in(second.path()));
    assert_eq!(a.validation.valid_paths, b.validation.valid_paths);
    assert_eq!(a.validation.total_paths, b.validation.total_paths);
    assert_eq!(
        fs::read_to_string(first.path().join("index.html")).unwrap(),
        fs::read_to_string(second.path().join("index.html")).unwrap()
    );
}

#[tokio::test]
async fn test_unreachable_root_page_fails_without_output() {
    let temp_dir = tempdir().unwrap();
    let output = temp_dir.path().join("site");
    let mirror = WebsiteMirror::with_source(Arc::new(StaticSource::new()), quiet_config());

    let result = mirror.mirror_page(&request(&output, 0)).await;

    assert!(result.is_err());
    assert!(!output.exists());
}

const SITE_ROOT: &str = r##"<html><head><link rel="stylesheet" href="/site.css"></head><body>
    <nav>
        <a href="/">Home</a>
        <a href="/about">About</a>
        <a href="https://example.com/projects/">Projects</a>
        <a href="/about">About again</a>
        <a href="/broken">Broken</a>
        <a href="/blog.html">Blog</a>
        <a href="/contact">Contact</a>
        <a href="#top">Top</a>
        <a href="/search?q=x">Search</a>
        <a href="/cv.pdf">CV</a>
        <a href="/admin">Admin</a>
        <a href="/login">Login</a>
        <a href="mailto:me@example.com">Mail</a>
        <a href="https://github.com/me">GitHub</a>
    </nav>
    <img src="/img/logo.png">
</body></html>"##;

const SUBPAGE: &str = r#"<html><head><link rel="stylesheet" href="/site.css"></head>
    <body><img src="https://example.com/img/logo.png"><img src="/img/only-here.png"></body></html>"#;

fn site_source() -> StaticSource {
    StaticSource::new()
        .page("https://example.com/", SITE_ROOT)
        .page("https://example.com/about", SUBPAGE)
        .page("https://example.com/projects/", SUBPAGE)
        .page("https://example.com/blog.html", SUBPAGE)
        .page("https://example.com/contact", SUBPAGE)
        .asset("https://example.com/site.css", b"css")
        .asset("https://example.com/img/logo.png", b"logo")
        .asset("https://example.com/img/only-here.png", b"only")
}

#[tokio::test]
async fn test_site_mirror_discovers_reconciles_and_shares_assets() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let source = Arc::new(site_source());
    let mirror = WebsiteMirror::with_source(source.clone(), quiet_config());

    let report = mirror.mirror_site(&request(root, 10)).await.unwrap();

    // /broken is discovered but 404s, so it is skipped
    assert_eq!(report.discovered_subpages, 5);
    let written: Vec<_> = report.page_links.iter().map(|l| (l.path.as_str(), l.file.as_str())).collect();
    assert_eq!(
        written,
        vec![
            ("/about", "pages/about.html"),
            ("/projects/", "pages/projects.html"),
            ("/blog.html", "pages/blog.html"),
            ("/contact", "pages/contact.html"),
        ]
    );

    // Shared layout assets are fetched once for all five pages
    assert_eq!(source.requests_for("https://example.com/site.css"), 1);
    assert_eq!(source.requests_for("https://example.com/img/logo.png"), 1);
    assert_eq!(source.requests_for("https://example.com/img/only-here.png"), 1);
    assert_eq!(files_in(root).iter().filter(|f| !f.starts_with("pages/")).count(), 3);

    let index = fs::read_to_string(root.join("index.html")).unwrap();
    assert_eq!(
        attrs(&index, "a", "href"),
        vec![
            "/",
            "./pages/about.html",
            "./pages/projects.html",
            "./pages/about.html",
            "/broken",
            "./pages/blog.html",
            "./pages/contact.html",
            "#top",
            "/search?q=x",
            "/cv.pdf",
            "/admin",
            "/login",
            "mailto:me@example.com",
            "https://github.com/me",
        ]
    );
    assert_eq!(report.updated_links, 5);

    let about = fs::read_to_string(root.join("pages/about.html")).unwrap();
    assert_eq!(attrs(&about, "link", "href"), vec!["../css/site.css"]);
    assert_eq!(attrs(&about, "img", "src"), vec!["../images/logo.png", "../images/only-here.png"]);

    // index: css + img, four subpages: css + 2 imgs each
    assert_eq!(report.validation.total_paths, 2 + 4 * 3);
    assert!(report.validation.is_valid, "{:?}", report.validation.issues);
}

#[tokio::test]
async fn test_subpage_cap_keeps_first_seen() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let source = Arc::new(site_source());
    let mirror = WebsiteMirror::with_source(source.clone(), quiet_config());

    let report = mirror.mirror_site(&request(root, 2)).await.unwrap();

    assert_eq!(report.discovered_subpages, 5);
    assert_eq!(report.subpages.len(), 2);
    assert_eq!(source.requests_for("https://example.com/blog.html"), 0);
    assert_eq!(source.requests_for("https://example.com/contact"), 0);

    let index = fs::read_to_string(root.join("index.html")).unwrap();
    let hrefs = attrs(&index, "a", "href");
    assert!(hrefs.contains(&"./pages/about.html".to_string()));
    assert!(hrefs.contains(&"/contact".to_string()));
    assert!(!root.join("pages/contact.html").exists());
}

#[tokio::test]
async fn test_site_mirror_without_subpages() {
    let temp_dir = tempdir().unwrap();
    let mirror = WebsiteMirror::with_source(Arc::new(basic_source()), quiet_config());

    let report = mirror.mirror_site(&request(temp_dir.path(), 0)).await.unwrap();

    assert_eq!(report.discovered_subpages, 1);
    assert!(report.subpages.is_empty());
    assert!(!temp_dir.path().join("pages").exists());
    assert!(report.validation.is_valid);
}

#[tokio::test]
async fn test_discover_subpages_lists_filtered_paths() {
    let mirror = WebsiteMirror::with_source(Arc::new(site_source()), quiet_config());
    let url = url::Url::parse("https://example.com/").unwrap();

    let paths = mirror.discover_subpages(&url).await.unwrap();

    assert_eq!(paths, vec!["/about", "/projects/", "/broken", "/blog.html", "/contact"]);
}

mod tool_surface {
    use super::*;
    use site_cloner::Toolbox;

    fn toolbox(source: StaticSource) -> Toolbox {
        Toolbox::new(WebsiteMirror::with_source(Arc::new(source), quiet_config()))
    }

    #[tokio::test]
    async fn test_clone_site_tool_reports_structure() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("Portfolio");
        let tools = toolbox(basic_source());

        let result = tools
            .invoke("cloneSite", &format!("https://example.com/|||{}", dir.display()))
            .await;

        assert!(result.starts_with("✅ Successfully cloned https://example.com/ to "));
        assert!(result.contains("css/ (1 files), js/ (1 files), images/ (1 files)"));
        assert!(result.ends_with("🔍 Path validation: 3/3 valid paths"));
        assert!(dir.join("index.html").is_file());
    }

    #[tokio::test]
    async fn test_clone_site_with_subpages_tool_lists_pages() {
        let temp_dir = tempdir().unwrap();
        let tools = toolbox(site_source());

        let result = tools
            .invoke(
                "cloneSiteWithSubpages",
                &format!("https://example.com/, {}", temp_dir.path().display()),
            )
            .await;

        assert!(result.contains("with 4 subpages"));
        assert!(result.contains("🔗 Updated 5 navigation links in main page"));
        assert!(result.contains("  - /about -> ./pages/about.html"));
        assert!(!result.contains("⚠️ Issues found"));
    }

    #[tokio::test]
    async fn test_malformed_input_has_no_side_effects() {
        let tools = toolbox(basic_source());

        let result = tools.invoke("cloneSite", "https://example.com/").await;
        assert!(result.starts_with("Error: Input should be in format"));

        let result = tools.invoke("cloneSite", "ftp://example.com/|||out").await;
        assert!(result.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_unreachable_root_is_a_result_string() {
        let temp_dir = tempdir().unwrap();
        let tools = toolbox(StaticSource::new());

        let result = tools
            .invoke("cloneSite", &format!("https://example.com/|||{}", temp_dir.path().display()))
            .await;

        assert!(result.starts_with("❌ Error cloning site:"));
    }

    #[tokio::test]
    async fn test_validate_tool() {
        let temp_dir = tempdir().unwrap();
        let tools = toolbox(basic_source());

        let missing = tools
            .invoke("validateAndFixPaths", &temp_dir.path().display().to_string())
            .await;
        assert!(missing.starts_with("Error: No index.html found in"));

        let mirror = WebsiteMirror::with_source(Arc::new(basic_source()), quiet_config());
        mirror.mirror_page(&request(temp_dir.path(), 0)).await.unwrap();
        fs::remove_file(temp_dir.path().join("js/app.js")).unwrap();

        let report = tools
            .invoke("validateAndFixPaths", &temp_dir.path().display().to_string())
            .await;
        assert!(report.contains("📊 Total paths: 3"));
        assert!(report.contains("❌ Invalid paths: 1"));
        assert!(report.contains("Missing JS: ./js/app.js"));
    }

    #[tokio::test]
    async fn test_list_subpages_tool() {
        let tools = toolbox(site_source());

        let result = tools.invoke("getUrlsInWebsitePage", "https://example.com/").await;

        assert_eq!(
            result,
            "📄 Found 5 potential subpages:\n1. /about\n2. /projects/\n3. /broken\n4. /blog.html\n5. /contact"
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let tools = toolbox(StaticSource::new());
        assert_eq!(tools.invoke("deleteSite", "x").await, "There is no such tool as deleteSite");
        assert_eq!(
            tools.names(),
            vec!["cloneSite", "cloneSiteWithSubpages", "validateAndFixPaths", "getUrlsInWebsitePage"]
        );
    }
}

#[tokio::test]
async fn test_job_deadline_expires() {
    let temp_dir = tempdir().unwrap();
    let output = temp_dir.path().join("site");
    let config = MirrorConfig {
        job_timeout_secs: 1,
        ..quiet_config()
    };
    let mirror = WebsiteMirror::with_source(Arc::new(HangingSource), config);

    let result = mirror.mirror_page(&request(&output, 0)).await;
    assert!(matches!(result, Err(MirrorError::Timeout(d)) if d.as_secs() == 1));
    assert!(!output.exists());

    let url = url::Url::parse("https://example.com/").unwrap();
    assert!(matches!(mirror.discover_subpages(&url).await, Err(MirrorError::Timeout(_))));
}

#[tokio::test]
async fn test_subpage_filenames_that_sanitise_alike_stay_distinct() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let source = StaticSource::new()
        .page(
            "https://example.com/",
            r#"<a href="/a-b">Dash</a><a href="/a/b">Nested</a>"#,
        )
        .page("https://example.com/a-b", "<p>dash</p>")
        .page("https://example.com/a/b", "<p>nested</p>");
    let mirror = WebsiteMirror::with_source(Arc::new(source), quiet_config());

    let report = mirror.mirror_site(&request(root, 10)).await.unwrap();

    let second = file_manager::disambiguate("a-b.html", "/a/b");
    let files: Vec<_> = report.page_links.iter().map(|l| l.file.clone()).collect();
    assert_eq!(files, vec!["pages/a-b.html".to_string(), format!("pages/{}", second)]);
    assert!(fs::read_to_string(root.join("pages/a-b.html")).unwrap().contains("dash"));
    assert!(fs::read_to_string(root.join("pages").join(&second)).unwrap().contains("nested"));

    let index = fs::read_to_string(root.join("index.html")).unwrap();
    assert_eq!(
        attrs(&index, "a", "href"),
        vec!["./pages/a-b.html".to_string(), format!("./pages/{}", second)]
    );
    assert_eq!(report.updated_links, 2);
}
