use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use url::Url;

use crate::file_manager::INDEX_FILE;
use crate::mirror::{MirrorReport, MirrorRequest, WebsiteMirror};
use crate::validator::{self, ValidationReport};

pub const CLONE_SITE: &str = "cloneSite";
pub const CLONE_SITE_WITH_SUBPAGES: &str = "cloneSiteWithSubpages";
pub const VALIDATE_AND_FIX_PATHS: &str = "validateAndFixPaths";
pub const GET_URLS_IN_WEBSITE_PAGE: &str = "getUrlsInWebsitePage";

const INPUT_FORMAT_ERROR: &str =
    "Error: Input should be in format 'siteUrl|||outputDir' or 'siteUrl, outputDir'";

/// A named operation the agent loop can call with a raw input string.
/// Every outcome, including failure, comes back as text.
#[async_trait(?Send)]
pub trait Tool {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn execute(&self, input: &str) -> String;
}

/// Splits `"<url>|||<dir>"` (or `"<url>, <dir>"`) into its two parts.
pub fn parse_clone_input(input: &str) -> Option<(String, String)> {
    let (url, dir) = input.split_once("|||").or_else(|| input.split_once(','))?;
    let (url, dir) = (url.trim(), dir.trim());
    if url.is_empty() || dir.is_empty() {
        return None;
    }
    Some((url.to_string(), dir.to_string()))
}

pub struct CloneSiteTool {
    mirror: Arc<WebsiteMirror>,
}

#[async_trait(?Send)]
impl Tool for CloneSiteTool {
    fn name(&self) -> &str {
        CLONE_SITE
    }

    fn description(&self) -> &str {
        "Clones a website's HTML, CSS, JS and images to a local directory. \
         Input format: \"siteUrl|||outputDir\" or \"siteUrl, outputDir\". \
         Creates separate folders: css/, js/, images/"
    }

    async fn execute(&self, input: &str) -> String {
        let Some((url, dir)) = parse_clone_input(input) else {
            return INPUT_FORMAT_ERROR.to_string();
        };
        let request = match MirrorRequest::new(&url, &dir, 0) {
            Ok(request) => request,
            Err(e) => return format!("Error: {}", e),
        };

        match self.mirror.mirror_page(&request).await {
            Ok(report) => format_clone_report(&report),
            Err(e) => format!("❌ Error cloning site: {}", e),
        }
    }
}

pub struct CloneSiteWithSubpagesTool {
    mirror: Arc<WebsiteMirror>,
}

#[async_trait(?Send)]
impl Tool for CloneSiteWithSubpagesTool {
    fn name(&self) -> &str {
        CLONE_SITE_WITH_SUBPAGES
    }

    fn description(&self) -> &str {
        "Clones the main page AND its same-origin subpages (one level deep) with \
         navigation links pointing at the local copies. Same input format as cloneSite."
    }

    async fn execute(&self, input: &str) -> String {
        let Some((url, dir)) = parse_clone_input(input) else {
            return INPUT_FORMAT_ERROR.to_string();
        };
        let request = match MirrorRequest::new(&url, &dir, self.mirror.config().max_subpages) {
            Ok(request) => request,
            Err(e) => return format!("Error: {}", e),
        };

        match self.mirror.mirror_site(&request).await {
            Ok(report) => format_site_report(&report),
            Err(e) => format!("❌ Error cloning site with subpages: {}", e),
        }
    }
}

pub struct ValidatePathsTool;

#[async_trait(?Send)]
impl Tool for ValidatePathsTool {
    fn name(&self) -> &str {
        VALIDATE_AND_FIX_PATHS
    }

    fn description(&self) -> &str {
        "Validates all relative paths in a cloned website directory and reports any issues. \
         Input: the output directory."
    }

    async fn execute(&self, input: &str) -> String {
        let output_dir = input.trim();
        if output_dir.is_empty() {
            return "Error: Please provide the directory path to validate".to_string();
        }
        if !Path::new(output_dir).join(INDEX_FILE).is_file() {
            return format!("Error: No index.html found in {}", output_dir);
        }

        match validator::validate_output(Path::new(output_dir)) {
            Ok(report) => format_validation_report(output_dir, &report),
            Err(e) => format!("❌ Error validating paths: {:#}", e),
        }
    }
}

pub struct ListSubpagesTool {
    mirror: Arc<WebsiteMirror>,
}

#[async_trait(?Send)]
impl Tool for ListSubpagesTool {
    fn name(&self) -> &str {
        GET_URLS_IN_WEBSITE_PAGE
    }

    fn description(&self) -> &str {
        "Scrapes a web page and lists the same-origin subpage paths it links to. Input: a URL."
    }

    async fn execute(&self, input: &str) -> String {
        let url = match Url::parse(input.trim()) {
            Ok(url) => url,
            Err(e) => return format!("Error: invalid URL '{}': {}", input.trim(), e),
        };

        match self.mirror.discover_subpages(&url).await {
            Ok(paths) if paths.is_empty() => format!("📄 No subpages found on {}", url),
            Ok(paths) => {
                let mut result = format!("📄 Found {} potential subpages:\n", paths.len());
                for (index, path) in paths.iter().enumerate() {
                    result.push_str(&format!("{}. {}\n", index + 1, path));
                }
                result.trim_end().to_string()
            }
            Err(e) => format!("❌ Error scraping URLs: {}", e),
        }
    }
}

/// Registry of the mirroring tools, addressed by name.
pub struct Toolbox {
    tools: Vec<Box<dyn Tool>>,
}

impl Toolbox {
    pub fn new(mirror: WebsiteMirror) -> Self {
        let mirror = Arc::new(mirror);
        Self {
            tools: vec![
                Box::new(CloneSiteTool { mirror: mirror.clone() }),
                Box::new(CloneSiteWithSubpagesTool { mirror: mirror.clone() }),
                Box::new(ValidatePathsTool),
                Box::new(ListSubpagesTool { mirror }),
            ],
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|tool| tool.name() == name).map(|tool| tool.as_ref())
    }

    /// Runs `tool_name` with `input`. Always yields a terminal result string.
    pub async fn invoke(&self, tool_name: &str, input: &str) -> String {
        match self.get(tool_name) {
            Some(tool) => {
                tracing::info!(tool = tool_name, %input, "invoking tool");
                tool.execute(input).await
            }
            None => format!("There is no such tool as {}", tool_name),
        }
    }
}

fn push_issues(result: &mut String, validation: &ValidationReport) {
    if !validation.is_valid {
        result.push_str(&format!("\n⚠️ Issues found:\n{}", validation.issues.join("\n")));
    }
}

pub fn format_clone_report(report: &MirrorReport) -> String {
    let counts = report.root_counts();
    let mut result = format!(
        "✅ Successfully cloned {} to {}\n",
        report.source_url,
        report.output_root.display()
    );
    result.push_str(&format!(
        "📁 Structure: css/ ({} files), js/ ({} files), images/ ({} files)\n",
        counts.stylesheets, counts.scripts, counts.images
    ));
    result.push_str(&format!(
        "🔍 Path validation: {}/{} valid paths",
        report.validation.valid_paths, report.validation.total_paths
    ));
    push_issues(&mut result, &report.validation);
    result
}

pub fn format_site_report(report: &MirrorReport) -> String {
    let mut result = format!(
        "✅ Successfully cloned {} with {} subpages to {}\n",
        report.source_url,
        report.subpages.len(),
        report.output_root.display()
    );
    result.push_str("📁 Main page: index.html\n");
    result.push_str(&format!("📁 Subpages: pages/ ({} files)\n", report.subpages.len()));
    result.push_str(&format!(
        "📁 Assets: css/, js/, images/ ({} unique files)\n",
        report.unique_assets()
    ));
    result.push_str(&format!(
        "🔗 Updated {} navigation links in main page\n",
        report.updated_links
    ));
    result.push_str(&format!(
        "🔍 Path validation: {}/{} valid paths",
        report.validation.valid_paths, report.validation.total_paths
    ));

    if report.page_links.is_empty() {
        result.push_str("\n🔍 No subpages found to clone.");
    } else {
        result.push_str("\n📋 Cloned subpages:");
        for link in &report.page_links {
            result.push_str(&format!("\n  - {} -> ./{}", link.path, link.file));
        }
    }

    push_issues(&mut result, &report.validation);
    result
}

pub fn format_validation_report(output_dir: &str, report: &ValidationReport) -> String {
    let mut result = format!("🔍 Path Validation Report for {}:\n", output_dir);
    result.push_str(&format!("📊 Total paths: {}\n", report.total_paths));
    result.push_str(&format!("✅ Valid paths: {}\n", report.valid_paths));
    result.push_str(&format!("❌ Invalid paths: {}\n\n", report.invalid_paths()));

    if report.issues.is_empty() {
        result.push_str("🎉 All paths are valid! The cloned site should work properly.");
    } else {
        result.push_str(&format!("⚠️ Issues found:\n{}\n\n", report.issues.join("\n")));
        result.push_str("💡 Suggestions:\n");
        result.push_str("- Check if all assets were downloaded properly\n");
        result.push_str("- Verify network connectivity during cloning\n");
        result.push_str("- Some external assets might be blocked by CORS");
    }

    result
}
