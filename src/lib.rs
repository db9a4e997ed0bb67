pub mod cli;
pub mod config;
pub mod document;
pub mod downloader;
pub mod error;
pub mod file_manager;
pub mod html_parser;
pub mod mirror;
pub mod rewriter;
pub mod tools;
pub mod url_resolver;
pub mod validator;

// Re-export main types for convenience
pub use cli::MirrorCommand;
pub use config::MirrorConfig;
pub use document::HtmlDocument;
pub use downloader::{AssetFetcher, AssetRegistry, DownloadResult, Fetched, HttpSource, ReqwestSource};
pub use error::{DownloadError, FetchError, MirrorError};
pub use file_manager::FileManager;
pub use html_parser::{AssetCategory, AssetReference, HtmlParser, NavigationLink};
pub use mirror::{MirrorReport, MirrorRequest, MirroredPage, WebsiteMirror};
pub use rewriter::PageLink;
pub use tools::{Tool, Toolbox};
pub use url_resolver::LinkClass;
pub use validator::ValidationReport;
