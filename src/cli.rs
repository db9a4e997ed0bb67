use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::MirrorConfig;

#[derive(Parser, Debug)]
#[command(
    name = "site-cloner",
    about = "Mirror a web page and its subpages into a local directory",
    version,
    long_about = "Downloads a static copy of a web page's HTML, CSS, images and JavaScript into css/, js/ and images/, rewrites every reference to the local copies and validates that each one exists on disk."
)]
pub struct MirrorCommand {
    #[command(subcommand)]
    pub command: Command,

    /// JSON config file; flags below override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum concurrent image downloads
    #[arg(short = 'c', long, global = true)]
    pub max_concurrent: Option<usize>,

    /// Timeout for requests in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// User agent string to use for requests
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Hide progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Print the report as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Mirror a single page
    Clone {
        /// The URL of the page to mirror
        url: String,

        /// Output directory for the mirrored page
        #[arg(short, long, default_value = "./mirrored_site")]
        output_dir: PathBuf,
    },

    /// Mirror a page and its same-origin subpages (one level deep)
    CloneSite {
        url: String,

        #[arg(short, long, default_value = "./mirrored_site")]
        output_dir: PathBuf,

        /// Maximum number of subpages to mirror
        #[arg(short = 'n', long)]
        max_subpages: Option<usize>,
    },

    /// Check that every local reference in a mirrored directory exists
    Validate { output_dir: PathBuf },

    /// List the same-origin subpages linked from a page
    ListPages { url: String },

    /// Run a tool by name with a raw input string
    Invoke { tool: String, input: String },
}

impl MirrorCommand {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn to_config(&self) -> Result<MirrorConfig> {
        let mut config = match &self.config {
            Some(path) => MirrorConfig::load(path)?,
            None => MirrorConfig::default(),
        };

        if let Some(max_concurrent) = self.max_concurrent {
            config.max_concurrent = max_concurrent;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Command::CloneSite {
            max_subpages: Some(max_subpages),
            ..
        } = self.command
        {
            config.max_subpages = max_subpages;
        }
        if self.no_progress || self.json {
            config.show_progress = false;
        }

        config.validate()?;
        Ok(config)
    }
}
