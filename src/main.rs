use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;
use url::Url;

use site_cloner::cli::{Command, MirrorCommand};
use site_cloner::mirror::{MirrorReport, MirrorRequest, WebsiteMirror};
use site_cloner::tools::{self, Toolbox};
use site_cloner::validator;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "site_cloner=info".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = MirrorCommand::parse();
    let config = args.to_config()?;
    let mirror = WebsiteMirror::new(config.clone()).context("Failed to build HTTP client")?;

    match &args.command {
        Command::Clone { url, output_dir } => {
            let request = MirrorRequest::new(url, &output_dir.to_string_lossy(), 0)?;
            println!("🚀 Cloning {} -> {}", url.blue(), output_dir.display());
            let report = mirror.mirror_page(&request).await?;
            print_report(&report, args.json, tools::format_clone_report)?;
        }
        Command::CloneSite { url, output_dir, .. } => {
            let request = MirrorRequest::new(url, &output_dir.to_string_lossy(), config.max_subpages)?;
            println!("🚀 Cloning {} with subpages -> {}", url.blue(), output_dir.display());
            let report = mirror.mirror_site(&request).await?;
            print_report(&report, args.json, tools::format_site_report)?;
        }
        Command::Validate { output_dir } => {
            let report = validator::validate_output(output_dir)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let text = tools::format_validation_report(&output_dir.to_string_lossy(), &report);
                if report.is_valid {
                    println!("{}", text.green());
                } else {
                    println!("{}", text.yellow());
                }
            }
        }
        Command::ListPages { url } => {
            let url = Url::parse(url).with_context(|| format!("Failed to parse URL: {}", url))?;
            let paths = mirror.discover_subpages(&url).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&paths)?);
            } else {
                println!("📄 Found {} potential subpages", paths.len().to_string().bold());
                for path in paths {
                    println!("  {}", path);
                }
            }
        }
        Command::Invoke { tool, input } => {
            let toolbox = Toolbox::new(mirror);
            println!("{}", toolbox.invoke(tool, input).await);
        }
    }

    Ok(())
}

fn print_report(report: &MirrorReport, json: bool, format: fn(&MirrorReport) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
        return Ok(());
    }

    let text = format(report);
    if report.validation.is_valid {
        println!("{}", text.green());
    } else {
        println!("{}", text.yellow());
    }
    Ok(())
}
