//! cdn-fallback command line.
//!
//! ```text
//! cdn-fallback [--config FILE] [--cdn-domain D] [--fallback-domain O]
//!              [--page-url URL] [--log-level L] <probe | rewrite URL... | config>
//! ```
//!
//! Options from `--config` are loaded first; flags override them.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use url::Url;

use cdn_fallback::config::loader::load_options;
use cdn_fallback::config::validation::validate_options;
use cdn_fallback::observability::logging::init_logging;
use cdn_fallback::rewrite::UrlRewriter;
use cdn_fallback::{CdnFallback, Document, FallbackConfig, FallbackOptions, HttpLoader, TracingReporter};

#[derive(Parser, Debug)]
#[command(name = "cdn-fallback", version, about = "Probe a CDN and rewrite its URLs to a fallback origin")]
struct Cli {
    /// TOML file with fallback options
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    cdn_domain: Option<String>,

    #[arg(long)]
    fallback_domain: Option<String>,

    /// Page the fallback runs for; supplies the scheme and default origin
    #[arg(long, default_value = "https://localhost/")]
    page_url: Url,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the delivery domain once
    Probe,
    /// Rewrite delivery-domain URLs to the fallback origin
    Rewrite { urls: Vec<String> },
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut options = match &cli.config {
        Some(path) => load_options(path)?,
        None => FallbackOptions::default(),
    };
    options = options.merge(FallbackOptions {
        cdn_domain: cli.cdn_domain.clone(),
        fallback_domain: cli.fallback_domain.clone(),
        ..FallbackOptions::default()
    });

    if let Err(errors) = validate_options(&options) {
        for e in &errors {
            tracing::error!(error = %e, "Invalid option");
        }
        return Err(format!("{} invalid option(s)", errors.len()).into());
    }

    let origin = cli.page_url.origin().ascii_serialization();

    match cli.command {
        Command::Probe => {
            let document = Document::new(cli.page_url.clone()).into_shared();
            let fallback = CdnFallback::with_loader(document, Arc::new(HttpLoader::new()))
                .with_reporter(Arc::new(TracingReporter));
            fallback.init(options);
            let outcome = fallback.test().await;
            println!("{}", serde_json::json!({ "cdnAvailable": outcome }));
        }
        Command::Rewrite { urls } => {
            let config = FallbackConfig::resolve(options, &origin);
            let rewriter = UrlRewriter::from_config(&config);
            for url in urls {
                if rewriter.is_delivery_url(&url) {
                    println!("{}", rewriter.rewrite(&url));
                } else {
                    println!("{}", url);
                }
            }
        }
        Command::Config => {
            let config = FallbackConfig::resolve(options, &origin);
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
