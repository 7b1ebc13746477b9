//! AliExpress extractor — entry point.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use aliexpress_extractor::browser::chromium::ChromiumLauncher;
use aliexpress_extractor::config::{
    resolve_chrome_path, resolve_port, BrowserSettings, ServerConfig,
};
use aliexpress_extractor::pipeline::extract_product_page;
use aliexpress_extractor::rest;

#[derive(Parser)]
#[command(
    name = "aliexpress-extractor",
    about = "Extract AliExpress product data by rendering the page in headless Chromium",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default).
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,

        /// Port to listen on. Falls back to the PORT env var, then 3000.
        #[arg(long)]
        port: Option<u16>,

        /// Chromium binary. Falls back to CHROME_PATH, then PATH lookup.
        #[arg(long)]
        chrome_path: Option<PathBuf>,
    },

    /// Extract a single product page and print its data as JSON.
    Extract {
        /// Product page URL.
        url: String,

        /// Chromium binary. Falls back to CHROME_PATH, then PATH lookup.
        #[arg(long)]
        chrome_path: Option<PathBuf>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Serve {
        host: IpAddr::from([0, 0, 0, 0]),
        port: None,
        chrome_path: None,
    }) {
        Commands::Serve {
            host,
            port,
            chrome_path,
        } => {
            let browser = BrowserSettings::default()
                .with_chrome_path(resolve_chrome_path(chrome_path.as_deref()));
            let config = ServerConfig::new(host, resolve_port(port), browser);

            match &config.browser.chrome_path {
                Some(path) => tracing::info!("Chromium: {}", path.display()),
                None => tracing::info!("Chromium: auto-detect"),
            }

            rest::serve(config, Arc::new(ChromiumLauncher::new())).await?;
        }

        Commands::Extract {
            url,
            chrome_path,
            pretty,
        } => {
            let settings = BrowserSettings::default()
                .with_chrome_path(resolve_chrome_path(chrome_path.as_deref()));
            let dados = extract_product_page(&ChromiumLauncher::new(), &settings, &url)
                .await
                .with_context(|| format!("failed to extract {url}"))?;

            let out = if pretty {
                serde_json::to_string_pretty(&dados)?
            } else {
                serde_json::to_string(&dados)?
            };
            println!("{out}");
        }
    }

    Ok(())
}
