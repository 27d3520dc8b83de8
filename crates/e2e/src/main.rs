//! gloss-e2e - screenshot comparison for the gloss web viewer
//!
//! Run with a WebDriver server listening (chromedriver, geckodriver or a
//! remote grid) and the viewer page being served.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gloss_e2e::runner::{capture_references, run_with_retry, RunOutcome, RunReport};
use gloss_e2e::webdriver::WebDriverFactory;
use gloss_e2e::{Browser, HarnessConfig, Resolution};

#[derive(Parser)]
#[command(name = "gloss-e2e")]
#[command(about = "Visual regression tests for the gloss web viewer")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "tests/web/e2e.toml")]
    config: PathBuf,

    #[command(flatten)]
    overrides: Overrides,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the viewer against stored references (default)
    Compare {
        /// Write a JSON summary of the run here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Capture new reference images at every configured resolution
    CaptureReferences,
}

/// Values that take precedence over the config file
#[derive(Args)]
struct Overrides {
    /// WebDriver server URL
    #[arg(long, env = "WEBDRIVER_URL", global = true)]
    webdriver_url: Option<String>,

    /// Viewer page URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Browser to request (chrome, firefox, edge, safari)
    #[arg(long, global = true)]
    browser: Option<Browser>,

    /// Directory holding reference, screenshot and diff images
    #[arg(long, global = true)]
    references_dir: Option<PathBuf>,

    /// Candidate resolutions, most preferred first (e.g. 1400x700,1024x512)
    #[arg(long, value_delimiter = ',', global = true)]
    resolutions: Vec<Resolution>,
}

impl Overrides {
    fn apply(self, config: &mut HarnessConfig) {
        if let Some(url) = self.webdriver_url {
            config.webdriver_url = url;
        }
        if let Some(url) = self.url {
            config.page_url = url;
        }
        if let Some(browser) = self.browser {
            config.browser = browser;
        }
        if let Some(dir) = self.references_dir {
            config.references_dir = dir;
        }
        if !self.resolutions.is_empty() {
            config.resolutions = self.resolutions;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = HarnessConfig::load(&cli.config)?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    let factory = WebDriverFactory::new(config.webdriver_url.clone());

    match cli.command.unwrap_or(Commands::Compare { report: None }) {
        Commands::Compare { report } => {
            let result = run_with_retry(&factory, &config).await;

            if let Some(path) = report {
                RunReport::from_run(&result).write(&path)?;
            }

            match result {
                Ok(RunOutcome::Completed(_)) => Ok(()),
                Ok(RunOutcome::RetriesExhausted { attempts, .. }) => {
                    error!("Gave up after {} attempts rejected by the browser grid", attempts);
                    std::process::exit(2);
                }
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::CaptureReferences => {
            let written = capture_references(&factory, &config).await?;
            info!("Captured {} of {} references", written.len(), config.resolutions.len());
            if written.len() < config.resolutions.len() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
