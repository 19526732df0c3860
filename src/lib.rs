use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub mod api;
pub mod config;
pub mod downloader;
pub mod error;
pub mod file;
pub mod format;
pub mod gate;
pub mod panels;
pub mod stats;
pub mod surface;
pub mod terminal;
pub mod viewer;
pub mod ws;

#[cfg(test)]
mod test_support;

pub use config::ViewerConfig;
pub use error::ViewerError;
pub use file::{Availability, FileDescriptor, ListDescriptor};
pub use gate::{AvailabilityGate, ChallengeProvider, ChallengeRequest, ChallengeSession, DownloadOutcome};
pub use stats::{StatsChannel, StatsConnection, StatsCounters, StatsTransport};
pub use surface::{Clipboard, Surface, ViewerEvent};
pub use viewer::{Collaborators, Viewer};

use api::ApiClient;
use downloader::Downloader;
use terminal::{SystemClipboard, TerminalChallenge, TerminalSurface};
use ws::WsTransport;

const FIRST_STATS_WAIT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "file_viewer", version, about = "Terminal viewer for hosted files")]
struct Cli {
    /// JSON config file
    #[arg(long, env = "VIEWER_CONFIG")]
    config: Option<PathBuf>,
    /// API endpoint, e.g. https://pixeldrain.com/api
    #[arg(long)]
    api: Option<String>,
    /// Challenge site key; "none" disables challenges
    #[arg(long)]
    captcha_key: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// View a single file
    File {
        id: String,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// View a list of files
    List {
        id: String,
        /// Entry to show instead of the first one
        #[arg(long)]
        index: Option<usize>,
        /// Download the whole list as a zip
        #[arg(long)]
        zip: bool,
        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Args)]
struct ViewArgs {
    /// Download the displayed file
    #[arg(long)]
    download: bool,
    /// Keep printing live stats until interrupted
    #[arg(long)]
    watch: bool,
    /// Copy the page link to the clipboard
    #[arg(long)]
    copy: bool,
    /// Print the details table
    #[arg(long)]
    details: bool,
    /// Directory downloads are written to
    #[arg(long)]
    out: Option<PathBuf>,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(run_cli(cli))
}

async fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let mut config = ViewerConfig::load(cli.config.as_deref())?;
    if let Some(api) = cli.api {
        config.api_endpoint = api;
    }
    if let Some(key) = cli.captcha_key {
        config.captcha_site_key = key;
    }
    let view = match &cli.command {
        Command::File { view, .. } | Command::List { view, .. } => view,
    };
    if let Some(out) = &view.out {
        config.download_dir = out.clone();
    }
    config.validate()?;

    let surface = Arc::new(TerminalSurface::default());
    let parts = Collaborators {
        surface: surface.clone(),
        clipboard: Arc::new(SystemClipboard),
        challenge: Arc::new(TerminalChallenge),
        transport: Arc::new(WsTransport),
    };
    let api = ApiClient::new(config.api_base())?;
    let downloader = Downloader::new(
        api.http().clone(),
        url::Url::parse(config.api_base())?,
        config.download_dir.clone(),
        surface.clone(),
    );
    let mut viewer = Viewer::new(config, parts, api.clone());

    match &cli.command {
        Command::File { id, .. } => {
            let file = api
                .file_info(id)
                .await
                .with_context(|| format!("failed to fetch file {id}"))?;
            println!("{} ({})", file.name, file.mime_type);
            viewer.open_file(file).await?;
        }
        Command::List { id, index, zip, .. } => {
            let list = api
                .list_info(id)
                .await
                .with_context(|| format!("failed to fetch list {id}"))?;
            println!("{} ({} files)", list.title, list.files.len());
            viewer.open_list(list).await?;
            if let Some(index) = index {
                viewer.select(*index).await?;
            }
            if *zip {
                if let Some(url) = viewer.download_list() {
                    downloader.fetch(&url).await?;
                }
            }
        }
    }

    if view.details {
        viewer.toggle_details().await?;
    }
    if view.copy {
        viewer.copy_link()?;
    }
    if view.download {
        match viewer.download().await? {
            DownloadOutcome::Direct(url) | DownloadOutcome::Verified(url) => {
                downloader.fetch(&url).await?;
            }
            DownloadOutcome::Abandoned => println!("Download cancelled."),
        }
    }

    if view.watch {
        tokio::signal::ctrl_c().await?;
    } else {
        let waited = tokio::time::timeout(FIRST_STATS_WAIT, async {
            while viewer.stats().is_none() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;
        if waited.is_err() {
            tracing::debug!("no stats received before exit");
        }
    }

    viewer.close().await;
    Ok(())
}
