use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use error::AppError;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tsdl_engine::{DownloadOptions, DownloaderConfig, HttpTransport, ProxyConfig};
use url::Url;

mod cli;
mod error;
mod playlist;
mod prompt;
mod utils;

use cli::CliArgs;
use prompt::OutputDecision;
use utils::progress::ProgressManager;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("tsdl.log")?;

    let multi_writer = MakeWriterExt::and(std::io::stdout, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    let config = downloader_config(&args);

    let base = args
        .base_url
        .as_deref()
        .map(Url::parse)
        .transpose()
        .map_err(|e| AppError::InvalidInput(format!("invalid base URL: {e}")))?;

    let playlist_transport = HttpTransport::new(&config)?;
    let loaded = playlist::load_playlist(&args.input, base, &playlist_transport).await?;
    if loaded.segments.is_empty() {
        warn!("Playlist has no segments");
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.ts", loaded.name)));

    if prompt::prepare_output(&output, args.yes).await? == OutputDecision::Abort {
        info!(path = %output.display(), "Keeping existing file, nothing downloaded");
        return Ok(());
    }

    let options = DownloadOptions::new(args.concurrency, args.retries);
    info!(
        segments = loaded.segments.len(),
        concurrency = options.concurrency_width,
        retries = options.retry_rounds,
        output = %output.display(),
        "Starting download"
    );

    let progress_manager = if args.show_progress {
        ProgressManager::new()
    } else {
        ProgressManager::new_disabled()
    };
    let sink_manager = progress_manager.clone();

    let result = tsdl_engine::download_to_file(
        loaded.segments,
        loaded.base,
        &config,
        options,
        &output,
        Some(Arc::new(move |event| sink_manager.handle_event(event))),
    )
    .await;

    match result {
        Ok(summary) => {
            info!(
                segments = summary.segments,
                size = %utils::format_bytes(summary.bytes),
                retries = summary.retries,
                "Saved {}",
                output.display()
            );
            Ok(())
        }
        Err(failure) => {
            progress_manager.abandon();
            if failure.is_partial() {
                warn!(
                    path = %output.display(),
                    segments = failure.segments_written,
                    "Output file is incomplete"
                );
            }
            Err(failure.into())
        }
    }
}

fn downloader_config(args: &CliArgs) -> DownloaderConfig {
    let mut builder = DownloaderConfig::builder().with_headers(utils::parse_headers(&args.headers));

    builder = match args.timeout {
        Some(0) => builder.without_timeout(),
        Some(secs) => builder.with_timeout(Duration::from_secs(secs)),
        None => builder,
    };
    if let Some(secs) = args.connect_timeout {
        builder = builder.with_connect_timeout(Duration::from_secs(secs));
    }
    if let Some(user_agent) = &args.user_agent {
        builder = builder.with_user_agent(user_agent);
    }

    if let Some(address) = &args.proxy {
        let mut proxy = ProxyConfig::new(args.proxy_type, address);
        if let (Some(username), Some(password)) = (&args.proxy_user, &args.proxy_pass) {
            proxy = proxy.with_auth(username, password);
        }
        info!(
            proxy = %address,
            proxy_type = ?args.proxy_type,
            has_auth = proxy.auth.is_some(),
            "Using proxy for downloads"
        );
        builder = builder.with_proxy(proxy);
    }

    builder.build()
}
