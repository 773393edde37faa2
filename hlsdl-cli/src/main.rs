mod cli;
mod error;
mod serve;

use crate::{
    cli::Args,
    error::{AppError, Result},
    serve::{FileServer, ListenAddr},
};
use clap::Parser;
use hlsdl_engine::{DownloadReport, HlsDownloader};
use std::future::Future;
use std::process;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    if !args.use_working_dir {
        switch_to_executable_dir()?;
    }

    let listen = ListenAddr::parse(&args.listen)?;
    let cancel_token = CancellationToken::new();

    let server = FileServer::new(&args.output, listen, cancel_token.clone());
    let server_task = tokio::spawn(async move { server.run().await });

    let download_task = args.download.clone().map(|url| {
        let config = args.download_config();
        tokio::spawn(async move {
            if let Err(e) = download(config, &url).await {
                error!(url = %url, "m3u8 download fail: {}", e);
            }
        })
    });

    supervise(
        server_task,
        download_task,
        tokio::signal::ctrl_c(),
        cancel_token,
    )
    .await
}

/// Drive the file server and the download as independent tasks.
///
/// Returns on `shutdown`, or once the server has stopped and no download is
/// still running. A server failure never interrupts a running download; its
/// error is reported after the download finishes.
async fn supervise<S>(
    server_task: JoinHandle<Result<()>>,
    download_task: Option<JoinHandle<()>>,
    shutdown: S,
    cancel_token: CancellationToken,
) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);
    let mut server_task = Some(server_task);
    let mut download_task = download_task;
    let mut server_result: Option<Result<()>> = None;

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Received Ctrl-C, shutting down");
                cancel_token.cancel();
                return Ok(());
            }
            joined = wait_for(&mut server_task) => {
                server_task = None;
                let result = joined.unwrap_or_else(|e| Err(AppError::Server(e.to_string())));
                if let Err(e) = &result {
                    error!("http server start failed: {}", e);
                }
                if download_task.is_none() {
                    return result;
                }
                info!("Waiting for the running download to finish");
                server_result = Some(result);
            }
            joined = wait_for(&mut download_task) => {
                download_task = None;
                if let Err(e) = joined {
                    error!(error = %e, "Download task ended abnormally");
                }
                if let Some(result) = server_result.take() {
                    return result;
                }
            }
        }
    }
}

/// Await a task slot; an empty slot never resolves.
async fn wait_for<T>(task: &mut Option<JoinHandle<T>>) -> std::result::Result<T, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn download(config: hlsdl_engine::HlsDownloadConfig, url: &str) -> Result<()> {
    let downloader = HlsDownloader::new(config)?;
    match downloader.run(url).await? {
        DownloadReport::Media(summary) if summary.failed > 0 => {
            warn!(
                failed = summary.failed,
                total = summary.total,
                "Some segments could not be downloaded"
            );
        }
        DownloadReport::Media(_) | DownloadReport::Master(_) => {}
    }
    Ok(())
}

/// Make relative paths resolve against the directory holding the executable.
fn switch_to_executable_dir() -> Result<()> {
    let exe = std::env::current_exe().map_err(|e| AppError::ExecutableDir(e.to_string()))?;
    let dir = exe
        .parent()
        .ok_or_else(|| AppError::ExecutableDir(format!("{} has no parent", exe.display())))?;
    std::env::set_current_dir(dir)?;
    info!(dir = %dir.display(), "Switched working directory to executable directory");
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}
