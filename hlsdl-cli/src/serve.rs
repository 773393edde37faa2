//! Read-only HTTP file server over the download directory.

use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{AppError, Result};

/// A parsed `--listen` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddr {
    /// Address passed to bind
    pub bind: String,
    /// Host:port shown to the user
    pub display: String,
}

impl ListenAddr {
    /// Parse `host:port` or `:port`. A bare `:port` binds every interface and
    /// is announced as `localhost:port`.
    pub fn parse(listen: &str) -> Result<Self> {
        let listen = listen.trim();
        let (host, port) = listen
            .rsplit_once(':')
            .ok_or_else(|| AppError::InvalidListenAddress(listen.to_string()))?;
        port.parse::<u16>()
            .map_err(|_| AppError::InvalidListenAddress(listen.to_string()))?;

        if host.is_empty() {
            Ok(Self {
                bind: format!("0.0.0.0:{port}"),
                display: format!("localhost:{port}"),
            })
        } else {
            Ok(Self {
                bind: listen.to_string(),
                display: listen.to_string(),
            })
        }
    }

    pub fn entry_url(&self) -> String {
        format!("http://{}/", self.display)
    }
}

pub struct FileServer {
    root: PathBuf,
    listen: ListenAddr,
    cancel_token: CancellationToken,
}

impl FileServer {
    pub fn new(root: impl Into<PathBuf>, listen: ListenAddr, cancel_token: CancellationToken) -> Self {
        Self {
            root: root.into(),
            listen,
            cancel_token,
        }
    }

    fn build_router(&self) -> Router {
        Router::new()
            .fallback_service(ServeDir::new(&self.root))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until the cancel token fires.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.listen.bind).await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        info!(
            root = %self.root.display(),
            local_addr = ?local,
            "http server entry at {}",
            self.listen.entry_url()
        );

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("http server shutting down...");
            })
            .await
            .map_err(|e| AppError::Server(e.to_string()))
    }
}
