use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}")]
    Download(#[from] hlsdl_engine::DownloadError),

    #[error("Invalid listen address `{0}`")]
    InvalidListenAddress(String),

    #[error("File server error: {0}")]
    Server(String),

    #[error("Cannot determine executable directory: {0}")]
    ExecutableDir(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
