use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}")]
    Download(#[from] tsdl_engine::DownloadError),

    #[error("Download failed: {0}")]
    Session(#[from] tsdl_engine::SessionFailure),

    #[error("Playlist error: {0}")]
    Playlist(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),
}
