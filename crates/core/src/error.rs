use thiserror::Error;

#[derive(Debug, Error)]
pub enum DcvstatError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("scan incomplete: {0}")]
    ScanIncomplete(String),

    #[error("reload discarded: {0}")]
    Discarded(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DcvstatError {
    /// True for the failures that abort a reload: the file could not be
    /// opened or the read stopped mid-scan.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ScanIncomplete(_))
    }
}

pub type Result<T> = std::result::Result<T, DcvstatError>;
