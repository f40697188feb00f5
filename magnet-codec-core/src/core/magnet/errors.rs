use thiserror::Error;

/// The magnet package specific results.
pub type Result<T> = std::result::Result<T, MagnetError>;

/// Represents possible errors that can occur when decoding a magnet URI.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MagnetError {
    /// The identifier of an exact topic or exact source is corrupt.
    #[error("identifier \"{0}\" is invalid")]
    InvalidIdentifier(String),
}
