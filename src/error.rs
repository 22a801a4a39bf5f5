//! Crate-level error.
//!
//! Each module reports its own error type. Batch and pipeline operations
//! return [`Error`], whose [`kind`](Error::kind) is the stable value callers
//! branch on.

use crate::crypto::CryptoError;
use crate::key::KeyError;
use crate::piece::PieceError;
use crate::threshold::ShareError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Share(#[from] ShareError),

    #[error(transparent)]
    Piece(#[from] PieceError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Encrypted output did not decrypt back to its input.
    #[error("encryption of key {index} could not be verified")]
    VerificationFailure { index: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    InvalidArgument(String),

    /// Failure reported by an asset loader or renderer.
    #[error("{0}")]
    Collaborator(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine-distinguishable error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    InvalidOperation,
    InvalidPiece,
    CombineError,
    InconsistentShares,
    InconsistentPieces,
    InconsistentThreshold,
    ThresholdNotMet,
    UnsupportedScheme,
    IncorrectPassphrase,
    VerificationFailure,
    Cancelled,
    InvalidArgument,
    Collaborator,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Key(e) => key_kind(e),
            Error::Share(e) => share_kind(e),
            Error::Piece(e) => piece_kind(e),
            Error::Crypto(e) => crypto_kind(e),
            Error::VerificationFailure { .. } => ErrorKind::VerificationFailure,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Collaborator(_) => ErrorKind::Collaborator,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The one failure a caller should answer by asking for the passphrase
    /// again.
    pub fn is_incorrect_passphrase(&self) -> bool {
        self.kind() == ErrorKind::IncorrectPassphrase
    }
}

fn key_kind(e: &KeyError) -> ErrorKind {
    match e {
        KeyError::Parse { .. } => ErrorKind::Parse,
        KeyError::InvalidAddress { .. }
        | KeyError::UnknownCurrency(_)
        | KeyError::DuplicateCurrency(_) => ErrorKind::InvalidArgument,
        KeyError::AddressMismatch
        | KeyError::InvalidOperation(_)
        | KeyError::AlreadyEncrypted
        | KeyError::NotEncrypted
        | KeyError::EmptyPassphrase => ErrorKind::InvalidOperation,
        KeyError::UnsupportedScheme { .. } => ErrorKind::UnsupportedScheme,
        KeyError::IncorrectPassphrase => ErrorKind::IncorrectPassphrase,
        KeyError::Crypto(e) => crypto_kind(e),
        KeyError::Share(e) => share_kind(e),
        KeyError::Entropy(_) => ErrorKind::Internal,
    }
}

fn share_kind(e: &ShareError) -> ErrorKind {
    match e {
        ShareError::InvalidThreshold { .. }
        | ShareError::TooManyShares(_)
        | ShareError::InvalidSecret => ErrorKind::InvalidArgument,
        ShareError::MissingThresholdPrefix | ShareError::MalformedShare(_) => ErrorKind::Parse,
        ShareError::InconsistentThreshold => ErrorKind::InconsistentThreshold,
        ShareError::ThresholdNotMet { .. } => ErrorKind::ThresholdNotMet,
        ShareError::InconsistentShares => ErrorKind::InconsistentShares,
        ShareError::Entropy(_) => ErrorKind::Internal,
    }
}

fn piece_kind(e: &PieceError) -> ErrorKind {
    match e {
        PieceError::Invalid(_) | PieceError::Json(_) => ErrorKind::InvalidPiece,
        PieceError::ThresholdNotMet { .. } => ErrorKind::ThresholdNotMet,
        PieceError::KeyCountMismatch
        | PieceError::InconsistentPieces(_)
        | PieceError::KeyMismatch { .. } => ErrorKind::InconsistentPieces,
        PieceError::InconsistentThreshold => ErrorKind::InconsistentThreshold,
        PieceError::CombineFailed => ErrorKind::CombineError,
        PieceError::UnknownTicker(_) | PieceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        PieceError::MissingPrivateKey => ErrorKind::InvalidOperation,
        PieceError::Key(e) => key_kind(e),
    }
}

fn crypto_kind(e: &CryptoError) -> ErrorKind {
    match e {
        CryptoError::IncorrectPassphrase => ErrorKind::IncorrectPassphrase,
        CryptoError::Malformed(_) | CryptoError::Encoding(_) => ErrorKind::Parse,
        CryptoError::Kdf(_) | CryptoError::Entropy(_) => ErrorKind::Internal,
    }
}
