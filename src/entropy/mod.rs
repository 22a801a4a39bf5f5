//! Randomness sources.
//!
//! Share coefficients and passphrase salts are drawn through the
//! [`EntropySource`] trait so tests can run deterministically.

pub mod os;

pub use os::OsEntropy;

/// Error types for entropy collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntropyError {
    /// The platform generator failed to produce bytes.
    #[error("failed to collect entropy from the operating system")]
    CollectionFailed,
}

/// A trait for entropy sources.
pub trait EntropySource {
    /// Returns a unique identifier for the source.
    fn name(&self) -> &'static str;

    /// Fills `dest` with random bytes from the source.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;
}
