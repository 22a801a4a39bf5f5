//! Cold-storage key and piece codec.
//!
//! Keys of several cryptocurrencies are generated or imported, optionally
//! encrypted with a passphrase, and written to one or more pieces. With more
//! than one piece every private key is split so that a threshold of pieces
//! reconstitutes it and fewer reveal nothing.

pub mod config;
pub mod crypto;
pub mod currency;
pub mod encoding;
pub mod entropy;
pub mod error;
pub mod key;
pub mod orchestrator;
pub mod piece;
pub mod pipeline;
pub mod threshold;

pub use config::{Bip38Params, CoreConfig, WeightTable};
pub use currency::{CurrencyPlugin, EncryptionScheme, PluginRegistry};
pub use error::{Error, ErrorKind};
pub use key::{get_key, parse_key, CryptoKey, KeyError};
pub use orchestrator::{CancelToken, EncryptionOrchestrator, ProgressListener};
pub use piece::{validate_piece, Piece, PieceCodec, PieceError, PieceKey};
pub use pipeline::{
    AssetLoader, CurrencyRequest, GeneratedStorage, GenerationRequest, KeyGenerationPipeline,
    NoAssets, PieceRenderer,
};
