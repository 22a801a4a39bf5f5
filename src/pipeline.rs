//! Key generation and import-decryption flows.
//!
//! A generation run validates the request, lets the host load whatever
//! assets it renders with, creates keys, encrypts the ones that asked for it,
//! distributes them over pieces, checks that the pieces reconstitute exactly
//! those keys and finally hands the pieces to the renderer. The first error
//! aborts the run and nothing partial is returned.

use std::fmt;
use std::sync::Arc;

use crate::config::{CoreConfig, WeightTable};
use crate::currency::{CurrencyPlugin, EncryptionScheme, PluginRegistry};
use crate::entropy::OsEntropy;
use crate::error::Error;
use crate::key::{CryptoKey, KeyError};
use crate::orchestrator::progress::ProgressTracker;
use crate::orchestrator::{
    BatchObserver, BatchStateMachine, CancelToken, EncryptionOrchestrator, ProgressListener,
    ScaledListener,
};
use crate::piece::{check_split, Piece, PieceCodec};

/// Error type returned by host collaborators.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Loads rendering assets (logos, fonts) for the requested currencies.
pub trait AssetLoader: Send + Sync {
    fn load(&self, plugins: &[Arc<dyn CurrencyPlugin>]) -> Result<(), CollaboratorError>;
}

/// Loader for hosts that need no assets.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAssets;

impl AssetLoader for NoAssets {
    fn load(&self, _plugins: &[Arc<dyn CurrencyPlugin>]) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Turns finished pieces into whatever the host exports.
pub trait PieceRenderer: Send + Sync {
    type Output;

    /// Relative cost of rendering, in the units of [`WeightTable`].
    fn weight(&self, num_keys: usize, num_pieces: usize, weights: &WeightTable) -> u64 {
        weights.render(num_keys, num_pieces)
    }

    fn render(
        &self,
        pieces: &[Piece],
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<Self::Output, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyRequest {
    pub ticker: String,
    pub num_keys: usize,
    pub encryption: Option<EncryptionScheme>,
}

impl CurrencyRequest {
    pub fn new(ticker: impl Into<String>, num_keys: usize, encryption: Option<EncryptionScheme>) -> Self {
        Self {
            ticker: ticker.into(),
            num_keys,
            encryption,
        }
    }
}

#[derive(Clone)]
pub struct GenerationRequest {
    pub currencies: Vec<CurrencyRequest>,
    pub num_pieces: usize,
    pub min_pieces: Option<usize>,
    pub passphrase: Option<String>,
    pub verify_encryption: bool,
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("currencies", &self.currencies)
            .field("num_pieces", &self.num_pieces)
            .field("min_pieces", &self.min_pieces)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***SENSITIVE***"))
            .field("verify_encryption", &self.verify_encryption)
            .finish()
    }
}

/// Result of a flow: the keys, the pieces holding them and the rendering.
#[derive(Debug)]
pub struct GeneratedStorage<O> {
    pub keys: Vec<CryptoKey>,
    pub pieces: Vec<Piece>,
    pub rendered: O,
}

pub struct KeyGenerationPipeline<L, R> {
    registry: Arc<PluginRegistry>,
    codec: PieceCodec,
    orchestrator: EncryptionOrchestrator,
    weights: WeightTable,
    observers: Vec<Arc<dyn BatchObserver>>,
    loader: L,
    renderer: R,
}

impl<L: AssetLoader, R: PieceRenderer> KeyGenerationPipeline<L, R> {
    /// Builds the registry from `config` and wires everything to it.
    pub fn new(config: &CoreConfig, loader: L, renderer: R) -> Result<Self, Error> {
        let registry = Arc::new(PluginRegistry::from_config(config)?);
        Ok(Self::with_registry(registry, config, loader, renderer))
    }

    pub fn with_registry(registry: Arc<PluginRegistry>, config: &CoreConfig, loader: L, renderer: R) -> Self {
        Self {
            codec: PieceCodec::new(registry.clone(), config),
            orchestrator: EncryptionOrchestrator::new(config),
            registry,
            weights: config.weights,
            observers: Vec::new(),
            loader,
            renderer,
        }
    }

    /// Observes the pipeline and the encryption batches it runs.
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.orchestrator = self.orchestrator.with_observer(observer.clone());
        self.observers.push(observer);
        self
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn codec(&self) -> &PieceCodec {
        &self.codec
    }

    /// Generates, encrypts, splits and renders new keys.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        listener: Arc<dyn ProgressListener>,
        cancel: &CancelToken,
    ) -> Result<GeneratedStorage<R::Output>, Error> {
        let mut machine = BatchStateMachine::new("Generation", self.observers.clone());
        machine.start()?;
        let outcome = self.run_generate(request, listener, cancel).await;
        machine.finish(outcome)
    }

    async fn run_generate(
        &self,
        request: &GenerationRequest,
        listener: Arc<dyn ProgressListener>,
        cancel: &CancelToken,
    ) -> Result<GeneratedStorage<R::Output>, Error> {
        let plugins = self.validate(request)?;
        check_cancelled(cancel)?;

        self.loader
            .load(&plugins)
            .map_err(|e| Error::Collaborator(format!("failed to load assets: {}", e)))?;

        let num_keys: usize = request.currencies.iter().map(|c| c.num_keys).sum();
        let schemes: Vec<EncryptionScheme> = request
            .currencies
            .iter()
            .filter_map(|c| c.encryption.map(|scheme| (scheme, c.num_keys)))
            .flat_map(|(scheme, n)| std::iter::repeat(scheme).take(n))
            .collect();
        let create_weight = self.weights.create_keys(num_keys);
        let encrypt_weight = self.weights.encrypt_keys(&schemes, request.verify_encryption);
        let render_weight = self.renderer.weight(num_keys, request.num_pieces, &self.weights);
        let stages = Stages::new(&[create_weight, encrypt_weight, render_weight]);
        log::debug!(
            "Weights: create {}, encrypt {}, render {}",
            create_weight,
            encrypt_weight,
            render_weight
        );

        // keys
        let tracker = ProgressTracker::new(
            stages.listener(&listener, 0),
            "Generating keys",
            create_weight,
            cancel.clone(),
        );
        let mut keys = Vec::with_capacity(num_keys);
        for (plugin, currency) in plugins.iter().zip(&request.currencies) {
            for _ in 0..currency.num_keys {
                check_cancelled(cancel)?;
                keys.push(CryptoKey::generate(plugin)?);
                tracker.complete_unit(keys.len() - 1, self.weights.create_key);
                tokio::task::yield_now().await;
            }
            log::info!("Generated {} {} keys", currency.num_keys, currency.ticker);
        }

        // encryption
        let mut targets = Vec::with_capacity(schemes.len());
        let mut start = 0;
        for currency in &request.currencies {
            if currency.encryption.is_some() {
                targets.extend(start..start + currency.num_keys);
            }
            start += currency.num_keys;
        }
        if !targets.is_empty() {
            let passphrase = request.passphrase.as_deref().unwrap_or_default();
            let subset: Vec<CryptoKey> = targets.iter().map(|&i| keys[i].clone()).collect();
            let encrypted = self
                .orchestrator
                .encrypt_keys(
                    subset,
                    &schemes,
                    passphrase,
                    request.verify_encryption,
                    stages.listener(&listener, 1),
                    cancel,
                )
                .await?;
            for (index, key) in targets.into_iter().zip(encrypted) {
                keys[index] = key;
            }
        }

        // pieces
        check_cancelled(cancel)?;
        let pieces = self
            .codec
            .keys_to_pieces(&keys, request.num_pieces, request.min_pieces, &mut OsEntropy::new())?;
        self.self_check(&keys, &pieces)?;

        check_cancelled(cancel)?;
        let rendered = self.render(&pieces, stages.listener(&listener, 2))?;
        check_cancelled(cancel)?;
        log::info!("Produced {} pieces holding {} keys", pieces.len(), keys.len());
        Ok(GeneratedStorage {
            keys,
            pieces,
            rendered,
        })
    }

    /// Decrypts copies of imported keys and renders them as one unsplit
    /// piece. `keys` themselves are never modified.
    pub async fn decrypt_imported(
        &self,
        keys: &[CryptoKey],
        passphrase: &str,
        listener: Arc<dyn ProgressListener>,
        cancel: &CancelToken,
    ) -> Result<GeneratedStorage<R::Output>, Error> {
        let mut machine = BatchStateMachine::new("Import", self.observers.clone());
        machine.start()?;
        let outcome = self.run_decrypt_imported(keys, passphrase, listener, cancel).await;
        machine.finish(outcome)
    }

    async fn run_decrypt_imported(
        &self,
        keys: &[CryptoKey],
        passphrase: &str,
        listener: Arc<dyn ProgressListener>,
        cancel: &CancelToken,
    ) -> Result<GeneratedStorage<R::Output>, Error> {
        if keys.is_empty() {
            return Err(Error::InvalidArgument("No keys to decrypt".to_string()));
        }
        let schemes: Vec<EncryptionScheme> = keys.iter().filter_map(CryptoKey::encryption).collect();
        let decrypt_weight = self.weights.decrypt_keys(&schemes);
        let render_weight = self.renderer.weight(keys.len(), 1, &self.weights);
        let stages = Stages::new(&[decrypt_weight, render_weight]);

        let decrypted = self
            .orchestrator
            .decrypt_keys(keys.to_vec(), passphrase, stages.listener(&listener, 0), cancel)
            .await?;

        check_cancelled(cancel)?;
        let pieces = self
            .codec
            .keys_to_pieces(&decrypted, 1, None, &mut OsEntropy::new())?;
        let rendered = self.render(&pieces, stages.listener(&listener, 1))?;
        check_cancelled(cancel)?;
        Ok(GeneratedStorage {
            keys: decrypted,
            pieces,
            rendered,
        })
    }

    /// Resolves every requested currency. Fails before any key is created.
    fn validate(&self, request: &GenerationRequest) -> Result<Vec<Arc<dyn CurrencyPlugin>>, Error> {
        if request.currencies.is_empty() {
            return Err(Error::InvalidArgument("At least one currency is required".to_string()));
        }
        let mut plugins = Vec::with_capacity(request.currencies.len());
        for currency in &request.currencies {
            let plugin = self.registry.require(&currency.ticker)?;
            if currency.num_keys == 0 {
                return Err(Error::InvalidArgument(format!(
                    "Number of {} keys must be >= 1",
                    currency.ticker
                )));
            }
            if let Some(scheme) = currency.encryption {
                if !plugin.supports(scheme) {
                    return Err(KeyError::UnsupportedScheme {
                        ticker: currency.ticker.clone(),
                        scheme,
                    }
                    .into());
                }
                if request.passphrase.as_deref().map_or(true, str::is_empty) {
                    return Err(Error::InvalidArgument(
                        "A passphrase is required to encrypt keys".to_string(),
                    ));
                }
            }
            plugins.push(plugin);
        }
        check_split(request.num_pieces, request.min_pieces)?;
        Ok(plugins)
    }

    fn self_check(&self, keys: &[CryptoKey], pieces: &[Piece]) -> Result<(), Error> {
        let restored = self.codec.pieces_to_keys(pieces).map_err(|e| {
            log::warn!("Self-check failed to reconstitute keys: {}", e);
            Error::Internal(format!("pieces do not reconstitute the generated keys: {}", e))
        })?;
        if restored != keys {
            log::warn!("Self-check reconstituted different keys");
            return Err(Error::Internal(
                "pieces do not reconstitute the generated keys".to_string(),
            ));
        }
        Ok(())
    }

    fn render(&self, pieces: &[Piece], listener: Arc<dyn ProgressListener>) -> Result<R::Output, Error> {
        self.renderer
            .render(pieces, &mut |fraction| listener.on_progress(fraction, "Rendering pieces"))
            .map_err(|e| Error::Collaborator(format!("failed to render pieces: {}", e)))
    }
}

fn check_cancelled(cancel: &CancelToken) -> Result<(), Error> {
    if cancel.is_cancelled() {
        log::warn!("Run cancelled");
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Consecutive stages sharing one progress bar in proportion to weight.
struct Stages {
    weights: Vec<u64>,
    total: u64,
}

impl Stages {
    fn new(weights: &[u64]) -> Self {
        Self {
            weights: weights.to_vec(),
            total: weights.iter().sum(),
        }
    }

    fn listener(&self, outer: &Arc<dyn ProgressListener>, stage: usize) -> Arc<dyn ProgressListener> {
        if self.total == 0 {
            return Arc::new(ScaledListener::new(outer.clone(), 1.0, 0.0));
        }
        let before: u64 = self.weights[..stage].iter().sum();
        let total = self.total as f64;
        Arc::new(ScaledListener::new(
            outer.clone(),
            before as f64 / total,
            self.weights[stage] as f64 / total,
        ))
    }
}
