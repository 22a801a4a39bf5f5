//! Bulk encryption and decryption of keys.
//!
//! Each key is an independent unit of work. Units run on the blocking pool,
//! at most `encryption_workers` at a time, and are placed back by index. The
//! first failing unit fails the whole batch; nothing partial is returned.

pub mod progress;
pub mod state;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use zeroize::Zeroizing;

use crate::config::{CoreConfig, WeightTable};
use crate::currency::EncryptionScheme;
use crate::error::Error;
use crate::key::CryptoKey;

pub use progress::{CancelToken, ProgressListener, ProgressTracker, ScaledListener};
pub use state::{BatchObserver, BatchState, BatchStateMachine};

/// Runs encryption batches with bounded concurrency.
#[derive(Clone)]
pub struct EncryptionOrchestrator {
    workers: usize,
    weights: WeightTable,
    observers: Vec<Arc<dyn BatchObserver>>,
}

impl EncryptionOrchestrator {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            workers: config.encryption_workers.max(1),
            weights: config.weights,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Encrypts `keys[i]` with `schemes[i]`.
    ///
    /// With `verify`, a copy of every encrypted key is decrypted again and
    /// compared with the original; any difference is a
    /// [`Error::VerificationFailure`].
    pub async fn encrypt_keys(
        &self,
        keys: Vec<CryptoKey>,
        schemes: &[EncryptionScheme],
        passphrase: &str,
        verify: bool,
        listener: Arc<dyn ProgressListener>,
        cancel: &CancelToken,
    ) -> Result<Vec<CryptoKey>, Error> {
        if keys.len() != schemes.len() {
            return Err(Error::InvalidArgument(format!(
                "{} keys but {} encryption schemes",
                keys.len(),
                schemes.len()
            )));
        }
        let mut machine = BatchStateMachine::new("Encryption", self.observers.clone());
        machine.start()?;
        log::info!(
            "Encrypting {} keys with {} workers (verify: {})",
            keys.len(),
            self.workers,
            verify
        );

        let units: Vec<Unit> = keys
            .into_iter()
            .zip(schemes.iter().copied())
            .map(|(key, scheme)| {
                let encrypt = self.weights.encrypt(scheme);
                let decrypt = if verify { self.weights.decrypt(scheme) } else { 0 };
                Unit {
                    key,
                    op: Op::Encrypt { scheme, verify },
                    split: (encrypt, decrypt),
                }
            })
            .collect();
        let total = units.iter().map(Unit::weight).sum();
        let tracker = Arc::new(ProgressTracker::new(listener, "Encrypting keys", total, cancel.clone()));

        let outcome = self.run(units, passphrase, tracker, cancel).await;
        machine.finish(outcome)
    }

    /// Decrypts every key with one passphrase. A wrong passphrase fails the
    /// batch with the key's own `IncorrectPassphrase` error.
    pub async fn decrypt_keys(
        &self,
        keys: Vec<CryptoKey>,
        passphrase: &str,
        listener: Arc<dyn ProgressListener>,
        cancel: &CancelToken,
    ) -> Result<Vec<CryptoKey>, Error> {
        let mut machine = BatchStateMachine::new("Decryption", self.observers.clone());
        machine.start()?;
        log::info!("Decrypting {} keys with {} workers", keys.len(), self.workers);

        let units: Vec<Unit> = keys
            .into_iter()
            .map(|key| {
                let weight = key.encryption().map_or(0, |scheme| self.weights.decrypt(scheme));
                Unit {
                    key,
                    op: Op::Decrypt,
                    split: (weight, 0),
                }
            })
            .collect();
        let total = units.iter().map(Unit::weight).sum();
        let tracker = Arc::new(ProgressTracker::new(listener, "Decrypting keys", total, cancel.clone()));

        let outcome = self.run(units, passphrase, tracker, cancel).await;
        machine.finish(outcome)
    }

    async fn run(
        &self,
        units: Vec<Unit>,
        passphrase: &str,
        tracker: Arc<ProgressTracker>,
        cancel: &CancelToken,
    ) -> Result<Vec<CryptoKey>, Error> {
        let count = units.len();
        let passphrase = Arc::new(Zeroizing::new(passphrase.to_string()));

        let tasks = units.into_iter().enumerate().map(|(index, unit)| {
            let tracker = tracker.clone();
            let passphrase = passphrase.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                log::debug!("Dispatching unit {}", index);
                let weight = unit.weight();
                let worker_tracker = tracker.clone();
                let key = tokio::task::spawn_blocking(move || {
                    unit.execute(index, passphrase.as_str(), &worker_tracker)
                })
                .await
                .map_err(|e| Error::Internal(format!("worker for unit {} failed: {}", index, e)))
                .and_then(|executed| executed)
                .map_err(|e| {
                    tracker.stop();
                    e
                })?;
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                tracker.complete_unit(index, weight);
                log::debug!("Completed unit {}", index);
                Ok((index, key))
            }
        });

        let mut results: Vec<Option<CryptoKey>> = (0..count).map(|_| None).collect();
        let mut completed = std::pin::pin!(stream::iter(tasks).buffer_unordered(self.workers));
        while let Some(result) = completed.next().await {
            match result {
                Ok((index, key)) => results[index] = Some(key),
                Err(Error::Cancelled) => {
                    log::warn!("Batch cancelled, discarding completed units");
                    return Err(Error::Cancelled);
                }
                Err(e) => {
                    tracker.stop();
                    return Err(e);
                }
            }
        }
        if cancel.is_cancelled() {
            log::warn!("Batch cancelled, discarding completed units");
            return Err(Error::Cancelled);
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, key)| {
                key.ok_or_else(|| Error::Internal(format!("unit {} produced no result", index)))
            })
            .collect()
    }
}

#[derive(Clone, Copy)]
enum Op {
    Encrypt { scheme: EncryptionScheme, verify: bool },
    Decrypt,
}

/// One key and what to do with it. `split` holds the weight of the main
/// operation and of the verifying decryption.
struct Unit {
    key: CryptoKey,
    op: Op,
    split: (u64, u64),
}

impl Unit {
    fn weight(&self) -> u64 {
        self.split.0 + self.split.1
    }

    /// Fraction of the whole unit once `fraction` of the stage starting at
    /// `start` with weight `span` is done.
    fn portion(&self, start: u64, span: u64, fraction: f64) -> f64 {
        let total = self.weight();
        if total == 0 {
            return 1.0;
        }
        (start as f64 + span as f64 * fraction) / total as f64
    }

    fn execute(self, index: usize, passphrase: &str, tracker: &ProgressTracker) -> Result<CryptoKey, Error> {
        let weight = self.weight();
        let (main, check) = self.split;
        let mut key = self.key.clone();
        match self.op {
            Op::Decrypt => {
                key.decrypt(passphrase, &mut |f| {
                    tracker.report_unit(index, weight, self.portion(0, main, f))
                })?;
            }
            Op::Encrypt { scheme, verify } => {
                key.encrypt(scheme, passphrase, &mut |f| {
                    tracker.report_unit(index, weight, self.portion(0, main, f))
                })?;
                if verify {
                    let mut copy = key.clone();
                    let decrypted = copy.decrypt(passphrase, &mut |f| {
                        tracker.report_unit(index, weight, self.portion(main, check, f))
                    });
                    if let Err(e) = decrypted {
                        log::warn!("Verification of unit {} failed: {}", index, e);
                        return Err(Error::VerificationFailure { index });
                    }
                    if copy != self.key {
                        log::warn!("Verification of unit {} decrypted to a different key", index);
                        return Err(Error::VerificationFailure { index });
                    }
                }
            }
        }
        Ok(key)
    }
}
