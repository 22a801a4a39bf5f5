//! Weighted progress accounting and cancellation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Receives `(fraction, label)` with `fraction` in `[0, 1]`.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, fraction: f64, label: &str);
}

impl<F> ProgressListener for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn on_progress(&self, fraction: f64, label: &str) {
        self(fraction, label)
    }
}

/// Listener that discards every report.
pub fn silent() -> Arc<dyn ProgressListener> {
    Arc::new(|_: f64, _: &str| {})
}

/// Maps `[0, 1]` onto `[offset, offset + scale]` of an outer listener, so one
/// progress bar can span several stages.
pub struct ScaledListener {
    inner: Arc<dyn ProgressListener>,
    offset: f64,
    scale: f64,
}

impl ScaledListener {
    pub fn new(inner: Arc<dyn ProgressListener>, offset: f64, scale: f64) -> Self {
        Self { inner, offset, scale }
    }
}

impl ProgressListener for ScaledListener {
    fn on_progress(&self, fraction: f64, label: &str) {
        self.inner
            .on_progress(self.offset + self.scale * fraction.clamp(0.0, 1.0), label);
    }
}

/// Cooperative cancellation flag shared between the host and a batch.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelToken").field(&self.is_cancelled()).finish()
    }
}

#[derive(Default)]
struct Totals {
    done: u64,
    in_flight: BTreeMap<usize, f64>,
}

/// Tracks `(done + sum(in-flight weight * fraction)) / total` for a batch.
///
/// Once the cancel token is set or the batch is stopped nothing more is
/// reported.
pub struct ProgressTracker {
    listener: Arc<dyn ProgressListener>,
    label: String,
    total: u64,
    cancel: CancelToken,
    stopped: AtomicBool,
    totals: Mutex<Totals>,
}

impl ProgressTracker {
    pub fn new(
        listener: Arc<dyn ProgressListener>,
        label: impl Into<String>,
        total: u64,
        cancel: CancelToken,
    ) -> Self {
        Self {
            listener,
            label: label.into(),
            total,
            cancel,
            stopped: AtomicBool::new(false),
            totals: Mutex::new(Totals::default()),
        }
    }

    /// Records that unit `index` of weight `weight` is `fraction` done.
    pub fn report_unit(&self, index: usize, weight: u64, fraction: f64) {
        let percent = {
            let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
            totals
                .in_flight
                .insert(index, weight as f64 * fraction.clamp(0.0, 1.0));
            self.percent(&totals)
        };
        self.emit(percent);
    }

    /// Moves unit `index` into the completed weight.
    pub fn complete_unit(&self, index: usize, weight: u64) {
        let percent = {
            let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
            totals.in_flight.remove(&index);
            totals.done += weight;
            self.percent(&totals)
        };
        self.emit(percent);
    }

    /// Silences the tracker for good. Reports from units still running on
    /// the blocking pool after the batch failed are dropped.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn percent(&self, totals: &Totals) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        let partial: f64 = totals.in_flight.values().sum();
        ((totals.done as f64 + partial) / self.total as f64).min(1.0)
    }

    fn emit(&self, percent: f64) {
        if self.cancel.is_cancelled() || self.stopped.load(Ordering::SeqCst) {
            return;
        }
        self.listener.on_progress(percent, &self.label);
    }
}
