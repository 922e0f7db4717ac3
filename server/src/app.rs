//! Composition root: one converter and one ledger per process.

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use pocketbook_common::{Currency, Result};
use pocketbook_fx::{CurrencyConverter, ResolvedRate};
use pocketbook_ledger::Ledger;

use crate::config::ServerConfig;
use crate::state::AppState;

/// The running service.
pub struct App {
    config: ServerConfig,
    converter: Arc<CurrencyConverter>,
    ledger: Ledger,
    state: Arc<RwLock<AppState>>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: Mutex<Option<mpsc::Receiver<()>>>,
    reporter: Mutex<Option<JoinHandle<()>>>,
}

impl App {
    /// Wire the HTTP rate source, cache, converter and ledger from `config`.
    pub fn new(config: ServerConfig) -> Self {
        let converter = config.fx.build_converter();
        Self::with_converter(config, converter)
    }

    /// Build around an existing converter.
    pub fn with_converter(config: ServerConfig, converter: CurrencyConverter) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let converter = Arc::new(converter);

        Self {
            ledger: Ledger::new(converter.clone()),
            converter,
            config,
            state: Arc::new(RwLock::new(AppState::Starting)),
            shutdown_tx,
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
            reporter: Mutex::new(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        info!(source = %self.config.fx.source_url, "Starting pocketbook");

        if self.config.warm_cache {
            self.warm_cache().await;
        }

        self.start_background_tasks();
        *self.state.write() = AppState::Running;

        info!("Pocketbook started");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping pocketbook");
        *self.state.write() = AppState::ShuttingDown;

        // No reporter ever took the receiver; nothing is listening.
        drop(self.shutdown_rx.lock().take());
        if let Err(e) = self.shutdown_tx.try_send(()) {
            debug!(reason = %e, "Shutdown signal not delivered");
        }

        let reporter = self.reporter.lock().take();
        if let Some(handle) = reporter {
            if let Err(e) = handle.await {
                warn!(error = %e, "Rate stats reporter ended abnormally");
            }
        }

        *self.state.write() = AppState::Stopped;
        info!("Pocketbook stopped");
        Ok(())
    }

    /// Fetch the rate table ahead of the first conversion. Returns whether a
    /// table is available afterwards.
    pub async fn warm_cache(&self) -> bool {
        match self.converter.cache().table().await {
            Ok(table) => {
                info!(quotes = table.len(), "Rate cache warmed");
                true
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Could not warm rate cache, conversions use fallback rates until the source recovers"
                );
                false
            }
        }
    }

    /// Resolve every supported pair.
    pub async fn rate_matrix(&self) -> Vec<ResolvedRate> {
        let pairs = Currency::ALL
            .iter()
            .flat_map(|&from| Currency::ALL.iter().map(move |&to| (from, to)));

        join_all(pairs.map(|(from, to)| self.converter.resolve(from, to))).await
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn converter(&self) -> &Arc<CurrencyConverter> {
        &self.converter
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state(&self) -> AppState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    fn start_background_tasks(&self) {
        let period = self.config.stats_interval;
        if period.is_zero() {
            return;
        }

        let Some(mut shutdown_rx) = self.shutdown_rx.lock().take() else {
            return;
        };

        let converter = self.converter.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => log_rate_stats(&converter),
                    _ = shutdown_rx.recv() => break,
                }
            }
            debug!("Rate stats reporter stopped");
        });

        *self.reporter.lock() = Some(handle);
    }
}

fn log_rate_stats(converter: &CurrencyConverter) {
    let cache = converter.cache().stats();
    let tiers = converter.metrics().snapshot();
    let age_secs = converter.cache().age().map(|age| age.as_secs());

    info!(
        hits = cache.hits,
        fetches = cache.fetches,
        failures = cache.failures,
        stale_serves = cache.stale_serves,
        table_age_secs = ?age_secs,
        live = tiers.live,
        fallback = tiers.fallback,
        last_resort = tiers.last_resort,
        "Rate stats"
    );
}
