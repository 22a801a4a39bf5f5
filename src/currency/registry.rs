//! Ticker-indexed plugin lookup.

use std::sync::Arc;

use super::{BitcoinPlugin, CurrencyPlugin, EthereumPlugin};
use crate::config::CoreConfig;
use crate::key::KeyError;

/// Immutable set of currency plugins, built once and shared by the codec,
/// orchestrator and pipeline.
#[derive(Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn CurrencyPlugin>>,
}

impl PluginRegistry {
    /// Registry over explicit plugins. Tickers must be unique.
    pub fn new(plugins: Vec<Arc<dyn CurrencyPlugin>>) -> Result<Self, KeyError> {
        for (i, plugin) in plugins.iter().enumerate() {
            if plugins[..i].iter().any(|p| p.ticker() == plugin.ticker()) {
                return Err(KeyError::DuplicateCurrency(plugin.ticker().to_string()));
            }
        }
        Ok(PluginRegistry { plugins })
    }

    /// BTC, BCH, LTC, DASH, ETH and ETC configured from `config`.
    ///
    /// Donation addresses must name a registered ticker and pass that
    /// currency's address check.
    pub fn from_config(config: &CoreConfig) -> Result<Self, KeyError> {
        let donation = |ticker: &str| config.donation_addresses.get(ticker).cloned();
        let plugins: Vec<Arc<dyn CurrencyPlugin>> = vec![
            Arc::new(BitcoinPlugin::bitcoin(config.bip38).with_donation_address(donation("BTC"))),
            Arc::new(
                BitcoinPlugin::bitcoin_cash(config.bip38).with_donation_address(donation("BCH")),
            ),
            Arc::new(BitcoinPlugin::litecoin(config.bip38).with_donation_address(donation("LTC"))),
            Arc::new(BitcoinPlugin::dash(config.bip38).with_donation_address(donation("DASH"))),
            Arc::new(EthereumPlugin::ethereum().with_donation_address(donation("ETH"))),
            Arc::new(EthereumPlugin::ethereum_classic().with_donation_address(donation("ETC"))),
        ];
        let registry = Self::new(plugins)?;

        for (ticker, address) in &config.donation_addresses {
            let plugin = registry.require(ticker)?;
            if !plugin.is_address(address) {
                return Err(KeyError::InvalidAddress {
                    ticker: ticker.clone(),
                    address: address.clone(),
                });
            }
        }
        log::debug!("registered currencies: {}", registry.tickers().join(", "));
        Ok(registry)
    }

    pub fn get(&self, ticker: &str) -> Option<Arc<dyn CurrencyPlugin>> {
        self.plugins.iter().find(|p| p.ticker() == ticker).cloned()
    }

    /// Like [`get`](Self::get), failing with `UnknownCurrency`.
    pub fn require(&self, ticker: &str) -> Result<Arc<dyn CurrencyPlugin>, KeyError> {
        self.get(ticker)
            .ok_or_else(|| KeyError::UnknownCurrency(ticker.to_string()))
    }

    pub fn plugins(&self) -> &[Arc<dyn CurrencyPlugin>] {
        &self.plugins
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.ticker()).collect()
    }
}
