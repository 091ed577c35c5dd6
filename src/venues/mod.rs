//! # Venues
//!
//! The capability set every venue adapter provides, and the registry that
//! maps a venue tag (`Bybit`, `Odos`, `Migration`, ...) to a factory.
//! Adding a venue means registering a factory; the engine never matches on
//! venue names.

/// Fixed-ratio conversion used for token migrations
pub mod migration;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;

use crate::engine::types::VenueRef;

pub use migration::Migration;

/// A quoting adapter for one venue. Quotes are side-effect-free reads.
///
/// A fresh instance is created per call, so `set_identity` only affects the
/// quotes issued through that instance.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Routes subsequent requests through `identity`, or directly when `None`.
    fn set_identity(&mut self, identity: Option<&str>);

    /// Tokens received for `amount_in` USDT (or input token for a step).
    /// `0.0` signals no liquidity.
    async fn quote_buy(&self, amount_in: f64, venue: &VenueRef) -> Result<f64>;

    /// USDT received for `amount_in` tokens. `0.0` signals no liquidity.
    async fn quote_sell(&self, amount_in: f64, venue: &VenueRef) -> Result<f64>;
}

/// Builds a fresh adapter instance.
pub type VenueFactory = Arc<dyn Fn() -> Box<dyn VenueAdapter> + Send + Sync>;

/// Venue tag to adapter factory.
#[derive(Clone, Default)]
pub struct VenueRegistry {
    /// Registered factories
    factories: HashMap<String, VenueFactory>,
}

impl fmt::Debug for VenueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("VenueRegistry").field("venues", &names).finish()
    }
}

impl VenueRegistry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the adapters that ship with this crate.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("Migration", || Box::new(Migration::new()));
        registry
    }

    /// Registers (or replaces) the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn VenueAdapter> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// A fresh adapter for `name`, if registered.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn VenueAdapter>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Whether `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered venue tags, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}
