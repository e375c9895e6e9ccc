//! Collector registry: names, constructors and enablement state.
//!
//! The registry is assembled explicitly by the startup routine, before flags
//! are parsed. After overrides have been applied it is only read.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::collector::{Collector, CollectorContext, CollectorError};

/// Errors raised while registering collectors or applying overrides.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A collector with this name is already registered.
    #[error("collector '{0}' is already registered")]
    Duplicate(String),

    /// An override names a collector that was never registered.
    #[error("unknown collector '{0}'")]
    UnknownCollector(String),
}

/// Explicit enablement overrides keyed by collector name.
///
/// Produced by the configuration layer. A name present here was explicitly
/// set, even when the value equals the collector's default.
pub type EnablementOverrides = BTreeMap<String, bool>;

type Constructor<S> =
    Box<dyn Fn(&CollectorContext<'_, S>) -> Result<Arc<dyn Collector>, CollectorError> + Send + Sync>;

/// Enablement state of a registered collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enablement {
    /// Compile-time default.
    pub default_enabled: bool,
    /// Effective state after overrides.
    pub enabled: bool,
    /// Whether an override was supplied.
    pub overridden: bool,
}

pub(crate) struct RegistryEntry<S> {
    pub(crate) constructor: Constructor<S>,
    pub(crate) enablement: Enablement,
}

/// Registry of available collectors.
///
/// `S` is the type of the shared dependencies handed to constructors at
/// build time.
pub struct CollectorRegistry<S = ()> {
    entries: BTreeMap<String, RegistryEntry<S>>,
}

impl<S> Default for CollectorRegistry<S> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<S> std::fmt::Debug for CollectorRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("collectors", &self.resolve())
            .finish_non_exhaustive()
    }
}

impl<S> CollectorRegistry<S> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector constructor under `name`.
    ///
    /// # Errors
    /// Returns `RegistryError::Duplicate` if `name` is taken; the existing
    /// entry is kept.
    pub fn register<C, F>(
        &mut self,
        name: impl Into<String>,
        default_enabled: bool,
        constructor: F,
    ) -> Result<(), RegistryError>
    where
        C: Collector,
        F: Fn(&CollectorContext<'_, S>) -> Result<C, CollectorError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        let constructor: Constructor<S> = Box::new(move |ctx: &CollectorContext<'_, S>| {
            let collector = constructor(ctx)?;
            Ok(Arc::new(collector) as Arc<dyn Collector>)
        });

        tracing::debug!(collector = %name, default_enabled, "Collector registered");
        self.entries.insert(
            name,
            RegistryEntry {
                constructor,
                enablement: Enablement {
                    default_enabled,
                    enabled: default_enabled,
                    overridden: false,
                },
            },
        );
        Ok(())
    }

    /// Apply explicit overrides from the configuration layer.
    ///
    /// # Errors
    /// Returns `RegistryError::UnknownCollector` for the first override that
    /// names an unregistered collector. No override is applied in that case.
    pub fn apply_overrides(&mut self, overrides: &EnablementOverrides) -> Result<(), RegistryError> {
        if let Some(unknown) = overrides.keys().find(|n| !self.contains(n)) {
            return Err(RegistryError::UnknownCollector(unknown.clone()));
        }

        for (name, enabled) in overrides {
            if let Some(entry) = self.entries.get_mut(name) {
                entry.enablement.enabled = *enabled;
                entry.enablement.overridden = true;
            }
        }
        Ok(())
    }

    /// Resolved enabled state of every registered collector.
    pub fn resolve(&self) -> BTreeMap<String, bool> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.enablement.enabled))
            .collect()
    }

    /// Full enablement table, for diagnostics.
    pub fn enablement(&self) -> impl Iterator<Item = (&str, Enablement)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.enablement))
    }

    /// Registered names with their default state, in name order.
    pub fn defaults(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.enablement.default_enabled))
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no collector is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry<S>)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}
