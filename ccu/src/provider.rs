// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Publishing clocks and resets to other drivers.

use std::collections::BTreeMap;

use crate::{descriptor::ClockId, reset::ResetId};

/// A clock that other drivers may look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedClock {
    pub name: &'static str,
    pub id: Option<ClockId>,
}

/// Everything one CCU provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// The firmware node (for instance, the device tree compatible).
    pub node: String,
    pub clocks: Vec<ProvidedClock>,
    /// Number of reset lines.
    pub resets: usize,
}

/// The host rejected a provider.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Rejected(pub String);

/// A host service that publishes providers.
pub trait Registry {
    /// Publish the provider, all or nothing.
    fn register(&mut self, provider: Provider) -> Result<(), Rejected>;
}

/// A [`Registry`] that keeps providers in memory, keyed by node.
#[derive(Debug, Default)]
pub struct ProviderTable {
    providers: BTreeMap<String, Provider>,
}

impl ProviderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&self, node: &str) -> Option<&Provider> {
        self.providers.get(node)
    }

    /// Look up a clock of `node` by name. Case doesn't matter.
    pub fn clock(&self, node: &str, name: &str) -> Option<&ProvidedClock> {
        self.provider(node)?
            .clocks
            .iter()
            .find(|clock| clock.name.eq_ignore_ascii_case(name))
    }

    /// Look up a reset line of `node` by index.
    pub fn reset(&self, node: &str, index: usize) -> Option<ResetId> {
        let provider = self.provider(node)?;
        (index < provider.resets).then_some(ResetId(index))
    }
}

impl Registry for ProviderTable {
    fn register(&mut self, provider: Provider) -> Result<(), Rejected> {
        if self.providers.contains_key(&provider.node) {
            return Err(Rejected(format!("{} is already registered", provider.node)));
        }
        self.providers.insert(provider.node.clone(), provider);
        Ok(())
    }
}
